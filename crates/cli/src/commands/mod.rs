// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod cache;
pub mod config;
pub mod result;
pub mod stats;
pub mod take;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use proctor_core::{AssessmentApi, FileStore, KeyValueStore, ResponseCache};

use crate::config::Config;
use crate::error::Result;

/// Effective configuration plus where it was loaded from.
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
}

impl Context {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Context {
            config,
            config_path,
        }
    }

    /// Opens the on-disk store in the data directory.
    pub fn store(&self) -> Result<Arc<dyn KeyValueStore>> {
        let store = FileStore::open(&self.config.store_dir())?;
        Ok(Arc::new(store))
    }

    pub fn api(&self) -> AssessmentApi {
        AssessmentApi::new(self.config.transport(), self.config.retry_policy())
    }

    pub fn cache(&self, store: Arc<dyn KeyValueStore>) -> ResponseCache {
        ResponseCache::new(store, self.config.cache_config())
    }
}

/// Runtime for commands that talk to the server.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
