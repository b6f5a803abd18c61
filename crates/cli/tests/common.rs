// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::net::TcpListener;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Isolated home for one test: config file and data directory inside a temp dir.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Sandbox {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn write_config(&self, text: &str) {
        std::fs::write(self.config_path(), text).unwrap();
    }

    /// `proctor` with config and data pointed into the sandbox.
    pub fn proctor(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("proctor");
        cmd.env("PROCTOR_CONFIG", self.config_path())
            .env("PROCTOR_DATA_DIR", self.data_dir())
            .env_remove("PROCTOR_SERVER")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

/// A base URL nothing is listening on.
pub fn dead_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}
