// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! proctor-core: client-side resilience layer for the assessment service
//!
//! This crate provides the request transport, retry policy, response cache,
//! persistent store and test-session engine used by the proctor CLI.

pub mod api;
pub mod cache;
pub mod clock;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod session;
pub mod store;
pub mod timer;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use api::AssessmentApi;
pub use cache::{CacheConfig, ResponseCache};
pub use clock::{ClockSource, ManualClock, SystemClock, TokioClock};
pub use error::{Error, ErrorKind, Result, RetryableError, SessionPhase};
pub use protocol::{Answers, ChoiceId, Question, QuestionId, TestResult, TestType};
pub use retry::RetryPolicy;
pub use session::{EngineConfig, SessionEngine, SessionView, Submission};
pub use store::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore, StoreError};
pub use transport::{HttpTransport, Method, Request, Transport, TransportConfig};
