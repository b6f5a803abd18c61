// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint layer over retry + transport.
//!
//! Each method validates its parameters before touching the network, issues one
//! request through the [`RetryPolicy`], and decodes the body into its wire type.
//! Session endpoints turn a 404 into [`Error::SessionNotFound`]. Per-student
//! reads turn a 404 into an empty default instead of an error.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result, RetryableError};
use crate::protocol::{
    AnswerRequest, AnswerResponse, Answers, CreateSessionRequest, CreateSessionResponse,
    FinishRequest, Question, QuestionId, StudentStatistics, TestResult, TestSummary, TestType,
};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Request, Transport, TransportConfig};

/// Client for the assessment service.
pub struct AssessmentApi<T: Transport = HttpTransport> {
    transport: T,
    retry: RetryPolicy,
}

impl AssessmentApi<HttpTransport> {
    /// Create a client with the default HTTP transport.
    pub fn new(config: TransportConfig, retry: RetryPolicy) -> Self {
        Self::with_transport(HttpTransport::new(config), retry)
    }
}

impl<T: Transport> AssessmentApi<T> {
    /// Create a client with a custom transport (for testing).
    pub fn with_transport(transport: T, retry: RetryPolicy) -> Self {
        AssessmentApi { transport, retry }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn call<R: DeserializeOwned>(&self, request: Request) -> Result<R> {
        let value = self
            .retry
            .run(|| self.transport.execute(request.clone()))
            .await?;
        serde_json::from_value(value).map_err(|e| {
            Error::Request(RetryableError::malformed(format!(
                "unexpected response from {}: {}",
                request.endpoint, e
            )))
        })
    }

    /// Like `call`, but a 404 yields `R::default()`.
    async fn call_or_default<R: DeserializeOwned + Default>(&self, request: Request) -> Result<R> {
        let endpoint = request.endpoint.clone();
        match self.call(request).await {
            Err(Error::Request(e)) if e.is_not_found() => {
                debug!(%endpoint, "not found, using default");
                Ok(R::default())
            }
            other => other,
        }
    }

    async fn call_session<R: DeserializeOwned>(&self, session_id: &str, request: Request) -> Result<R> {
        match self.call(request).await {
            Err(Error::Request(e)) if e.is_not_found() => {
                Err(Error::SessionNotFound(session_id.to_string()))
            }
            other => other,
        }
    }

    /// `POST /tests/session`
    pub async fn create_session(
        &self,
        topic_id: u64,
        test_type: TestType,
    ) -> Result<CreateSessionResponse> {
        if topic_id == 0 {
            return Err(Error::Validation("topic id must be positive".to_string()));
        }
        let body = serde_json::to_value(CreateSessionRequest {
            topic_id,
            test_type,
        })?;
        self.call(Request::post("tests/session", body)).await
    }

    /// `GET /tests/session/{id}/question`
    pub async fn current_question(&self, session_id: &str) -> Result<Question> {
        validate_id("session id", session_id)?;
        self.call_session(
            session_id,
            Request::get(format!("tests/session/{}/question", session_id)),
        )
        .await
    }

    /// `POST /tests/session/{id}/answer`
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: QuestionId,
        answer_id: &str,
    ) -> Result<AnswerResponse> {
        validate_id("session id", session_id)?;
        if answer_id.trim().is_empty() {
            return Err(Error::Validation("answer must not be empty".to_string()));
        }
        let body = serde_json::to_value(AnswerRequest {
            question_id,
            answer_id: answer_id.to_string(),
        })?;
        self.call_session(
            session_id,
            Request::post(format!("tests/session/{}/answer", session_id), body),
        )
        .await
    }

    /// `POST /tests/session/{id}/finish`
    pub async fn finish_session(
        &self,
        session_id: &str,
        answers: &Answers,
        time_spent_secs: u64,
    ) -> Result<TestResult> {
        validate_id("session id", session_id)?;
        let body = serde_json::to_value(FinishRequest {
            answers: answers.clone(),
            time_spent_secs,
        })?;
        self.call_session(
            session_id,
            Request::post(format!("tests/session/{}/finish", session_id), body),
        )
        .await
    }

    /// `GET /tests/result/{id}`
    pub async fn get_result(&self, result_id: &str) -> Result<TestResult> {
        validate_id("result id", result_id)?;
        self.call(Request::get(format!("tests/result/{}", result_id)))
            .await
    }

    /// `GET /students/{id}/statistics`, zeroed on 404.
    pub async fn student_statistics(&self, student_id: u64) -> Result<StudentStatistics> {
        self.call_or_default(Request::get(format!("students/{}/statistics", student_id)))
            .await
    }

    /// `GET /students/{id}/tests`, empty on 404.
    pub async fn tests_by_student(&self, student_id: u64) -> Result<Vec<TestSummary>> {
        self.call_or_default(Request::get(format!("students/{}/tests", student_id)))
            .await
    }
}

fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", what)));
    }
    if id.contains('/') {
        return Err(Error::Validation(format!("{} contains '/': {}", what, id)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
