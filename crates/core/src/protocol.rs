// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types exchanged with the assessment service.
//!
//! The protocol is plain JSON over HTTP:
//! - `POST /tests/session` creates a session and returns the first question
//! - `GET /tests/session/{id}/question` returns the current question
//! - `POST /tests/session/{id}/answer` records one answer
//! - `POST /tests/session/{id}/finish` grades the attempt
//! - `GET /tests/result/{id}` returns a graded result

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned question identifier.
pub type QuestionId = u64;

/// Identifier of one answer option within a question.
pub type ChoiceId = String;

/// Committed answers, one choice per question.
pub type Answers = BTreeMap<QuestionId, ChoiceId>;

/// Kind of attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// Untimed practice; the clock counts up.
    #[default]
    Training,
    /// Graded attempt, usually with a time limit; the clock counts down.
    Exam,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Training => write!(f, "training"),
            TestType::Exam => write!(f, "exam"),
        }
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "training" => Ok(TestType::Training),
            "exam" => Ok(TestType::Exam),
            other => Err(format!(
                "invalid test type: '{}'\n  hint: valid types are: training, exam",
                other
            )),
        }
    }
}

/// Session metadata returned on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub topic_id: u64,
    #[serde(default)]
    pub test_type: TestType,
    pub total_questions: u32,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: ChoiceId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    /// 1-based position within the test, when the server reports it.
    #[serde(default)]
    pub number: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub answered: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub topic_id: u64,
    pub test_type: TestType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session: SessionInfo,
    #[serde(default)]
    pub current_question: Option<Question>,
    #[serde(default)]
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub answer_id: ChoiceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub next_question: Option<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishRequest {
    pub answers: Answers,
    pub time_spent_secs: u64,
}

/// A graded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics for one student. Zeroed when the student has none.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudentStatistics {
    #[serde(default)]
    pub tests_taken: u32,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub best_score: f64,
}

/// One entry of a student's test history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub result_id: String,
    pub topic_id: u64,
    #[serde(default)]
    pub test_type: TestType,
    pub score: f64,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
