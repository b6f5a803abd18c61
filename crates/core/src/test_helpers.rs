// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: a scripted transport and response fixtures.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::RetryableError;
use crate::transport::{Method, Request, Transport, TransportResult};

type Route = (Method, String);

/// Mock transport for testing without real sockets.
///
/// Responses are looked up by method and endpoint: queued one-shot responses
/// first, then the route's standing response, else a 404.
#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<Route, VecDeque<TransportResult<Value>>>>,
    standing: Mutex<HashMap<Route, TransportResult<Value>>>,
    requests: Mutex<Vec<Request>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response returned once.
    pub fn respond_once(&self, method: Method, endpoint: &str, result: TransportResult<Value>) {
        self.queued
            .lock()
            .unwrap()
            .entry((method, endpoint.to_string()))
            .or_default()
            .push_back(result);
    }

    /// Set the response returned whenever nothing is queued.
    pub fn respond(&self, method: Method, endpoint: &str, result: TransportResult<Value>) {
        self.standing
            .lock()
            .unwrap()
            .insert((method, endpoint.to_string()), result);
    }

    /// Delay every response by `delay` (tokio time).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests seen for one route.
    pub fn count(&self, method: Method, endpoint: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.endpoint == endpoint)
            .count()
    }

    fn next_response(&self, route: &Route) -> TransportResult<Value> {
        if let Some(result) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(route)
            .and_then(|q| q.pop_front())
        {
            return result;
        }
        match self.standing.lock().unwrap().get(route) {
            Some(result) => result.clone(),
            None => Err(RetryableError::from_status(
                404,
                format!("no mock route for {} {}", route.0.as_str(), route.1),
            )),
        }
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Value>> + Send + '_>> {
        Box::pin(async move {
            let route = (request.method, request.endpoint.clone());
            self.requests.lock().unwrap().push(request);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.next_response(&route)
        })
    }
}

pub fn question_json(id: u64) -> Value {
    json!({
        "id": id,
        "text": format!("Question {}", id),
        "options": [
            {"id": "A", "text": "first"},
            {"id": "B", "text": "second"},
            {"id": "C", "text": "third"},
        ],
        "number": id,
    })
}

pub fn session_json(
    session_id: &str,
    topic_id: u64,
    test_type: &str,
    total: u32,
    limit: Option<u32>,
) -> Value {
    json!({
        "session": {
            "id": session_id,
            "topic_id": topic_id,
            "test_type": test_type,
            "total_questions": total,
            "time_limit_minutes": limit,
        },
        "current_question": question_json(1),
        "progress": {"answered": 0, "total": total},
    })
}

pub fn result_json(result_id: &str, correct: u32, total: u32) -> Value {
    json!({
        "id": result_id,
        "score": f64::from(correct) * 100.0 / f64::from(total),
        "correct_answers": correct,
        "total_questions": total,
        "passed": correct * 2 >= total,
    })
}
