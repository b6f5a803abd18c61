// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use serde_json::{json, Value};

use super::*;
use crate::error::RetryableError;
use crate::retry::RetryPolicy;
use crate::store::MemoryStore;
use crate::test_helpers::{question_json, result_json, session_json, MockTransport};
use crate::transport::Method;

const START_MS: u64 = 1_700_000_000_000;
const TOPIC: u64 = 42;
const FINISH: &str = "tests/session/s-1/finish";

struct Harness {
    engine: SessionEngine<Arc<MockTransport>>,
    mock: Arc<MockTransport>,
    store: Arc<MemoryStore>,
}

fn harness_with(store: Arc<MemoryStore>, session: Value) -> Harness {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, "tests/session", Ok(session));
    mock.respond(Method::Post, FINISH, Ok(result_json("r-1", 1, 30)));
    let engine = SessionEngine::with_clock(
        AssessmentApi::with_transport(mock.clone(), RetryPolicy::default()),
        store.clone(),
        Arc::new(TokioClock::starting_at(START_MS)),
        EngineConfig::default(),
    );
    Harness {
        engine,
        mock,
        store,
    }
}

fn training() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        session_json("s-1", TOPIC, "training", 30, None),
    )
}

fn timed_exam() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        session_json("s-1", TOPIC, "exam", 30, Some(1)),
    )
}

fn stored(store: &MemoryStore, key: &str) -> Option<Value> {
    store
        .get(key)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

fn choices(ids: &[&str]) -> BTreeSet<ChoiceId> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn initialize_publishes_first_question() {
    let h = training();
    let mut rx = h.engine.subscribe();

    let view = h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    assert_eq!(view.phase, SessionPhase::InProgress);
    assert_eq!(view.session_id.as_deref(), Some("s-1"));
    assert_eq!(view.total_questions, 30);
    assert_eq!(view.current_question.unwrap().id, 1);
    assert_eq!(view.time_left, None);
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().phase, SessionPhase::InProgress);
}

#[tokio::test(start_paused = true)]
async fn finalize_commits_only_a_single_choice() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    h.engine.propose_choice(1, "A").unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    assert!(!h.engine.finalize_answer(1).unwrap());
    let view = h.engine.view();
    assert!(view.answers.is_empty());
    assert_eq!(view.selected[&1], choices(&["A", "B"]));

    h.engine.withdraw_choice(1, "A").unwrap();
    assert!(h.engine.finalize_answer(1).unwrap());
    let view = h.engine.view();
    assert_eq!(view.answers[&1], "B");
    assert!(!view.selected.contains_key(&1));

    // Nothing proposed.
    assert!(!h.engine.finalize_answer(7).unwrap());
    assert_eq!(h.engine.view().answers.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn propose_is_idempotent_and_withdraw_drops_empty_sets() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    h.engine.propose_choice(3, "C").unwrap();
    h.engine.propose_choice(3, "C").unwrap();
    assert_eq!(h.engine.view().selected[&3], choices(&["C"]));

    h.engine.withdraw_choice(3, "C").unwrap();
    h.engine.withdraw_choice(3, "C").unwrap();
    assert!(h.engine.view().selected.is_empty());

    assert!(matches!(
        h.engine.propose_choice(3, ""),
        Err(Error::Validation(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn navigation_finalizes_the_question_left() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    h.engine.propose_choice(1, "B").unwrap();
    assert_eq!(h.engine.navigate(2).unwrap(), None);
    assert_eq!(h.engine.view().answers[&1], "B");
    assert_eq!(h.engine.view().current_question_id, Some(2));

    // Question 1 was loaded at start, so its content comes back.
    let back = h.engine.navigate(1).unwrap().unwrap();
    assert_eq!(back.id, 1);
}

#[tokio::test(start_paused = true)]
async fn training_attempt_submits_committed_answers_only() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    h.engine.propose_choice(1, "B").unwrap();
    h.engine.navigate(2).unwrap();
    h.engine.propose_choice(2, "A").unwrap();
    h.engine.propose_choice(2, "C").unwrap();
    assert_eq!(h.engine.unanswered_count(), 29);

    let submission = h.engine.submit().await.unwrap();

    assert_eq!(submission.unanswered, 29);
    assert_eq!(submission.result.id, "r-1");
    let sent = h.mock.requests().last().cloned().unwrap();
    assert_eq!(sent.endpoint, FINISH);
    assert_eq!(
        sent.body,
        Some(json!({"answers": {"1": "B"}, "time_spent_secs": 0}))
    );
    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::Finished);
    assert!(view.is_finished);
    assert_eq!(view.result.unwrap().id, "r-1");
    assert!(h.store.keys().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn autosave_mirrors_state_after_thirty_seconds() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();
    h.engine.propose_choice(2, "A").unwrap();

    tokio::time::sleep(Duration::from_millis(29_500)).await;
    assert_eq!(stored(&h.store, &answers_key(TOPIC)), None);
    assert_eq!(
        stored(&h.store, &time_key(TOPIC)),
        Some(json!({"elapsed_secs": 29, "deadline_ms": null}))
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        stored(&h.store, &answers_key(TOPIC)),
        Some(json!({"1": "B"}))
    );
    assert_eq!(
        stored(&h.store, &selected_key(TOPIC)),
        Some(json!({"2": ["A"]}))
    );
    assert_eq!(h.engine.view().time_elapsed, 30);
}

#[tokio::test(start_paused = true)]
async fn timed_exam_auto_submits_exactly_once() {
    let h = timed_exam();
    let view = h.engine.initialize(TOPIC, TestType::Exam).await.unwrap();
    assert_eq!(view.time_left, Some(60));
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();

    tokio::time::sleep(Duration::from_millis(59_500)).await;
    assert_eq!(h.mock.count(Method::Post, FINISH), 0);
    assert_eq!(h.engine.view().time_left, Some(1));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.mock.count(Method::Post, FINISH), 1);
    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::Finished);
    assert_eq!(view.result.unwrap().id, "r-1");
    let sent = h.mock.requests().last().cloned().unwrap();
    assert_eq!(
        sent.body,
        Some(json!({"answers": {"1": "B"}, "time_spent_secs": 60}))
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.mock.count(Method::Post, FINISH), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_submit_is_not_repeated() {
    let h = timed_exam();
    h.mock.respond(
        Method::Post,
        FINISH,
        Err(RetryableError::from_status(503, "maintenance")),
    );
    h.engine.initialize(TOPIC, TestType::Exam).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;

    // One automatic submission, retried by the policy, never restarted.
    assert_eq!(h.mock.count(Method::Post, FINISH), 3);
    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::InProgress);
    assert_eq!(view.time_left, Some(0));
    assert!(view.error.is_some());

    // A manual submit still works.
    h.mock
        .respond(Method::Post, FINISH, Ok(result_json("r-1", 0, 30)));
    h.engine.submit().await.unwrap();
    assert_eq!(h.engine.phase(), SessionPhase::Finished);
}

#[tokio::test(start_paused = true)]
async fn failed_submit_keeps_local_state() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();
    h.mock.respond(
        Method::Post,
        FINISH,
        Err(RetryableError::from_status(500, "boom")),
    );

    let err = h.engine.submit().await.unwrap_err();

    assert!(err.is_retryable());
    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::InProgress);
    assert_eq!(view.answers[&1], "B");
    assert_eq!(
        view.error.as_deref(),
        Some("The server ran into a problem. Please try again in a moment.")
    );
    assert_eq!(
        stored(&h.store, &answers_key(TOPIC)),
        Some(json!({"1": "B"}))
    );

    // Answers can still change, and a later submit succeeds.
    h.engine.propose_choice(2, "C").unwrap();
    h.mock
        .respond(Method::Post, FINISH, Ok(result_json("r-1", 2, 30)));
    let submission = h.engine.submit().await.unwrap();
    assert_eq!(submission.result.correct_answers, 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_submit_is_rejected() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.mock.set_delay(Duration::from_secs(2));

    let (first, (second, propose)) = tokio::join!(h.engine.submit(), async {
        tokio::task::yield_now().await;
        (h.engine.submit().await, h.engine.propose_choice(3, "A"))
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(Error::SubmitInProgress)));
    assert!(matches!(propose, Err(Error::SubmitInProgress)));
    assert_eq!(h.mock.count(Method::Post, FINISH), 1);
}

#[tokio::test(start_paused = true)]
async fn pending_unanswered_counts_the_implicit_finalize() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    h.engine.propose_choice(1, "B").unwrap();
    h.engine.navigate(2).unwrap();
    assert_eq!(h.engine.pending_unanswered(), 29);

    h.engine.propose_choice(2, "A").unwrap();
    assert_eq!(h.engine.unanswered_count(), 29);
    assert_eq!(h.engine.pending_unanswered(), 28);

    // Two choices on the current question do not commit.
    h.engine.propose_choice(2, "C").unwrap();
    assert_eq!(h.engine.pending_unanswered(), 29);
    h.engine.withdraw_choice(2, "C").unwrap();

    let submission = h.engine.submit().await.unwrap();
    assert_eq!(submission.unanswered, 28);
}

#[tokio::test(start_paused = true)]
async fn initialize_resumes_saved_progress() {
    let store = Arc::new(MemoryStore::new());
    store.set(&answers_key(TOPIC), r#"{"3":"C"}"#).unwrap();
    store.set(&selected_key(TOPIC), r#"{"4":["A","B"]}"#).unwrap();
    store.set(&time_key(TOPIC), r#"{"elapsed_secs":120}"#).unwrap();
    let h = harness_with(store, session_json("s-1", TOPIC, "training", 30, None));

    let view = h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    assert_eq!(view.answers[&3], "C");
    assert_eq!(view.selected[&4], choices(&["A", "B"]));
    assert_eq!(view.time_elapsed, 120);
    assert_eq!(h.engine.unanswered_count(), 29);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.engine.view().time_elapsed, 121);
}

#[tokio::test(start_paused = true)]
async fn resumed_deadline_takes_precedence() {
    let store = Arc::new(MemoryStore::new());
    let deadline = START_MS + 10_000;
    store
        .set(
            &time_key(TOPIC),
            &json!({"elapsed_secs": 50, "deadline_ms": deadline}).to_string(),
        )
        .unwrap();
    let h = harness_with(store, session_json("s-1", TOPIC, "exam", 30, Some(1)));

    let view = h.engine.initialize(TOPIC, TestType::Exam).await.unwrap();
    assert_eq!(view.time_left, Some(10));

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(h.mock.count(Method::Post, FINISH), 1);
}

#[tokio::test(start_paused = true)]
async fn unreadable_saved_progress_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    store.set(&answers_key(TOPIC), "{not json").unwrap();
    let h = harness_with(store, session_json("s-1", TOPIC, "training", 30, None));

    let view = h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    assert_eq!(view.phase, SessionPhase::InProgress);
    assert!(view.answers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_initialize_can_be_retried() {
    let h = training();
    for _ in 0..3 {
        h.mock.respond_once(
            Method::Post,
            "tests/session",
            Err(RetryableError::network("connection refused")),
        );
    }

    let err = h
        .engine
        .initialize(TOPIC, TestType::Training)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Request(_)));
    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::Error);
    assert!(!view.loading);
    assert_eq!(
        view.error.as_deref(),
        Some("Could not reach the server. Check your connection and try again.")
    );

    let view = h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    assert_eq!(view.phase, SessionPhase::InProgress);
    assert_eq!(view.error, None);
    assert_eq!(h.mock.count(Method::Post, "tests/session"), 4);
}

#[tokio::test(start_paused = true)]
async fn operations_check_phase() {
    let h = training();

    assert!(matches!(
        h.engine.propose_choice(1, "A"),
        Err(Error::InvalidState {
            phase: SessionPhase::Uninitialized,
            ..
        })
    ));
    assert!(matches!(
        h.engine.submit().await,
        Err(Error::InvalidState { .. })
    ));
    assert!(matches!(
        h.engine.save_progress(),
        Err(Error::NoActiveSession)
    ));
    assert!(matches!(
        h.engine.initialize(0, TestType::Training).await,
        Err(Error::Validation(_))
    ));
    assert!(h.mock.requests().is_empty());

    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    assert!(matches!(
        h.engine.initialize(TOPIC, TestType::Training).await,
        Err(Error::InvalidState {
            action: "initialize",
            phase: SessionPhase::InProgress
        })
    ));

    h.engine.submit().await.unwrap();
    assert!(matches!(
        h.engine.finalize_answer(1),
        Err(Error::InvalidState {
            phase: SessionPhase::Finished,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn record_answer_advances_to_next_question() {
    let h = training();
    h.mock.respond(
        Method::Post,
        "tests/session/s-1/answer",
        Ok(json!({"progress": {"answered": 1, "total": 30}, "next_question": question_json(2)})),
    );
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    assert!(matches!(
        h.engine.record_answer(1).await,
        Err(Error::Validation(_))
    ));

    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();
    h.engine.record_answer(1).await.unwrap();

    let view = h.engine.view();
    assert_eq!(view.progress.answered, 1);
    assert_eq!(view.current_question.unwrap().id, 2);
    let sent = h.mock.requests().last().cloned().unwrap();
    assert_eq!(sent.body, Some(json!({"question_id": 1, "answer_id": "B"})));
}

#[tokio::test(start_paused = true)]
async fn failed_answer_push_keeps_committed_answer() {
    let h = training();
    h.mock.respond(
        Method::Post,
        "tests/session/s-1/answer",
        Err(RetryableError::from_status(502, "bad gateway")),
    );
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();

    assert!(h.engine.record_answer(1).await.is_err());

    let view = h.engine.view();
    assert_eq!(view.phase, SessionPhase::InProgress);
    assert_eq!(view.answers[&1], "B");
    assert!(view.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn load_current_question_points_at_server_question() {
    let h = training();
    h.mock.respond(
        Method::Get,
        "tests/session/s-1/question",
        Ok(question_json(5)),
    );
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();

    let question = h.engine.load_current_question().await.unwrap();

    assert_eq!(question.id, 5);
    let view = h.engine.view();
    assert_eq!(view.current_question_id, Some(5));
    assert_eq!(view.current_question.unwrap().options.len(), 3);
    assert!(!view.loading);
}

#[tokio::test(start_paused = true)]
async fn cancel_clears_saved_progress() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();
    h.engine.save_progress().unwrap();
    assert!(stored(&h.store, &answers_key(TOPIC)).is_some());

    h.engine.cancel().unwrap();

    assert!(h.store.keys().unwrap().is_empty());
    let view = h.engine.view();
    assert_eq!(view, SessionView::default());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.store.keys().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_saves_and_stops_timer() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    h.engine.propose_choice(1, "B").unwrap();
    h.engine.finalize_answer(1).unwrap();

    h.engine.shutdown();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        stored(&h.store, &answers_key(TOPIC)),
        Some(json!({"1": "B"}))
    );
    assert_eq!(stored(&h.store, &time_key(TOPIC)), None);
}

#[tokio::test(start_paused = true)]
async fn dropping_engine_stops_timer() {
    let h = training();
    h.engine.initialize(TOPIC, TestType::Training).await.unwrap();
    let store = h.store.clone();

    drop(h);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(stored(&store, &time_key(TOPIC)), None);
}
