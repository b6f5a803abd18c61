// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle of one test attempt.
//!
//! ```text
//! Uninitialized -> Initializing -> InProgress -> Submitting -> Finished
//!                       |                ^            |
//!                       v                +------------+ (submit failed)
//!                     Error -> Initializing
//! ```
//!
//! Answers are captured in two stages. [`SessionEngine::propose_choice`] and
//! [`SessionEngine::withdraw_choice`] edit a per-question scratch set;
//! [`SessionEngine::finalize_answer`] commits the choice only when exactly one
//! is selected. Committed answers and the scratch sets are mirrored into the
//! [`KeyValueStore`] under `test_{topic}_*` keys every autosave period, and
//! restored when the same topic is initialized again.
//!
//! State sits behind a `std::sync::Mutex` that is never held across an await,
//! so each synchronous operation is atomic. A separate async mutex guards
//! `submit`; a second call while one is in flight fails with
//! [`Error::SubmitInProgress`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AssessmentApi;
use crate::clock::{ClockSource, TokioClock};
use crate::error::{Error, Result, SessionPhase};
use crate::protocol::{
    AnswerResponse, Answers, ChoiceId, Progress, Question, QuestionId, SessionInfo, TestResult,
    TestType,
};
use crate::store::{KeyValueStore, KeyValueStoreExt};
use crate::timer::{self, Stopwatch, Tick, TimerHandle, TimerMode, TimerSnapshot};
use crate::transport::{HttpTransport, Transport};

/// Proposed choices per question, not yet committed.
pub type Selections = BTreeMap<QuestionId, BTreeSet<ChoiceId>>;

pub fn answers_key(topic_id: u64) -> String {
    format!("test_{}_answers", topic_id)
}

pub fn selected_key(topic_id: u64) -> String {
    format!("test_{}_selected", topic_id)
}

pub fn time_key(topic_id: u64) -> String {
    format!("test_{}_time", topic_id)
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often committed state is mirrored to the store.
    pub autosave_interval: Duration,
    /// Timer period.
    pub tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            autosave_interval: Duration::from_secs(30),
            tick: timer::TICK,
        }
    }
}

/// Snapshot published to observers after every state change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub session_id: Option<String>,
    pub topic_id: Option<u64>,
    pub test_type: Option<TestType>,
    pub total_questions: u32,
    pub current_question_id: Option<QuestionId>,
    /// The current question, when its content has been loaded.
    pub current_question: Option<Question>,
    pub answers: Answers,
    pub selected: Selections,
    pub time_elapsed: u64,
    /// Seconds left in a timed attempt.
    pub time_left: Option<u64>,
    pub loading: bool,
    /// User-facing message for the last failure.
    pub error: Option<String>,
    pub is_finished: bool,
    pub progress: Progress,
    pub result: Option<TestResult>,
}

impl SessionView {
    pub fn unanswered(&self) -> u32 {
        self.total_questions
            .saturating_sub(self.answers.len() as u32)
    }
}

/// Outcome of a successful [`SessionEngine::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Questions without a committed answer at submission time.
    pub unanswered: u32,
    pub result: TestResult,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    info: SessionInfo,
    stopwatch: Stopwatch,
}

#[derive(Debug, Default)]
struct Mirror {
    answers: Answers,
    selected: Selections,
    time: Option<TimerSnapshot>,
}

#[derive(Debug, Default)]
struct State {
    phase: SessionPhase,
    session: Option<ActiveSession>,
    questions: BTreeMap<QuestionId, Question>,
    current: Option<QuestionId>,
    answers: Answers,
    selected: Selections,
    elapsed_secs: u64,
    time_left: Option<u64>,
    loading: bool,
    error: Option<String>,
    progress: Progress,
    result: Option<TestResult>,
    last_save_ms: u64,
    timer: Option<TimerHandle>,
}

impl State {
    fn view(&self) -> SessionView {
        let info = self.session.as_ref().map(|s| &s.info);
        SessionView {
            phase: self.phase,
            session_id: info.map(|i| i.id.clone()),
            topic_id: info.map(|i| i.topic_id),
            test_type: info.map(|i| i.test_type),
            total_questions: info.map_or(self.progress.total, |i| i.total_questions),
            current_question_id: self.current,
            current_question: self
                .current
                .and_then(|id| self.questions.get(&id))
                .cloned(),
            answers: self.answers.clone(),
            selected: self.selected.clone(),
            time_elapsed: self.elapsed_secs,
            time_left: self.time_left,
            loading: self.loading,
            error: self.error.clone(),
            is_finished: self.phase == SessionPhase::Finished,
            progress: self.progress,
            result: self.result.clone(),
        }
    }

    fn session_id(&self) -> Result<String> {
        self.session
            .as_ref()
            .map(|s| s.info.id.clone())
            .ok_or(Error::NoActiveSession)
    }

    fn is_session(&self, session_id: &str) -> bool {
        self.session.as_ref().is_some_and(|s| s.info.id == session_id)
    }

    /// Answer mutations are only accepted while in progress.
    fn require_active(&self, action: &'static str) -> Result<()> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            SessionPhase::Submitting => Err(Error::SubmitInProgress),
            phase => Err(Error::InvalidState { action, phase }),
        }
    }

    fn finalize(&mut self, question_id: QuestionId) -> bool {
        let choice = match self.selected.get(&question_id) {
            Some(set) if set.len() == 1 => set.iter().next().cloned(),
            _ => None,
        };
        match choice {
            Some(choice) => {
                self.answers.insert(question_id, choice);
                self.selected.remove(&question_id);
                true
            }
            None => false,
        }
    }

    fn unanswered(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| {
            s.info
                .total_questions
                .saturating_sub(self.answers.len() as u32)
        })
    }

    /// Unanswered count after the implicit finalize of the current question.
    fn pending_unanswered(&self) -> u32 {
        let commits_current = self.current.is_some_and(|q| {
            !self.answers.contains_key(&q) && self.selected.get(&q).is_some_and(|s| s.len() == 1)
        });
        self.unanswered().saturating_sub(u32::from(commits_current))
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

struct Inner<T: Transport> {
    api: AssessmentApi<T>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn ClockSource>,
    config: EngineConfig,
    state: Mutex<State>,
    submit_guard: tokio::sync::Mutex<()>,
    auto_submitted: AtomicBool,
    view_tx: watch::Sender<SessionView>,
}

/// Drives one test attempt.
///
/// Cheap to clone; clones share the same session. The timer holds only a weak
/// reference, so dropping the last clone stops it.
pub struct SessionEngine<T: Transport + 'static = HttpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport + 'static> Clone for SessionEngine<T> {
    fn clone(&self) -> Self {
        SessionEngine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> SessionEngine<T> {
    /// Creates an engine with default timing.
    pub fn new(api: AssessmentApi<T>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(
            api,
            store,
            Arc::new(TokioClock::new()),
            EngineConfig::default(),
        )
    }

    pub fn with_clock(
        api: AssessmentApi<T>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn ClockSource>,
        config: EngineConfig,
    ) -> Self {
        let (view_tx, _) = watch::channel(SessionView::default());
        SessionEngine {
            inner: Arc::new(Inner {
                api,
                store,
                clock,
                config,
                state: Mutex::new(State::default()),
                submit_guard: tokio::sync::Mutex::new(()),
                auto_submitted: AtomicBool::new(false),
                view_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, st: &State) {
        self.inner.view_tx.send_replace(st.view());
    }

    /// Latest published snapshot.
    pub fn view(&self) -> SessionView {
        self.inner.view_tx.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    /// Starts an attempt on `topic_id`, resuming any mirrored progress.
    ///
    /// Allowed from `Uninitialized` and `Error`. A failed request leaves the
    /// engine in `Error` with a user-facing message, from which the same call
    /// may be retried.
    pub async fn initialize(&self, topic_id: u64, test_type: TestType) -> Result<SessionView> {
        if topic_id == 0 {
            return Err(Error::Validation("topic id must be positive".to_string()));
        }
        {
            let mut st = self.state();
            match st.phase {
                SessionPhase::Uninitialized | SessionPhase::Error => {}
                phase => {
                    return Err(Error::InvalidState {
                        action: "initialize",
                        phase,
                    })
                }
            }
            st.phase = SessionPhase::Initializing;
            st.loading = true;
            st.error = None;
            self.publish(&st);
        }
        info!(topic_id, %test_type, "starting session");

        let created = match self.inner.api.create_session(topic_id, test_type).await {
            Ok(created) => created,
            Err(e) => {
                warn!(topic_id, error = %e, "session start failed");
                let mut st = self.state();
                st.phase = SessionPhase::Error;
                st.loading = false;
                st.error = Some(e.user_message());
                self.publish(&st);
                return Err(e);
            }
        };

        let mirror = self.load_mirror(topic_id);
        let now = self.inner.clock.now_ms();
        let deadline_ms = created
            .session
            .time_limit_minutes
            .filter(|m| *m > 0)
            .map(|minutes| {
                mirror
                    .time
                    .and_then(|t| t.deadline_ms)
                    .unwrap_or(now + u64::from(minutes) * 60_000)
            });
        let mode = match deadline_ms {
            Some(deadline_ms) => TimerMode::CountDown { deadline_ms },
            None => TimerMode::CountUp,
        };
        let offset = mirror.time.map_or(0, |t| t.elapsed_secs);
        let stopwatch = Stopwatch::new(mode, offset, now);
        let reading = stopwatch.read(now);

        let mut st = self.state();
        if st.phase != SessionPhase::Initializing {
            // Cancelled while the request was in flight.
            return Err(Error::InvalidState {
                action: "initialize",
                phase: st.phase,
            });
        }
        let session_id = created.session.id.clone();
        let total = created.session.total_questions;
        st.questions.clear();
        st.current = None;
        if let Some(question) = created.current_question {
            st.current = Some(question.id);
            st.questions.insert(question.id, question);
        }
        st.session = Some(ActiveSession {
            info: created.session,
            stopwatch,
        });
        st.answers = mirror.answers;
        st.selected = mirror.selected;
        st.progress = Progress {
            answered: created.progress.answered,
            total: if created.progress.total == 0 {
                total
            } else {
                created.progress.total
            },
        };
        st.elapsed_secs = reading.elapsed_secs;
        st.time_left = reading.remaining_secs;
        st.last_save_ms = now;
        st.result = None;
        st.loading = false;
        st.phase = SessionPhase::InProgress;
        self.inner.auto_submitted.store(false, Ordering::SeqCst);
        st.stop_timer();
        st.timer = Some(self.start_timer(stopwatch));
        self.publish(&st);
        info!(
            %session_id,
            topic_id,
            total,
            resumed_answers = st.answers.len(),
            time_left = ?st.time_left,
            "session in progress"
        );
        Ok(st.view())
    }

    fn load_mirror(&self, topic_id: u64) -> Mirror {
        fn load<V: serde::de::DeserializeOwned>(
            store: &dyn KeyValueStore,
            key: &str,
        ) -> Option<V> {
            match store.load_json(key) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key, error = %e, "ignoring unreadable saved progress");
                    None
                }
            }
        }

        let store = self.inner.store.as_ref();
        Mirror {
            answers: load(store, &answers_key(topic_id)).unwrap_or_default(),
            selected: load(store, &selected_key(topic_id)).unwrap_or_default(),
            time: load(store, &time_key(topic_id)),
        }
    }

    fn start_timer(&self, stopwatch: Stopwatch) -> TimerHandle {
        let weak = Arc::downgrade(&self.inner);
        timer::start(
            Arc::clone(&self.inner.clock),
            stopwatch,
            self.inner.config.tick,
            move |tick| match weak.upgrade() {
                Some(inner) => SessionEngine { inner }.on_tick(tick),
                None => ControlFlow::Break(()),
            },
        )
    }

    fn on_tick(&self, tick: Tick) -> ControlFlow<()> {
        let mut st = self.state();
        let (topic_id, stopwatch) = match (&st.session, st.phase) {
            (Some(s), SessionPhase::InProgress | SessionPhase::Submitting) => {
                (s.info.topic_id, s.stopwatch)
            }
            _ => return ControlFlow::Break(()),
        };

        let now = self.inner.clock.now_ms();
        let snapshot = stopwatch.snapshot(now);
        if let Err(e) = self.inner.store.save_json(&time_key(topic_id), &snapshot) {
            warn!(topic_id, error = %e, "failed to persist timer");
        }
        st.elapsed_secs = tick.elapsed_secs;
        st.time_left = tick.remaining_secs;

        let autosave_ms = self.inner.config.autosave_interval.as_millis() as u64;
        if st.phase == SessionPhase::InProgress && now.saturating_sub(st.last_save_ms) >= autosave_ms
        {
            match self.write_mirror(&mut st) {
                Ok(()) => debug!(topic_id, answers = st.answers.len(), "autosaved"),
                Err(e) => warn!(topic_id, error = %e, "autosave failed"),
            }
        }

        let expired = tick.expired() && st.phase == SessionPhase::InProgress;
        self.publish(&st);
        drop(st);

        if expired && !self.inner.auto_submitted.swap(true, Ordering::SeqCst) {
            info!(topic_id, "time is up, submitting");
            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.submit().await {
                    warn!(error = %e, "automatic submission failed");
                }
            });
        }
        ControlFlow::Continue(())
    }

    /// Adds `choice_id` to the question's proposed set. Idempotent.
    pub fn propose_choice(&self, question_id: QuestionId, choice_id: &str) -> Result<()> {
        if choice_id.trim().is_empty() {
            return Err(Error::Validation("choice must not be empty".to_string()));
        }
        let mut st = self.state();
        st.require_active("change answers")?;
        if st
            .selected
            .entry(question_id)
            .or_default()
            .insert(choice_id.to_string())
        {
            self.publish(&st);
        }
        Ok(())
    }

    /// Removes `choice_id` from the question's proposed set.
    pub fn withdraw_choice(&self, question_id: QuestionId, choice_id: &str) -> Result<()> {
        let mut st = self.state();
        st.require_active("change answers")?;
        let Some(set) = st.selected.get_mut(&question_id) else {
            return Ok(());
        };
        if set.remove(choice_id) {
            if set.is_empty() {
                st.selected.remove(&question_id);
            }
            self.publish(&st);
        }
        Ok(())
    }

    /// Commits the question's answer if exactly one choice is proposed.
    ///
    /// Returns whether an answer was committed. With zero or several proposed
    /// choices nothing changes.
    pub fn finalize_answer(&self, question_id: QuestionId) -> Result<bool> {
        let mut st = self.state();
        st.require_active("change answers")?;
        let committed = st.finalize(question_id);
        if committed {
            debug!(question_id, "answer committed");
            self.publish(&st);
        }
        Ok(committed)
    }

    /// Finalizes the question being left, then points at `target`.
    ///
    /// Returns the target's content if it has been loaded before.
    pub fn navigate(&self, target: QuestionId) -> Result<Option<Question>> {
        let mut st = self.state();
        st.require_active("navigate")?;
        if let Some(current) = st.current {
            st.finalize(current);
        }
        st.current = Some(target);
        self.publish(&st);
        Ok(st.questions.get(&target).cloned())
    }

    /// Fetches the server's current question and points at it.
    pub async fn load_current_question(&self) -> Result<Question> {
        let session_id = {
            let mut st = self.state();
            st.require_active("load a question")?;
            let id = st.session_id()?;
            st.loading = true;
            self.publish(&st);
            id
        };

        let outcome = self.inner.api.current_question(&session_id).await;

        let mut st = self.state();
        st.loading = false;
        match outcome {
            Ok(question) => {
                if st.is_session(&session_id) {
                    st.current = Some(question.id);
                    st.questions.insert(question.id, question.clone());
                    st.error = None;
                }
                self.publish(&st);
                Ok(question)
            }
            Err(e) => {
                warn!(%session_id, error = %e, "failed to load question");
                st.error = Some(e.user_message());
                self.publish(&st);
                Err(e)
            }
        }
    }

    /// Sends the committed answer for `question_id` to the server.
    ///
    /// On success progress is updated and the engine moves to the next
    /// question the server names. On failure the error is published; the
    /// committed answer is kept either way.
    pub async fn record_answer(&self, question_id: QuestionId) -> Result<AnswerResponse> {
        let (session_id, choice) = {
            let st = self.state();
            st.require_active("send an answer")?;
            let choice = st.answers.get(&question_id).cloned().ok_or_else(|| {
                Error::Validation(format!("question {} has no committed answer", question_id))
            })?;
            (st.session_id()?, choice)
        };

        let outcome = self
            .inner
            .api
            .submit_answer(&session_id, question_id, &choice)
            .await;

        let mut st = self.state();
        match outcome {
            Ok(response) => {
                if st.is_session(&session_id) {
                    let total = st.progress.total;
                    st.progress = response.progress;
                    if st.progress.total == 0 {
                        st.progress.total = total;
                    }
                    if let Some(next) = &response.next_question {
                        st.current = Some(next.id);
                        st.questions.insert(next.id, next.clone());
                    }
                    st.error = None;
                    self.publish(&st);
                }
                Ok(response)
            }
            Err(e) => {
                warn!(%session_id, question_id, error = %e, "failed to send answer");
                st.error = Some(e.user_message());
                self.publish(&st);
                Err(e)
            }
        }
    }

    fn write_mirror(&self, st: &mut State) -> Result<()> {
        let topic_id = st
            .session
            .as_ref()
            .map(|s| s.info.topic_id)
            .ok_or(Error::NoActiveSession)?;
        self.inner
            .store
            .save_json(&answers_key(topic_id), &st.answers)?;
        self.inner
            .store
            .save_json(&selected_key(topic_id), &st.selected)?;
        st.last_save_ms = self.inner.clock.now_ms();
        Ok(())
    }

    /// Mirrors committed answers and proposed choices to the store.
    pub fn save_progress(&self) -> Result<()> {
        let mut st = self.state();
        self.write_mirror(&mut st)?;
        debug!(answers = st.answers.len(), "progress saved");
        Ok(())
    }

    /// Questions without a committed answer.
    pub fn unanswered_count(&self) -> u32 {
        self.state().unanswered()
    }

    /// Questions that [`SessionEngine::submit`] would report as unanswered.
    ///
    /// Counts a single proposed choice on the current question as answered,
    /// since submitting finalizes it first.
    pub fn pending_unanswered(&self) -> u32 {
        self.state().pending_unanswered()
    }

    fn purge(&self, topic_id: u64) {
        for key in [
            answers_key(topic_id),
            selected_key(topic_id),
            time_key(topic_id),
        ] {
            if let Err(e) = self.inner.store.remove(&key) {
                warn!(key, error = %e, "failed to clear saved progress");
            }
        }
    }

    /// Finalizes the current question and submits all committed answers.
    ///
    /// Unanswered questions do not block submission; callers wanting a
    /// confirmation should check [`SessionEngine::pending_unanswered`] first. On
    /// failure the engine returns to `InProgress` with every answer intact.
    pub async fn submit(&self) -> Result<Submission> {
        let _in_flight = self
            .inner
            .submit_guard
            .try_lock()
            .map_err(|_| Error::SubmitInProgress)?;

        let (session_id, topic_id, answers, elapsed_secs, unanswered) = {
            let mut st = self.state();
            match st.phase {
                SessionPhase::InProgress => {}
                SessionPhase::Submitting => return Err(Error::SubmitInProgress),
                phase => {
                    return Err(Error::InvalidState {
                        action: "submit",
                        phase,
                    })
                }
            }
            if let Some(current) = st.current {
                st.finalize(current);
            }
            let (session_id, topic_id, stopwatch) = match &st.session {
                Some(s) => (s.info.id.clone(), s.info.topic_id, s.stopwatch),
                None => return Err(Error::NoActiveSession),
            };
            let elapsed_secs = stopwatch.read(self.inner.clock.now_ms()).elapsed_secs;
            let unanswered = st.unanswered();
            st.phase = SessionPhase::Submitting;
            st.loading = true;
            st.error = None;
            self.publish(&st);
            (
                session_id,
                topic_id,
                st.answers.clone(),
                elapsed_secs,
                unanswered,
            )
        };
        info!(
            %session_id,
            answered = answers.len(),
            unanswered,
            elapsed_secs,
            "submitting"
        );

        let outcome = self
            .inner
            .api
            .finish_session(&session_id, &answers, elapsed_secs)
            .await;

        let mut st = self.state();
        st.loading = false;
        match outcome {
            Ok(result) => {
                st.stop_timer();
                self.purge(topic_id);
                st.phase = SessionPhase::Finished;
                st.session = None;
                st.elapsed_secs = elapsed_secs;
                st.result = Some(result.clone());
                self.publish(&st);
                info!(%session_id, result_id = %result.id, score = result.score, "session finished");
                Ok(Submission { unanswered, result })
            }
            Err(e) => {
                warn!(%session_id, error = %e, "submission failed");
                st.phase = SessionPhase::InProgress;
                st.error = Some(e.user_message());
                if let Err(save) = self.write_mirror(&mut st) {
                    warn!(error = %save, "failed to save progress after failed submission");
                }
                self.publish(&st);
                Err(e)
            }
        }
    }

    /// Abandons the attempt and clears its saved progress.
    pub fn cancel(&self) -> Result<()> {
        let mut st = self.state();
        if st.phase == SessionPhase::Submitting {
            return Err(Error::SubmitInProgress);
        }
        st.stop_timer();
        if let Some(session) = &st.session {
            info!(session_id = %session.info.id, "session cancelled");
            self.purge(session.info.topic_id);
        }
        *st = State::default();
        self.inner.auto_submitted.store(false, Ordering::SeqCst);
        self.publish(&st);
        Ok(())
    }

    /// Stops the timer and saves progress, keeping it for a later resume.
    pub fn shutdown(&self) {
        let mut st = self.state();
        st.stop_timer();
        if st.phase == SessionPhase::InProgress {
            if let Err(e) = self.write_mirror(&mut st) {
                warn!(error = %e, "failed to save progress on shutdown");
            }
        }
        debug!(phase = %st.phase, "session engine shut down");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
