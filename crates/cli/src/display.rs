// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeSet;
use std::fmt::Write;

use proctor_core::protocol::{StudentStatistics, TestSummary};
use proctor_core::{ChoiceId, Question, SessionView, TestResult};

use crate::colors;

/// Remaining time below which the clock is highlighted.
const LOW_TIME_SECS: u64 = 60;

/// Format seconds as `mm:ss`, or `h:mm:ss` past an hour.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Format a question with its options.
///
/// `[x]` marks a selected option, `*` the committed answer.
pub fn format_question(
    question: &Question,
    selected: Option<&BTreeSet<ChoiceId>>,
    committed: Option<&ChoiceId>,
) -> String {
    let title = match question.number {
        Some(n) => format!("Question {} (id {})", n, question.id),
        None => format!("Question {}", question.id),
    };
    let mut out = format!("{}\n  {}\n", colors::header(&title), question.text);
    for option in &question.options {
        let mark = if selected.is_some_and(|s| s.contains(&option.id)) {
            "[x]"
        } else {
            "[ ]"
        };
        let line = format!("  {} {}) {}", mark, option.id, option.text);
        if committed == Some(&option.id) {
            let _ = writeln!(out, "{} {}", colors::good(&line), colors::good("*"));
        } else {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

/// One-line summary of a running session.
pub fn format_status(view: &SessionView) -> String {
    let mut out = format!(
        "{} | answered {}/{}",
        view.phase,
        view.answers.len(),
        view.total_questions
    );
    if let Some(q) = view.current_question_id {
        let _ = write!(out, " | question {}", q);
    }
    let _ = write!(out, " | elapsed {}", format_duration(view.time_elapsed));
    if let Some(left) = view.time_left {
        let clock = format!("left {}", format_duration(left));
        if left < LOW_TIME_SECS {
            let _ = write!(out, " | {}", colors::bad(&clock));
        } else {
            let _ = write!(out, " | {}", clock);
        }
    }
    if let Some(err) = &view.error {
        let _ = write!(out, "\n{}", colors::bad(err));
    }
    out
}

fn format_score(score: f64) -> String {
    format!("{:.1}%", score)
}

pub fn format_result(result: &TestResult) -> String {
    let mut out = format!("{}\n", colors::header(&format!("Result {}", result.id)));
    let _ = writeln!(
        out,
        "  Score:   {} ({}/{} correct)",
        format_score(result.score),
        result.correct_answers,
        result.total_questions
    );
    match result.passed {
        Some(true) => {
            let _ = writeln!(out, "  Outcome: {}", colors::good("passed"));
        }
        Some(false) => {
            let _ = writeln!(out, "  Outcome: {}", colors::bad("failed"));
        }
        None => {}
    }
    if let Some(at) = result.completed_at {
        let _ = writeln!(out, "  Completed: {}", at.format("%Y-%m-%d %H:%M"));
    }
    out
}

pub fn format_stats(student_id: u64, stats: &StudentStatistics) -> String {
    let mut out = format!(
        "{}\n",
        colors::header(&format!("Student {}", student_id))
    );
    if stats.tests_taken == 0 {
        let _ = writeln!(out, "  {}", colors::context("No tests taken yet."));
        return out;
    }
    let _ = writeln!(out, "  Tests taken:   {}", stats.tests_taken);
    let _ = writeln!(out, "  Average score: {}", format_score(stats.average_score));
    let _ = writeln!(out, "  Best score:    {}", format_score(stats.best_score));
    out
}

pub fn format_history(student_id: u64, tests: &[TestSummary]) -> String {
    let mut out = format!(
        "{}\n",
        colors::header(&format!("History for student {}", student_id))
    );
    if tests.is_empty() {
        let _ = writeln!(out, "  {}", colors::context("No tests taken yet."));
        return out;
    }
    for test in tests {
        let when = test
            .completed_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {}  topic {:<6} {:<8} {:>6}  {}",
            when,
            test.topic_id,
            test.test_type.to_string(),
            format_score(test.score),
            colors::context(&test.result_id)
        );
    }
    out
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
