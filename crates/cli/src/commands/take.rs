// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive test session on stdin.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use proctor_core::{
    ChoiceId, Question, QuestionId, SessionEngine, SessionPhase, SessionView, TestType, TokioClock,
    Transport,
};

use crate::colors;
use crate::display::{format_duration, format_question, format_result, format_status};
use crate::error::{Error, Result};

use super::{runtime, Context};

const HELP: &str = "\
  p <question> <choice>   Select a choice
  w <question> <choice>   Clear a selected choice
  f                       Commit the selection for the current question
  g <question>            Go to a question
  n                       Fetch the current question from the server
  a                       Send the current answer to the server
  s                       Save progress
  status                  Show progress and time
  submit                  Finish the test and show the result
  quit                    Save and leave";

/// One line typed at the session prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Propose {
        question: QuestionId,
        choice: ChoiceId,
    },
    Withdraw {
        question: QuestionId,
        choice: ChoiceId,
    },
    Finalize,
    Goto(QuestionId),
    Next,
    Answer,
    Save,
    Submit,
    Status,
    Quit,
    Help,
}

fn question_arg(word: Option<&str>) -> Result<QuestionId> {
    let word = word.ok_or_else(|| Error::Usage("missing question number".to_string()))?;
    word.parse()
        .map_err(|_| Error::Usage(format!("not a question number: '{}'", word)))
}

fn choice_arg(word: Option<&str>) -> Result<ChoiceId> {
    word.map(str::to_string)
        .ok_or_else(|| Error::Usage("missing choice".to_string()))
}

/// Parses one prompt line. Blank lines yield `None`.
pub fn parse_input(line: &str) -> Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let input = match command {
        "p" => Input::Propose {
            question: question_arg(words.next())?,
            choice: choice_arg(words.next())?,
        },
        "w" => Input::Withdraw {
            question: question_arg(words.next())?,
            choice: choice_arg(words.next())?,
        },
        "f" => Input::Finalize,
        "g" => Input::Goto(question_arg(words.next())?),
        "n" => Input::Next,
        "a" => Input::Answer,
        "s" => Input::Save,
        "submit" => Input::Submit,
        "status" => Input::Status,
        "quit" | "q" => Input::Quit,
        "help" | "?" => Input::Help,
        other => {
            return Err(Error::Usage(format!(
                "unknown command: '{}' (type 'help' for a list)",
                other
            )))
        }
    };
    if let Some(extra) = words.next() {
        return Err(Error::Usage(format!("unexpected argument: '{}'", extra)));
    }
    Ok(Some(input))
}

/// What the prompt loop does after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Wait for a yes/no answer before submitting.
    Confirm,
    Done,
}

pub fn run(ctx: &Context, topic: u64, exam: bool) -> Result<()> {
    let test_type = if exam {
        TestType::Exam
    } else {
        TestType::Training
    };
    let store = ctx.store()?;
    let rt = runtime()?;
    rt.block_on(async {
        let engine = SessionEngine::with_clock(
            ctx.api(),
            store,
            Arc::new(TokioClock::new()),
            ctx.config.engine_config(),
        );
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();
        run_session(&engine, topic, test_type, stdin, &mut stdout).await
    })
}

fn show_question<W: Write>(out: &mut W, view: &SessionView, question: &Question) -> Result<()> {
    let text = format_question(
        question,
        view.selected.get(&question.id),
        view.answers.get(&question.id),
    );
    write!(out, "{}", text)?;
    Ok(())
}

fn show_intro<W: Write>(out: &mut W, view: &SessionView) -> Result<()> {
    let kind = view.test_type.unwrap_or_default();
    writeln!(
        out,
        "{}",
        colors::header(&format!(
            "Topic {} ({}): {} questions",
            view.topic_id.unwrap_or_default(),
            kind,
            view.total_questions
        ))
    )?;
    if let Some(left) = view.time_left {
        writeln!(out, "Time left: {}", format_duration(left))?;
    }
    if !view.answers.is_empty() {
        writeln!(
            out,
            "{}",
            colors::context(&format!("Resumed with {} saved answers.", view.answers.len()))
        )?;
    }
    if let Some(question) = &view.current_question {
        show_question(out, view, question)?;
    }
    writeln!(out, "{}", colors::context("Type 'help' for commands."))?;
    Ok(())
}

/// Drives one session: reads commands from `input` until the test is
/// submitted, time runs out, or the user leaves.
pub(crate) async fn run_session<T, R, W>(
    engine: &SessionEngine<T>,
    topic: u64,
    test_type: TestType,
    input: R,
    out: &mut W,
) -> Result<()>
where
    T: Transport + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let view = engine.initialize(topic, test_type).await?;
    show_intro(out, &view)?;

    let mut updates = engine.subscribe();
    let mut lines = input.lines();
    let mut confirming = false;
    let mut prompt = true;
    let mut last_error = view.error.clone();

    loop {
        if prompt {
            write!(out, "> ")?;
            out.flush()?;
            prompt = false;
        }
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    writeln!(out)?;
                    break;
                };
                prompt = true;
                let flow = if confirming {
                    confirming = false;
                    if matches!(line.trim(), "y" | "Y" | "yes") {
                        submit(engine, out).await?
                    } else {
                        writeln!(out, "Submission cancelled.")?;
                        Flow::Continue
                    }
                } else {
                    match parse_input(&line) {
                        Ok(None) => Flow::Continue,
                        Ok(Some(Input::Quit)) => break,
                        Ok(Some(cmd)) => match handle(engine, cmd, out).await {
                            Ok(flow) => flow,
                            Err(Error::Core(e)) => {
                                writeln!(out, "{}", colors::bad(&e.user_message()))?;
                                Flow::Continue
                            }
                            Err(e @ Error::Usage(_)) => {
                                writeln!(out, "{}", e)?;
                                Flow::Continue
                            }
                            Err(e) => return Err(e),
                        },
                        Err(e) => {
                            writeln!(out, "{}", e)?;
                            Flow::Continue
                        }
                    }
                };
                // Errors from this command were already printed.
                last_error = updates.borrow_and_update().error.clone();
                match flow {
                    Flow::Continue => {}
                    Flow::Confirm => confirming = true,
                    Flow::Done => return Ok(()),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if view.phase == SessionPhase::Finished {
                    if let Some(result) = &view.result {
                        writeln!(out)?;
                        writeln!(out, "{}", colors::bad("Time is up. Your answers were submitted."))?;
                        write!(out, "{}", format_result(result))?;
                        return Ok(());
                    }
                }
                if view.error != last_error {
                    if let Some(message) = &view.error {
                        writeln!(out)?;
                        writeln!(out, "{}", colors::bad(message))?;
                        if view.time_left == Some(0) {
                            writeln!(
                                out,
                                "Time is up but the answers were not submitted. Type 'submit' to try again."
                            )?;
                        }
                        prompt = true;
                    }
                    last_error = view.error;
                }
            }
        }
    }

    engine.shutdown();
    info!(topic, "left session");
    writeln!(out, "Progress saved. Run the same command to resume.")?;
    Ok(())
}

fn current_question<T: Transport + 'static>(engine: &SessionEngine<T>) -> Result<QuestionId> {
    engine
        .view()
        .current_question_id
        .ok_or_else(|| Error::Usage("no current question (use 'n' to fetch it)".to_string()))
}

async fn handle<T, W>(engine: &SessionEngine<T>, input: Input, out: &mut W) -> Result<Flow>
where
    T: Transport + 'static,
    W: Write,
{
    match input {
        Input::Propose { question, choice } => {
            engine.propose_choice(question, &choice)?;
            show_selection(out, &engine.view(), question)?;
        }
        Input::Withdraw { question, choice } => {
            engine.withdraw_choice(question, &choice)?;
            show_selection(out, &engine.view(), question)?;
        }
        Input::Finalize => {
            let question = current_question(engine)?;
            if engine.finalize_answer(question)? {
                writeln!(out, "Answer for question {} committed.", question)?;
            } else {
                writeln!(
                    out,
                    "Select exactly one choice for question {} first.",
                    question
                )?;
            }
        }
        Input::Goto(target) => match engine.navigate(target)? {
            Some(question) => show_question(out, &engine.view(), &question)?,
            None => writeln!(out, "Now on question {}.", target)?,
        },
        Input::Next => {
            let question = engine.load_current_question().await?;
            show_question(out, &engine.view(), &question)?;
        }
        Input::Answer => {
            let question = current_question(engine)?;
            let response = engine.record_answer(question).await?;
            writeln!(
                out,
                "Answer sent ({}/{} answered).",
                response.progress.answered, response.progress.total
            )?;
            if let Some(next) = &response.next_question {
                show_question(out, &engine.view(), next)?;
            } else if response.is_finished {
                writeln!(out, "All questions answered. Type 'submit' to finish.")?;
            }
        }
        Input::Save => {
            engine.save_progress()?;
            writeln!(out, "Progress saved.")?;
        }
        Input::Status => writeln!(out, "{}", format_status(&engine.view()))?,
        Input::Help => writeln!(out, "{}", HELP)?,
        Input::Submit => {
            let unanswered = engine.pending_unanswered();
            if unanswered > 0 {
                write!(
                    out,
                    "{} question(s) unanswered. Submit anyway? [y/N] ",
                    unanswered
                )?;
                out.flush()?;
                return Ok(Flow::Confirm);
            }
            return submit(engine, out).await;
        }
        Input::Quit => return Ok(Flow::Done),
    }
    Ok(Flow::Continue)
}

fn show_selection<W: Write>(out: &mut W, view: &SessionView, question: QuestionId) -> Result<()> {
    let chosen: Vec<&str> = view
        .selected
        .get(&question)
        .map(|set| set.iter().map(String::as_str).collect())
        .unwrap_or_default();
    if chosen.is_empty() {
        writeln!(out, "Question {}: nothing selected.", question)?;
    } else {
        writeln!(out, "Question {}: {} selected.", question, chosen.join(", "))?;
    }
    Ok(())
}

async fn submit<T, W>(engine: &SessionEngine<T>, out: &mut W) -> Result<Flow>
where
    T: Transport + 'static,
    W: Write,
{
    match engine.submit().await {
        Ok(submission) => {
            writeln!(out, "{}", colors::good("Test submitted."))?;
            write!(out, "{}", format_result(&submission.result))?;
            Ok(Flow::Done)
        }
        Err(e) => {
            writeln!(out, "{}", colors::bad(&e.user_message()))?;
            writeln!(out, "Your answers are kept. Type 'submit' to try again.")?;
            Ok(Flow::Continue)
        }
    }
}

#[cfg(test)]
#[path = "take_tests.rs"]
mod tests;
