//! Interaction policies for spawned processes
//!
//! A [`ProcessInteraction`] decides, for the text accumulated from a process:
//! - which [`Answer`] to write back (first matching reply rule wins)
//! - whether a completed line is echoed to the informational output
//! - whether a completed line is echoed to the error output
//!
//! Every pattern is a regular expression matched against the *whole* text,
//! as if wrapped in `^(?:...)$`. Use `.*` for substring matches.

use regex::Regex;

use crate::answer::Answer;
use edemon_core::prelude::*;

static NO_ANSWER: Answer = Answer::NONE;

/// Immutable reply and echo rules for one process.
#[derive(Debug, Clone, Default)]
pub struct ProcessInteraction {
    replies: Vec<(Regex, Answer)>,
    output: Vec<Regex>,
    error_output: Vec<Regex>,
}

impl ProcessInteraction {
    pub fn builder() -> ProcessInteractionBuilder {
        ProcessInteractionBuilder::default()
    }

    /// No replies, nothing echoed.
    pub fn silent() -> Self {
        Self::default()
    }

    /// No replies, every line echoed to the informational output.
    pub fn echo_all() -> Self {
        Self {
            output: vec![whole_match(".*").expect("static pattern is valid")],
            ..Self::default()
        }
    }

    /// Reply for the current, possibly partial, output text.
    pub fn reply_to(&self, text: &str) -> &Answer {
        self.replies
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, answer)| answer)
            .unwrap_or(&NO_ANSWER)
    }

    pub fn should_output(&self, line: &str) -> bool {
        self.output.iter().any(|pattern| pattern.is_match(line))
    }

    pub fn should_output_to_err(&self, line: &str) -> bool {
        self.error_output.iter().any(|pattern| pattern.is_match(line))
    }

    /// False when no reply rule exists; the process's input can then be
    /// closed as soon as it starts.
    pub fn requires_input_interaction(&self) -> bool {
        !self.replies.is_empty()
    }
}

/// Accumulates rules by value and validates them in [`build`](Self::build).
///
/// ```
/// use edemon_process::{Answer, ProcessInteraction};
///
/// let interaction = ProcessInteraction::builder()
///     .when(r"Do you wish to create a custom hardware profile\? \[no\] ")
///     .reply_with(Answer::text("no"))
///     .error_output(".*ERROR.*")
///     .build()
///     .unwrap();
/// assert!(interaction.requires_input_interaction());
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ProcessInteractionBuilder {
    replies: Vec<(String, Option<Answer>)>,
    orphan_answers: usize,
    output: Vec<String>,
    error_output: Vec<String>,
}

impl ProcessInteractionBuilder {
    /// Register a prompt pattern. Must be followed by [`reply_with`](Self::reply_with).
    pub fn when(mut self, pattern: impl Into<String>) -> Self {
        self.replies.push((pattern.into(), None));
        self
    }

    /// Pair an answer with the most recent [`when`](Self::when) pattern.
    pub fn reply_with(mut self, answer: Answer) -> Self {
        match self.replies.last_mut() {
            Some((_, slot @ None)) => *slot = Some(answer),
            _ => self.orphan_answers += 1,
        }
        self
    }

    /// Shorthand for `when(pattern).reply_with(answer)`.
    pub fn reply(self, pattern: impl Into<String>, answer: Answer) -> Self {
        self.when(pattern).reply_with(answer)
    }

    /// Echo completed lines matching `pattern` to the informational output.
    pub fn output(mut self, pattern: impl Into<String>) -> Self {
        self.output.push(pattern.into());
        self
    }

    /// Echo every completed line to the informational output.
    pub fn output_all(self) -> Self {
        self.output(".*")
    }

    /// Echo completed lines matching `pattern` to the error output.
    pub fn error_output(mut self, pattern: impl Into<String>) -> Self {
        self.error_output.push(pattern.into());
        self
    }

    /// Validate and compile the rules.
    ///
    /// Fails on a pattern without an answer, an answer without a pattern, or
    /// an invalid regular expression.
    pub fn build(self) -> Result<ProcessInteraction> {
        if self.orphan_answers > 0 {
            return Err(Error::invalid_interaction(format!(
                "{} answer(s) registered without a preceding pattern",
                self.orphan_answers
            )));
        }

        let replies = self
            .replies
            .into_iter()
            .map(|(pattern, answer)| {
                let answer = answer.ok_or_else(|| {
                    Error::invalid_interaction(format!("pattern '{pattern}' has no answer"))
                })?;
                Ok((whole_match(&pattern)?, answer))
            })
            .collect::<Result<Vec<_>>>()?;

        let output = compile_all(&self.output)?;
        let error_output = compile_all(&self.error_output)?;

        Ok(ProcessInteraction {
            replies,
            output,
            error_output,
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| whole_match(p)).collect()
}

fn whole_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| Error::invalid_interaction(format!("invalid pattern '{pattern}': {e}")))
}
