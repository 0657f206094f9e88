//! Replies written back to a process's input

/// What to do with a process's input after inspecting its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Write nothing
    None,
    /// Write the payload
    Text,
    /// Close the input and stop reading output
    Eof,
}

/// A reply to a process prompt.
///
/// Text answers always end with a newline so the bytes written form a
/// complete input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    kind: AnswerKind,
    payload: String,
}

impl Answer {
    pub const NONE: Answer = Answer {
        kind: AnswerKind::None,
        payload: String::new(),
    };

    pub const EOF: Answer = Answer {
        kind: AnswerKind::Eof,
        payload: String::new(),
    };

    /// A text reply; a trailing `\n` is appended.
    pub fn text(reply: impl Into<String>) -> Self {
        let mut payload = reply.into();
        payload.push('\n');
        Self {
            kind: AnswerKind::Text,
            payload,
        }
    }

    pub fn kind(&self) -> AnswerKind {
        self.kind
    }

    /// Bytes to write, including the trailing newline. Empty for
    /// [`AnswerKind::None`] and [`AnswerKind::Eof`].
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn is_none(&self) -> bool {
        self.kind == AnswerKind::None
    }
}

impl Default for Answer {
    fn default() -> Self {
        Self::NONE
    }
}
