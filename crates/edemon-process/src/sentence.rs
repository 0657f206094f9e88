//! Line accumulation for character-at-a-time output scanning

/// Characters read from a process since the last completed line.
///
/// A single `Sentence` is reused for every line of a process: [`Sentence::reset`]
/// clears the text but keeps the allocation.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    text: String,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, c: char) -> &mut Self {
        self.text.push(c);
        self
    }

    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.text.push_str(s);
        self
    }

    /// True once the last character is a line feed.
    ///
    /// `\r\n` ends one line; a bare `\r` (progress redraw) does not.
    pub fn is_finished(&self) -> bool {
        self.text.ends_with('\n')
    }

    /// The text without trailing line terminators (`\n`, `\r`).
    pub fn trim(&self) -> &str {
        self.text.trim_end_matches(['\n', '\r'])
    }

    pub fn reset(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }
}
