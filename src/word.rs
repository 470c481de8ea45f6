//! Word accumulation for the streaming parser.
//!
//! Character data arrives in arbitrary fragments. `WordBuffer` collects it
//! into whitespace-separated words in a fixed-capacity buffer, so a single
//! runaway token can never grow the heap.

extern crate alloc;

use alloc::string::String;

use crate::style::FontStyle;

/// Maximum bytes held for one word before it is force-flushed.
pub const MAX_WORD_BYTES: usize = 200;

/// Soft hyphen, dropped from word content.
const SOFT_HYPHEN: char = '\u{00AD}';

/// A measured unit of text: UTF-8 content plus its font style
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Word {
    /// Word content
    pub text: String,
    /// Style the word is drawn in
    pub style: FontStyle,
}

impl Word {
    /// Create a new word
    pub fn new(text: impl Into<String>, style: FontStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Markup whitespace that separates words.
pub(crate) fn is_markup_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\r' | '\n' | '\t')
}

/// Fixed-capacity buffer for the word currently being read.
#[derive(Debug, Default)]
pub struct WordBuffer {
    buf: heapless::String<MAX_WORD_BYTES>,
}

impl WordBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no bytes are pending
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pending bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Append one character.
    ///
    /// When the character does not fit, the pending bytes are returned as a
    /// complete word and the character starts the next one. Characters are
    /// never split, so a flushed word is always valid UTF-8.
    pub fn push(&mut self, ch: char) -> Option<String> {
        if ch == SOFT_HYPHEN {
            return None;
        }
        if self.buf.push(ch).is_ok() {
            return None;
        }
        let full = self.take();
        // An empty buffer always has room for one char.
        let _ = self.buf.push(ch);
        full
    }

    /// Take the pending word, leaving the buffer empty.
    pub fn take(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let word = String::from(self.buf.as_str());
        self.buf.clear();
        Some(word)
    }

    /// Feed a character-data fragment.
    ///
    /// Whitespace ends the pending word. With `fold_newlines` set (inside a
    /// header) line feeds are read as spaces first, which only matters for
    /// the word boundary itself. Every completed word is passed to `emit`.
    pub fn feed(&mut self, text: &str, fold_newlines: bool, mut emit: impl FnMut(String)) {
        for mut ch in text.chars() {
            if fold_newlines && ch == '\n' {
                ch = ' ';
            }
            if is_markup_whitespace(ch) {
                if let Some(word) = self.take() {
                    emit(word);
                }
                continue;
            }
            if let Some(word) = self.push(ch) {
                emit(word);
            }
        }
    }
}
