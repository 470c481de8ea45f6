//! Paragraph model: word accumulation, heading heuristics, drop caps and
//! line layout.
//!
//! A [`Paragraph`] is filled word by word while its block is open, then laid
//! out into [`TextLine`]s. Layout moves each word into exactly one line;
//! the paragraph keeps only words that were not emitted yet.

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::line_break::compute_line_breaks;
use crate::metrics::{FontId, FontMetrics};
use crate::page::TextLine;
use crate::style::{Alignment, FontStyle};
use crate::word::Word;

/// Indent prepended to the first word when paragraphs are not spaced apart.
pub const FIRST_LINE_INDENT: char = '\u{2003}';

/// Drop caps are measured at this multiple of the body font.
const DROP_CAP_SCALE: i32 = 3;
const DROP_CAP_GAP: i32 = 5;
const DROP_CAP_QUOTE_GAP: i32 = 8;
/// Lines indented beside a drop cap.
const DROP_CAP_LINES: usize = 2;

fn is_layout_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\u{00A0}')
}

fn is_quote_mark(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}'
    )
}

fn is_blank(text: &str) -> bool {
    text.chars().all(is_layout_whitespace)
}

fn is_ascii_number(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_chapter_word(text: &str) -> bool {
    text.eq_ignore_ascii_case("chapter")
}

/// Drop-cap glyph taken from the front of a paragraph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedDropCap {
    /// One codepoint, or a quote mark and the codepoint after it
    pub text: String,
    /// Style of the word it was taken from
    pub style: FontStyle,
    /// Width at drop-cap scale
    pub width: i32,
    /// Whether `text` starts with a quote mark
    pub has_quote: bool,
}

impl ExtractedDropCap {
    /// Horizontal space reserved beside the drop cap, gap included
    pub fn indent(&self) -> i32 {
        let gap = if self.has_quote {
            DROP_CAP_QUOTE_GAP
        } else {
            DROP_CAP_GAP
        };
        self.width + gap
    }
}

/// Paragraph facts handed along with every emitted line
#[derive(Clone, Copy, Debug)]
pub struct LineContext<'a> {
    /// Paragraph is a header
    pub is_header: bool,
    /// Drop cap of the paragraph, once extracted
    pub drop_cap: Option<&'a ExtractedDropCap>,
    /// Index of the line within the paragraph
    pub line_index: usize,
}

/// One logical paragraph of styled words
#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    words: Vec<Word>,
    alignment: Alignment,
    extra_paragraph_spacing: bool,
    is_header: bool,
    drop_cap_claimed: bool,
    drop_cap_pending: bool,
    drop_cap: Option<ExtractedDropCap>,
    indent_applied: bool,
    lines_emitted: usize,
}

impl Paragraph {
    /// Create an empty paragraph
    pub fn new(alignment: Alignment, extra_paragraph_spacing: bool) -> Self {
        Self {
            words: Vec::new(),
            alignment,
            extra_paragraph_spacing,
            is_header: false,
            drop_cap_claimed: false,
            drop_cap_pending: false,
            drop_cap: None,
            indent_applied: false,
            lines_emitted: 0,
        }
    }

    /// Append a word. Empty words are ignored.
    pub fn add_word(&mut self, text: impl Into<String>, style: FontStyle) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.words.push(Word { text, style });
    }

    /// Words not yet laid out
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Number of words not yet laid out
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if no words are pending
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True if every pending word is made of spaces, tabs, line breaks or
    /// no-break spaces.
    pub fn is_effectively_empty(&self) -> bool {
        self.words.iter().all(|w| is_blank(&w.text))
    }

    /// Alignment of the paragraph's lines
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Change line alignment
    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    /// Whether the paragraph is laid out as a single header line
    pub fn is_header(&self) -> bool {
        self.is_header
    }

    /// Mark or unmark the paragraph as a header.
    ///
    /// A header never keeps a drop cap, so marking releases any claim.
    pub fn set_header(&mut self, is_header: bool) {
        self.is_header = is_header;
        if is_header {
            self.drop_cap_claimed = false;
            self.drop_cap_pending = false;
        }
    }

    /// Flag the paragraph to receive a drop cap. Headers refuse the flag.
    pub fn claim_drop_cap(&mut self) -> bool {
        if self.is_header {
            return false;
        }
        self.drop_cap_claimed = true;
        self.drop_cap_pending = self.drop_cap.is_none();
        true
    }

    /// Whether the paragraph holds a drop-cap claim
    pub fn claimed_drop_cap(&self) -> bool {
        self.drop_cap_claimed
    }

    /// The extracted drop cap, if extraction has run and succeeded
    pub fn drop_cap(&self) -> Option<&ExtractedDropCap> {
        self.drop_cap.as_ref()
    }

    /// Single word "chapter", any case
    pub fn is_bare_chapter(&self) -> bool {
        self.words.len() == 1 && is_chapter_word(&self.words[0].text)
    }

    /// Single word of ASCII digits
    pub fn is_bare_number(&self) -> bool {
        self.words.len() == 1 && is_ascii_number(&self.words[0].text)
    }

    /// Flag chapter-title lookalikes as headers.
    ///
    /// Matches "chapter" alone, a number alone, or 2 to 4 words starting
    /// with "chapter" followed by a number. A numbered list item set as its
    /// own paragraph also matches.
    pub fn set_header_if_chapter(&mut self) {
        let matches = match self.words.len() {
            1 => is_chapter_word(&self.words[0].text) || is_ascii_number(&self.words[0].text),
            2..=4 => {
                is_chapter_word(&self.words[0].text) && is_ascii_number(&self.words[1].text)
            }
            _ => false,
        };
        if matches {
            self.set_header(true);
        }
    }

    /// Append another paragraph's pending words; header status is sticky.
    pub fn merge_from(&mut self, other: Paragraph) {
        let is_header = self.is_header || other.is_header;
        self.words.extend(other.words);
        if is_header {
            self.set_header(true);
        }
    }

    /// Upgrade every word to a bold variant of its style
    pub fn embolden(&mut self) {
        for word in &mut self.words {
            word.style = word.style.with_bold(true);
        }
    }

    /// Take the drop-cap glyph from the first visible word.
    ///
    /// Runs at most once per claim. Extraction is abandoned when the first
    /// visible codepoint is whitespace, or when the glyph measures zero width;
    /// in both cases the words are left untouched and the claim is dropped.
    /// A paragraph with no visible word keeps its claim so the caller can
    /// pass it on.
    pub fn extract_drop_cap<M: FontMetrics + ?Sized>(&mut self, metrics: &M, font_id: FontId) {
        if !self.drop_cap_pending {
            return;
        }
        self.drop_cap_pending = false;

        let Some(index) = self.words.iter().position(|w| !is_blank(&w.text)) else {
            return;
        };
        let word = &self.words[index];
        let mut chars = word.text.char_indices();
        let Some((_, first)) = chars.next() else {
            self.drop_cap_claimed = false;
            return;
        };
        if is_layout_whitespace(first) || first == '\0' {
            self.drop_cap_claimed = false;
            return;
        }

        let has_quote = is_quote_mark(first);
        let mut end = first.len_utf8();
        if has_quote {
            if let Some((pos, second)) = chars.next() {
                end = pos + second.len_utf8();
            }
        }

        let text = String::from(&word.text[..end]);
        let style = word.style;
        let width = metrics
            .text_width(font_id, &text, style)
            .saturating_mul(DROP_CAP_SCALE);
        if width <= 0 {
            log::warn!("[PTX] Drop cap {:?} measured {} px, skipping", text, width);
            self.drop_cap_claimed = false;
            return;
        }

        let word = &mut self.words[index];
        word.text.drain(..end);
        if word.text.is_empty() {
            self.words.remove(index);
        }
        self.drop_cap = Some(ExtractedDropCap {
            text,
            style,
            width,
            has_quote,
        });
    }

    /// Lay out pending words into lines of at most `page_width` pixels.
    ///
    /// With `include_last_line` unset the final line is held back so more
    /// words can join it later. Emitted words leave the paragraph.
    pub fn layout<M, F>(
        &mut self,
        metrics: &M,
        font_id: FontId,
        page_width: i32,
        include_last_line: bool,
        mut on_line: F,
    ) where
        M: FontMetrics + ?Sized,
        F: FnMut(TextLine, &LineContext<'_>),
    {
        if self.words.is_empty() {
            return;
        }

        let font = if self.is_header {
            metrics.header_font_id(font_id)
        } else {
            font_id
        };

        self.extract_drop_cap(metrics, font);

        if !self.extra_paragraph_spacing && !self.indent_applied && self.lines_emitted == 0 {
            if let Some(first) = self.words.first_mut() {
                first.text.insert(0, FIRST_LINE_INDENT);
            }
            self.indent_applied = true;
        }

        let space = metrics.space_width(font);
        let widths: Vec<i32> = self
            .words
            .iter()
            .map(|w| metrics.text_width(font, &w.text, w.style).max(0))
            .collect();

        let indent = self.drop_cap.as_ref().map_or(0, ExtractedDropCap::indent);
        let breaks = if self.is_header {
            vec![self.words.len()]
        } else {
            compute_line_breaks(&widths, page_width - indent, space)
        };
        let emit = if include_last_line {
            breaks.len()
        } else {
            breaks.len().saturating_sub(1)
        };

        let mut start = 0;
        for (idx, &end) in breaks.iter().take(emit).enumerate() {
            let line_index = self.lines_emitted;
            let offset = if line_index < DROP_CAP_LINES { indent } else { 0 };
            let is_last = idx + 1 == breaks.len();
            let x_positions = place_words(
                &widths[start..end],
                space,
                page_width - offset,
                offset,
                self.alignment,
                is_last,
            );
            let words: Vec<Word> = self.words[start..end]
                .iter_mut()
                .map(|w| Word {
                    text: core::mem::take(&mut w.text),
                    style: w.style,
                })
                .collect();

            let ctx = LineContext {
                is_header: self.is_header,
                drop_cap: self.drop_cap.as_ref(),
                line_index,
            };
            on_line(TextLine::new(words, x_positions, self.alignment), &ctx);
            self.lines_emitted += 1;
            start = end;
        }

        self.words.drain(..start);
    }
}

/// X offset of each word on a line `line_width` wide, shifted by `offset`.
fn place_words(
    widths: &[i32],
    space: i32,
    line_width: i32,
    offset: i32,
    alignment: Alignment,
    is_last: bool,
) -> Vec<u16> {
    let count = widths.len() as i32;
    let total: i32 = widths.iter().fold(0i32, |acc, &w| acc.saturating_add(w));
    let spare = line_width.saturating_sub(total);
    let gaps = (count - 1).max(0);

    let spacing = if alignment == Alignment::Justified && !is_last && count >= 2 {
        spare / gaps
    } else {
        space
    };
    let mut x = match alignment {
        Alignment::Right => spare - gaps * space,
        Alignment::Center => (spare - gaps * space) / 2,
        Alignment::Justified | Alignment::Left => 0,
    };

    let mut positions = Vec::with_capacity(widths.len());
    for &w in widths {
        positions.push((x + offset).clamp(0, u16::MAX as i32) as u16);
        x = x.saturating_add(w).saturating_add(spacing);
    }
    positions
}
