//! Page object model.
//!
//! A [`Page`] is an ordered list of placed elements. There are exactly two
//! kinds, a laid-out text line and a drop cap, and each carries a stable tag
//! byte in the section cache format.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use crate::metrics::{FontId, FontMetrics};
use crate::style::{Alignment, FontStyle};
use crate::word::Word;

/// Drawing surface used to put a page on screen.
///
/// Coordinates are the top-left of the text box; implementations add the
/// ascender themselves if their primitives are baseline-anchored.
pub trait Renderer: FontMetrics {
    /// Backend error
    type Error;

    /// Draw one word
    fn draw_text(
        &mut self,
        font_id: FontId,
        x: i32,
        y: i32,
        text: &str,
        style: FontStyle,
    ) -> Result<(), Self::Error>;

    /// Draw an enlarged drop-cap glyph run at roughly `size_px` tall
    fn draw_drop_cap(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        size_px: i32,
        style: FontStyle,
    ) -> Result<(), Self::Error>;
}

/// One visual line: words with precomputed x offsets
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TextLine {
    words: Vec<Word>,
    x_positions: Vec<u16>,
    alignment: Alignment,
}

impl TextLine {
    /// Create a line. `words` and `x_positions` must be the same length;
    /// extra entries on either side are dropped.
    pub fn new(mut words: Vec<Word>, mut x_positions: Vec<u16>, alignment: Alignment) -> Self {
        let len = words.len().min(x_positions.len());
        words.truncate(len);
        x_positions.truncate(len);
        Self {
            words,
            x_positions,
            alignment,
        }
    }

    /// Words on the line
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// X offset of each word, relative to the line origin
    pub fn x_positions(&self) -> &[u16] {
        &self.x_positions
    }

    /// Alignment the line was laid out with
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Check if the line has no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words joined by single spaces
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (idx, word) in self.words.iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            out.push_str(&word.text);
        }
        out
    }

    /// Draw every word at its offset from `(x, y)`
    pub fn render<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        font_id: FontId,
        x: i32,
        y: i32,
    ) -> Result<(), R::Error> {
        for (word, &offset) in self.words.iter().zip(&self.x_positions) {
            renderer.draw_text(font_id, x + offset as i32, y, &word.text, word.style)?;
        }
        Ok(())
    }
}

/// A text line placed on a page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLine {
    /// The laid-out line
    pub line: TextLine,
    /// Page-relative x
    pub x: i16,
    /// Page-relative y
    pub y: i16,
}

/// An extracted drop-cap glyph placed on a page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropCap {
    /// One codepoint, or a quote mark plus one codepoint
    pub text: String,
    /// Page-relative x
    pub x: i16,
    /// Page-relative y
    pub y: i16,
    /// Body font of the paragraph the glyph was taken from
    pub font_id: FontId,
    /// Style of the source word
    pub style: FontStyle,
}

/// Serialization tag of a page element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementTag {
    /// [`PageLine`]
    Line = 1,
    /// [`DropCap`]
    DropCap = 2,
}

impl ElementTag {
    /// Decode a tag byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ElementTag::Line),
            2 => Some(ElementTag::DropCap),
            _ => None,
        }
    }
}

/// Element placed on a page
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageElement {
    /// Laid-out text line
    Line(PageLine),
    /// Drop-cap glyph
    DropCap(DropCap),
}

impl PageElement {
    /// Serialization tag
    pub fn tag(&self) -> ElementTag {
        match self {
            PageElement::Line(_) => ElementTag::Line,
            PageElement::DropCap(_) => ElementTag::DropCap,
        }
    }

    /// Page-relative y of the element
    pub fn y(&self) -> i16 {
        match self {
            PageElement::Line(line) => line.y,
            PageElement::DropCap(cap) => cap.y,
        }
    }

    pub(crate) fn shift_down(&mut self, dy: i32) {
        let y = match self {
            PageElement::Line(line) => &mut line.y,
            PageElement::DropCap(cap) => &mut cap.y,
        };
        *y = clamp_i16((*y as i32).saturating_add(dy));
    }

    /// Draw the element offset by `(x_offset, y_offset)`.
    ///
    /// Center-aligned lines are header lines and use the header font for
    /// `font_id`.
    pub fn render<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        font_id: FontId,
        x_offset: i32,
        y_offset: i32,
    ) -> Result<(), R::Error> {
        match self {
            PageElement::Line(placed) => {
                let font = if placed.line.alignment() == Alignment::Center {
                    renderer.header_font_id(font_id)
                } else {
                    font_id
                };
                placed.line.render(
                    renderer,
                    font,
                    placed.x as i32 + x_offset,
                    placed.y as i32 + y_offset,
                )
            }
            PageElement::DropCap(cap) => {
                let size = renderer.line_height(cap.font_id) * 5 / 2;
                renderer.draw_drop_cap(
                    cap.x as i32 + x_offset,
                    cap.y as i32 + y_offset,
                    &cap.text,
                    size,
                    cap.style,
                )
            }
        }
    }
}

pub(crate) fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// One screen of content
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Page {
    elements: Vec<PageElement>,
}

impl Page {
    /// Create a new empty page
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element
    pub fn push(&mut self, element: PageElement) {
        self.elements.push(element);
    }

    /// Elements in draw order
    pub fn elements(&self) -> &[PageElement] {
        &self.elements
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> Option<&mut PageElement> {
        self.elements.get_mut(index)
    }

    /// Check if page has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Text lines on the page, in order
    pub fn lines(&self) -> impl Iterator<Item = &PageLine> {
        self.elements.iter().filter_map(|el| match el {
            PageElement::Line(line) => Some(line),
            PageElement::DropCap(_) => None,
        })
    }

    /// Draw all elements
    pub fn render<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        font_id: FontId,
        x_offset: i32,
        y_offset: i32,
    ) -> Result<(), R::Error> {
        for element in &self.elements {
            element.render(renderer, font_id, x_offset, y_offset)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
mod wire {
    use std::io::{Read, Write};

    use super::*;
    use crate::codec::*;
    use crate::error::PagerError;

    /// Upper bound on words in one serialized line.
    pub(super) const MAX_LINE_WORDS: u32 = 8192;

    impl TextLine {
        /// Write the line record
        pub fn serialize<W: Write>(&self, w: &mut W) -> Result<(), PagerError> {
            let count = u32::try_from(self.words.len())
                .ok()
                .filter(|&count| count <= MAX_LINE_WORDS)
                .ok_or_else(|| {
                    PagerError::Format(format!("line with {} words", self.words.len()))
                })?;
            write_u32(w, count)?;
            for word in &self.words {
                write_str(w, &word.text)?;
            }
            for &x in &self.x_positions {
                write_u16(w, x)?;
            }
            for word in &self.words {
                write_u8(w, word.style.to_u8())?;
            }
            write_u8(w, self.alignment.to_u8())
        }

        /// Read a line record
        pub fn deserialize<R: Read>(r: &mut R) -> Result<Self, PagerError> {
            let count = read_u32(r)?;
            if count > MAX_LINE_WORDS {
                return Err(PagerError::Format(format!("line with {} words", count)));
            }
            let count = count as usize;
            let mut texts = Vec::with_capacity(count);
            for _ in 0..count {
                texts.push(read_string(r)?);
            }
            let mut x_positions = Vec::with_capacity(count);
            for _ in 0..count {
                x_positions.push(read_u16(r)?);
            }
            let mut words = Vec::with_capacity(count);
            for text in texts {
                words.push(Word::new(text, read_style(r)?));
            }
            let raw = read_u8(r)?;
            let alignment = Alignment::from_u8(raw)
                .ok_or_else(|| PagerError::Format(format!("alignment {}", raw)))?;
            Ok(Self {
                words,
                x_positions,
                alignment,
            })
        }
    }

    fn read_style<R: Read>(r: &mut R) -> Result<FontStyle, PagerError> {
        let raw = read_u8(r)?;
        FontStyle::from_u8(raw).ok_or_else(|| PagerError::Format(format!("font style {}", raw)))
    }

    impl PageElement {
        /// Write tag byte and payload
        pub fn serialize<W: Write>(&self, w: &mut W) -> Result<(), PagerError> {
            write_u8(w, self.tag() as u8)?;
            match self {
                PageElement::Line(placed) => {
                    write_i16(w, placed.x)?;
                    write_i16(w, placed.y)?;
                    placed.line.serialize(w)
                }
                PageElement::DropCap(cap) => {
                    write_i16(w, cap.x)?;
                    write_i16(w, cap.y)?;
                    write_i32(w, cap.font_id)?;
                    write_u8(w, cap.style.to_u8())?;
                    write_str(w, &cap.text)
                }
            }
        }

        /// Read tag byte and payload
        pub fn deserialize<R: Read>(r: &mut R) -> Result<Self, PagerError> {
            let raw = read_u8(r)?;
            let tag = ElementTag::from_u8(raw).ok_or_else(|| {
                log::warn!("[PGE] Deserialization failed: unknown tag {}", raw);
                PagerError::Format(format!("unknown element tag {}", raw))
            })?;
            let x = read_i16(r)?;
            let y = read_i16(r)?;
            match tag {
                ElementTag::Line => Ok(PageElement::Line(PageLine {
                    line: TextLine::deserialize(r)?,
                    x,
                    y,
                })),
                ElementTag::DropCap => {
                    let font_id = read_i32(r)?;
                    let style = read_style(r)?;
                    let text = read_string(r)?;
                    Ok(PageElement::DropCap(DropCap {
                        text,
                        x,
                        y,
                        font_id,
                        style,
                    }))
                }
            }
        }
    }

    impl Page {
        /// Write the page record: element count, then each element
        pub fn serialize<W: Write>(&self, w: &mut W) -> Result<(), PagerError> {
            let count = u16::try_from(self.elements.len()).map_err(|_| {
                PagerError::Format(format!("page with {} elements", self.elements.len()))
            })?;
            write_u16(w, count)?;
            for element in &self.elements {
                element.serialize(w)?;
            }
            Ok(())
        }

        /// Read one page record
        pub fn deserialize<R: Read>(r: &mut R) -> Result<Self, PagerError> {
            let count = read_u16(r)?;
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elements.push(PageElement::deserialize(r)?);
            }
            Ok(Self { elements })
        }
    }
}
