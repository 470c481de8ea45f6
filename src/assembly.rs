//! Page assembly: stacks laid-out lines into viewport-sized pages.

extern crate alloc;

use alloc::vec::Vec;

use crate::metrics::{FontId, FontMetrics};
use crate::page::{clamp_i16, DropCap, Page, PageElement, PageLine, TextLine};
use crate::paragraph::LineContext;
use crate::streaming::SectionOptions;
use crate::style::Alignment;

/// Space above and below a header line, in pixels.
pub const HEADER_PADDING: i32 = 30;

/// Drop-cap bookkeeping for the open paragraph on the open page.
#[derive(Debug, Default)]
struct DropCapState {
    placed: bool,
    lines: usize,
    first_line: Option<usize>,
}

/// Builds pages from a stream of laid-out lines.
///
/// Completed pages queue up in the assembler until the caller drains them
/// with [`PageAssembler::take_completed`].
#[derive(Debug)]
pub struct PageAssembler {
    font_id: FontId,
    line_compression: f32,
    viewport_height: i32,
    extra_paragraph_spacing: bool,
    page: Page,
    cursor_y: i32,
    drop_cap: DropCapState,
    completed: Vec<Page>,
}

impl PageAssembler {
    /// Create an assembler for the given layout parameters
    pub fn new(options: &SectionOptions) -> Self {
        Self {
            font_id: options.font_id,
            line_compression: options.line_compression,
            viewport_height: options.viewport_height as i32,
            extra_paragraph_spacing: options.extra_paragraph_spacing,
            page: Page::new(),
            cursor_y: 0,
            drop_cap: DropCapState::default(),
            completed: Vec::new(),
        }
    }

    /// Line advance for `font_id` after compression
    pub fn line_height<M: FontMetrics + ?Sized>(&self, metrics: &M, font_id: FontId) -> i32 {
        (metrics.line_height(font_id) as f32 * self.line_compression) as i32
    }

    /// Current y cursor on the open page
    pub fn cursor_y(&self) -> i32 {
        self.cursor_y
    }

    /// Page being filled
    pub fn current_page(&self) -> &Page {
        &self.page
    }

    /// Take pages completed since the last call
    pub fn take_completed(&mut self) -> Vec<Page> {
        core::mem::take(&mut self.completed)
    }

    fn flush_page(&mut self) {
        let page = core::mem::take(&mut self.page);
        self.completed.push(page);
        self.cursor_y = 0;
        self.drop_cap = DropCapState::default();
    }

    /// Place one line, starting a new page when it would overflow.
    pub fn add_line<M: FontMetrics + ?Sized>(
        &mut self,
        metrics: &M,
        line: TextLine,
        ctx: &LineContext<'_>,
    ) {
        let is_header_line = ctx.is_header && line.alignment() == Alignment::Center;
        let font = if is_header_line {
            metrics.header_font_id(self.font_id)
        } else {
            self.font_id
        };
        let line_height = self.line_height(metrics, font);
        let padding = if is_header_line { HEADER_PADDING } else { 0 };

        if self.cursor_y + line_height + padding > self.viewport_height && !self.page.is_empty()
        {
            self.flush_page();
        }

        self.cursor_y += padding;

        // A paragraph that runs onto a new page gets its drop cap again there.
        if let Some(cap) = ctx.drop_cap {
            if !self.drop_cap.placed {
                let baseline_shift = metrics.ascender(self.font_id) - metrics.ascender(font);
                let y = self.cursor_y - baseline_shift + line_height;
                self.page.push(PageElement::DropCap(DropCap {
                    text: cap.text.clone(),
                    x: 0,
                    y: clamp_i16(y),
                    font_id: self.font_id,
                    style: cap.style,
                }));
                self.drop_cap.placed = true;
            }
            self.drop_cap.lines += 1;
            if self.drop_cap.lines == 1 {
                self.drop_cap.first_line = Some(self.page.len());
            }
        }

        self.page.push(PageElement::Line(PageLine {
            line,
            x: 0,
            y: clamp_i16(self.cursor_y),
        }));
        self.cursor_y += line_height;
        if is_header_line {
            self.cursor_y += HEADER_PADDING;
        }
    }

    /// Close out a paragraph after its last line was placed.
    ///
    /// A drop cap spans two lines; when its paragraph produced a single
    /// line, that line moves down one line so the glyph does not overhang
    /// empty space above the next paragraph.
    pub fn finish_paragraph<M: FontMetrics + ?Sized>(&mut self, metrics: &M) {
        let line_height = self.line_height(metrics, self.font_id);
        if self.drop_cap.lines == 1 {
            if let Some(element) = self
                .drop_cap
                .first_line
                .and_then(|idx| self.page.element_mut(idx))
            {
                element.shift_down(line_height);
                self.cursor_y += line_height;
            }
        }
        self.drop_cap = DropCapState::default();

        if self.extra_paragraph_spacing {
            self.cursor_y += line_height / 2;
        }
    }

    /// Flush the open page, empty or not. Call once at end of stream.
    pub fn finish(&mut self) {
        self.flush_page();
    }
}
