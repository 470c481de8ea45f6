//! embedded-graphics renderer for `mu-pager` pages.
//!
//! [`MonoFontBackend`] measures text with the embedded-graphics ASCII mono
//! fonts, so pages built with it line up pixel for pixel with what
//! [`EgRenderer`] draws.

#![no_std]

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_10X20, FONT_6X13, FONT_6X13_BOLD, FONT_6X13_ITALIC, FONT_7X13, FONT_7X13_BOLD,
            FONT_7X13_ITALIC, FONT_9X15, FONT_9X15_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use mu_pager::{FontId, FontMetrics, FontStyle, Page, Renderer};

/// Pixels between the bottom of one line's cells and the top of the next.
const LINE_GAP: i32 = 2;

/// Mono-font metrics over three sizes of the ASCII fonts.
///
/// Font ids form one ladder: [`MonoFontBackend::SMALL`] (6x13),
/// [`MonoFontBackend::MEDIUM`] (7x13) and [`MonoFontBackend::LARGE`]
/// (9x15). Headers use the next size up. Unknown ids fall back to `SMALL`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    /// 6x13 body font
    pub const SMALL: FontId = 0;
    /// 7x13 body font
    pub const MEDIUM: FontId = 1;
    /// 9x15 body font
    pub const LARGE: FontId = 2;

    /// Face used for `font_id` in `style`
    pub fn face(font_id: FontId, style: FontStyle) -> &'static MonoFont<'static> {
        match (font_id, style.is_bold(), style.is_italic()) {
            (Self::LARGE, true, _) => &FONT_9X15_BOLD,
            (Self::LARGE, false, _) => &FONT_9X15,
            (Self::MEDIUM, true, _) => &FONT_7X13_BOLD,
            (Self::MEDIUM, false, true) => &FONT_7X13_ITALIC,
            (Self::MEDIUM, false, false) => &FONT_7X13,
            (_, true, _) => &FONT_6X13_BOLD,
            (_, false, true) => &FONT_6X13_ITALIC,
            _ => &FONT_6X13,
        }
    }

    /// Largest face no taller than `size_px`, for drop caps
    pub fn drop_cap_face(size_px: i32) -> &'static MonoFont<'static> {
        [&FONT_10X20, &FONT_9X15, &FONT_7X13]
            .into_iter()
            .find(|font| font.character_size.height as i32 <= size_px)
            .unwrap_or(&FONT_6X13)
    }

    fn advance(font: &MonoFont<'_>) -> i32 {
        (font.character_size.width + font.character_spacing) as i32
    }
}

impl FontMetrics for MonoFontBackend {
    fn text_width(&self, font_id: FontId, text: &str, style: FontStyle) -> i32 {
        let chars = text.chars().count() as i32;
        chars.saturating_mul(Self::advance(Self::face(font_id, style)))
    }

    fn space_width(&self, font_id: FontId) -> i32 {
        Self::advance(Self::face(font_id, FontStyle::Regular))
    }

    fn line_height(&self, font_id: FontId) -> i32 {
        Self::face(font_id, FontStyle::Regular).character_size.height as i32 + LINE_GAP
    }

    fn ascender(&self, font_id: FontId) -> i32 {
        Self::face(font_id, FontStyle::Regular).baseline as i32
    }

    fn header_font_id(&self, base: FontId) -> FontId {
        match base {
            Self::SMALL => Self::MEDIUM,
            Self::MEDIUM | Self::LARGE => Self::LARGE,
            other => other,
        }
    }
}

/// Draws pages onto an embedded-graphics target.
pub struct EgRenderer<'a, D> {
    display: &'a mut D,
    backend: MonoFontBackend,
}

impl<'a, D> EgRenderer<'a, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    /// Renderer drawing onto `display`
    pub fn new(display: &'a mut D) -> Self {
        Self {
            display,
            backend: MonoFontBackend,
        }
    }

    /// Clear the target and draw `page` with its top-left at `(x, y)`.
    pub fn render_page(
        &mut self,
        page: &Page,
        font_id: FontId,
        x: i32,
        y: i32,
    ) -> Result<(), D::Error> {
        self.display.clear(BinaryColor::Off)?;
        page.render(self, font_id, x, y)
    }
}

impl<D> FontMetrics for EgRenderer<'_, D> {
    fn text_width(&self, font_id: FontId, text: &str, style: FontStyle) -> i32 {
        self.backend.text_width(font_id, text, style)
    }

    fn space_width(&self, font_id: FontId) -> i32 {
        self.backend.space_width(font_id)
    }

    fn line_height(&self, font_id: FontId) -> i32 {
        self.backend.line_height(font_id)
    }

    fn ascender(&self, font_id: FontId) -> i32 {
        self.backend.ascender(font_id)
    }

    fn header_font_id(&self, base: FontId) -> FontId {
        self.backend.header_font_id(base)
    }
}

impl<D> Renderer for EgRenderer<'_, D>
where
    D: DrawTarget<Color = BinaryColor>,
{
    type Error = D::Error;

    fn draw_text(
        &mut self,
        font_id: FontId,
        x: i32,
        y: i32,
        text: &str,
        style: FontStyle,
    ) -> Result<(), Self::Error> {
        let face = MonoTextStyle::new(MonoFontBackend::face(font_id, style), BinaryColor::On);
        Text::with_baseline(text, Point::new(x, y), face, Baseline::Top).draw(self.display)?;
        Ok(())
    }

    fn draw_drop_cap(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        size_px: i32,
        _style: FontStyle,
    ) -> Result<(), Self::Error> {
        let font = MonoFontBackend::drop_cap_face(size_px);
        let face = MonoTextStyle::new(font, BinaryColor::On);
        // Drop cap y is the baseline of the text it sits beside.
        Text::with_baseline(text, Point::new(x, y), face, Baseline::Bottom).draw(self.display)?;
        Ok(())
    }
}
