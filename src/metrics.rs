//! Font metrics provider used by layout and page assembly.
//!
//! Glyph rasterization lives outside this crate. Layout only needs widths,
//! heights and ascenders, queried through [`FontMetrics`].

use crate::style::FontStyle;

/// Identifier of a loaded font face at one size.
pub type FontId = i32;

/// Font ids of the bundled reader fonts.
pub mod font_ids {
    use super::FontId;

    /// Bookerly 12pt
    pub const BOOKERLY_12: FontId = -142_329_172;
    /// Bookerly 14pt
    pub const BOOKERLY_14: FontId = 104_246_423;
    /// Bookerly 16pt
    pub const BOOKERLY_16: FontId = 1_909_382_491;
    /// Bookerly 18pt
    pub const BOOKERLY_18: FontId = 2_056_549_737;
    /// Noto Sans 12pt
    pub const NOTOSANS_12: FontId = -1_646_794_343;
    /// Noto Sans 14pt
    pub const NOTOSANS_14: FontId = -890_242_897;
    /// Noto Sans 16pt
    pub const NOTOSANS_16: FontId = 241_925_189;
    /// Noto Sans 18pt
    pub const NOTOSANS_18: FontId = 1_503_221_336;
    /// OpenDyslexic 8pt
    pub const OPENDYSLEXIC_8: FontId = 875_216_341;
    /// OpenDyslexic 10pt
    pub const OPENDYSLEXIC_10: FontId = -1_234_231_183;
    /// OpenDyslexic 12pt
    pub const OPENDYSLEXIC_12: FontId = 1_682_200_414;
    /// OpenDyslexic 14pt
    pub const OPENDYSLEXIC_14: FontId = -1_851_285_286;
}

/// Size ladders per family, smallest first.
const FAMILY_LADDERS: [[FontId; 4]; 3] = [
    [
        font_ids::BOOKERLY_12,
        font_ids::BOOKERLY_14,
        font_ids::BOOKERLY_16,
        font_ids::BOOKERLY_18,
    ],
    [
        font_ids::NOTOSANS_12,
        font_ids::NOTOSANS_14,
        font_ids::NOTOSANS_16,
        font_ids::NOTOSANS_18,
    ],
    [
        font_ids::OPENDYSLEXIC_8,
        font_ids::OPENDYSLEXIC_10,
        font_ids::OPENDYSLEXIC_12,
        font_ids::OPENDYSLEXIC_14,
    ],
];

/// Map a body font to the next size up in its family.
///
/// The largest size of a family maps to itself. Unknown ids are returned
/// unchanged.
pub fn header_font_id(base: FontId) -> FontId {
    for ladder in FAMILY_LADDERS.iter() {
        if let Some(pos) = ladder.iter().position(|&id| id == base) {
            return ladder[(pos + 1).min(ladder.len() - 1)];
        }
    }
    base
}

/// Text measurement queries, in pixels.
pub trait FontMetrics {
    /// Advance width of `text` drawn in `style`
    fn text_width(&self, font_id: FontId, text: &str, style: FontStyle) -> i32;

    /// Advance width of one inter-word space
    fn space_width(&self, font_id: FontId) -> i32;

    /// Baseline-to-baseline distance
    fn line_height(&self, font_id: FontId) -> i32;

    /// Distance from the top of the line box to the baseline
    fn ascender(&self, font_id: FontId) -> i32;

    /// Font used for header lines set in `base`
    fn header_font_id(&self, base: FontId) -> FontId {
        header_font_id(base)
    }
}

impl<T: FontMetrics + ?Sized> FontMetrics for &T {
    fn text_width(&self, font_id: FontId, text: &str, style: FontStyle) -> i32 {
        (**self).text_width(font_id, text, style)
    }

    fn space_width(&self, font_id: FontId) -> i32 {
        (**self).space_width(font_id)
    }

    fn line_height(&self, font_id: FontId) -> i32 {
        (**self).line_height(font_id)
    }

    fn ascender(&self, font_id: FontId) -> i32 {
        (**self).ascender(font_id)
    }

    fn header_font_id(&self, base: FontId) -> FontId {
        (**self).header_font_id(base)
    }
}

/// Fixed-advance metrics, every char one cell wide.
///
/// Header fonts (anything `header_font_id` maps to a different id, and the
/// top of each ladder) get `header_scale` percent larger cells.
#[derive(Clone, Debug, PartialEq)]
pub struct MonoMetrics {
    /// Cell width in pixels
    pub char_width: i32,
    /// Cell width for bold styles
    pub bold_char_width: i32,
    /// Line height in pixels
    pub line_height: i32,
    /// Ascender in pixels
    pub ascender: i32,
    /// Size of header fonts relative to body fonts, in percent
    pub header_scale: i32,
}

impl Default for MonoMetrics {
    fn default() -> Self {
        Self::font_10x20()
    }
}

impl MonoMetrics {
    /// Metrics of a 10x20 bitmap font
    pub fn font_10x20() -> Self {
        Self {
            char_width: 10,
            bold_char_width: 10,
            line_height: 20,
            ascender: 16,
            header_scale: 100,
        }
    }

    fn scale(&self, font_id: FontId, value: i32) -> i32 {
        if is_header_size(font_id) {
            value * self.header_scale / 100
        } else {
            value
        }
    }
}

fn is_header_size(font_id: FontId) -> bool {
    FAMILY_LADDERS
        .iter()
        .any(|ladder| ladder[1..].contains(&font_id))
}

impl FontMetrics for MonoMetrics {
    fn text_width(&self, font_id: FontId, text: &str, style: FontStyle) -> i32 {
        let cell = if style.is_bold() {
            self.bold_char_width
        } else {
            self.char_width
        };
        let chars = text.chars().count() as i32;
        self.scale(font_id, chars.saturating_mul(cell))
    }

    fn space_width(&self, font_id: FontId) -> i32 {
        self.scale(font_id, self.char_width)
    }

    fn line_height(&self, font_id: FontId) -> i32 {
        self.scale(font_id, self.line_height)
    }

    fn ascender(&self, font_id: FontId) -> i32 {
        self.scale(font_id, self.ascender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_font_ladder() {
        assert_eq!(
            header_font_id(font_ids::BOOKERLY_12),
            font_ids::BOOKERLY_14
        );
        assert_eq!(
            header_font_id(font_ids::NOTOSANS_16),
            font_ids::NOTOSANS_18
        );
        assert_eq!(
            header_font_id(font_ids::OPENDYSLEXIC_8),
            font_ids::OPENDYSLEXIC_10
        );
    }

    #[test]
    fn test_header_font_saturates() {
        assert_eq!(
            header_font_id(font_ids::BOOKERLY_18),
            font_ids::BOOKERLY_18
        );
        assert_eq!(
            header_font_id(font_ids::OPENDYSLEXIC_14),
            font_ids::OPENDYSLEXIC_14
        );
    }

    #[test]
    fn test_unknown_font_maps_to_itself() {
        assert_eq!(header_font_id(7), 7);
    }

    #[test]
    fn test_mono_metrics() {
        let metrics = MonoMetrics::default();
        assert_eq!(metrics.text_width(0, "hello", FontStyle::Regular), 50);
        assert_eq!(metrics.text_width(0, "héllo", FontStyle::Bold), 50);
        assert_eq!(metrics.space_width(0), 10);
        assert_eq!(metrics.line_height(0), 20);
    }

    #[test]
    fn test_mono_metrics_header_scale() {
        let metrics = MonoMetrics {
            header_scale: 150,
            ..MonoMetrics::default()
        };
        let header = metrics.header_font_id(font_ids::BOOKERLY_12);
        assert_eq!(metrics.line_height(font_ids::BOOKERLY_12), 20);
        assert_eq!(metrics.line_height(header), 30);
    }
}
