//! Font style and paragraph alignment tags.
//!
//! Both enums have stable wire values; they are written verbatim into
//! section cache files.

/// Font style of a single word
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FontStyle {
    /// Upright, regular weight
    #[default]
    Regular = 0,
    /// Bold weight
    Bold = 1,
    /// Italic
    Italic = 2,
    /// Bold and italic
    BoldItalic = 3,
}

impl FontStyle {
    /// Build a style from independent bold/italic flags
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontStyle::BoldItalic,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (false, false) => FontStyle::Regular,
        }
    }

    /// Check if style is bold
    pub fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    /// Check if style is italic
    pub fn is_italic(&self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }

    /// Apply bold flag to current style
    pub fn with_bold(&self, bold: bool) -> Self {
        Self::from_flags(bold, self.is_italic())
    }

    /// Apply italic flag to current style
    pub fn with_italic(&self, italic: bool) -> Self {
        Self::from_flags(self.is_bold(), italic)
    }

    /// Wire value
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire value, `None` for unknown bytes
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FontStyle::Regular),
            1 => Some(FontStyle::Bold),
            2 => Some(FontStyle::Italic),
            3 => Some(FontStyle::BoldItalic),
            _ => None,
        }
    }
}

/// Horizontal alignment of a paragraph's lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Alignment {
    /// Spread words to fill the line (last line stays left-aligned)
    #[default]
    Justified = 0,
    /// Flush left
    Left = 1,
    /// Centered
    Center = 2,
    /// Flush right
    Right = 3,
}

impl Alignment {
    /// Wire value
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire value, `None` for unknown bytes
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Alignment::Justified),
            1 => Some(Alignment::Left),
            2 => Some(Alignment::Center),
            3 => Some(Alignment::Right),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_style_flags() {
        let mut style = FontStyle::Regular;
        assert!(!style.is_bold());
        assert!(!style.is_italic());

        style = style.with_bold(true);
        assert_eq!(style, FontStyle::Bold);

        style = style.with_italic(true);
        assert_eq!(style, FontStyle::BoldItalic);

        style = style.with_bold(false);
        assert_eq!(style, FontStyle::Italic);
    }

    #[test]
    fn test_wire_values_are_stable() {
        assert_eq!(FontStyle::BoldItalic.to_u8(), 3);
        assert_eq!(Alignment::Justified.to_u8(), 0);
        assert_eq!(Alignment::Right.to_u8(), 3);
        assert_eq!(Alignment::from_u8(2), Some(Alignment::Center));
        assert_eq!(FontStyle::from_u8(4), None);
        assert_eq!(Alignment::from_u8(9), None);
    }
}
