//! Build parameters, streaming limits and progress reporting.
//!
//! [`SectionOptions`] holds the layout parameters a cache file is keyed on.
//! [`StreamLimits`] holds operational knobs that never affect output bytes.

use crate::metrics::FontId;
use crate::style::Alignment;

/// Layout parameters of a section cache.
///
/// Every field is stored in the cache header; a cache is only reused when
/// all of them match exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionOptions {
    /// Body font
    pub font_id: FontId,
    /// Multiplier applied to font line height
    pub line_compression: f32,
    /// Half a line between paragraphs instead of a first-line indent
    pub extra_paragraph_spacing: bool,
    /// Alignment of ordinary paragraphs
    pub paragraph_alignment: Alignment,
    /// Text area width in pixels
    pub viewport_width: u16,
    /// Text area height in pixels
    pub viewport_height: u16,
    /// Ignore bold/italic markup in the source
    pub standardize_formatting: bool,
}

impl Default for SectionOptions {
    fn default() -> Self {
        Self {
            font_id: 0,
            line_compression: 1.0,
            extra_paragraph_spacing: false,
            paragraph_alignment: Alignment::Justified,
            viewport_width: 480,
            viewport_height: 800,
            standardize_formatting: false,
        }
    }
}

impl SectionOptions {
    /// Set the body font
    pub fn with_font_id(mut self, font_id: FontId) -> Self {
        self.font_id = font_id;
        self
    }

    /// Set the line-height multiplier
    pub fn with_line_compression(mut self, line_compression: f32) -> Self {
        self.line_compression = line_compression;
        self
    }

    /// Toggle paragraph spacing
    pub fn with_extra_paragraph_spacing(mut self, enabled: bool) -> Self {
        self.extra_paragraph_spacing = enabled;
        self
    }

    /// Set default paragraph alignment
    pub fn with_paragraph_alignment(mut self, alignment: Alignment) -> Self {
        self.paragraph_alignment = alignment;
        self
    }

    /// Set viewport size
    pub fn with_viewport(mut self, width: u16, height: u16) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Toggle formatting standardization
    pub fn with_standardize_formatting(mut self, enabled: bool) -> Self {
        self.standardize_formatting = enabled;
        self
    }

    /// Bit-exact comparison, as the cache header sees it
    pub fn same_layout(&self, other: &SectionOptions) -> bool {
        self.font_id == other.font_id
            && self.line_compression.to_bits() == other.line_compression.to_bits()
            && self.extra_paragraph_spacing == other.extra_paragraph_spacing
            && self.paragraph_alignment == other.paragraph_alignment
            && self.viewport_width == other.viewport_width
            && self.viewport_height == other.viewport_height
            && self.standardize_formatting == other.standardize_formatting
    }
}

/// Limits for incremental processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLimits {
    /// Bytes read from the scratch file per tokenizer refill
    pub read_chunk: usize,
    /// Attempts at streaming a chapter into scratch storage
    pub source_attempts: u8,
    /// Pause between attempts, in milliseconds
    pub retry_backoff_ms: u64,
    /// Sources smaller than this get no progress callbacks
    pub progress_min_bytes: u64,
    /// Words an open paragraph may hold before early layout
    pub flood_word_limit: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            read_chunk: 1024,
            source_attempts: 3,
            retry_backoff_ms: 50,
            progress_min_bytes: 50 * 1024,
            flood_word_limit: 750,
        }
    }
}

impl StreamLimits {
    /// Conservative limits for embedded environments.
    pub fn embedded() -> Self {
        Self::default()
    }

    /// Larger reads for desktop tools.
    pub fn desktop() -> Self {
        Self {
            read_chunk: 16384,
            retry_backoff_ms: 0,
            ..Self::default()
        }
    }
}

/// Receives build progress for large chapters.
pub trait BuildProgress {
    /// Called once before parsing when the source is large enough to report
    fn on_start(&mut self) {}

    /// Called with a percentage in 10% steps
    fn on_progress(&mut self, percent: u8);
}

/// Progress sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl BuildProgress for NoProgress {
    fn on_progress(&mut self, _percent: u8) {}
}

impl<F: FnMut(u8)> BuildProgress for F {
    fn on_progress(&mut self, percent: u8) {
        self(percent)
    }
}

/// Turns byte positions into 10% progress steps.
#[derive(Clone, Copy, Debug)]
pub struct ProgressTracker {
    total: u64,
    enabled: bool,
    last: u8,
}

impl ProgressTracker {
    /// Track a source of `total` bytes; disabled below `min_bytes`.
    pub fn new(total: u64, min_bytes: u64) -> Self {
        Self {
            total,
            enabled: total > 0 && total >= min_bytes,
            last: 0,
        }
    }

    /// Whether progress will be reported at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Percentage to report for `position`, if a new step was reached.
    pub fn update(&mut self, position: u64) -> Option<u8> {
        if !self.enabled {
            return None;
        }
        let percent = (position.min(self.total) * 100 / self.total) as u8;
        if percent >= self.last.saturating_add(10) {
            self.last = percent / 10 * 10;
            Some(percent)
        } else {
            None
        }
    }
}

/// Statistics collected while building a section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionStats {
    /// Bytes of chapter markup parsed
    pub bytes_read: u64,
    /// Pages written to the cache
    pub pages: u16,
    /// Paragraphs laid out
    pub paragraphs: usize,
    /// Paragraphs dropped as whitespace-only
    pub paragraphs_discarded: usize,
    /// Early layouts triggered by oversized paragraphs
    pub flood_layouts: usize,
    /// Deepest element nesting seen
    pub max_depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_default_limits() {
        let limits = StreamLimits::default();
        assert_eq!(limits.read_chunk, 1024);
        assert_eq!(limits.source_attempts, 3);
        assert_eq!(limits.flood_word_limit, 750);
    }

    #[test]
    fn test_same_layout_is_bit_exact() {
        let a = SectionOptions::default().with_line_compression(0.95);
        let b = SectionOptions::default().with_line_compression(0.95);
        assert!(a.same_layout(&b));
        let c = b.with_line_compression(0.950_000_1);
        assert!(!a.same_layout(&c));
        assert!(!a.same_layout(&a.with_standardize_formatting(true)));
    }

    #[test]
    fn test_progress_in_ten_percent_steps() {
        let mut tracker = ProgressTracker::new(100_000, 50 * 1024);
        let reported: Vec<u8> = (0..=100_000u64)
            .step_by(2_500)
            .filter_map(|pos| tracker.update(pos))
            .collect();
        assert_eq!(reported, [10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_small_sources_report_nothing() {
        let mut tracker = ProgressTracker::new(1_000, 50 * 1024);
        assert!(!tracker.is_enabled());
        assert_eq!(tracker.update(1_000), None);
    }

    #[test]
    fn test_closure_progress_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |p: u8| seen.push(p);
            sink.on_start();
            sink.on_progress(40);
        }
        assert_eq!(seen, [40]);
    }
}
