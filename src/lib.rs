//! mu-pager -- Streaming chapter pagination with a seekable page cache
//!
//! Turns one EPUB chapter (XHTML) into fixed-size pages for a small
//! display, and stores them in a compact binary cache so any page can be
//! loaded later with a single table lookup.
//!
//! The pipeline:
//!
//! 1. [`ChapterParser`] streams markup through quick-xml and collects styled
//!    words into paragraphs.
//! 2. [`Paragraph::layout`] breaks each paragraph into lines, minimizing
//!    the sum of squared slack, and extracts drop caps.
//! 3. [`PageAssembler`] stacks lines into viewport-sized [`Page`]s.
//! 4. [`Section`] serializes each page as it completes and appends a lookup
//!    table of page offsets.
//!
//! # Features
//!
//! - `std` (default) -- markup parser, storage, cache files
//! - `async` -- tokio helpers for loading chapter sources
//! - `cli` -- the `mu-pager` inspection binary
//!
//! Without `std` the crate is `no_std + alloc` and exposes the layout core:
//! paragraphs, line breaking, the page model and page assembly.
//!
//! # Allocation Behavior
//!
//! Memory use is bounded by one open paragraph (flushed early once it holds
//! more than [`StreamLimits::flood_word_limit`] words), one held-back
//! chapter-title paragraph and the page being filled. Words are buffered in
//! a fixed 200-byte `heapless` string.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(clippy::large_enum_variant, clippy::large_stack_arrays, clippy::redundant_clone)]
#![warn(
    clippy::box_collection,
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

extern crate alloc;

pub mod assembly;
pub mod error;
pub mod line_break;
pub mod metrics;
pub mod page;
pub mod paragraph;
pub mod streaming;
pub mod style;
pub mod word;

#[cfg(feature = "std")]
mod codec;

#[cfg(feature = "std")]
pub mod parser;

#[cfg(feature = "std")]
pub mod section;

#[cfg(feature = "std")]
pub mod storage;

#[cfg(feature = "async")]
pub mod async_api;

// Re-export key types for convenience
pub use assembly::PageAssembler;
#[cfg(feature = "async")]
pub use async_api::load_chapters_async;
pub use error::{CacheMiss, PagerError};
pub use line_break::compute_line_breaks;
pub use metrics::{header_font_id, FontId, FontMetrics, MonoMetrics};
pub use page::{DropCap, ElementTag, Page, PageElement, PageLine, Renderer, TextLine};
pub use paragraph::{ExtractedDropCap, LineContext, Paragraph};
#[cfg(feature = "std")]
pub use parser::ChapterParser;
#[cfg(feature = "std")]
pub use section::{
    ChapterSource, InMemoryChapters, Section, SectionHeader, HEADER_SIZE, SECTION_FILE_VERSION,
};
#[cfg(feature = "std")]
pub use storage::{FsStorage, Storage};
pub use streaming::{
    BuildProgress, NoProgress, ProgressTracker, SectionOptions, SectionStats, StreamLimits,
};
pub use style::{Alignment, FontStyle};
pub use word::{Word, WordBuffer};
