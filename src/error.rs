//! Unified error types for mu-pager
//!
//! Provides a top-level `PagerError` covering storage, markup and cache
//! format failures, plus `From` impls so `?` works across module boundaries.

extern crate alloc;

use alloc::string::{String, ToString};
use core::fmt;

/// Top-level error type for mu-pager operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PagerError {
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
    /// Markup tokenizer error in chapter source
    Parse(String),
    /// Malformed cache record (unknown element tag, oversized field, short read)
    Format(String),
    /// Cache file is absent or was built with different parameters
    CacheMiss(CacheMiss),
    /// Page index requested is out of bounds
    PageOutOfBounds {
        /// Requested page index.
        index: u16,
        /// Number of pages in the section.
        page_count: u16,
    },
    /// Chapter source could not be streamed to scratch storage
    SourceUnavailable {
        /// Spine index of the chapter.
        spine_index: usize,
        /// Attempts made before giving up.
        attempts: u8,
    },
    /// A page was written at an offset the lookup table cannot represent
    InvalidPageOffset {
        /// Page number with the bad offset.
        page: usize,
    },
}

impl PagerError {
    /// Whether the caller should treat this error as "rebuild the cache".
    ///
    /// Mismatched headers and malformed records are both folded into the
    /// same rebuild path.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, PagerError::CacheMiss(_) | PagerError::Format(_))
    }
}

impl fmt::Display for PagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagerError::Io(msg) => write!(f, "I/O error: {}", msg),
            PagerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            PagerError::Format(msg) => write!(f, "Malformed cache: {}", msg),
            PagerError::CacheMiss(kind) => write!(f, "Cache miss: {}", kind),
            PagerError::PageOutOfBounds { index, page_count } => write!(
                f,
                "Page index {} out of bounds (page count: {})",
                index, page_count
            ),
            PagerError::SourceUnavailable {
                spine_index,
                attempts,
            } => write!(
                f,
                "Chapter {} could not be streamed after {} attempts",
                spine_index, attempts
            ),
            PagerError::InvalidPageOffset { page } => {
                write!(f, "Page {} has an invalid file offset", page)
            }
        }
    }
}

/// Reasons a cache file cannot be used as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheMiss {
    /// No cache file exists for the section
    NotFound,
    /// File was written by a different format version
    VersionMismatch {
        /// Version byte found on disk.
        found: u8,
        /// Version this build writes.
        expected: u8,
    },
    /// Layout parameters in the header differ from the requested ones
    ParametersMismatch,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMiss::NotFound => write!(f, "no cache file"),
            CacheMiss::VersionMismatch { found, expected } => {
                write!(f, "version {} (expected {})", found, expected)
            }
            CacheMiss::ParametersMismatch => write!(f, "layout parameters changed"),
        }
    }
}

impl From<CacheMiss> for PagerError {
    fn from(kind: CacheMiss) -> Self {
        PagerError::CacheMiss(kind)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PagerError {}

#[cfg(feature = "std")]
impl std::error::Error for CacheMiss {}

#[cfg(feature = "std")]
impl From<std::io::Error> for PagerError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PagerError::Format("unexpected end of record".to_string())
        } else {
            PagerError::Io(err.to_string())
        }
    }
}

#[cfg(feature = "std")]
impl From<quick_xml::Error> for PagerError {
    fn from(err: quick_xml::Error) -> Self {
        PagerError::Parse(err.to_string())
    }
}
