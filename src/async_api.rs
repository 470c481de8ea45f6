//! Optional async helpers for loading chapter sources.
//!
//! This module is available with the `async` feature.

extern crate alloc;

use alloc::string::ToString;
use std::path::Path;

use crate::error::PagerError;
use crate::section::InMemoryChapters;

/// Read chapter files asynchronously into an [`InMemoryChapters`].
///
/// Spine indices follow the order of `paths`.
pub async fn load_chapters_async<I, P>(paths: I) -> Result<InMemoryChapters, PagerError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut chapters = InMemoryChapters::new();
    for path in paths {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PagerError::Io(format!("{}: {}", path.display(), e.to_string())))?;
        log::debug!("[SCT] Loaded {} ({} bytes)", path.display(), bytes.len());
        chapters.push(bytes);
    }
    Ok(chapters)
}
