//! Section cache files.
//!
//! One cache file holds every page of one chapter, laid out for one set of
//! [`SectionOptions`]:
//!
//! ```text
//! header   u8 version, i32 font, f32 compression, u8 extra spacing,
//!          u8 alignment, u16 width, u16 height, u8 standardize,
//!          u16 page count, u32 LUT offset                  (22 bytes)
//! body     page records, back to back
//! LUT      u32 absolute offset per page
//! ```
//!
//! Page count and LUT offset are written as zero placeholders and patched
//! once the body is complete. A failed build never leaves a file behind.

use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::time::Duration;

use crate::codec::{
    read_bool, read_f32, read_i32, read_u16, read_u32, read_u8, write_bool, write_f32,
    write_i32, write_u16, write_u32, write_u8,
};
use crate::error::{CacheMiss, PagerError};
use crate::metrics::FontMetrics;
use crate::page::Page;
use crate::parser::ChapterParser;
use crate::storage::{join_path, Storage};
use crate::streaming::{BuildProgress, SectionOptions, SectionStats, StreamLimits};
use crate::style::Alignment;

/// Format version written by this crate.
pub const SECTION_FILE_VERSION: u8 = 10;
/// Last version without the standardize-formatting byte.
pub const LEGACY_SECTION_FILE_VERSION: u8 = 9;
/// Size of a current-version header in bytes.
pub const HEADER_SIZE: u64 = 22;

const PAGE_COUNT_FIELD: u64 = HEADER_SIZE - 6;
const LUT_OFFSET_FIELD: u64 = HEADER_SIZE - 4;

/// Parsed cache header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionHeader {
    /// Format version byte
    pub version: u8,
    /// Layout parameters the file was built with
    pub options: SectionOptions,
    /// Number of page records
    pub page_count: u16,
    /// Absolute offset of the page lookup table
    pub lut_offset: u32,
}

impl SectionHeader {
    /// Current-version header with zeroed placeholders
    pub fn new(options: SectionOptions) -> Self {
        Self {
            version: SECTION_FILE_VERSION,
            options,
            page_count: 0,
            lut_offset: 0,
        }
    }

    /// Encoded size for `version`
    pub fn encoded_len(version: u8) -> u64 {
        if version >= SECTION_FILE_VERSION {
            HEADER_SIZE
        } else {
            HEADER_SIZE - 1
        }
    }

    /// Write the header; versions before 10 omit the standardize byte.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), PagerError> {
        let o = &self.options;
        write_u8(w, self.version)?;
        write_i32(w, o.font_id)?;
        write_f32(w, o.line_compression)?;
        write_bool(w, o.extra_paragraph_spacing)?;
        write_u8(w, o.paragraph_alignment.to_u8())?;
        write_u16(w, o.viewport_width)?;
        write_u16(w, o.viewport_height)?;
        if self.version >= SECTION_FILE_VERSION {
            write_bool(w, o.standardize_formatting)?;
        }
        write_u16(w, self.page_count)?;
        write_u32(w, self.lut_offset)
    }

    /// Read a version 9 or 10 header.
    ///
    /// Version 9 files carry no standardize byte; it reads as `false`.
    pub fn read<R: Read>(r: &mut R) -> Result<Self, PagerError> {
        let version = read_u8(r)?;
        if version != SECTION_FILE_VERSION && version != LEGACY_SECTION_FILE_VERSION {
            return Err(CacheMiss::VersionMismatch {
                found: version,
                expected: SECTION_FILE_VERSION,
            }
            .into());
        }

        let font_id = read_i32(r)?;
        let line_compression = read_f32(r)?;
        let extra_paragraph_spacing = read_bool(r)?;
        let raw_alignment = read_u8(r)?;
        let paragraph_alignment = Alignment::from_u8(raw_alignment)
            .ok_or_else(|| PagerError::Format(format!("alignment {}", raw_alignment)))?;
        let viewport_width = read_u16(r)?;
        let viewport_height = read_u16(r)?;
        let standardize_formatting = if version >= SECTION_FILE_VERSION {
            read_bool(r)?
        } else {
            false
        };
        let page_count = read_u16(r)?;
        let lut_offset = read_u32(r)?;

        Ok(Self {
            version,
            options: SectionOptions {
                font_id,
                line_compression,
                extra_paragraph_spacing,
                paragraph_alignment,
                viewport_width,
                viewport_height,
                standardize_formatting,
            },
            page_count,
            lut_offset,
        })
    }

    /// Check the header against the parameters a caller wants to render with.
    pub fn check(&self, options: &SectionOptions) -> Result<(), CacheMiss> {
        if self.version != SECTION_FILE_VERSION {
            return Err(CacheMiss::VersionMismatch {
                found: self.version,
                expected: SECTION_FILE_VERSION,
            });
        }
        if !self.options.same_layout(options) {
            return Err(CacheMiss::ParametersMismatch);
        }
        Ok(())
    }
}

/// Supplies raw chapter markup by spine index.
pub trait ChapterSource {
    /// Write the complete markup of chapter `spine_index` to `out`.
    fn stream_chapter(&mut self, spine_index: usize, out: &mut dyn Write)
        -> Result<(), PagerError>;
}

impl<C: ChapterSource + ?Sized> ChapterSource for &mut C {
    fn stream_chapter(
        &mut self,
        spine_index: usize,
        out: &mut dyn Write,
    ) -> Result<(), PagerError> {
        (**self).stream_chapter(spine_index, out)
    }
}

/// Chapters held in memory, indexed by spine position.
#[derive(Clone, Debug, Default)]
pub struct InMemoryChapters {
    chapters: Vec<Vec<u8>>,
}

impl InMemoryChapters {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chapter and return its spine index
    pub fn push(&mut self, markup: impl Into<Vec<u8>>) -> usize {
        self.chapters.push(markup.into());
        self.chapters.len() - 1
    }

    /// Number of chapters
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// Check if there are no chapters
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

impl ChapterSource for InMemoryChapters {
    fn stream_chapter(
        &mut self,
        spine_index: usize,
        out: &mut dyn Write,
    ) -> Result<(), PagerError> {
        let markup = self
            .chapters
            .get(spine_index)
            .ok_or_else(|| PagerError::Io(format!("no chapter at spine index {}", spine_index)))?;
        out.write_all(markup)?;
        Ok(())
    }
}

/// Writer that counts bytes passed through it.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Cache file of one chapter.
///
/// ```no_run
/// use mu_pager::{FsStorage, InMemoryChapters, MonoMetrics, NoProgress, Section,
///     SectionOptions, StreamLimits};
///
/// let storage = FsStorage::new("/sd");
/// let mut chapters = InMemoryChapters::new();
/// let spine = chapters.push("<html><body><p>Hello</p></body></html>");
/// let options = SectionOptions::default();
///
/// let mut section = Section::new(&storage, "cache/book", spine);
/// if section.load_section_file(&options).is_err() {
///     section.create_section_file(
///         &mut chapters,
///         &MonoMetrics::default(),
///         &options,
///         &StreamLimits::default(),
///         &mut NoProgress,
///     )?;
/// }
/// let _page = section.load_page(0)?;
/// # Ok::<(), mu_pager::PagerError>(())
/// ```
#[derive(Debug)]
pub struct Section<S: Storage> {
    storage: S,
    cache_dir: String,
    spine_index: usize,
    file_path: String,
    page_count: u16,
}

impl<S: Storage> Section<S> {
    /// Section for chapter `spine_index`, cached under `cache_dir`.
    pub fn new(storage: S, cache_dir: impl Into<String>, spine_index: usize) -> Self {
        let cache_dir = cache_dir.into();
        let file_path = join_path(
            &join_path(&cache_dir, "sections"),
            &format!("{}.bin", spine_index),
        );
        Self {
            storage,
            cache_dir,
            spine_index,
            file_path,
            page_count: 0,
        }
    }

    /// Path of the cache file
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Path of the scratch copy of the chapter markup
    pub fn temp_path(&self) -> String {
        join_path(&self.cache_dir, &format!(".tmp_{}.html", self.spine_index))
    }

    /// Spine index of the chapter
    pub fn spine_index(&self) -> usize {
        self.spine_index
    }

    /// Pages known from the last successful load or build, 0 otherwise
    pub fn page_count(&self) -> u16 {
        self.page_count
    }

    /// Storage provider
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the header without validating it
    pub fn inspect_header(&self) -> Result<SectionHeader, PagerError> {
        let file = self
            .storage
            .open_read(&self.file_path)
            .map_err(|_| PagerError::from(CacheMiss::NotFound))?;
        SectionHeader::read(&mut BufReader::new(file))
    }

    /// Open the cache file and check it was built with `options`.
    ///
    /// Returns the page count on a hit. A file with another version, other
    /// parameters or an unreadable header is deleted, and the error reports
    /// a cache miss so the caller rebuilds.
    pub fn load_section_file(&mut self, options: &SectionOptions) -> Result<u16, PagerError> {
        self.page_count = 0;
        let file = match self.storage.open_read(&self.file_path) {
            Ok(file) => file,
            Err(_) => {
                log::info!("[SCT] Cache file not found: {}", self.file_path);
                return Err(CacheMiss::NotFound.into());
            }
        };

        let header = SectionHeader::read(&mut BufReader::new(file));
        let miss = match header {
            Ok(header) => match header.check(options) {
                Ok(()) => {
                    self.page_count = header.page_count;
                    log::info!(
                        "[SCT] Cache hit for section {}: {} pages",
                        self.spine_index,
                        header.page_count
                    );
                    return Ok(header.page_count);
                }
                Err(miss) => {
                    log::info!(
                        "[SCT] Cache for section {} is stale ({}): file {:?}, requested {:?}",
                        self.spine_index,
                        miss,
                        header.options,
                        options
                    );
                    PagerError::CacheMiss(miss)
                }
            },
            Err(err) => {
                log::warn!("[SCT] Unreadable cache header in {}: {}", self.file_path, err);
                err
            }
        };

        self.clear_cache()?;
        Err(miss)
    }

    /// Delete the cache file if it exists
    pub fn clear_cache(&self) -> Result<(), PagerError> {
        if !self.storage.exists(&self.file_path) {
            log::debug!("[SCT] Cache does not exist, no action needed");
            return Ok(());
        }
        self.storage.remove(&self.file_path).map_err(|err| {
            log::warn!("[SCT] Failed to clear cache {}: {}", self.file_path, err);
            PagerError::from(err)
        })?;
        log::info!("[SCT] Cache cleared: {}", self.file_path);
        Ok(())
    }

    /// Build the cache file from `source`.
    ///
    /// The chapter is first copied to a scratch file, then parsed in
    /// `limits.read_chunk` sized reads while pages are written out as they
    /// complete. On any error the scratch file and the partial cache file
    /// are both removed.
    pub fn create_section_file<C, M, P>(
        &mut self,
        source: &mut C,
        metrics: &M,
        options: &SectionOptions,
        limits: &StreamLimits,
        progress: &mut P,
    ) -> Result<SectionStats, PagerError>
    where
        C: ChapterSource + ?Sized,
        M: FontMetrics + ?Sized,
        P: BuildProgress + ?Sized,
    {
        self.page_count = 0;
        self.storage
            .mkdir(&join_path(&self.cache_dir, "sections"))?;

        let temp = self.temp_path();
        let result = self
            .stream_source(source, &temp, limits)
            .and_then(|source_len| {
                self.write_pages(&temp, source_len, metrics, options, limits, progress)
            });

        if self.storage.exists(&temp) {
            if let Err(err) = self.storage.remove(&temp) {
                log::warn!("[SCT] Failed to remove {}: {}", temp, err);
            }
        }

        match result {
            Ok(stats) => Ok(stats),
            Err(err) => {
                log::warn!("[SCT] Build of section {} failed: {}", self.spine_index, err);
                self.page_count = 0;
                if let Err(cleanup) = self.clear_cache() {
                    log::warn!("[SCT] Partial cache left behind: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    /// Rebuild only when the existing cache does not match `options`.
    pub fn ensure_section_file<C, M, P>(
        &mut self,
        source: &mut C,
        metrics: &M,
        options: &SectionOptions,
        limits: &StreamLimits,
        progress: &mut P,
    ) -> Result<u16, PagerError>
    where
        C: ChapterSource + ?Sized,
        M: FontMetrics + ?Sized,
        P: BuildProgress + ?Sized,
    {
        match self.load_section_file(options) {
            Ok(count) => Ok(count),
            Err(err) if err.is_cache_miss() => {
                let stats = self.create_section_file(source, metrics, options, limits, progress)?;
                Ok(stats.pages)
            }
            Err(err) => Err(err),
        }
    }

    fn stream_source<C: ChapterSource + ?Sized>(
        &self,
        source: &mut C,
        temp: &str,
        limits: &StreamLimits,
    ) -> Result<u64, PagerError> {
        let attempts = limits.source_attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                log::warn!("[SCT] Retrying stream (attempt {})", attempt + 1);
                if limits.retry_backoff_ms > 0 {
                    std::thread::sleep(Duration::from_millis(limits.retry_backoff_ms));
                }
            }

            if self.storage.exists(temp) {
                if let Err(err) = self.storage.remove(temp) {
                    log::warn!("[SCT] Could not remove stale {}: {}", temp, err);
                }
            }

            let file = match self.storage.open_write(temp) {
                Ok(file) => file,
                Err(err) => {
                    log::warn!("[SCT] Could not open {}: {}", temp, err);
                    continue;
                }
            };
            let mut writer = CountingWriter::new(BufWriter::with_capacity(limits.read_chunk, file));
            let streamed = source
                .stream_chapter(self.spine_index, &mut writer)
                .and_then(|()| writer.flush().map_err(PagerError::from));
            let written = writer.written;
            drop(writer);

            match streamed {
                Ok(()) => {
                    log::debug!("[SCT] Streamed {} bytes to {}", written, temp);
                    return Ok(written);
                }
                Err(err) => {
                    log::warn!("[SCT] Stream attempt {} failed: {}", attempt + 1, err);
                    if self.storage.exists(temp) {
                        if let Err(err) = self.storage.remove(temp) {
                            log::warn!("[SCT] Could not remove partial {}: {}", temp, err);
                        }
                    }
                }
            }
        }

        Err(PagerError::SourceUnavailable {
            spine_index: self.spine_index,
            attempts,
        })
    }

    fn write_pages<M, P>(
        &mut self,
        temp: &str,
        source_len: u64,
        metrics: &M,
        options: &SectionOptions,
        limits: &StreamLimits,
        progress: &mut P,
    ) -> Result<SectionStats, PagerError>
    where
        M: FontMetrics + ?Sized,
        P: BuildProgress + ?Sized,
    {
        let input = BufReader::with_capacity(limits.read_chunk, self.storage.open_read(temp)?);
        let mut out = BufWriter::new(self.storage.open_write(&self.file_path)?);
        SectionHeader::new(*options).write(&mut out)?;

        let mut position = HEADER_SIZE;
        let mut lut: Vec<u32> = Vec::new();
        let parser = ChapterParser::new(metrics, *options, limits);
        let mut stats = parser.parse(input, source_len, limits, progress, |page| {
            let offset = u32::try_from(position)
                .map_err(|_| PagerError::InvalidPageOffset { page: lut.len() })?;
            let mut counter = CountingWriter::new(&mut out);
            page.serialize(&mut counter)?;
            position += counter.written;
            log::debug!("[SCT] Page {} written at {}", lut.len(), offset);
            lut.push(offset);
            Ok(())
        })?;

        let page_count = u16::try_from(lut.len())
            .map_err(|_| PagerError::Format(format!("{} pages in one section", lut.len())))?;
        let lut_offset = u32::try_from(position)
            .map_err(|_| PagerError::InvalidPageOffset { page: lut.len() })?;
        for &offset in &lut {
            write_u32(&mut out, offset)?;
        }

        let mut file = out
            .into_inner()
            .map_err(|err| PagerError::Io(err.error().to_string()))?;
        file.seek(SeekFrom::Start(PAGE_COUNT_FIELD))?;
        write_u16(&mut file, page_count)?;
        write_u32(&mut file, lut_offset)?;
        file.flush()?;

        self.page_count = page_count;
        stats.pages = page_count;
        log::info!(
            "[SCT] Built section {}: {} pages, {} bytes of markup",
            self.spine_index,
            page_count,
            stats.bytes_read
        );
        Ok(stats)
    }

    /// Load one page through the lookup table.
    ///
    /// Needs a prior successful load or build to know the page count.
    pub fn load_page(&self, index: u16) -> Result<Page, PagerError> {
        if index >= self.page_count {
            return Err(PagerError::PageOutOfBounds {
                index,
                page_count: self.page_count,
            });
        }

        let mut file = self
            .storage
            .open_read(&self.file_path)
            .map_err(|_| PagerError::from(CacheMiss::NotFound))?;
        file.seek(SeekFrom::Start(LUT_OFFSET_FIELD))?;
        let lut_offset = read_u32(&mut file)?;
        file.seek(SeekFrom::Start(lut_offset as u64 + 4 * index as u64))?;
        let offset = read_u32(&mut file)?;
        if (offset as u64) < HEADER_SIZE || offset >= lut_offset {
            return Err(PagerError::InvalidPageOffset {
                page: index as usize,
            });
        }
        file.seek(SeekFrom::Start(offset as u64))?;
        Page::deserialize(&mut BufReader::new(file))
    }
}
