//! Integration tests for building and reading section cache files.

use std::fs;
use std::io::Write;
use std::path::Path;

use mu_pager::{
    Alignment, CacheMiss, ChapterParser, ChapterSource, FsStorage, InMemoryChapters, MonoMetrics,
    NoProgress, Page, PagerError, Section, SectionHeader, SectionOptions, StreamLimits,
    HEADER_SIZE, SECTION_FILE_VERSION,
};

// =============================================================================
// Fixtures
// =============================================================================

fn chapter_markup(paragraphs: usize) -> String {
    let mut html = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Ch</title></head><body>\n\
         <h1>The Long Road</h1>\n",
    );
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p>Paragraph {} begins with <b>bold words</b> and <i>a little emphasis</i>, \
             then continues long enough to wrap across several lines of the narrow \
             viewport used by these tests &mdash; number {}.</p>\n",
            i, i
        ));
    }
    html.push_str("</body></html>\n");
    html
}

fn options() -> SectionOptions {
    SectionOptions::default()
        .with_viewport(300, 200)
        .with_paragraph_alignment(Alignment::Justified)
}

fn limits() -> StreamLimits {
    StreamLimits {
        retry_backoff_ms: 0,
        ..StreamLimits::default()
    }
}

fn build(
    root: &Path,
    markup: &str,
    options: &SectionOptions,
) -> Result<(FsStorage, u16), PagerError> {
    let storage = FsStorage::new(root);
    let mut chapters = InMemoryChapters::new();
    let spine = chapters.push(markup);
    let pages = {
        let mut section = Section::new(&storage, "book", spine);
        section
            .create_section_file(
                &mut chapters,
                &MonoMetrics::default(),
                options,
                &limits(),
                &mut NoProgress,
            )?
            .pages
    };
    Ok((storage, pages))
}

fn cache_file(root: &Path) -> std::path::PathBuf {
    root.join("book").join("sections").join("0.bin")
}

fn temp_file(root: &Path) -> std::path::PathBuf {
    root.join("book").join(".tmp_0.html")
}

fn sequential_pages(markup: &str, options: SectionOptions) -> Vec<Page> {
    let metrics = MonoMetrics::default();
    let limits = limits();
    let mut pages = Vec::new();
    ChapterParser::new(&metrics, options, &limits)
        .parse(
            markup.as_bytes(),
            markup.len() as u64,
            &limits,
            &mut NoProgress,
            |page| {
                pages.push(page);
                Ok(())
            },
        )
        .unwrap();
    pages
}

struct FlakySource {
    markup: Vec<u8>,
    failures_left: usize,
    calls: usize,
}

impl ChapterSource for FlakySource {
    fn stream_chapter(&mut self, _spine_index: usize, out: &mut dyn Write) -> Result<(), PagerError> {
        self.calls += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            out.write_all(&self.markup[..self.markup.len() / 2])?;
            return Err(PagerError::Io("card busy".into()));
        }
        out.write_all(&self.markup)?;
        Ok(())
    }
}

// =============================================================================
// Build and load
// =============================================================================

#[test]
fn test_build_then_load_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, pages) = build(dir.path(), &chapter_markup(12), &options()).unwrap();
    assert!(pages > 1);
    assert!(cache_file(dir.path()).exists());
    assert!(!temp_file(dir.path()).exists());

    let mut section = Section::new(&storage, "book", 0);
    assert_eq!(section.load_section_file(&options()), Ok(pages));
    assert_eq!(section.page_count(), pages);
}

#[test]
fn test_header_and_lut_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pages) = build(dir.path(), &chapter_markup(6), &options()).unwrap();
    let bytes = fs::read(cache_file(dir.path())).unwrap();

    assert_eq!(bytes[0], SECTION_FILE_VERSION);
    let page_count = u16::from_le_bytes([bytes[16], bytes[17]]);
    let lut_offset = u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
    assert_eq!(page_count, pages);
    assert_eq!(bytes.len(), lut_offset + 4 * pages as usize);

    let first = u32::from_le_bytes(bytes[lut_offset..lut_offset + 4].try_into().unwrap());
    assert_eq!(first as u64, HEADER_SIZE);
    let offsets: Vec<u32> = bytes[lut_offset..]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_rebuild_is_byte_identical() {
    let markup = chapter_markup(10);
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    build(a.path(), &markup, &options()).unwrap();
    build(b.path(), &markup, &options()).unwrap();
    assert_eq!(
        fs::read(cache_file(a.path())).unwrap(),
        fs::read(cache_file(b.path())).unwrap()
    );
}

#[test]
fn test_random_access_matches_sequential_build() {
    let dir = tempfile::tempdir().unwrap();
    let markup = chapter_markup(15);
    let (storage, pages) = build(dir.path(), &markup, &options()).unwrap();
    let expected = sequential_pages(&markup, options());
    assert_eq!(expected.len(), pages as usize);

    let mut section = Section::new(&storage, "book", 0);
    section.load_section_file(&options()).unwrap();
    for index in (0..pages).rev() {
        assert_eq!(section.load_page(index).unwrap(), expected[index as usize]);
    }
}

#[test]
fn test_page_index_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, pages) = build(dir.path(), &chapter_markup(2), &options()).unwrap();
    let mut section = Section::new(&storage, "book", 0);

    // Unknown page count until the header is loaded.
    assert!(matches!(
        section.load_page(0),
        Err(PagerError::PageOutOfBounds { page_count: 0, .. })
    ));

    section.load_section_file(&options()).unwrap();
    assert_eq!(
        section.load_page(pages),
        Err(PagerError::PageOutOfBounds {
            index: pages,
            page_count: pages
        })
    );
}

#[test]
fn test_empty_chapter_has_one_empty_page() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, pages) = build(
        dir.path(),
        "<html><head><title>x</title></head><body>  </body></html>",
        &options(),
    )
    .unwrap();
    assert_eq!(pages, 1);

    let mut section = Section::new(&storage, "book", 0);
    section.load_section_file(&options()).unwrap();
    assert!(section.load_page(0).unwrap().is_empty());
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn test_any_parameter_change_invalidates() {
    let base = options();
    let variants = [
        base.with_font_id(3),
        base.with_line_compression(0.95),
        base.with_extra_paragraph_spacing(true),
        base.with_paragraph_alignment(Alignment::Left),
        base.with_viewport(301, 200),
        base.with_viewport(300, 201),
        base.with_standardize_formatting(true),
    ];

    for variant in variants {
        let dir = tempfile::tempdir().unwrap();
        let (storage, _) = build(dir.path(), &chapter_markup(3), &base).unwrap();
        let mut section = Section::new(&storage, "book", 0);
        assert_eq!(
            section.load_section_file(&variant),
            Err(PagerError::CacheMiss(CacheMiss::ParametersMismatch)),
            "{:?}",
            variant
        );
        assert!(!cache_file(dir.path()).exists());
        assert_eq!(section.page_count(), 0);
    }
}

#[test]
fn test_missing_cache_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path());
    let mut section = Section::new(&storage, "book", 0);
    let err = section.load_section_file(&options()).unwrap_err();
    assert_eq!(err, PagerError::CacheMiss(CacheMiss::NotFound));
    assert!(err.is_cache_miss());
}

#[test]
fn test_legacy_version_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("book/sections")).unwrap();
    let mut header = SectionHeader::new(options());
    header.version = 9;
    let mut bytes = Vec::new();
    header.write(&mut bytes).unwrap();
    fs::write(cache_file(dir.path()), &bytes).unwrap();

    let storage = FsStorage::new(dir.path());
    let mut section = Section::new(&storage, "book", 0);
    let inspected = section.inspect_header().unwrap();
    assert_eq!(inspected.version, 9);
    assert!(!inspected.options.standardize_formatting);

    assert_eq!(
        section.load_section_file(&options()),
        Err(PagerError::CacheMiss(CacheMiss::VersionMismatch {
            found: 9,
            expected: SECTION_FILE_VERSION
        }))
    );
    assert!(!cache_file(dir.path()).exists());
}

#[test]
fn test_unknown_element_tag_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, _) = build(dir.path(), &chapter_markup(2), &options()).unwrap();
    let path = cache_file(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    // First page starts right after the header: u16 count, then a tag.
    bytes[HEADER_SIZE as usize + 2] = 9;
    fs::write(&path, &bytes).unwrap();

    let mut section = Section::new(&storage, "book", 0);
    section.load_section_file(&options()).unwrap();
    let err = section.load_page(0).unwrap_err();
    assert!(matches!(err, PagerError::Format(_)));
    assert!(err.is_cache_miss());
}

#[test]
fn test_ensure_rebuilds_only_on_miss() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path());
    let mut chapters = InMemoryChapters::new();
    chapters.push(chapter_markup(4));
    let metrics = MonoMetrics::default();
    let mut section = Section::new(&storage, "book", 0);

    let pages = section
        .ensure_section_file(&mut chapters, &metrics, &options(), &limits(), &mut NoProgress)
        .unwrap();
    let modified = fs::metadata(cache_file(dir.path())).unwrap().len();
    assert_eq!(
        section
            .ensure_section_file(&mut chapters, &metrics, &options(), &limits(), &mut NoProgress)
            .unwrap(),
        pages
    );
    assert_eq!(fs::metadata(cache_file(dir.path())).unwrap().len(), modified);

    let narrow = options().with_viewport(200, 200);
    let narrow_pages = section
        .ensure_section_file(&mut chapters, &metrics, &narrow, &limits(), &mut NoProgress)
        .unwrap();
    assert!(narrow_pages > pages);
    assert_eq!(section.inspect_header().unwrap().options, narrow);
}

// =============================================================================
// Failure cleanup and retries
// =============================================================================

#[test]
fn test_flaky_source_is_retried() {
    let markup = chapter_markup(5);
    let clean = tempfile::tempdir().unwrap();
    build(clean.path(), &markup, &options()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path());
    let mut source = FlakySource {
        markup: markup.into_bytes(),
        failures_left: 2,
        calls: 0,
    };
    let mut section = Section::new(&storage, "book", 0);
    section
        .create_section_file(
            &mut source,
            &MonoMetrics::default(),
            &options(),
            &limits(),
            &mut NoProgress,
        )
        .unwrap();

    assert_eq!(source.calls, 3);
    assert!(!temp_file(dir.path()).exists());
    assert_eq!(
        fs::read(cache_file(dir.path())).unwrap(),
        fs::read(cache_file(clean.path())).unwrap()
    );
}

#[test]
fn test_source_gives_up_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path());
    let mut source = FlakySource {
        markup: chapter_markup(1).into_bytes(),
        failures_left: usize::MAX,
        calls: 0,
    };
    let mut section = Section::new(&storage, "book", 0);
    let err = section
        .create_section_file(
            &mut source,
            &MonoMetrics::default(),
            &options(),
            &limits(),
            &mut NoProgress,
        )
        .unwrap_err();

    assert_eq!(
        err,
        PagerError::SourceUnavailable {
            spine_index: 0,
            attempts: 3
        }
    );
    assert_eq!(source.calls, 3);
    assert!(!temp_file(dir.path()).exists());
    assert!(!cache_file(dir.path()).exists());
}

#[test]
fn test_parse_failure_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let broken = format!("{}<p>unclosed</div>", chapter_markup(20).replace("</body></html>\n", ""));
    let err = build(dir.path(), &broken, &options()).unwrap_err();
    assert!(matches!(err, PagerError::Parse(_)));
    assert!(!cache_file(dir.path()).exists());
    assert!(!temp_file(dir.path()).exists());
}

#[test]
fn test_failed_rebuild_removes_previous_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, _) = build(dir.path(), &chapter_markup(3), &options()).unwrap();
    assert!(cache_file(dir.path()).exists());

    let mut chapters = InMemoryChapters::new();
    chapters.push("<html><body><p>bad</span></body></html>");
    let mut section = Section::new(&storage, "book", 0);
    assert!(section
        .create_section_file(
            &mut chapters,
            &MonoMetrics::default(),
            &options(),
            &limits(),
            &mut NoProgress,
        )
        .is_err());
    assert!(!cache_file(dir.path()).exists());
    assert_eq!(section.page_count(), 0);
}

// =============================================================================
// Progress
// =============================================================================

#[test]
fn test_progress_only_for_large_chapters() {
    let metrics = MonoMetrics::default();
    for (paragraphs, expect_progress) in [(3usize, false), (400usize, true)] {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let mut chapters = InMemoryChapters::new();
        let markup = chapter_markup(paragraphs);
        let large = markup.len() >= 50 * 1024;
        assert_eq!(large, expect_progress);
        chapters.push(markup);

        let mut reported = Vec::new();
        let mut progress = |percent: u8| reported.push(percent);
        let mut section = Section::new(&storage, "book", 0);
        section
            .create_section_file(&mut chapters, &metrics, &options(), &limits(), &mut progress)
            .unwrap();

        assert_eq!(!reported.is_empty(), expect_progress);
        if expect_progress {
            assert!(reported.iter().all(|p| *p <= 100));
            assert!(reported.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
