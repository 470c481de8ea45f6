//! Streaming chapter parser.
//!
//! Drives quick-xml over a buffered reader and turns markup events into
//! paragraphs, then into pages. Only the open paragraph, one deferred
//! "Chapter" paragraph and the page being filled are held in memory.
//!
//! Tag handling is a fixed whitelist: block tags start paragraphs, header
//! tags start centered header paragraphs, `b`/`strong`/`i`/`em` toggle
//! emphasis, and images, tables, `head` and page-break markers are skipped
//! with everything inside them. All other tags are transparent.

use std::io::BufRead;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::assembly::PageAssembler;
use crate::error::PagerError;
use crate::metrics::FontMetrics;
use crate::page::Page;
use crate::paragraph::Paragraph;
use crate::streaming::{
    BuildProgress, ProgressTracker, SectionOptions, SectionStats, StreamLimits,
};
use crate::style::{Alignment, FontStyle};
use crate::word::WordBuffer;

const HEADER_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const BLOCK_TAGS: &[&str] = &["p", "li", "div", "br", "blockquote"];
const BOLD_TAGS: &[&str] = &["b", "strong"];
const ITALIC_TAGS: &[&str] = &["i", "em"];
const IMAGE_TAGS: &[&str] = &["img"];
const SKIP_TAGS: &[&str] = &["head", "table"];

/// Marker value for an until-depth region that is not open.
const INACTIVE: usize = usize::MAX;

fn matches_tag(name: &str, tags: &[&str]) -> bool {
    tags.contains(&name)
}

/// Chapter-to-pages state machine.
///
/// The `start_element`, `characters` and `end_element` callbacks can be
/// driven directly; [`ChapterParser::parse`] wires them to quick-xml.
pub struct ChapterParser<'m, M: FontMetrics + ?Sized> {
    metrics: &'m M,
    options: SectionOptions,
    flood_word_limit: usize,
    depth: usize,
    skip_until: usize,
    bold_until: usize,
    italic_until: usize,
    header_until: usize,
    word: WordBuffer,
    current: Paragraph,
    deferred: Option<Paragraph>,
    needs_drop_cap: bool,
    assembler: PageAssembler,
    stats: SectionStats,
}

impl<'m, M: FontMetrics + ?Sized> ChapterParser<'m, M> {
    /// Create a parser laying out with `metrics` and `options`
    pub fn new(metrics: &'m M, options: SectionOptions, limits: &StreamLimits) -> Self {
        Self {
            metrics,
            options,
            flood_word_limit: limits.flood_word_limit,
            depth: 0,
            skip_until: INACTIVE,
            bold_until: INACTIVE,
            italic_until: INACTIVE,
            header_until: INACTIVE,
            word: WordBuffer::new(),
            current: Paragraph::new(
                options.paragraph_alignment,
                options.extra_paragraph_spacing,
            ),
            deferred: None,
            needs_drop_cap: false,
            assembler: PageAssembler::new(&options),
            stats: SectionStats::default(),
        }
    }

    /// Current element nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Paragraph being filled
    pub fn current_paragraph(&self) -> &Paragraph {
        &self.current
    }

    /// Pages completed so far and not yet taken
    pub fn take_completed(&mut self) -> Vec<Page> {
        self.assembler.take_completed()
    }

    fn in_skip_region(&self) -> bool {
        self.skip_until < self.depth
    }

    fn current_style(&self) -> FontStyle {
        if self.options.standardize_formatting {
            return FontStyle::Regular;
        }
        FontStyle::from_flags(
            self.bold_until < self.depth,
            self.italic_until < self.depth,
        )
    }

    fn flush_word(&mut self) {
        if let Some(text) = self.word.take() {
            let style = self.current_style();
            self.current.add_word(text, style);
        }
    }

    /// Handle an opening tag. `page_break` marks page-break placeholders.
    pub fn start_element(&mut self, name: &str, page_break: bool) {
        if self.in_skip_region() {
            self.depth += 1;
            return;
        }

        let depth = self.depth;
        if page_break || matches_tag(name, IMAGE_TAGS) || matches_tag(name, SKIP_TAGS) {
            self.skip_until = depth;
        } else if matches_tag(name, HEADER_TAGS) {
            self.header_until = self.header_until.min(depth);
            self.start_paragraph(Alignment::Center, true);
            if !self.options.standardize_formatting {
                self.bold_until = self.bold_until.min(depth);
            }
        } else if matches_tag(name, BLOCK_TAGS) {
            let alignment = if name == "br" {
                self.current.alignment()
            } else {
                self.options.paragraph_alignment
            };
            self.start_paragraph(alignment, false);
        } else if matches_tag(name, BOLD_TAGS) {
            if !self.options.standardize_formatting {
                self.bold_until = self.bold_until.min(depth);
            }
        } else if matches_tag(name, ITALIC_TAGS) && !self.options.standardize_formatting {
            self.italic_until = self.italic_until.min(depth);
        }

        self.depth += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
    }

    /// Handle a run of character data
    pub fn characters(&mut self, text: &str) {
        if self.in_skip_region() {
            return;
        }

        let style = self.current_style();
        let in_header = self.header_until < self.depth;
        let current = &mut self.current;
        self.word
            .feed(text, in_header, |word| current.add_word(word, style));

        if self.current.len() > self.flood_word_limit {
            let metrics = self.metrics;
            let assembler = &mut self.assembler;
            self.current.layout(
                metrics,
                self.options.font_id,
                self.options.viewport_width as i32,
                false,
                |line, ctx| assembler.add_line(metrics, line, ctx),
            );
            self.stats.flood_layouts += 1;
        }
    }

    /// Handle a closing tag
    pub fn end_element(&mut self, name: &str) {
        let Some(open_depth) = self.depth.checked_sub(1) else {
            return;
        };
        if self.skip_until < open_depth {
            self.depth = open_depth;
            return;
        }
        if self.skip_until == open_depth {
            self.skip_until = INACTIVE;
            self.depth = open_depth;
            return;
        }

        let is_header = matches_tag(name, HEADER_TAGS);
        if is_header
            || open_depth == 0
            || matches_tag(name, BLOCK_TAGS)
            || matches_tag(name, BOLD_TAGS)
            || matches_tag(name, ITALIC_TAGS)
        {
            self.flush_word();
        }

        if is_header && self.header_until == open_depth {
            self.header_until = INACTIVE;
            if !self.current.is_empty() {
                self.current.set_header(true);
                self.current.set_alignment(Alignment::Center);
                self.current.embolden();
                self.needs_drop_cap = true;
            }
        }

        if name == "p" && !self.current.is_empty() {
            self.detect_chapter_title();
        }

        self.depth = open_depth;
        if self.bold_until == open_depth {
            self.bold_until = INACTIVE;
        }
        if self.italic_until == open_depth {
            self.italic_until = INACTIVE;
        }
    }

    fn detect_chapter_title(&mut self) {
        if flag_chapter_title(&mut self.current) {
            self.needs_drop_cap = true;
        }

        if self.current.is_bare_number() {
            if let Some(mut merged) = self.deferred.take() {
                let number = core::mem::replace(
                    &mut self.current,
                    Paragraph::new(
                        self.options.paragraph_alignment,
                        self.options.extra_paragraph_spacing,
                    ),
                );
                merged.merge_from(number);
                if flag_chapter_title(&mut merged) {
                    self.needs_drop_cap = true;
                }
                self.current = merged;
            }
        }

        if self.current.is_header() {
            self.current.set_alignment(Alignment::Center);
            self.current.embolden();
        }
    }

    fn start_paragraph(&mut self, alignment: Alignment, is_header: bool) {
        self.flush_word();

        if self.current.is_empty() {
            let had_claim = self.current.claimed_drop_cap();
            self.current.set_alignment(alignment);
            self.current.set_header(is_header);
            if had_claim && !self.current.claimed_drop_cap() {
                self.needs_drop_cap = true;
            }
        } else {
            let mut fresh = Paragraph::new(alignment, self.options.extra_paragraph_spacing);
            fresh.set_header(is_header);
            let finished = core::mem::replace(&mut self.current, fresh);

            if let Some(previous) = self.deferred.take() {
                self.finalize_deferred(previous);
            }
            if finished.is_bare_chapter() {
                // Held back: the next paragraph may be its number.
                self.needs_drop_cap |= finished.is_header();
                self.deferred = Some(finished);
            } else {
                self.finalize(finished);
            }
        }

        if self.needs_drop_cap && !self.current.claimed_drop_cap() && self.current.claim_drop_cap()
        {
            self.needs_drop_cap = false;
        }
    }

    fn finalize(&mut self, mut paragraph: Paragraph) {
        if paragraph.is_header() {
            self.needs_drop_cap = true;
        }
        if paragraph.is_effectively_empty() {
            if paragraph.claimed_drop_cap() {
                self.needs_drop_cap = true;
            }
            self.stats.paragraphs_discarded += 1;
            return;
        }

        let metrics = self.metrics;
        let assembler = &mut self.assembler;
        paragraph.layout(
            metrics,
            self.options.font_id,
            self.options.viewport_width as i32,
            true,
            |line, ctx| assembler.add_line(metrics, line, ctx),
        );
        assembler.finish_paragraph(metrics);
        self.stats.paragraphs += 1;

        if paragraph.claimed_drop_cap() && paragraph.drop_cap().is_none() {
            self.needs_drop_cap = true;
        }
    }

    /// Lay out a held-back chapter paragraph. Its drop-cap hand-off already
    /// happened when it was deferred.
    fn finalize_deferred(&mut self, paragraph: Paragraph) {
        let needs_drop_cap = self.needs_drop_cap;
        self.finalize(paragraph);
        self.needs_drop_cap = needs_drop_cap;
    }

    /// Flush everything still open and close the last page.
    pub fn finish(&mut self) {
        self.flush_word();
        if let Some(previous) = self.deferred.take() {
            self.finalize_deferred(previous);
        }
        let last = core::mem::replace(
            &mut self.current,
            Paragraph::new(
                self.options.paragraph_alignment,
                self.options.extra_paragraph_spacing,
            ),
        );
        self.finalize(last);
        self.assembler.finish();
    }

    /// Parse a whole chapter, handing each completed page to `on_page`.
    ///
    /// `total_bytes` is the input size, used only for progress reporting.
    pub fn parse<R, P, F>(
        mut self,
        input: R,
        total_bytes: u64,
        limits: &StreamLimits,
        progress: &mut P,
        mut on_page: F,
    ) -> Result<SectionStats, PagerError>
    where
        R: BufRead,
        P: BuildProgress + ?Sized,
        F: FnMut(Page) -> Result<(), PagerError>,
    {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(false);
        reader.config_mut().expand_empty_elements = true;

        let mut tracker = ProgressTracker::new(total_bytes, limits.progress_min_bytes);
        if tracker.is_enabled() {
            progress.on_start();
        }

        let mut buf = Vec::with_capacity(limits.read_chunk);
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = element_name(&reader, &e)?;
                    self.start_element(&name, is_page_break(&e));
                }
                Ok(Event::End(e)) => {
                    let local = e.local_name();
                    let name = reader
                        .decoder()
                        .decode(local.as_ref())
                        .map_err(|err| PagerError::Parse(format!("Decode error: {:?}", err)))?;
                    self.end_element(&name);
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .decode()
                        .map_err(|err| PagerError::Parse(format!("Decode error: {:?}", err)))?;
                    self.characters(&text);
                }
                Ok(Event::CData(e)) => {
                    let text = e
                        .decode()
                        .map_err(|err| PagerError::Parse(format!("Decode error: {:?}", err)))?;
                    self.characters(&text);
                }
                Ok(Event::GeneralRef(e)) => {
                    let entity = e
                        .decode()
                        .map_err(|err| PagerError::Parse(format!("Decode error: {:?}", err)))?;
                    match resolve_entity(&entity) {
                        Some(text) => self.characters(&text),
                        None => log::warn!("[CHP] Dropping unknown entity &{};", entity),
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(PagerError::Parse(format!(
                        "at byte {}: {}",
                        reader.error_position(),
                        err
                    )));
                }
            }
            buf.clear();

            for page in self.assembler.take_completed() {
                on_page(page)?;
            }
            if let Some(percent) = tracker.update(reader.buffer_position() as u64) {
                progress.on_progress(percent);
            }
        }

        self.finish();
        for page in self.assembler.take_completed() {
            on_page(page)?;
        }

        let mut stats = self.stats;
        stats.bytes_read = reader.buffer_position() as u64;
        log::debug!(
            "[CHP] Parsed {} bytes: {} paragraphs, {} discarded, {} early layouts",
            stats.bytes_read,
            stats.paragraphs,
            stats.paragraphs_discarded,
            stats.flood_layouts
        );
        Ok(stats)
    }
}

/// Apply the chapter-title heuristic; true when it cost the paragraph its
/// drop-cap claim.
fn flag_chapter_title(paragraph: &mut Paragraph) -> bool {
    let had_claim = paragraph.claimed_drop_cap();
    paragraph.set_header_if_chapter();
    had_claim && !paragraph.claimed_drop_cap()
}

fn element_name<R>(reader: &Reader<R>, e: &BytesStart) -> Result<String, PagerError> {
    reader
        .decoder()
        .decode(e.local_name().as_ref())
        .map(|s| s.into_owned())
        .map_err(|err| PagerError::Parse(format!("Decode error: {:?}", err)))
}

/// `role="doc-pagebreak"` or `epub:type="pagebreak"`
fn is_page_break(e: &BytesStart) -> bool {
    e.attributes().flatten().any(|attr| {
        let key = attr.key.as_ref();
        let value = attr.value.as_ref();
        (key == b"role" && value == b"doc-pagebreak")
            || (key == b"epub:type" && value == b"pagebreak")
    })
}

/// Resolve an entity reference body (without `&` and `;`).
fn resolve_entity(name: &str) -> Option<String> {
    if let Ok(resolved) = unescape(&format!("&{};", name)) {
        return Some(resolved.into_owned());
    }
    html_entity(name).map(String::from)
}

fn html_entity(name: &str) -> Option<char> {
    let ch = match name {
        "nbsp" => '\u{00A0}',
        "shy" => '\u{00AD}',
        "ensp" => '\u{2002}',
        "emsp" => '\u{2003}',
        "thinsp" => '\u{2009}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "sbquo" => '\u{201A}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "bdquo" => '\u{201E}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "middot" => '\u{00B7}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "deg" => '\u{00B0}',
        "sect" => '\u{00A7}',
        "para" => '\u{00B6}',
        "dagger" => '\u{2020}',
        "times" => '\u{00D7}',
        "iexcl" => '\u{00A1}',
        "iquest" => '\u{00BF}',
        "aacute" => 'á',
        "agrave" => 'à',
        "acirc" => 'â',
        "auml" => 'ä',
        "ccedil" => 'ç',
        "eacute" => 'é',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "euml" => 'ë',
        "iacute" => 'í',
        "igrave" => 'ì',
        "iuml" => 'ï',
        "ntilde" => 'ñ',
        "oacute" => 'ó',
        "ograve" => 'ò',
        "ouml" => 'ö',
        "szlig" => 'ß',
        "uacute" => 'ú',
        "ugrave" => 'ù',
        "uuml" => 'ü',
        "Eacute" => 'É',
        _ => return None,
    };
    Some(ch)
}
