use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use mu_pager::{
    ChapterParser, FsStorage, InMemoryChapters, MonoMetrics, NoProgress, Section, SectionOptions,
    StreamLimits,
};

#[derive(Clone, Copy)]
struct Fixture {
    key: &'static str,
    paragraphs: usize,
    headers_every: usize,
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        key: "short-story",
        paragraphs: 40,
        headers_every: 0,
    },
    Fixture {
        key: "chapter",
        paragraphs: 400,
        headers_every: 50,
    },
    Fixture {
        key: "long-chapter",
        paragraphs: 3000,
        headers_every: 200,
    },
];

const WARMUP_ITERS: usize = 2;
const MEASURE_ITERS: usize = 10;

struct TrackingAllocator;

static CURRENT_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL_ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn current_alloc_bytes() -> usize {
    CURRENT_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn peak_alloc_bytes() -> usize {
    PEAK_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn reset_peak_alloc_bytes() {
    PEAK_ALLOC_BYTES.store(current_alloc_bytes(), Ordering::Relaxed);
}

fn add_current_alloc_bytes(delta: usize) {
    let current = CURRENT_ALLOC_BYTES.fetch_add(delta, Ordering::Relaxed) + delta;
    PEAK_ALLOC_BYTES.fetch_max(current, Ordering::Relaxed);
}

fn sub_current_alloc_bytes(delta: usize) {
    let _ = CURRENT_ALLOC_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(delta))
    });
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        sub_current_alloc_bytes(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                add_current_alloc_bytes(new_size - layout.size());
            } else {
                sub_current_alloc_bytes(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: &'static str,
    case: &'static str,
    median: u128,
    p90: u128,
    max: u128,
    median_peak_heap_bytes: usize,
    max_peak_heap_bytes: usize,
}

fn chapter_markup(fixture: &Fixture) -> String {
    let mut html = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Bench</title></head><body>\n",
    );
    for i in 0..fixture.paragraphs {
        if fixture.headers_every > 0 && i % fixture.headers_every == 0 {
            html.push_str(&format!("<h2>Part {}</h2>\n", i / fixture.headers_every + 1));
        }
        html.push_str(&format!(
            "<p>It was the {}th evening, and the lamps along the <i>quay</i> burned low \
             while the <b>harbour master</b> counted ships &mdash; slowly, carefully, \
             as if the sea itself might object to a wrong number.</p>\n",
            i
        ));
    }
    html.push_str("</body></html>\n");
    html
}

fn options() -> SectionOptions {
    SectionOptions::default().with_viewport(464, 769)
}

fn percentile<T: Copy>(sorted: &[T], percentile: f64) -> T {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn run_case<F>(fixture: &'static str, case: &'static str, mut op: F) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..WARMUP_ITERS {
        black_box(op());
    }

    let mut samples = Vec::with_capacity(MEASURE_ITERS);
    let mut mem_samples = Vec::with_capacity(MEASURE_ITERS);
    for _ in 0..MEASURE_ITERS {
        let baseline_alloc = current_alloc_bytes();
        reset_peak_alloc_bytes();
        let start = Instant::now();
        black_box(op());
        samples.push(start.elapsed().as_nanos());
        mem_samples.push(peak_alloc_bytes().saturating_sub(baseline_alloc));
    }

    samples.sort_unstable();
    mem_samples.sort_unstable();
    CaseResult {
        fixture,
        case,
        median: percentile(&samples, 0.5),
        p90: percentile(&samples, 0.9),
        max: samples[samples.len() - 1],
        median_peak_heap_bytes: percentile(&mem_samples, 0.5),
        max_peak_heap_bytes: mem_samples[mem_samples.len() - 1],
    }
}

fn main() {
    println!("# mu-pager benchmark corpus");
    println!(
        "# warmup_iters={}, measure_iters={}",
        WARMUP_ITERS, MEASURE_ITERS
    );
    println!("fixture,case,median_ns,p90_ns,max_ns,median_peak_heap_bytes,max_peak_heap_bytes");

    let metrics = MonoMetrics::default();
    let limits = StreamLimits::desktop();
    let mut results = Vec::new();

    for fixture in FIXTURES {
        let markup = chapter_markup(fixture);
        let dir = tempfile::tempdir().expect("tempdir failed");
        let storage = FsStorage::new(dir.path());
        let mut chapters = InMemoryChapters::new();
        let spine = chapters.push(markup.as_str());

        results.push(run_case(fixture.key, "parse/in_memory", || {
            let mut pages = 0usize;
            ChapterParser::new(&metrics, options(), &limits)
                .parse(
                    markup.as_bytes(),
                    markup.len() as u64,
                    &limits,
                    &mut NoProgress,
                    |page| {
                        pages += 1;
                        black_box(page);
                        Ok(())
                    },
                )
                .expect("parse failed");
            pages
        }));

        results.push(run_case(fixture.key, "section/build", || {
            let mut section = Section::new(&storage, "bench", spine);
            let stats = section
                .create_section_file(&mut chapters, &metrics, &options(), &limits, &mut NoProgress)
                .expect("build failed");
            stats.pages as usize
        }));

        results.push(run_case(fixture.key, "section/load_header", || {
            let mut section = Section::new(&storage, "bench", spine);
            section.load_section_file(&options()).expect("cache miss") as usize
        }));

        results.push(run_case(fixture.key, "section/random_pages", || {
            let mut section = Section::new(&storage, "bench", spine);
            let count = section.load_section_file(&options()).expect("cache miss");
            // Stride through pages out of order, like a reader jumping around.
            let mut elements = 0usize;
            let mut index = 0u16;
            for _ in 0..count {
                index = (index + 7) % count;
                elements += section.load_page(index).expect("page load failed").len();
            }
            elements
        }));
    }

    for result in &results {
        println!(
            "{},{},{},{},{},{},{}",
            result.fixture,
            result.case,
            result.median,
            result.p90,
            result.max,
            result.median_peak_heap_bytes,
            result.max_peak_heap_bytes
        );
    }
}
