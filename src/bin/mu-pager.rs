use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use mu_pager::{
    Alignment, ChapterSource, FontStyle, FsStorage, MonoMetrics, Page, PageElement, PagerError,
    Section, SectionHeader, SectionOptions, SectionStats, StreamLimits,
};

enum Json {
    Bool(bool),
    Num(usize),
    Int(i64),
    Float(f64),
    Str(String),
    Arr(Vec<Json>),
    Obj(Vec<(String, Json)>),
}

impl Json {
    fn render(&self, pretty: bool) -> String {
        let mut out = String::new();
        self.write_into(&mut out, pretty, 0);
        out
    }

    fn write_into(&self, out: &mut String, pretty: bool, depth: usize) {
        match self {
            Json::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
            Json::Num(v) => out.push_str(&v.to_string()),
            Json::Int(v) => out.push_str(&v.to_string()),
            Json::Float(v) if v.is_finite() => out.push_str(&v.to_string()),
            Json::Float(_) => out.push_str("null"),
            Json::Str(v) => write_json_string(out, v),
            Json::Arr(items) => {
                out.push('[');
                if !items.is_empty() && pretty {
                    out.push('\n');
                }
                for (idx, item) in items.iter().enumerate() {
                    if pretty {
                        write_indent(out, depth + 1);
                    }
                    item.write_into(out, pretty, depth + 1);
                    if idx + 1 != items.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if !items.is_empty() && pretty {
                    write_indent(out, depth);
                }
                out.push(']');
            }
            Json::Obj(fields) => {
                out.push('{');
                if !fields.is_empty() && pretty {
                    out.push('\n');
                }
                for (idx, (key, value)) in fields.iter().enumerate() {
                    if pretty {
                        write_indent(out, depth + 1);
                    }
                    write_json_string(out, key);
                    out.push(':');
                    if pretty {
                        out.push(' ');
                    }
                    value.write_into(out, pretty, depth + 1);
                    if idx + 1 != fields.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if !fields.is_empty() && pretty {
                    write_indent(out, depth);
                }
                out.push('}');
            }
        }
    }
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c <= '\u{1f}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Chapter markup read from a file on disk, whatever spine index is asked for.
struct FileChapter {
    path: PathBuf,
}

impl ChapterSource for FileChapter {
    fn stream_chapter(&mut self, _spine_index: usize, out: &mut dyn Write) -> Result<(), PagerError> {
        let mut file = File::open(&self.path)?;
        io::copy(&mut file, out)?;
        Ok(())
    }
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let mut rest = args.into_iter().skip(1).collect::<Vec<_>>();
    let pretty = pop_flag(&mut rest, "--pretty");

    if rest.is_empty() || rest[0] == "--help" || rest[0] == "-h" {
        print_help();
        return Ok(());
    }

    let cmd = rest.remove(0);
    match cmd.as_str() {
        "build" => {
            let mut args = rest;
            let force = pop_flag(&mut args, "--force");
            let quiet = pop_flag(&mut args, "--quiet");
            let spine = pop_value::<usize>(&mut args, "--spine")?.unwrap_or(0);
            let options = parse_options(&mut args)?;
            let chapter = first_arg(&args, "build requires <chapter_path> <cache_dir>")?;
            let cache_dir = args
                .get(1)
                .cloned()
                .ok_or_else(|| "build requires <chapter_path> <cache_dir>".to_string())?;

            let storage = FsStorage::new(&cache_dir);
            let mut section = Section::new(&storage, "", spine);
            let mut source = FileChapter {
                path: PathBuf::from(&chapter),
            };
            let metrics = MonoMetrics::default();
            let limits = StreamLimits::desktop();
            let mut progress = |percent: u8| {
                if !quiet {
                    eprintln!("building: {}%", percent);
                }
            };

            let cached = !force && section.load_section_file(&options).is_ok();
            let stats = if cached {
                None
            } else {
                Some(
                    section
                        .create_section_file(
                            &mut source,
                            &metrics,
                            &options,
                            &limits,
                            &mut progress,
                        )
                        .map_err(display_err)?,
                )
            };

            let mut fields = vec![
                ("chapter".to_string(), Json::Str(chapter)),
                (
                    "cache_file".to_string(),
                    Json::Str(
                        storage
                            .root()
                            .join(section.file_path())
                            .display()
                            .to_string(),
                    ),
                ),
                ("cached".to_string(), Json::Bool(cached)),
                (
                    "page_count".to_string(),
                    Json::Num(section.page_count() as usize),
                ),
            ];
            if let Some(stats) = stats {
                fields.push(("stats".to_string(), stats_json(&stats)));
            }
            println!("{}", Json::Obj(fields).render(pretty));
        }
        "info" => {
            let mut args = rest;
            let spine = pop_value::<usize>(&mut args, "--spine")?.unwrap_or(0);
            let cache_dir = first_arg(&args, "info requires <cache_dir>")?;
            let storage = FsStorage::new(&cache_dir);
            let section = Section::new(&storage, "", spine);
            let header = section.inspect_header().map_err(display_err)?;
            let output = Json::Obj(vec![
                ("cache_dir".to_string(), Json::Str(cache_dir)),
                ("spine".to_string(), Json::Num(spine)),
                ("current".to_string(), Json::Bool(header.check(&header.options).is_ok())),
                ("header".to_string(), header_json(&header)),
            ]);
            println!("{}", output.render(pretty));
        }
        "page" => {
            let mut args = rest;
            let spine = pop_value::<usize>(&mut args, "--spine")?.unwrap_or(0);
            let cache_dir = first_arg(&args, "page requires <cache_dir> <index>")?;
            let index = args
                .get(1)
                .ok_or_else(|| "page requires <cache_dir> <index>".to_string())?;
            let index = index
                .parse::<u16>()
                .map_err(|_| format!("invalid page index '{}'", index))?;

            let storage = FsStorage::new(&cache_dir);
            let mut section = Section::new(&storage, "", spine);
            let header = section.inspect_header().map_err(display_err)?;
            header
                .check(&header.options)
                .map_err(|miss| format!("cache needs a rebuild: {}", miss))?;
            section
                .load_section_file(&header.options)
                .map_err(display_err)?;
            let page = section.load_page(index).map_err(display_err)?;

            let output = Json::Obj(vec![
                ("spine".to_string(), Json::Num(spine)),
                ("index".to_string(), Json::Num(index as usize)),
                (
                    "page_count".to_string(),
                    Json::Num(section.page_count() as usize),
                ),
                ("page".to_string(), page_json(&page)),
            ]);
            println!("{}", output.render(pretty));
        }
        _ => {
            return Err(format!(
                "unknown command '{}'; run `mu-pager --help` for usage",
                cmd
            ));
        }
    }

    Ok(())
}

fn parse_options(args: &mut Vec<String>) -> Result<SectionOptions, String> {
    let mut options = SectionOptions::default();
    if let Some(font) = pop_value::<i32>(args, "--font")? {
        options = options.with_font_id(font);
    }
    if let Some(compression) = pop_value::<f32>(args, "--compression")? {
        options = options.with_line_compression(compression);
    }
    let width = pop_value::<u16>(args, "--width")?.unwrap_or(options.viewport_width);
    let height = pop_value::<u16>(args, "--height")?.unwrap_or(options.viewport_height);
    options = options.with_viewport(width, height);
    if let Some(align) = pop_value::<String>(args, "--align")? {
        let alignment = match align.as_str() {
            "justified" => Alignment::Justified,
            "left" => Alignment::Left,
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            other => return Err(format!("invalid --align value '{}'", other)),
        };
        options = options.with_paragraph_alignment(alignment);
    }
    options = options
        .with_extra_paragraph_spacing(pop_flag(args, "--spacing"))
        .with_standardize_formatting(pop_flag(args, "--standardize"));
    Ok(options)
}

fn first_arg(args: &[String], msg: &str) -> Result<String, String> {
    args.first().cloned().ok_or_else(|| msg.to_string())
}

fn pop_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn pop_value<T: std::str::FromStr>(args: &mut Vec<String>, flag: &str) -> Result<Option<T>, String> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| format!("invalid {} value '{}'", flag, value))
}

fn alignment_name(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Justified => "justified",
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
    }
}

fn style_name(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "regular",
        FontStyle::Bold => "bold",
        FontStyle::Italic => "italic",
        FontStyle::BoldItalic => "bold_italic",
    }
}

fn header_json(header: &SectionHeader) -> Json {
    let o = &header.options;
    Json::Obj(vec![
        ("version".to_string(), Json::Num(header.version as usize)),
        ("font_id".to_string(), Json::Int(o.font_id as i64)),
        (
            "line_compression".to_string(),
            Json::Float(o.line_compression as f64),
        ),
        (
            "extra_paragraph_spacing".to_string(),
            Json::Bool(o.extra_paragraph_spacing),
        ),
        (
            "paragraph_alignment".to_string(),
            Json::Str(alignment_name(o.paragraph_alignment).to_string()),
        ),
        (
            "viewport_width".to_string(),
            Json::Num(o.viewport_width as usize),
        ),
        (
            "viewport_height".to_string(),
            Json::Num(o.viewport_height as usize),
        ),
        (
            "standardize_formatting".to_string(),
            Json::Bool(o.standardize_formatting),
        ),
        (
            "page_count".to_string(),
            Json::Num(header.page_count as usize),
        ),
        (
            "lut_offset".to_string(),
            Json::Num(header.lut_offset as usize),
        ),
    ])
}

fn stats_json(stats: &SectionStats) -> Json {
    Json::Obj(vec![
        ("bytes_read".to_string(), Json::Num(stats.bytes_read as usize)),
        ("pages".to_string(), Json::Num(stats.pages as usize)),
        ("paragraphs".to_string(), Json::Num(stats.paragraphs)),
        (
            "paragraphs_discarded".to_string(),
            Json::Num(stats.paragraphs_discarded),
        ),
        ("flood_layouts".to_string(), Json::Num(stats.flood_layouts)),
        ("max_depth".to_string(), Json::Num(stats.max_depth)),
    ])
}

fn page_json(page: &Page) -> Json {
    let elements = page
        .elements()
        .iter()
        .map(|element| match element {
            PageElement::Line(placed) => {
                let words = placed
                    .line
                    .words()
                    .iter()
                    .zip(placed.line.x_positions())
                    .map(|(word, &x)| {
                        Json::Obj(vec![
                            ("text".to_string(), Json::Str(word.text.clone())),
                            ("x".to_string(), Json::Num(x as usize)),
                            (
                                "style".to_string(),
                                Json::Str(style_name(word.style).to_string()),
                            ),
                        ])
                    })
                    .collect();
                Json::Obj(vec![
                    ("type".to_string(), Json::Str("line".to_string())),
                    ("x".to_string(), Json::Int(placed.x as i64)),
                    ("y".to_string(), Json::Int(placed.y as i64)),
                    (
                        "alignment".to_string(),
                        Json::Str(alignment_name(placed.line.alignment()).to_string()),
                    ),
                    ("text".to_string(), Json::Str(placed.line.text())),
                    ("words".to_string(), Json::Arr(words)),
                ])
            }
            PageElement::DropCap(cap) => Json::Obj(vec![
                ("type".to_string(), Json::Str("drop_cap".to_string())),
                ("x".to_string(), Json::Int(cap.x as i64)),
                ("y".to_string(), Json::Int(cap.y as i64)),
                ("font_id".to_string(), Json::Int(cap.font_id as i64)),
                (
                    "style".to_string(),
                    Json::Str(style_name(cap.style).to_string()),
                ),
                ("text".to_string(), Json::Str(cap.text.clone())),
            ]),
        })
        .collect();
    Json::Obj(vec![
        ("element_count".to_string(), Json::Num(page.len())),
        ("elements".to_string(), Json::Arr(elements)),
    ])
}

fn display_err(err: PagerError) -> String {
    err.to_string()
}

fn print_help() {
    let help = r#"mu-pager - paginate EPUB chapters into section cache files

USAGE:
  mu-pager [--pretty] <command> [args...]

COMMANDS:
  build <chapter_path> <cache_dir> [--spine <n>] [--force] [--quiet]
        [--width <px>] [--height <px>] [--font <id>] [--compression <f>]
        [--align justified|left|center|right] [--spacing] [--standardize]
  info <cache_dir> [--spine <n>]
  page <cache_dir> <index> [--spine <n>]

NOTES:
  - Output is JSON by default.
  - Layout uses 10x20 monospace metrics.
  - `build` reuses a cache built with identical parameters unless --force.
"#;
    println!("{}", help);
}
