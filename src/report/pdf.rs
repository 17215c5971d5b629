//! PDF transfer report using genpdf
//!
//! Human-readable companion to the MHL: job summary, destinations and the
//! per-file digest table.

use std::path::Path;

use genpdf::{
    elements::{Break, LinearLayout, Paragraph, TableLayout, Text},
    fonts, style, Alignment, Document, Element,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::offload::format_bytes;
use crate::report::JobResult;

/// Generate the PDF report for a completed job
pub fn write_pdf(path: &Path, result: &JobResult, config: &Config) -> Result<()> {
    let font_family = load_fonts()?;

    let mut doc = Document::new(font_family);
    doc.set_title("Media Offload Report");
    doc.set_minimal_conformance();

    add_header(&mut doc, result, config);
    add_summary(&mut doc, result, config);
    if !result.files.is_empty() {
        add_file_table(&mut doc, result, config)?;
    }
    add_footer(&mut doc, result);

    doc.render_to_file(path)
        .map_err(|e| Error::Report(e.to_string()))?;
    Ok(())
}

/// Families tried at each font location, most specific first
const FONT_FAMILIES: &[&str] = &["LiberationSans", "DejaVuSans", "Arial", "arial"];

/// Resolve a usable TrueType family. Lookup order: the `CARTAGE_FONTS_DIR`
/// environment variable, a `fonts/` directory next to the binary's working
/// directory, then the platform's font directories.
fn load_fonts() -> Result<fonts::FontFamily<fonts::FontData>> {
    let mut dirs: Vec<std::path::PathBuf> = Vec::new();
    if let Ok(dir) = std::env::var("CARTAGE_FONTS_DIR") {
        dirs.push(dir.into());
    }
    dirs.push("./fonts".into());
    if cfg!(target_os = "macos") {
        dirs.push("/Library/Fonts".into());
        dirs.push("/System/Library/Fonts/Supplemental".into());
    } else if cfg!(windows) {
        dirs.push("C:\\Windows\\Fonts".into());
    } else {
        dirs.push("/usr/share/fonts/truetype/liberation".into());
        dirs.push("/usr/share/fonts/truetype/dejavu".into());
    }

    for dir in &dirs {
        if !dir.is_dir() {
            continue;
        }
        for family in FONT_FAMILIES {
            if let Ok(font) = fonts::from_files(dir, family, None) {
                return Ok(font);
            }
        }
    }

    Err(Error::Report(format!(
        "no usable TrueType family in any of {:?}; set CARTAGE_FONTS_DIR or install \
         the Liberation/DejaVu font packages",
        dirs
    )))
}

fn add_header(doc: &mut Document, result: &JobResult, config: &Config) {
    doc.push(
        Paragraph::new("Media Offload Report")
            .aligned(Alignment::Center)
            .styled(style::Style::new().bold().with_font_size(18)),
    );

    let subtitle = if config.job_name.is_empty() {
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    } else {
        format!(
            "{} | {}",
            config.job_name,
            result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    };
    doc.push(
        Paragraph::new(subtitle)
            .aligned(Alignment::Center)
            .styled(style::Style::new().with_font_size(10)),
    );
    doc.push(Break::new(1.0));
}

fn add_summary(doc: &mut Document, result: &JobResult, config: &Config) {
    section_header(doc, "Transfer Summary");

    let mut layout = LinearLayout::vertical();
    layout.push(info_row("Status:", &result.status.to_uppercase()));
    layout.push(info_row("Source:", &result.source.display().to_string()));
    for dest in &result.destinations {
        layout.push(info_row("Destination:", &dest.display().to_string()));
    }
    layout.push(info_row("Files:", &result.total_files.to_string()));
    layout.push(info_row("Data:", &format_bytes(result.total_bytes)));
    layout.push(info_row("Duration:", &result.duration));
    layout.push(info_row("Speed:", &format!("{:.2} MB/s", result.speed_mbps)));
    if !config.camera.is_empty() {
        layout.push(info_row("Camera:", &config.camera));
    }
    if !config.reel.is_empty() {
        layout.push(info_row("Reel:", &config.reel));
    }
    if !result.error.is_empty() {
        layout.push(info_row("Error:", &result.error));
    }
    doc.push(layout);
    doc.push(Break::new(1.0));
}

fn add_file_table(doc: &mut Document, result: &JobResult, config: &Config) -> Result<()> {
    section_header(doc, "Verified Files");

    let algo = config.algorithm;
    let mut table = TableLayout::new(vec![4, 1, 3]);
    table.set_cell_decorator(genpdf::elements::FrameCellDecorator::new(true, true, false));

    table
        .row()
        .element(Text::new("File").styled(style::Style::new().bold()))
        .element(Text::new("Size").styled(style::Style::new().bold()))
        .element(Text::new(algo.name()).styled(style::Style::new().bold()))
        .push()
        .map_err(|e| Error::Report(e.to_string()))?;

    for file in &result.files {
        let digest = match file.hash.primary(algo) {
            "" => file.hash.to_string(),
            primary => primary.to_string(),
        };
        table
            .row()
            .element(Text::new(&file.rel_path).styled(style::Style::new().with_font_size(8)))
            .element(
                Text::new(format_bytes(file.size)).styled(style::Style::new().with_font_size(8)),
            )
            .element(Text::new(digest).styled(style::Style::new().with_font_size(8)))
            .push()
            .map_err(|e| Error::Report(e.to_string()))?;
    }

    doc.push(table);
    doc.push(Break::new(1.0));
    Ok(())
}

fn add_footer(doc: &mut Document, result: &JobResult) {
    doc.push(Break::new(1.0));
    let generated = format!(
        "Generated by cartage {} on {}",
        env!("CARGO_PKG_VERSION"),
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    doc.push(
        Paragraph::new(generated)
            .aligned(Alignment::Center)
            .styled(style::Style::new().with_font_size(8)),
    );
}

fn section_header(doc: &mut Document, title: &str) {
    doc.push(Paragraph::new(title).styled(style::Style::new().bold().with_font_size(14)));
    doc.push(Break::new(0.5));
}

fn info_row(label: &str, value: &str) -> Paragraph {
    Paragraph::new(format!("{} {}", label, value))
}
