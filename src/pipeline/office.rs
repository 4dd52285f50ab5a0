//! Word-processor documents: DOCX (zip + XML) and legacy binary DOC.
//!
//! Word files have no fixed page geometry, so there is nothing to rasterise.
//! The loader instead looks for a representative picture embedded in the
//! document (a photographed meal plan, a food diary scan). The largest
//! decodable raster under `word/media/` becomes the page image. When there
//! is none, the loader returns a single *non-visual* page carrying the body
//! text, and the orchestrator reports that no preview is available.
//!
//! Legacy `.doc` files are OLE compound documents; their text is recovered
//! best-effort by scanning for printable 8-bit and UTF-16LE runs. A `.doc`
//! that is really a zip container (a renamed DOCX) is handled as DOCX.

use crate::error::AnalysisError;
use crate::pipeline::load::{FileKind, PageImage};
use image::GenericImageView;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Embedded pictures smaller than this on either edge are treated as icons.
const MIN_PREVIEW_EDGE: u32 = 32;

/// Minimum run length kept when scraping text out of a binary `.doc`.
const MIN_TEXT_RUN: usize = 4;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

static RE_PARAGRAPH_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</w:p>|<w:br\s*/>").unwrap());

static RE_TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").unwrap());

static RE_TEXT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|\x00").unwrap());

/// Load a DOCX: its largest embedded picture (if any) plus its body text.
pub fn load_docx(bytes: &[u8]) -> Result<PageImage, AnalysisError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| decode_error(FileKind::Docx, e))?;

    let xml = read_entry_to_string(&mut archive, "word/document.xml")?;
    let text = document_text(&xml);
    debug!("DOCX body: {} chars of text", text.len());

    match largest_embedded_image(&mut archive) {
        Some(image) => {
            info!(
                "Using embedded DOCX picture as preview ({}x{})",
                image.width(),
                image.height()
            );
            Ok(PageImage::raster(0, image).with_text(text))
        }
        None => {
            warn!("DOCX has no usable embedded picture; falling back to text only");
            Ok(PageImage::non_visual(text))
        }
    }
}

/// Load a legacy `.doc`; always non-visual.
pub fn load_doc(bytes: &[u8]) -> Result<PageImage, AnalysisError> {
    if bytes.starts_with(ZIP_MAGIC) {
        debug!(".doc upload is a zip container; reading it as DOCX");
        return load_docx(bytes);
    }
    if bytes.is_empty() {
        return Err(AnalysisError::DocumentDecode {
            kind: FileKind::Doc.to_string(),
            detail: "the file is empty".to_string(),
        });
    }

    let text = scrape_binary_text(bytes);
    debug!("DOC text scrape recovered {} chars", text.len());
    Ok(PageImage::non_visual(text))
}

/// Flatten WordprocessingML into plain text, one paragraph per line.
pub fn document_text(xml: &str) -> String {
    let tabbed = RE_TAB.replace_all(xml, "<w:t> </w:t>");
    let marked = RE_PARAGRAPH_END.replace_all(&tabbed, "\x00");
    let mut out = String::new();
    for caps in RE_TEXT_RUN.captures_iter(&marked) {
        match caps.get(1) {
            Some(run) => out.push_str(&unescape_xml(run.as_str())),
            None => out.push('\n'),
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn read_entry_to_string(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, AnalysisError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| decode_error(FileKind::Docx, format!("{name}: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| decode_error(FileKind::Docx, format!("{name}: {e}")))?;
    Ok(xml)
}

/// Largest (by stored size) picture under `word/media/` that decodes and is
/// not icon-sized.
fn largest_embedded_image(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
) -> Option<image::DynamicImage> {
    let mut candidates: Vec<(u64, String)> = Vec::new();
    for i in 0..archive.len() {
        let Ok(entry) = archive.by_index(i) else {
            continue;
        };
        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("word/media/")
            && (lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg"))
        {
            candidates.push((entry.size(), name));
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    for (_, name) in candidates {
        let mut buf = Vec::new();
        let read = archive
            .by_name(&name)
            .map_err(|e| e.to_string())
            .and_then(|mut entry| entry.read_to_end(&mut buf).map_err(|e| e.to_string()));
        if let Err(e) = read {
            debug!("Skipping {}: {}", name, e);
            continue;
        }
        match image::load_from_memory(&buf) {
            Ok(img) if img.width() >= MIN_PREVIEW_EDGE && img.height() >= MIN_PREVIEW_EDGE => {
                return Some(img)
            }
            Ok(img) => debug!("Skipping {}: icon-sized ({:?})", name, img.dimensions()),
            Err(e) => debug!("Skipping {}: {}", name, e),
        }
    }
    None
}

/// Recover readable text from a binary document.
///
/// Both encodings Word uses for its text stream are scanned; the one that
/// yields more characters wins.
pub fn scrape_binary_text(bytes: &[u8]) -> String {
    let narrow = printable_runs(bytes.iter().map(|&b| b as u16));
    let wide = printable_runs(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
    );
    let count = |runs: &[String]| runs.iter().map(|r| r.len()).sum::<usize>();
    let best = if count(&wide) > count(&narrow) { wide } else { narrow };
    best.join("\n")
}

fn printable_runs(units: impl Iterator<Item = u16>) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for unit in units {
        let ch = char::from_u32(unit as u32)
            .filter(|c| unit < 0x80 && (c.is_ascii_graphic() || *c == ' '));
        match ch {
            Some(c) => current.push(c),
            None => {
                flush_run(&mut current, &mut runs);
            }
        }
    }
    flush_run(&mut current, &mut runs);
    runs
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    let trimmed = current.trim();
    if trimmed.len() >= MIN_TEXT_RUN {
        runs.push(trimmed.to_string());
    }
    current.clear();
}

fn decode_error(kind: FileKind, detail: impl ToString) -> AnalysisError {
    AnalysisError::DocumentDecode {
        kind: kind.to_string(),
        detail: detail.to_string(),
    }
}
