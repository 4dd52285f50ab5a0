//! PDF rasterisation: render leading pages to [`PageImage`]s via pdfium.
//!
//! Each page is rendered from its own geometry. A page of `w × h` points is
//! scaled by `dpi / 72`, and if the longest edge then exceeds
//! `max_rendered_pixels` both edges shrink by the same factor. Portrait,
//! landscape and odd-sized pages therefore keep their aspect ratio; no fixed
//! or square canvas is ever assumed.
//!
//! pdfium is not async-safe, so callers run this on a blocking thread
//! (the orchestrator uses `tokio::task::spawn_blocking`).

use crate::error::AnalysisError;
use crate::pipeline::load::{FileKind, LoadedDocument, PageImage};
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

/// Rasterise the first `max_pages` pages of an in-memory PDF, in document
/// order. Later pages are counted but never rendered.
pub fn render_pdf_pages(
    bytes: &[u8],
    dpi: u32,
    max_pixels: u32,
    max_pages: usize,
) -> Result<LoadedDocument, AnalysisError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                "the PDF is password-protected".to_string()
            } else {
                err_str
            };
            decode_error(detail)
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if total_pages == 0 {
        return Err(decode_error("the PDF has no pages".to_string()));
    }

    let to_render = pages_to_render(total_pages, max_pages);
    let mut results = Vec::with_capacity(to_render);

    for (idx, page) in pages.iter().enumerate().take(to_render) {
        let width_pts = page.width().value;
        let height_pts = page.height().value;
        let (width, height) = target_size(width_pts, height_pts, dpi, max_pixels).ok_or_else(
            || {
                decode_error(format!(
                    "page {} has invalid geometry ({} × {} pt)",
                    idx + 1,
                    width_pts,
                    height_pts
                ))
            },
        )?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| decode_error(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} ({:.0}×{:.0} pt) → {}x{} px",
            idx + 1,
            width_pts,
            height_pts,
            image.width(),
            image.height()
        );

        results.push(PageImage::raster(idx, image));
    }

    Ok(LoadedDocument {
        page_count: total_pages,
        pages: results,
    })
}

/// How many leading pages to rasterise; at least one.
pub fn pages_to_render(total_pages: usize, max_pages: usize) -> usize {
    total_pages.min(max_pages.max(1))
}

/// Pixel size for a page of the given point size.
///
/// Returns `None` for non-positive or non-finite geometry.
pub fn target_size(width_pts: f32, height_pts: f32, dpi: u32, max_pixels: u32) -> Option<(u32, u32)> {
    if !(width_pts.is_finite() && height_pts.is_finite()) || width_pts <= 0.0 || height_pts <= 0.0
    {
        return None;
    }

    let scale = dpi as f64 / 72.0;
    let mut width = width_pts as f64 * scale;
    let mut height = height_pts as f64 * scale;

    let longest = width.max(height);
    let cap = max_pixels.max(1) as f64;
    if longest > cap {
        let shrink = cap / longest;
        width *= shrink;
        height *= shrink;
    }

    Some((
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    ))
}

/// Bind to `PDFIUM_LIB_PATH` when set, otherwise to the system library.
fn bind_pdfium() -> Result<Pdfium, AnalysisError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_VAR) {
        Ok(path) if !path.trim().is_empty() => {
            debug!("Binding pdfium from {}", path);
            Pdfium::bind_to_library(path.trim().to_string())
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AnalysisError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn decode_error(detail: String) -> AnalysisError {
    AnalysisError::DocumentDecode {
        kind: FileKind::Pdf.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_portrait_keeps_aspect_ratio() {
        // A4 = 595 × 842 pt
        let (w, h) = target_size(595.0, 842.0, 72, 5000).unwrap();
        assert_eq!((w, h), (595, 842));
        let (w, h) = target_size(595.0, 842.0, 144, 5000).unwrap();
        assert_eq!((w, h), (1190, 1684));
    }

    #[test]
    fn landscape_page_is_capped_on_width() {
        let (w, h) = target_size(842.0, 595.0, 300, 2000).unwrap();
        assert_eq!(w, 2000);
        assert_eq!(h, (2000.0_f64 * 595.0 / 842.0).round() as u32);
        assert!(w > h);
    }

    #[test]
    fn pages_are_never_forced_square() {
        let (w, h) = target_size(300.0, 900.0, 150, 2000).unwrap();
        assert_ne!(w, h);
        assert_eq!(h, 1875);
        assert_eq!(w, 625);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        assert_eq!(target_size(0.0, 842.0, 150, 2000), None);
        assert_eq!(target_size(595.0, -1.0, 150, 2000), None);
        assert_eq!(target_size(f32::NAN, 842.0, 150, 2000), None);
    }

    #[test]
    fn only_leading_pages_are_rendered() {
        assert_eq!(pages_to_render(300, 1), 1);
        assert_eq!(pages_to_render(3, 10), 3);
        assert_eq!(pages_to_render(5, 0), 1);
    }

    #[test]
    fn tiny_pages_are_at_least_one_pixel() {
        assert_eq!(target_size(0.1, 0.1, 72, 2000), Some((1, 1)));
    }
}
