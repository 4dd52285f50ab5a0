//! Image encoding: a visual [`PageImage`] → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 payloads embedded in the JSON request
//! body. PNG keeps printed portions and percentages crisp; JPEG artefacts on
//! small table text noticeably hurt recognition.

use crate::error::AnalysisError;
use crate::pipeline::load::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page for the VLM.
///
/// Returns `Ok(None)` for non-visual pages, which must never be sent as an
/// image. Images whose longest edge exceeds `max_pixels` (typically photos
/// or DOCX pictures, which skip the PDF render cap) are downscaled first,
/// preserving aspect ratio.
pub fn encode_page(page: &PageImage, max_pixels: u32) -> Result<Option<ImageData>, AnalysisError> {
    let Some(img) = page.image() else {
        return Ok(None);
    };

    let longest = img.width().max(img.height());
    let cap = max_pixels.max(1);
    let scaled;
    let img: &DynamicImage = if longest > cap {
        scaled = img.resize(cap, cap, FilterType::Triangle);
        debug!(
            "Downscaled page {} from {}x{} to {}x{}",
            page.index + 1,
            page.width,
            page.height,
            scaled.width(),
            scaled.height()
        );
        &scaled
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| AnalysisError::Internal(format!("PNG encoding failed: {e}")))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page.index + 1, b64.len());

    Ok(Some(ImageData::new(b64, "image/png").with_detail("high")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page(w: u32, h: u32) -> PageImage {
        PageImage::raster(
            0,
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255]))),
        )
    }

    #[test]
    fn encode_small_image() {
        let data = encode_page(&page(10, 10), 2000).unwrap().expect("visual page");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&decoded).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn oversized_image_is_downscaled_keeping_aspect() {
        let data = encode_page(&page(400, 100), 200).unwrap().unwrap();
        let back = image::load_from_memory(&STANDARD.decode(&data.data).unwrap()).unwrap();
        assert_eq!((back.width(), back.height()), (200, 50));
    }

    #[test]
    fn non_visual_page_is_not_encoded() {
        let page = PageImage::non_visual("Oats - 20%");
        assert!(encode_page(&page, 2000).unwrap().is_none());
    }
}
