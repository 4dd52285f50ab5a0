//! Document loading: file-kind detection and the [`DocumentLoader`] seam.
//!
//! The orchestrator only sees [`PageImage`]s. How they were produced (pdfium
//! rasterisation, image decoding, or an embedded picture pulled out of a
//! DOCX) stays behind [`DocumentLoader`], so tests can substitute a fake and
//! alternative backends can be plugged in without touching the pipeline.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::{office, render};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Supported upload kinds, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    /// Office Open XML word-processor document.
    Docx,
    /// Legacy binary Word document.
    Doc,
    /// PNG or JPEG raster image.
    Image,
}

impl FileKind {
    /// Map a bare extension (case-insensitive, no dot) to a kind.
    pub fn from_extension(ext: &str) -> Option<FileKind> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "doc" => Some(FileKind::Doc),
            "jpg" | "jpeg" | "png" => Some(FileKind::Image),
            _ => None,
        }
    }

    /// Detect the kind of an uploaded file from its name.
    pub fn from_file_name(file_name: &str) -> Result<FileKind, AnalysisError> {
        let ext = Path::new(file_name.trim())
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        FileKind::from_extension(ext).ok_or_else(|| AnalysisError::UnsupportedFormat {
            extension: if ext.is_empty() {
                "(none)".to_string()
            } else {
                ext.to_ascii_lowercase()
            },
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Docx => "DOCX",
            FileKind::Doc => "DOC",
            FileKind::Image => "image",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded page of an uploaded document.
///
/// A page is *visual* when it carries a raster image. Word-processor files
/// without any embedded picture produce a single non-visual page holding the
/// extracted text instead; such a page must never be sent to the VLM as an
/// image.
#[derive(Clone)]
pub struct PageImage {
    /// 0-based position in the document.
    pub index: usize,
    /// Pixel width, taken from the decoded geometry (0 when non-visual).
    pub width: u32,
    /// Pixel height, taken from the decoded geometry (0 when non-visual).
    pub height: u32,
    image: Option<DynamicImage>,
    text: Option<String>,
}

impl PageImage {
    pub fn raster(index: usize, image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index,
            width,
            height,
            image: Some(image),
            text: None,
        }
    }

    /// Placeholder page for documents with no visual representation.
    pub fn non_visual(text: impl Into<String>) -> Self {
        Self {
            index: 0,
            width: 0,
            height: 0,
            image: None,
            text: Some(text.into()),
        }
    }

    /// Attach document text to a page (e.g. DOCX body next to its picture).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn is_visual(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// `true` when the page has neither an image nor any non-blank text.
    pub fn is_blank(&self) -> bool {
        self.image.is_none() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("visual", &self.is_visual())
            .field("text_len", &self.text.as_ref().map(|t| t.len()))
            .finish()
    }
}

/// The pages decoded from one upload.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Pages in the whole document, decoded or not.
    pub page_count: usize,
    /// The leading pages that were actually decoded, in document order.
    pub pages: Vec<PageImage>,
}

impl LoadedDocument {
    /// A document that is exactly one page.
    pub fn single(page: PageImage) -> Self {
        Self {
            page_count: 1,
            pages: vec![page],
        }
    }
}

/// Decodes uploaded bytes into an ordered sequence of pages.
///
/// Only the first `max_pages` pages are decoded; the rest are counted but
/// never rasterised. Called on a blocking thread, so implementations may do
/// CPU-heavy work.
pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        bytes: &[u8],
        kind: FileKind,
        max_pages: usize,
    ) -> Result<LoadedDocument, AnalysisError>;
}

/// The default loader: pdfium for PDFs, `image` for rasters, zip/XML for
/// word-processor files.
#[derive(Debug, Clone)]
pub struct StandardLoader {
    dpi: u32,
    max_rendered_pixels: u32,
}

impl StandardLoader {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }
}

impl DocumentLoader for StandardLoader {
    fn load(
        &self,
        bytes: &[u8],
        kind: FileKind,
        max_pages: usize,
    ) -> Result<LoadedDocument, AnalysisError> {
        debug!("Loading {} bytes as {} (up to {} page(s))", bytes.len(), kind, max_pages);
        match kind {
            FileKind::Pdf => {
                render::render_pdf_pages(bytes, self.dpi, self.max_rendered_pixels, max_pages)
            }
            FileKind::Image => decode_image(bytes).map(LoadedDocument::single),
            FileKind::Docx => office::load_docx(bytes).map(LoadedDocument::single),
            FileKind::Doc => office::load_doc(bytes).map(LoadedDocument::single),
        }
    }
}

/// Decode a PNG/JPEG upload; the image is the document's only page.
pub fn decode_image(bytes: &[u8]) -> Result<PageImage, AnalysisError> {
    let image = image::load_from_memory(bytes).map_err(|e| AnalysisError::DocumentDecode {
        kind: FileKind::Image.to_string(),
        detail: e.to_string(),
    })?;
    Ok(PageImage::raster(0, image))
}
