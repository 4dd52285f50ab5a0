//! Error types for the nutrivisual library.
//!
//! A single fatal error type, [`AnalysisError`], covers everything that stops
//! one analysis request: unreadable input, unsupported formats, documents with
//! nothing to look at, a failing VLM, or missing configuration.
//!
//! An analysis that *succeeds* but finds nothing to chart is not an error.
//! That outcome is reported as [`crate::output::Notice::EmptyComposition`] on
//! the returned [`crate::output::AnalysisResult`], because free-text model
//! output that does not follow the requested format is the expected case,
//! not the exceptional one.
//!
//! Every `Display` message is a short sentence meant to be shown to the user
//! as-is. None of these errors terminate the process; the caller can simply
//! resubmit.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the nutrivisual library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file extension is not one of pdf, doc, docx, jpg, jpeg, png.
    #[error(
        "Unsupported file format: '{extension}'. \
Please upload a PDF, DOC, DOCX, JPG, JPEG, or PNG file."
    )]
    UnsupportedFormat { extension: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The file has a supported extension but its bytes could not be decoded.
    #[error("Could not read {kind} document: {detail}")]
    DocumentDecode { kind: String, detail: String },

    /// The document yielded neither a page image nor any text to analyse.
    #[error(
        "No preview available for '{file_name}': the document contains no \
image and no readable text to analyse."
    )]
    NoPreviewAvailable { file_name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF pages are rasterised with pdfium. Either:\n\
  • Install libpdfium where the system loader can find it, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// The VLM call failed (network, quota, auth, timeout) on every attempt.
    #[error("Analysis request failed after {attempts} attempt(s): {cause}")]
    GenerationFailure { attempts: u32, cause: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Required configuration is missing or invalid (e.g. no API key).
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The pie chart could not be written to disk.
    #[error("Failed to write chart to '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
