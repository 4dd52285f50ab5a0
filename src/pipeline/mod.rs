//! Pipeline stages for diet-composition analysis.
//!
//! Each submodule implements exactly one transformation step so each can be
//! tested on its own and swapped behind the [`load::DocumentLoader`] and
//! [`generate::TextGenerator`] seams.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ load ──▶ encode ──▶ generate ──▶ postprocess ──▶ composition::extract
//! (path/URL) (pdf/docx/img) (base64)  (VLM)      (cleanup)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into memory
//! 2. [`load`]    — detect the file kind and decode it into page images;
//!    PDFs go through [`render`], word-processor files through [`office`]
//! 3. [`encode`]  — PNG-encode and base64-wrap the selected page
//! 4. [`generate`] — call the VLM with timeout and retry/backoff; the only
//!    stage with network I/O besides URL download
//! 5. [`postprocess`] — deterministic cleanup of model quirks before parsing

pub mod encode;
pub mod generate;
pub mod input;
pub mod load;
pub mod office;
pub mod postprocess;
pub mod render;
