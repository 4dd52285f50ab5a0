//! Input resolution: turn a user-supplied path or URL into in-memory bytes.
//!
//! Every loader works on byte slices (pdfium included, via
//! `load_pdf_from_byte_slice`), so nothing is ever written to a temp file.
//! The file *name* is kept alongside the bytes because the upload's kind is
//! decided from its extension.

use crate::error::AnalysisError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where the bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Local(PathBuf),
    Url(String),
}

/// A fully read upload.
#[derive(Clone)]
pub struct ResolvedInput {
    /// Final path segment, used for file-kind detection and reporting.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub source: InputSource,
}

impl std::fmt::Debug for ResolvedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedInput")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory upload.
///
/// URLs are downloaded with `timeout_secs` as the whole-request timeout;
/// anything else is treated as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<ResolvedInput, AnalysisError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnalysisError::PermissionDenied { path });
        }
        Err(_) => return Err(AnalysisError::FileNotFound { path }),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local file {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        file_name,
        bytes,
        source: InputSource::Local(path),
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, AnalysisError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let file_name = file_name_from_url(url)
        .or_else(|| content_type.as_deref().and_then(file_name_from_content_type))
        .unwrap_or_else(|| "downloaded".to_string());

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} ({} bytes)", file_name, bytes.len());

    Ok(ResolvedInput {
        file_name,
        bytes: bytes.to_vec(),
        source: InputSource::Url(url.to_string()),
    })
}

/// Last path segment of a URL, when it looks like a file name.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}

/// Synthetic file name for a download whose URL carries none.
fn file_name_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        _ => return None,
    };
    Some(format!("downloaded.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/plan.pdf"));
        assert!(is_url("http://example.com/plan.pdf"));
        assert!(!is_url("/tmp/plan.pdf"));
        assert!(!is_url("plan.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/diets/week1.docx?dl=1").as_deref(),
            Some("week1.docx")
        );
        assert_eq!(file_name_from_url("https://example.com/download"), None);
        assert_eq!(file_name_from_url("https://example.com/"), None);
    }

    #[test]
    fn test_file_name_from_content_type() {
        assert_eq!(
            file_name_from_content_type("application/pdf; charset=binary").as_deref(),
            Some("downloaded.pdf")
        );
        assert_eq!(
            file_name_from_content_type("IMAGE/JPEG").as_deref(),
            Some("downloaded.jpg")
        );
        assert_eq!(file_name_from_content_type("text/html"), None);
    }

    #[tokio::test]
    async fn local_file_is_read_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"bytes")
            .unwrap();

        let input = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(input.file_name, "plan.png");
        assert_eq!(input.bytes, b"bytes");
        assert_eq!(input.source, InputSource::Local(path));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here/plan.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound { .. }));
    }
}
