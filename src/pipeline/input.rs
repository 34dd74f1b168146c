//! Input resolution: turn a user-supplied path or URL into document bytes.
//!
//! Both extractors work from memory (pdfium via `load_pdf_from_byte_slice`,
//! PPTX via an in-memory ZIP), so a download never touches the disk.

use crate::error::StudyGuideError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Document bytes plus a human-readable name for error messages.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// File name (local) or last URL path segment (download).
    pub source_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, StudyGuideError> {
    if input.trim().is_empty() {
        return Err(StudyGuideError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<ResolvedInput, StudyGuideError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(StudyGuideError::PermissionDenied { path });
        }
        Err(_) => return Err(StudyGuideError::FileNotFound { path }),
    };

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput { source_name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, StudyGuideError> {
    info!("Downloading document from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| StudyGuideError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StudyGuideError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            StudyGuideError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            StudyGuideError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(StudyGuideError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?.to_vec();
    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput {
        source_name: filename_from_url(&parsed),
        bytes,
    })
}

/// Last non-empty path segment, or `"download"`.
fn filename_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map(|last| last.to_string())
        .unwrap_or_else(|| "download".to_string())
}
