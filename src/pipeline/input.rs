//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! URL inputs are downloaded into a `TempDir` that lives as long as the
//! returned [`ResolvedInput`], so the copy disappears once the run is over
//! whether it succeeded or not. The zip signature (`PK\x03\x04`) is checked
//! up front so a mistyped path to a `.ppt` or `.pdf` fails with a clear
//! message before a vision model is ever built.

use crate::error::AltTextError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// The resolved input: either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the package was downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the presentation regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Whether the file only exists for the duration of this run.
    pub fn is_downloaded(&self) -> bool {
        matches!(self, ResolvedInput::Downloaded { .. })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local presentation path.
///
/// URLs are downloaded with `timeout_secs`; local paths are checked for
/// existence, read permission and the zip signature.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, AltTextError> {
    if input.trim().is_empty() {
        return Err(AltTextError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, AltTextError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(AltTextError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(AltTextError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut head = [0u8; 4];
            let n = f.read(&mut head).unwrap_or(0);
            if let Some(magic) = foreign_magic(&head[..n]) {
                return Err(AltTextError::NotAPptx { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AltTextError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AltTextError::FileNotFound { path });
        }
    }

    debug!("Resolved local presentation: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, AltTextError> {
    let failed = |e: reqwest::Error| {
        if e.is_timeout() {
            AltTextError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AltTextError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    info!(url, "Fetching remote deck");
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(failed)?;
    let body = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(failed)?
        .bytes()
        .await
        .map_err(failed)?;

    // Share links often answer with an HTML login page; catch it before it
    // reaches the package reader.
    if let Some(magic) = foreign_magic(&body) {
        return Err(AltTextError::NotAPptx {
            path: PathBuf::from(url),
            magic,
        });
    }

    let dir = TempDir::new().map_err(|e| AltTextError::Internal(format!("cannot create staging dir: {e}")))?;
    let path = dir.path().join(filename_from_url(url));
    tokio::fs::write(&path, &body).await.map_err(|e| {
        AltTextError::Internal(format!("cannot stage downloaded deck at {}: {e}", path.display()))
    })?;

    debug!(bytes = body.len(), path = %path.display(), "Remote deck staged");
    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: dir,
    })
}

/// The first four bytes, when they are not a zip local-file signature.
fn foreign_magic(bytes: &[u8]) -> Option<[u8; 4]> {
    if bytes.starts_with(ZIP_MAGIC) {
        return None;
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Some(magic)
}

/// Last path segment of the URL when it looks like a file name, otherwise
/// `downloaded.pptx`.
pub(crate) fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pptx".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/deck.pptx"));
        assert!(is_url("http://example.com/deck.pptx"));
        assert!(!is_url("/tmp/deck.pptx"));
        assert!(!is_url("deck.pptx"));
        assert!(!is_url(""));
    }

    #[test]
    fn foreign_magic_pads_short_payloads() {
        assert_eq!(foreign_magic(b"PK\x03\x04rest"), None);
        assert_eq!(foreign_magic(b"<!DOCTYPE html>"), Some(*b"<!DO"));
        assert_eq!(foreign_magic(b"PK"), Some(*b"PK\0\0"));
        assert_eq!(foreign_magic(b""), Some([0; 4]));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            filename_from_url("https://example.com/files/q3-review.pptx?dl=1"),
            "q3-review.pptx"
        );
        assert_eq!(filename_from_url("https://example.com/download"), "downloaded.pptx");
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pptx");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/no/such/deck.pptx", 5).await.unwrap_err();
        assert!(matches!(err, AltTextError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, AltTextError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_zip_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, b"%PDF-1.7 not a deck").unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, AltTextError::NotAPptx { magic, .. } if &magic == b"%PDF"));
    }

    #[tokio::test]
    async fn zip_file_resolves_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, b"PK\x03\x04rest-of-archive").unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert!(!resolved.is_downloaded());
        assert_eq!(resolved.path(), path);
    }
}
