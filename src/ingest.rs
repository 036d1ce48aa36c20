//! File ingestion.
//!
//! Turns a user-supplied file into plain text or a base64 payload ready to
//! be sent to the completion gateway. Deciding which formats can be
//! analyzed at all is the caller's job.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Errors raised while reading a file.
#[derive(Debug, thiserror::Error)]
pub enum FileReadError {
    #[error("Failed to read file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{}': content is not valid UTF-8 text", path.display())]
    NotText { path: PathBuf },
}

/// A file selected by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
}

impl SourceFile {
    /// Describe a file by path; the MIME type is guessed from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mime_type = mime_guess::from_path(&path).first_or_octet_stream().essence_str().to_string();
        Self { path, file_name, mime_type }
    }

    /// Lowercased extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path.extension().map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Read a file as UTF-8 text.
pub async fn read_as_text(path: &Path) -> Result<String, FileReadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| FileReadError::Io { path: path.to_path_buf(), source })?;

    String::from_utf8(bytes).map_err(|_| FileReadError::NotText { path: path.to_path_buf() })
}

/// Read a file as a raw base64 payload.
///
/// A file that already holds a data URI yields the payload after the comma.
pub async fn read_as_base64(path: &Path) -> Result<String, FileReadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| FileReadError::Io { path: path.to_path_buf(), source })?;

    if bytes.starts_with(b"data:") {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            return Ok(strip_data_uri_prefix(text.trim()).to_string());
        }
    }

    Ok(STANDARD.encode(bytes))
}

/// Drop a `data:<mime>;base64,` prefix if present.
pub fn strip_data_uri_prefix(payload: &str) -> &str {
    if payload.starts_with("data:") {
        payload.split_once(',').map_or("", |(_, data)| data)
    } else {
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_uri_prefix() {
        assert_eq!(strip_data_uri_prefix("data:image/png;base64,iVBORw0K"), "iVBORw0K");
        assert_eq!(strip_data_uri_prefix("iVBORw0K"), "iVBORw0K");
        assert_eq!(strip_data_uri_prefix("data:broken"), "");
    }

    #[test]
    fn test_source_file_mime_and_extension() {
        let file = SourceFile::new("/site/photos/Scaffold.JPG");
        assert_eq!(file.file_name, "Scaffold.JPG");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.extension().as_deref(), Some("jpg"));
    }

    #[tokio::test]
    async fn test_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regs.txt");
        std::fs::write(&path, "Workers must wear hard hats.").unwrap();

        assert_eq!(read_as_text(&path).await.unwrap(), "Workers must wear hard hats.");
    }

    #[tokio::test]
    async fn test_read_as_text_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = read_as_text(&path).await.unwrap_err();
        assert!(matches!(err, FileReadError::NotText { .. }));
    }

    #[test]
    fn test_missing_file_is_surfaced() {
        let err = tokio_test::block_on(read_as_text(Path::new("/definitely/not/here.txt")))
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }

    #[tokio::test]
    async fn test_read_as_base64_encodes_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(read_as_base64(&path).await.unwrap(), "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_read_as_base64_strips_data_uri_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.b64");
        std::fs::write(&path, "data:image/webp;base64,UklGRg==\n").unwrap();

        assert_eq!(read_as_base64(&path).await.unwrap(), "UklGRg==");
    }
}
