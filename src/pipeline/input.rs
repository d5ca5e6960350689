//! Input resolution: load the raw document text and remember where it lives.
//!
//! Inclusion directives are resolved relative to the document's directory, so
//! a [`SourceDocument`] always carries a base directory next to its text. For
//! standard input that is the process working directory.

use crate::error::BuildError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Raw input text plus the directory relative inclusion paths resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    text: String,
    base_dir: PathBuf,
    path: Option<PathBuf>,
}

impl SourceDocument {
    /// Wrap text that was obtained elsewhere.
    pub fn new(text: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            base_dir: base_dir.into(),
            path: None,
        }
    }

    /// Record the file the text was read from, so a document that includes
    /// itself is reported as a cycle.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Read a document from a local file.
///
/// Surrounding whitespace is trimmed. The base directory is the file's parent
/// directory, made absolute against the working directory.
pub async fn read_file(path: impl AsRef<Path>) -> Result<SourceDocument, BuildError> {
    let path = path.as_ref().to_path_buf();

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BuildError::FileNotFound { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BuildError::PermissionDenied { path });
        }
        Err(e) => return Err(BuildError::ReadFailed { path, source: e }),
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_dir = std::path::absolute(&parent).map_err(|e| BuildError::ReadFailed {
        path: parent.clone(),
        source: e,
    })?;

    debug!("Read {} bytes from {}", text.len(), path.display());
    let file = base_dir.join(path.file_name().unwrap_or_default());
    Ok(SourceDocument::new(text.trim(), base_dir).with_path(file))
}

/// Read a document from standard input, resolving includes against the
/// working directory.
pub async fn read_stdin() -> Result<SourceDocument, BuildError> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .map_err(|e| BuildError::ReadFailed {
            path: PathBuf::from("<stdin>"),
            source: e,
        })?;

    let base_dir = std::env::current_dir()
        .map_err(|e| BuildError::Internal(format!("Cannot determine working directory: {e}")))?;

    debug!("Read {} bytes from stdin", text.len());
    Ok(SourceDocument::new(text, base_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_file_trims_and_records_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "\n\n# Title\n\nHello\n\n").unwrap();

        let doc = read_file(&path).await.expect("readable");
        assert_eq!(doc.text(), "# Title\n\nHello");
        assert_eq!(doc.base_dir(), dir.path());
        assert_eq!(doc.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn read_file_missing_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(dir.path().join("nope.md")).await.unwrap_err();
        assert!(matches!(err, BuildError::FileNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn new_keeps_text_verbatim() {
        let doc = SourceDocument::new("  padded  ", "/tmp");
        assert_eq!(doc.text(), "  padded  ");
        assert_eq!(doc.base_dir(), Path::new("/tmp"));
    }
}
