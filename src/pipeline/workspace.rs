//! The disposable build directory.
//!
//! A [`Workspace`] owns one uniquely named temporary directory for the length
//! of one build. Everything the build creates lands inside it: the document
//! and bibliography sources, staged include trees, and every side file the
//! TeX engine and bibliography processor leave behind (`.aux`, `.log`,
//! `.bbl`, `.blg`, `.out`, `.nav`, `.snm`, `.toc`, ...). Teardown is a single
//! recursive removal, so no file type can be forgotten.
//!
//! [`Workspace::close`] removes the directory and reports failures. If a
//! workspace is dropped without being closed (early return, panic) the
//! underlying [`TempDir`] still removes it.

use crate::error::BuildError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

const PREFIX: &str = "mdpress-";

/// An exclusively owned temporary directory for one build.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root` (or the system
    /// temp dir).
    pub fn create(root: Option<&Path>) -> Result<Self, BuildError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| BuildError::Staging {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the workspace.
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a text file at the workspace root.
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf, BuildError> {
        let path = self.join(name);
        std::fs::write(&path, contents).map_err(|e| BuildError::Staging {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Copy a directory tree into the workspace under its own basename.
    pub fn stage_dir(&self, source: &Path) -> Result<PathBuf, BuildError> {
        let dest = self.join(&basename(source)?);
        copy_tree(source, &dest).map_err(|e| BuildError::Staging {
            path: source.to_path_buf(),
            source: e,
        })?;
        debug!("Staged directory {} → {}", source.display(), dest.display());
        Ok(dest)
    }

    /// Copy a single file into the workspace under its own basename.
    pub fn stage_file(&self, source: &Path) -> Result<PathBuf, BuildError> {
        let dest = self.join(&basename(source)?);
        std::fs::copy(source, &dest).map_err(|e| BuildError::Staging {
            path: source.to_path_buf(),
            source: e,
        })?;
        debug!("Staged file {} → {}", source.display(), dest.display());
        Ok(dest)
    }

    /// Remove the workspace and everything in it.
    ///
    /// A directory that is already gone counts as removed.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("Removed workspace {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to remove workspace {}: {e}", path.display());
                // Best effort: try again file by file; whatever is left is reported.
                match std::fs::remove_dir_all(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

fn basename(path: &Path) -> Result<String, BuildError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BuildError::Staging {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })
}

/// Copy `source` to `dest`, following symbolic links. A link loop is an error.
fn copy_tree(source: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
