use crate::errors::{RefactronError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where transformed code is put so the test command can see it.
pub trait SourceStage: Send + Sync {
    /// Make `code` the current content of `file`.
    fn stage(&self, file: &Path, code: &str) -> Result<()>;
}

/// Keeps code in memory only. Tests see whatever is on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStage;

impl SourceStage for NoopStage {
    fn stage(&self, _file: &Path, _code: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes staged code to disk, resolving relative paths against `root`.
#[derive(Debug, Clone)]
pub struct FileStage {
    root: PathBuf,
}

impl FileStage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        }
    }
}

impl SourceStage for FileStage {
    fn stage(&self, file: &Path, code: &str) -> Result<()> {
        let path = self.resolve(file);
        fs::write(&path, code)
            .map_err(|e| RefactronError::io(format!("failed to stage code: {}", e), Some(path)))
    }
}
