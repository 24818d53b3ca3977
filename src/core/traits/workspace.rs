use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to create execution directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write source file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Source file owned by exactly one execution.
///
/// Released explicitly through [`Workspace::release`]. If the owning future is
/// dropped before that happens, `Drop` removes the file synchronously.
#[derive(Debug)]
pub struct SourceFile {
    id: Uuid,
    path: PathBuf,
    armed: bool,
}

impl SourceFile {
    pub fn new(id: Uuid, path: PathBuf) -> Self {
        Self {
            id,
            path,
            armed: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hands the path over to the caller; `Drop` will no longer touch it.
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for SourceFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    execution_id = %self.id,
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove abandoned source file"
                );
            }
        }
    }
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait Workspace: std::fmt::Debug + Send + Sync {
    /// Writes `code` to a fresh uniquely named file with the given extension.
    async fn create(&self, code: &str, extension: &str) -> Result<SourceFile, WorkspaceError>;

    /// Deletes the file. Failures are logged, never returned.
    async fn release(&self, file: SourceFile);
}
