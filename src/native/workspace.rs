use std::path::{Path, PathBuf};

use tokio::{fs, sync::OnceCell};
use uuid::Uuid;

use crate::{
    constants::SOURCE_FILE_PREFIX,
    core::traits::workspace::{SourceFile, Workspace, WorkspaceError},
};

#[derive(Debug)]
pub struct TempWorkspace {
    dir: PathBuf,
    ready: OnceCell<()>,
}

impl TempWorkspace {
    pub fn new<T: AsRef<Path>>(dir: T) -> Self {
        TempWorkspace {
            dir: dir.as_ref().into(),
            ready: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), WorkspaceError> {
        self.ready
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|source| WorkspaceError::CreateDir {
                        path: self.dir.clone(),
                        source,
                    })?;
                tracing::info!(dir = %self.dir.display(), "execution workspace ready");
                Ok::<(), WorkspaceError>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl Workspace for TempWorkspace {
    async fn create(&self, code: &str, extension: &str) -> Result<SourceFile, WorkspaceError> {
        self.ensure_dir().await?;

        let id = Uuid::new_v4();
        let path = self
            .dir
            .join(format!("{}{}.{}", SOURCE_FILE_PREFIX, id, extension));

        // Armed before writing so a partial file is removed on failure.
        let file = SourceFile::new(id, path);
        fs::write(file.path(), code)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: file.path().to_path_buf(),
                source,
            })?;

        tracing::debug!(execution_id = %id, path = %file.path().display(), "source file written");
        Ok(file)
    }

    async fn release(&self, file: SourceFile) {
        let id = file.id();
        let path = file.disarm();

        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(
                execution_id = %id,
                path = %path.display(),
                error = %e,
                "failed to remove source file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use uuid::Uuid;

    use super::*;

    fn workspace_dir() -> PathBuf {
        std::env::temp_dir().join(format!("codeview_{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_create_writes_source_verbatim() {
        let dir = workspace_dir();
        let workspace = TempWorkspace::new(&dir);

        let code = "print('hi')\n  \n";
        let file = workspace.create(code, "py").await.unwrap();

        assert!(file.path().starts_with(&dir));
        assert_eq!(file.path().extension().unwrap(), "py");
        assert_eq!(fs::read_to_string(file.path()).await.unwrap(), code);

        workspace.release(file).await;
    }

    #[tokio::test]
    async fn test_release_deletes_file() {
        let workspace = TempWorkspace::new(workspace_dir());

        let file = workspace.create("console.log(1)", "js").await.unwrap();
        let path = file.path().to_path_buf();
        workspace.release(file).await;

        assert!(!path.exists());
        // The directory itself is kept for later executions.
        assert!(workspace.dir().exists());
    }

    #[tokio::test]
    async fn test_release_of_missing_file_is_swallowed() {
        let workspace = TempWorkspace::new(workspace_dir());

        let file = workspace.create("x", "py").await.unwrap();
        std::fs::remove_file(file.path()).unwrap();

        workspace.release(file).await;
    }

    #[tokio::test]
    async fn test_dropped_file_is_removed() {
        let workspace = TempWorkspace::new(workspace_dir());

        let file = workspace.create("x", "py").await.unwrap();
        let path = file.path().to_path_buf();
        drop(file);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let workspace = TempWorkspace::new(workspace_dir());

        let a = workspace.create("a", "js").await.unwrap();
        let b = workspace.create("b", "js").await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());

        workspace.release(a).await;
        workspace.release(b).await;
    }

    #[tokio::test]
    async fn test_existing_dir_is_reused() {
        let dir = workspace_dir();
        std::fs::create_dir_all(&dir).unwrap();

        let workspace = TempWorkspace::new(&dir);
        let file = workspace.create("x", "py").await.unwrap();

        workspace.release(file).await;
    }

    #[tokio::test]
    async fn test_unwritable_dir() {
        // /proc is readonly dir
        let dir = Path::new("/proc").join(format!("codeview_{}", Uuid::new_v4()));
        let workspace = TempWorkspace::new(dir);

        let result = workspace.create("x", "py").await;

        assert!(matches!(result, Err(WorkspaceError::CreateDir { .. })));
    }
}
