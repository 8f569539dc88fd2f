//! Artifact persistence.
//!
//! Generated documents are written under a fixed output root with a name
//! derived from the course title. Each write goes to its own synced temporary
//! sibling which is then renamed into place, so a document is either absent or
//! complete, and concurrent writers of the same name never share a temp file.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File name for a course document: the title lowercased, with spaces and
/// path separators replaced by underscores, plus `.md`.
pub fn artifact_file_name(title: &str) -> String {
    let stem: String = title
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("{stem}.md")
}

/// Somewhere finished documents can be written.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `content` under `relative_name`, replacing any previous
    /// document of the same name. Returns where it was written.
    async fn persist(&self, relative_name: &str, content: &str) -> Result<PathBuf, PersistenceError>;
}

/// Stores documents as files under a root directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_name: &str) -> Result<PathBuf, PersistenceError> {
        let relative = Path::new(relative_name);
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(relative)),
            _ => Err(PersistenceError::InvalidName(relative_name.to_string())),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, relative_name: &str, content: &str) -> Result<PathBuf, PersistenceError> {
        let path = self.resolve(relative_name)?;
        let root = self.root.clone();
        let target = path.clone();
        let content = content.to_owned();
        let bytes = content.len();

        tokio::task::spawn_blocking(move || write_atomic(&root, &target, content.as_bytes()))
            .await
            .map_err(|e| PersistenceError::Io {
                path: path.clone(),
                source: std::io::Error::other(e),
            })??;

        debug!(path = %path.display(), bytes, "Artifact written");
        Ok(path)
    }
}

/// Writes `content` to a uniquely named temp file in `root`, syncs it and
/// renames it over `target`. The temp file is removed if any step fails.
fn write_atomic(root: &Path, target: &Path, content: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PersistenceError::Io { path, source }
    };

    std::fs::create_dir_all(root).map_err(io_err(root))?;

    let mut temp_file = NamedTempFile::new_in(root).map_err(io_err(root))?;
    let temp_path = temp_file.path().to_path_buf();
    temp_file
        .write_all(content)
        .map_err(io_err(temp_path.as_path()))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(io_err(temp_path.as_path()))?;

    temp_file
        .persist(target)
        .map_err(|e| PersistenceError::Io {
            path: target.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}
