use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::recording::VideoArtifact;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Failed to write preview {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove preview {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Get the root directory for playback previews
pub fn get_preview_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("charisma")
        .join("previews")
}

/// Scratch files standing in for object URLs: one per artifact, removed on revoke.
#[derive(Debug, Clone)]
pub struct PreviewStore {
    root: PathBuf,
}

impl Default for PreviewStore {
    fn default() -> Self {
        Self::new(get_preview_dir())
    }
}

impl PreviewStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the preview path for an artifact
    pub fn path_for(&self, artifact: &VideoArtifact) -> PathBuf {
        self.root
            .join(format!("{}.{}", artifact.id, artifact.extension()))
    }

    pub async fn publish(&self, artifact: &VideoArtifact) -> Result<PathBuf, PreviewError> {
        let path = self.path_for(artifact);
        let write = async {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(&path, &artifact.bytes).await
        };
        write.await.map_err(|source| PreviewError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "preview published");
        Ok(path)
    }

    /// Removes a published preview. Already-missing files are fine.
    pub async fn revoke(&self, path: &Path) -> Result<(), PreviewError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "preview revoked");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PreviewError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Blocking `revoke` for teardown paths that cannot await, such as `Drop`.
    pub fn revoke_now(&self, path: &Path) -> Result<(), PreviewError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "preview revoked");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PreviewError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::ArtifactOrigin;

    #[tokio::test]
    async fn publish_then_revoke() {
        let root = std::env::temp_dir().join(format!("charisma-preview-{}", uuid::Uuid::new_v4()));
        let store = PreviewStore::new(&root);
        let artifact = VideoArtifact::new(
            "answer.mov",
            "video/quicktime",
            b"moov".to_vec(),
            ArtifactOrigin::Uploaded,
        );

        let path = store.publish(&artifact).await.unwrap();
        assert_eq!(path.extension().unwrap(), "mov");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"moov");

        store.revoke(&path).await.unwrap();
        assert!(!path.exists());
        store.revoke(&path).await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_now_removes_synchronously() {
        let root = std::env::temp_dir().join(format!("charisma-preview-{}", uuid::Uuid::new_v4()));
        let store = PreviewStore::new(&root);
        let artifact = VideoArtifact::from_chunks(&[bytes::Bytes::from_static(b"webm")]);

        let path = store.publish(&artifact).await.unwrap();
        store.revoke_now(&path).unwrap();
        assert!(!path.exists());
        store.revoke_now(&path).unwrap();

        std::fs::remove_dir_all(&root).unwrap();
    }
}
