//! Thumbnail files kept in a local directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domain::ThumbnailStore;

/// Stores thumbnails as files under one directory.
///
/// A reference is resolved by its file name only, so references cannot
/// point outside the directory.
#[derive(Debug, Clone)]
pub struct LocalThumbnailStore {
    root: PathBuf,
}

impl LocalThumbnailStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        Path::new(reference)
            .file_name()
            .map(|name| self.root.join(name))
    }
}

#[async_trait]
impl ThumbnailStore for LocalThumbnailStore {
    async fn remove(&self, reference: &str) -> std::io::Result<()> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("recyco-thumbs-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn removes_file_by_name() {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("bottle.png"), b"png").await.unwrap();

        let store = LocalThumbnailStore::new(&dir);
        store.remove("markets/bottle.png").await.unwrap();
        assert!(!dir.join("bottle.png").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let store = LocalThumbnailStore::new(scratch_dir());
        assert!(store.remove("nothing.png").await.is_ok());
        assert!(store.remove("").await.is_ok());
        assert!(store.remove("..").await.is_ok());
    }
}
