use async_trait::async_trait;

/// File storage for item thumbnails.
///
/// The catalog only ever removes thumbnails; uploads happen before an item
/// is created or updated and hand the catalog a reference string.
#[async_trait]
pub trait ThumbnailStore: Send + Sync {
    /// Removes the file behind a reference. Missing files are not an error.
    async fn remove(&self, reference: &str) -> std::io::Result<()>;
}

/// Thumbnail store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopThumbnailStore;

#[async_trait]
impl ThumbnailStore for NoopThumbnailStore {
    async fn remove(&self, _reference: &str) -> std::io::Result<()> {
        Ok(())
    }
}
