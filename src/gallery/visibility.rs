use super::{Gallery, GalleryError, MetadataEntry};
use chrono::Utc;
use tracing::info;

impl Gallery {
    /// Set the public flag of an image, creating its metadata entry when it
    /// has none. An existing entry keeps its `uploadedAt`.
    pub async fn set_public(&self, id: &str, is_public: bool) -> Result<(), GalleryError> {
        self.metadata
            .update(|document| {
                document
                    .entry(id.to_string())
                    .or_insert_with(|| MetadataEntry::new(Utc::now()))
                    .is_public = is_public;
            })
            .await?;

        info!(id = %id, is_public, "Updated image visibility");
        Ok(())
    }

    /// Add one like to an existing image and return the new count.
    pub async fn like(&self, id: &str) -> Result<u64, GalleryError> {
        if self.find_filename(id).await?.is_none() {
            return Err(GalleryError::NotFound(format!("Image {} not found", id)));
        }

        let likes = self
            .metadata
            .update(|document| {
                let entry = document
                    .entry(id.to_string())
                    .or_insert_with(|| MetadataEntry::new(Utc::now()));
                entry.likes += 1;
                entry.likes
            })
            .await?;

        Ok(likes)
    }
}
