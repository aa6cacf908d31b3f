use super::{Gallery, GalleryError, ImageRecord, MetadataMap, image_id, is_image};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

impl Gallery {
    /// Every stored image, newest first. `None` when the upload directory
    /// does not exist yet.
    pub async fn list_images(&self) -> Result<Option<Vec<ImageRecord>>, GalleryError> {
        self.scan(false).await
    }

    /// Only the images flagged public, newest first.
    pub async fn list_public_images(&self) -> Result<Option<Vec<ImageRecord>>, GalleryError> {
        self.scan(true).await
    }

    async fn scan(&self, public_only: bool) -> Result<Option<Vec<ImageRecord>>, GalleryError> {
        debug!("Scanning upload directory: {:?}", self.directory);

        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata = self.metadata.load().await;
        let mut images = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !is_image(&filename) {
                continue;
            }

            let file_metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Error reading file {}: {}", filename, e);
                    continue;
                }
            };

            let uploaded_at: DateTime<Utc> = match file_metadata.modified() {
                Ok(modified) => modified.into(),
                Err(e) => {
                    warn!("No modification time for {}: {}", filename, e);
                    continue;
                }
            };

            let record = self.build_record(&metadata, filename, file_metadata.len(), uploaded_at);
            if public_only && !record.is_public {
                continue;
            }

            images.push(record);
        }

        images.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        Ok(Some(images))
    }

    fn build_record(
        &self,
        metadata: &MetadataMap,
        filename: String,
        size: u64,
        uploaded_at: DateTime<Utc>,
    ) -> ImageRecord {
        let id = image_id(&filename).to_string();
        let entry = metadata.get(&id);

        ImageRecord {
            original_name: entry
                .and_then(|e| e.original_name.clone())
                .unwrap_or_else(|| filename.clone()),
            category: entry
                .map(|e| e.category().to_string())
                .unwrap_or_else(|| super::DEFAULT_CATEGORY.to_string()),
            likes: entry.map(|e| e.likes).unwrap_or(0),
            is_public: entry.map(|e| e.is_public).unwrap_or(false),
            path: self.public_path(&filename),
            id,
            filename,
            size,
            uploaded_at,
        }
    }

    /// Stored filename for an image id, if a file with that id exists.
    pub async fn find_filename(&self, id: &str) -> Result<Option<String>, GalleryError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if is_image(&filename) && image_id(&filename) == id {
                return Ok(Some(filename));
            }
        }

        Ok(None)
    }
}
