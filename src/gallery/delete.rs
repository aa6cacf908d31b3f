use super::{BulkDeleteReport, Gallery, GalleryError, image_id, is_image, validate_filename};
use std::collections::HashSet;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

impl Gallery {
    /// Remove a stored image and its metadata entry.
    pub async fn delete_file(&self, filename: &str) -> Result<(), GalleryError> {
        validate_filename(filename)?;
        let filename = filename.trim();

        match tokio::fs::remove_file(self.directory.join(filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("File not found or already deleted: {}", filename);
                return Err(GalleryError::NotFound(
                    "File not found or already deleted".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let id = image_id(filename).to_string();
        self.metadata
            .update(|document| {
                document.remove(&id);
            })
            .await?;

        info!("Successfully deleted file: {}", filename);
        Ok(())
    }

    /// Remove the file of an image id. Returns the filename that was removed.
    pub async fn delete_by_id(&self, id: &str) -> Result<String, GalleryError> {
        let filename = self
            .find_filename(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("Image {} not found", id)))?;

        self.delete_file(&filename).await?;
        Ok(filename)
    }

    /// Remove many files at once. Removals run concurrently and a failure
    /// only affects its own file.
    pub async fn delete_many(&self, filenames: &[String]) -> Result<BulkDeleteReport, GalleryError> {
        let total = filenames.len();
        let mut failed = Vec::new();
        let mut tasks = JoinSet::new();

        for filename in filenames {
            if let Err(e) = validate_filename(filename) {
                warn!("Refusing to delete {:?}: {}", filename, e);
                failed.push(filename.clone());
                continue;
            }

            let filename = filename.trim().to_string();
            let path = self.directory.join(&filename);
            tasks.spawn(async move {
                let result = tokio::fs::remove_file(&path).await;
                (filename, result)
            });
        }

        let mut removed_ids = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((filename, Ok(()))) => {
                    removed_ids.insert(image_id(&filename).to_string());
                }
                Ok((filename, Err(e))) => {
                    warn!("Failed to delete {}: {}", filename, e);
                    failed.push(filename);
                }
                Err(e) => error!("Delete task failed: {}", e),
            }
        }

        if !removed_ids.is_empty() {
            self.metadata
                .update(|document| document.retain(|id, _| !removed_ids.contains(id)))
                .await?;
        }

        let deleted = removed_ids.len();
        failed.sort();
        info!("Bulk delete removed {} of {} files", deleted, total);

        Ok(BulkDeleteReport {
            message: format!("Deleted {} of {} images", deleted, total),
            deleted,
            total,
            failed,
        })
    }

    /// Drop metadata entries whose image file no longer exists. Returns the
    /// ids that were removed.
    pub async fn prune_orphans(&self) -> Result<Vec<String>, GalleryError> {
        let mut existing = HashSet::new();

        match tokio::fs::read_dir(&self.directory).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let filename = entry.file_name().to_string_lossy().to_string();
                    if is_image(&filename) {
                        existing.insert(image_id(&filename).to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let removed = self
            .metadata
            .update(|document| {
                let orphans: Vec<String> = document
                    .keys()
                    .filter(|id| !existing.contains(*id))
                    .cloned()
                    .collect();
                for id in &orphans {
                    document.remove(id);
                }
                orphans
            })
            .await?;

        if !removed.is_empty() {
            info!("Pruned {} orphaned metadata entries", removed.len());
        }

        Ok(removed)
    }
}
