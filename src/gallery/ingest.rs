use super::image_processing::{ProcessedImage, process_upload};
use super::{
    DEFAULT_CATEGORY, Gallery, GalleryError, ImageRecord, MetadataEntry, StorageUsage,
    UploadedImage, format_megabytes, image_id,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One `images` part of an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: Some(content_type.into()),
            bytes,
        }
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Bytes a directory entry counts toward the quota. Entries removed since
/// the directory was read count as nothing.
pub(crate) fn stored_size(metadata: std::io::Result<std::fs::Metadata>) -> std::io::Result<u64> {
    match metadata {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Ok(0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

impl Gallery {
    /// Total bytes of all regular files in the upload directory.
    pub async fn storage_usage(&self) -> Result<StorageUsage, GalleryError> {
        let mut used = 0;

        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StorageUsage {
                    used,
                    limit: self.limits.max_storage,
                });
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            used += stored_size(entry.metadata().await)?;
        }

        Ok(StorageUsage {
            used,
            limit: self.limits.max_storage,
        })
    }

    /// Validate, compress and persist a batch of uploaded files.
    ///
    /// The batch is refused as a whole when it would push the directory past
    /// the storage limit. After that, files are handled one by one: anything
    /// that is not image-typed, is over the per-file limit, or fails to
    /// process is left out of the result while the rest continue.
    pub async fn ingest(
        &self,
        files: Vec<IncomingFile>,
        category: &str,
    ) -> Result<Vec<UploadedImage>, GalleryError> {
        if files.is_empty() {
            return Err(GalleryError::NoFiles);
        }

        tokio::fs::create_dir_all(&self.directory).await?;

        self.check_quota(&files).await?;

        let category = match category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            trimmed => trimmed.to_string(),
        };

        let mut uploaded = Vec::new();

        for file in files {
            if !file.is_image() {
                warn!(
                    "Skipping {}: content type {:?} is not an image",
                    file.name, file.content_type
                );
                continue;
            }

            if file.size() > self.limits.max_file_size {
                warn!(
                    "File {} exceeds {}MB limit ({}MB), skipping...",
                    file.name,
                    format_megabytes(self.limits.max_file_size),
                    format_megabytes(file.size())
                );
                continue;
            }

            let original_size = file.size();
            let name = file.name.clone();
            let content_type = file.content_type.clone().unwrap_or_default();
            let limits = self.limits;

            let processed = match tokio::task::spawn_blocking(move || {
                process_upload(file.bytes, &content_type, &limits, &file.name)
            })
            .await
            {
                Ok(Some(processed)) => processed,
                Ok(None) => {
                    warn!("Skipping {}: not a recognizable image", name);
                    continue;
                }
                Err(e) => {
                    error!("Error processing file {}: {}", name, e);
                    continue;
                }
            };

            if processed.recompressed {
                info!(
                    "Compressed {}: {}MB -> {}MB",
                    name,
                    format_megabytes(original_size),
                    format_megabytes(processed.bytes.len() as u64)
                );
            }

            match self
                .persist(processed, &name, &category, original_size)
                .await
            {
                Ok(image) => uploaded.push(image),
                Err(e) => {
                    error!("Error storing file {}: {}", name, e);
                    continue;
                }
            }
        }

        if uploaded.is_empty() {
            return Err(GalleryError::NoValidImages);
        }

        info!("Stored {} uploaded images", uploaded.len());
        Ok(uploaded)
    }

    async fn check_quota(&self, files: &[IncomingFile]) -> Result<(), GalleryError> {
        let upload_size: u64 = files.iter().map(IncomingFile::size).sum();

        let usage = match self.storage_usage().await {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Could not check storage limit: {}", e);
                return Ok(());
            }
        };

        if usage.used + upload_size > usage.limit {
            warn!(
                current = usage.used,
                upload = upload_size,
                limit = usage.limit,
                "Upload rejected, storage limit exceeded"
            );
            return Err(GalleryError::QuotaExceeded {
                current_usage: format_megabytes(usage.used),
                upload_size: format_megabytes(upload_size),
                max_storage: format_megabytes(usage.limit),
            });
        }

        Ok(())
    }

    /// Write the binary, then record its metadata entry. A failed metadata
    /// write removes the binary again.
    async fn persist(
        &self,
        processed: ProcessedImage,
        original_name: &str,
        category: &str,
        original_size: u64,
    ) -> Result<UploadedImage, GalleryError> {
        let filename = format!("{}.{}", Uuid::new_v4(), processed.extension);
        let id = image_id(&filename).to_string();
        let file_path = self.directory.join(&filename);

        tokio::fs::write(&file_path, &processed.bytes).await?;

        let uploaded_at = Utc::now();
        let entry = MetadataEntry {
            is_public: false,
            uploaded_at,
            original_name: Some(original_name.to_string()),
            category: Some(category.to_string()),
            likes: 0,
        };

        if let Err(e) = self
            .metadata
            .update(|document| {
                document.insert(id.clone(), entry);
            })
            .await
        {
            if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
                warn!("Failed to clean up {:?}: {}", file_path, remove_err);
            }
            return Err(e);
        }

        Ok(UploadedImage {
            record: ImageRecord {
                id,
                path: self.public_path(&filename),
                filename,
                original_name: original_name.to_string(),
                size: processed.bytes.len() as u64,
                uploaded_at,
                category: category.to_string(),
                likes: 0,
                is_public: false,
            },
            original_size,
        })
    }
}
