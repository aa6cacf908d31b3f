use super::{DEFAULT_CATEGORY, GalleryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Persisted attributes of one image, keyed by image id in the document.
///
/// Only `isPublic` and `uploadedAt` are guaranteed to be present; documents
/// written before the remaining fields existed still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub likes: u64,
}

impl MetadataEntry {
    pub fn new(uploaded_at: DateTime<Utc>) -> Self {
        Self {
            is_public: false,
            uploaded_at,
            original_name: None,
            category: None,
            likes: 0,
        }
    }

    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

pub type MetadataMap = BTreeMap<String, MetadataEntry>;

/// JSON document mapping image id to [`MetadataEntry`].
///
/// Every mutation goes through [`MetadataStore::update`], which holds the
/// store lock across the read, the change and the write.
pub struct MetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MetadataStore {
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(METADATA_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing or unparsable file reads as empty.
    pub async fn load(&self) -> MetadataMap {
        read_document(&self.path).await
    }

    /// Apply `f` to the current document and persist the result.
    pub async fn update<F, R>(&self, f: F) -> Result<R, GalleryError>
    where
        F: FnOnce(&mut MetadataMap) -> R,
    {
        let _guard = self.lock.lock().await;

        let mut document = read_document(&self.path).await;
        let result = f(&mut document);
        write_document(&self.path, &document).await?;

        Ok(result)
    }
}

async fn read_document(path: &Path) -> MetadataMap {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No metadata document at {:?}", path);
            return MetadataMap::new();
        }
        Err(e) => {
            warn!("Failed to read metadata document {:?}: {}", path, e);
            return MetadataMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!("Metadata document {:?} is corrupt, ignoring it: {}", path, e);
            MetadataMap::new()
        }
    }
}

async fn write_document(path: &Path, document: &MetadataMap) -> Result<(), GalleryError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(document)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, content).await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}
