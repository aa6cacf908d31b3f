// Gallery module - uploaded image store and its admin services
mod core;
mod delete;
mod error;
mod extract;
mod handlers;
mod image_processing;
mod ingest;
mod metadata;
mod types;
mod visibility;

#[cfg(test)]
mod tests;

pub use error::GalleryError;
pub use extract::GalleryJson;
pub use handlers::{
    bulk_delete_handler, delete_by_id_handler, delete_handler, gallery_handler, like_handler,
    public_gallery_handler, serve_upload_handler, toggle_public_handler, upload_body_limit,
    upload_handler,
};
pub use ingest::IncomingFile;
pub use metadata::{METADATA_FILE_NAME, MetadataEntry, MetadataMap, MetadataStore};
pub use types::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type SharedGallery = Arc<Gallery>;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Directory of uploaded images plus the metadata document stored beside
/// them. Listings are rebuilt from the directory on every call.
pub struct Gallery {
    pub(crate) directory: PathBuf,
    pub(crate) public_path_prefix: String,
    pub(crate) limits: UploadLimits,
    pub(crate) metadata: MetadataStore,
}

impl Gallery {
    pub fn new(config: &crate::StorageConfig) -> Self {
        Self::with_limits(config, UploadLimits::default())
    }

    pub fn with_limits(config: &crate::StorageConfig, limits: UploadLimits) -> Self {
        Self {
            directory: config.upload_directory.clone(),
            public_path_prefix: format!("/{}", config.public_path_prefix.trim_matches('/')),
            limits,
            metadata: MetadataStore::new(&config.upload_directory),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub(crate) fn public_path(&self, filename: &str) -> String {
        format!("{}/{}", self.public_path_prefix, filename)
    }
}

pub(crate) fn is_image(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub(crate) fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Image id for a stored filename: the name without its extension.
pub fn image_id(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(dot) => &filename[..dot],
    }
}

/// Reject anything that is not a bare stored image name, so requests
/// cannot reach outside the upload directory or touch the metadata file.
pub(crate) fn validate_filename(filename: &str) -> Result<(), GalleryError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(GalleryError::MissingFilename);
    }

    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains("..") {
        return Err(GalleryError::InvalidFilename(filename.to_string()));
    }

    if !is_image(trimmed) {
        return Err(GalleryError::InvalidFilename(filename.to_string()));
    }

    Ok(())
}
