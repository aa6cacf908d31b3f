use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "general";

/// Ingestion policy. The defaults are the fixed production values; they are
/// deliberately not part of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_storage: u64,
    pub jpeg_quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024,
            max_storage: 250 * 1024 * 1024,
            jpeg_quality: 80,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

/// An image as reported by listings, assembled from the file on disk and
/// its metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub category: String,
    pub likes: u64,
    pub is_public: bool,
}

/// An image persisted by an upload, carrying both byte sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    #[serde(flatten)]
    pub record: ImageRecord,
    pub original_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub total_original_size: u64,
    pub total_processed_size: u64,
    pub compression_ratio: String,
}

impl ProcessingStats {
    pub fn from_images(images: &[UploadedImage]) -> Self {
        let total_original_size: u64 = images.iter().map(|img| img.original_size).sum();
        let total_processed_size: u64 = images.iter().map(|img| img.record.size).sum();

        let compression_ratio = if total_original_size > 0 {
            let saved = total_original_size as f64 - total_processed_size as f64;
            format!("{:.1}", saved / total_original_size as f64 * 100.0)
        } else {
            "0".to_string()
        };

        Self {
            total_original_size,
            total_processed_size,
            compression_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub images: Vec<UploadedImage>,
    pub processing_stats: ProcessingStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryListResponse {
    pub images: Vec<ImageRecord>,
    pub total: usize,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkDeleteRequest {
    pub filenames: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub message: String,
    pub deleted: usize,
    pub total: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteByIdResponse {
    pub message: String,
    pub id: String,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePublicRequest {
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TogglePublicResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub message: String,
    pub id: String,
    pub likes: u64,
}

/// Storage usage of the upload directory against the aggregate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used: u64,
    pub limit: u64,
}

/// Bytes rendered as decimal megabytes with two decimals ("12.34").
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}
