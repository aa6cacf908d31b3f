use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("No files provided")]
    NoFiles,

    #[error("No valid images were uploaded")]
    NoValidImages,

    #[error("Storage limit exceeded: {current_usage}MB used, {upload_size}MB requested, {max_storage}MB allowed")]
    QuotaExceeded {
        current_usage: String,
        upload_size: String,
        max_storage: String,
    },

    #[error("Filename is required")]
    MissingFilename,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            GalleryError::Multipart(_)
            | GalleryError::BadRequest(_)
            | GalleryError::NoFiles
            | GalleryError::NoValidImages
            | GalleryError::MissingFilename
            | GalleryError::InvalidFilename(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.to_string() }),
            ),
            GalleryError::QuotaExceeded {
                current_usage,
                upload_size,
                max_storage,
            } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({
                    "error": "Storage limit exceeded",
                    "details": {
                        "currentUsage": current_usage,
                        "uploadSize": upload_size,
                        "maxStorage": max_storage,
                    }
                }),
            ),
            GalleryError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": self.to_string() }),
            ),
            GalleryError::IoError(_)
            | GalleryError::ImageError(_)
            | GalleryError::SerdeError(_)
            | GalleryError::JoinError(_) => {
                tracing::error!("Internal gallery error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
