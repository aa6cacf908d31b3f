use super::{
    BulkDeleteReport, BulkDeleteRequest, DEFAULT_CATEGORY, DeleteByIdResponse, DeleteRequest,
    DeleteResponse, GalleryError, GalleryJson, GalleryListResponse, IncomingFile, LikeResponse,
    ProcessingStats, TogglePublicRequest, TogglePublicResponse, UploadLimits, UploadResponse,
    validate_filename,
};
use crate::AppState;
use crate::login::AdminSession;
use axum::{
    Json,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Request body limit for the upload route: a whole batch up to the storage
/// limit, plus room for the multipart framing.
pub fn upload_body_limit(limits: &UploadLimits) -> DefaultBodyLimit {
    let headroom = 8 * 1024 * 1024;
    DefaultBodyLimit::max((limits.max_storage + headroom) as usize)
}

pub async fn upload_handler(
    admin: AdminSession,
    State(app_state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, GalleryError> {
    let mut multipart = multipart.map_err(|e| GalleryError::BadRequest(e.body_text()))?;
    let mut files = Vec::new();
    let mut category = DEFAULT_CATEGORY.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::Multipart(e.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("images") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GalleryError::Multipart(e.body_text()))?;
                files.push(IncomingFile {
                    name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("category") => {
                category = field
                    .text()
                    .await
                    .map_err(|e| GalleryError::Multipart(e.body_text()))?;
            }
            _ => {} // Ignore unknown fields.
        }
    }

    debug!(
        user = %admin.username,
        files = files.len(),
        category = %category,
        "Upload received"
    );

    let images = app_state.gallery.ingest(files, &category).await?;
    let processing_stats = ProcessingStats::from_images(&images);

    Ok(Json(UploadResponse {
        message: "Images uploaded successfully".to_string(),
        images,
        processing_stats,
    }))
}

pub async fn gallery_handler(
    State(app_state): State<AppState>,
) -> Result<Json<GalleryListResponse>, GalleryError> {
    let response = match app_state.gallery.list_images().await? {
        Some(images) => GalleryListResponse {
            total: images.len(),
            message: format!("Found {} images in uploads directory", images.len()),
            images,
        },
        None => missing_directory_response(),
    };

    Ok(Json(response))
}

pub async fn public_gallery_handler(
    State(app_state): State<AppState>,
) -> Result<Json<GalleryListResponse>, GalleryError> {
    let response = match app_state.gallery.list_public_images().await? {
        Some(images) => GalleryListResponse {
            total: images.len(),
            message: format!("Found {} public images", images.len()),
            images,
        },
        None => missing_directory_response(),
    };

    Ok(Json(response))
}

fn missing_directory_response() -> GalleryListResponse {
    GalleryListResponse {
        images: Vec::new(),
        total: 0,
        message: "No uploads directory found".to_string(),
    }
}

pub async fn delete_handler(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    GalleryJson(request): GalleryJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, GalleryError> {
    let filename = request
        .filename
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or(GalleryError::MissingFilename)?;

    app_state.gallery.delete_file(&filename).await?;

    Ok(Json(DeleteResponse {
        message: "Image deleted successfully".to_string(),
        filename,
    }))
}

pub async fn bulk_delete_handler(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    GalleryJson(request): GalleryJson<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteReport>, GalleryError> {
    let report = app_state.gallery.delete_many(&request.filenames).await?;
    Ok(Json(report))
}

pub async fn delete_by_id_handler(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteByIdResponse>, GalleryError> {
    let filename = app_state.gallery.delete_by_id(&id).await?;

    Ok(Json(DeleteByIdResponse {
        message: "Image deleted successfully".to_string(),
        id,
        filename,
    }))
}

pub async fn toggle_public_handler(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    GalleryJson(request): GalleryJson<TogglePublicRequest>,
) -> Result<Json<TogglePublicResponse>, GalleryError> {
    app_state.gallery.set_public(&id, request.is_public).await?;

    let message = if request.is_public {
        "Image made public on landing page"
    } else {
        "Image hidden from landing page"
    };

    Ok(Json(TogglePublicResponse {
        success: true,
        message: message.to_string(),
    }))
}

pub async fn like_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, GalleryError> {
    let likes = app_state.gallery.like(&id).await?;

    Ok(Json(LikeResponse {
        message: "Image liked successfully".to_string(),
        id,
        likes,
    }))
}

pub async fn serve_upload_handler(
    State(app_state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    if validate_filename(&filename).is_err() {
        warn!(filename = %filename, "Refusing to serve non-image upload path");
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let path = app_state.gallery.directory().join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return (StatusCode::NOT_FOUND, "File not found").into_response(),
    };

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}
