use super::GalleryError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

/// `Json<T>` whose rejections become `GalleryError::BadRequest`, so a
/// malformed body still gets a JSON `{error}` response.
pub struct GalleryJson<T>(pub T);

impl<S, T> FromRequest<S> for GalleryJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GalleryError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| GalleryError::BadRequest(e.body_text()))?;
        Ok(GalleryJson(value))
    }
}
