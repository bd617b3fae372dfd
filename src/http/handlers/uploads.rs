use crate::error::{AppError, AppResult};
use crate::http::handlers::common::json_body;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// `data:<mime>;base64,<payload>`
    pub data: String,
    /// Object name inside the profile folder; random when absent
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Upload an image or a pdf and return its public URL
pub async fn upload(
    State(state): State<AppState>,
    request: Result<Json<UploadRequest>, JsonRejection>,
) -> AppResult<Json<UploadResponse>> {
    let request = json_body(request)?;
    if request.data.trim().is_empty() {
        return Err(AppError::Validation("data is required".to_string()));
    }

    let path = request.path.as_deref();
    let url = if request.data.starts_with("data:application/") {
        state.uploader.handle_file_upload(&request.data, path).await?
    } else {
        state.uploader.handle_image_upload(&request.data, path).await?
    };
    Ok(Json(UploadResponse { url }))
}
