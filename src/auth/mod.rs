//! Firebase authentication and role checks for the HTTP layer.

pub mod firebase;
pub mod middleware;

pub use firebase::{FirebaseAuth, FirebaseClaims};
pub use middleware::{allow, require_admin, require_auth, AuthContext, ADMIN_ROLE};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token not available")]
    MissingToken,

    #[error("{0}")]
    InvalidToken(String),

    #[error("Unauthorized")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::UNAUTHORIZED,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// How incoming requests are authenticated
#[derive(Clone)]
pub enum AuthMode {
    /// Verify Firebase ID tokens
    Firebase(Arc<FirebaseAuth>),
    /// Development: skip verification and act as a fixed user
    Dev { user_id: String },
}
