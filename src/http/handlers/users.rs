use crate::auth::AuthContext;
use crate::error::AppResult;
use crate::http::handlers::common::json_body;
use crate::models::{NewUser, User, UserUpdate};
use crate::services::{OnboardingRequest, VerificationSent, VerificationRequest};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// `GET /users`, or a single user when `?email=` is given
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Response> {
    match query.email.filter(|e| !e.trim().is_empty()) {
        Some(email) => Ok(Json(state.users.find_by_email(&email).await?).into_response()),
        None => Ok(Json(state.users.list().await?).into_response()),
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Result<Json<NewUser>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let new_user = json_body(request)?;
    let signup = state.users.signup(&auth.uid, new_user).await?;
    Ok((StatusCode::CREATED, Json(signup.user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(&user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    request: Result<Json<UserUpdate>, JsonRejection>,
) -> AppResult<Json<User>> {
    let update = json_body(request)?;
    Ok(Json(state.users.update(&user_id, update).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<String>> {
    Ok(Json(state.users.delete(&user_id).await?))
}

pub async fn disable_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<String>> {
    Ok(Json(state.users.disable(&user_id).await?))
}

pub async fn enable_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<String>> {
    Ok(Json(state.users.enable(&user_id).await?))
}

/// `POST /users/:user_id/onboarding`; the body is optional
pub async fn onboard_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    request: Option<Json<OnboardingRequest>>,
) -> AppResult<Json<User>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.users.onboard(&user_id, request).await?))
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Result<Json<NewUser>, JsonRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let invitee = json_body(request)?;
    state.users.invite(&auth, &invitee).await?;
    Ok(Json(json!({ "email": invitee.email.trim() })))
}

pub async fn verification_code(
    State(state): State<AppState>,
    request: Result<Json<VerificationRequest>, JsonRejection>,
) -> AppResult<Json<VerificationSent>> {
    let request = json_body(request)?;
    Ok(Json(state.users.send_verification_code(request).await?))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    request: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> AppResult<Json<()>> {
    let request = json_body(request)?;
    state.users.forgot_password(&request.email).await?;
    Ok(Json(()))
}
