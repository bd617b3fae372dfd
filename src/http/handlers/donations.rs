use crate::auth::AuthContext;
use crate::error::AppResult;
use crate::http::handlers::common::{json_body, parse_id};
use crate::models::{Donation, DonationUpdate, DonationWithPiggy, NewDonation};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

/// Donations sent by the calling user
pub async fn list_donations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> AppResult<Json<Vec<DonationWithPiggy>>> {
    Ok(Json(state.donations.list_for_sender(&auth.uid).await?))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
) -> AppResult<Json<Donation>> {
    let id = parse_id(&donation_id, "donation_id")?;
    Ok(Json(state.donations.get(id).await?))
}

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Result<Json<NewDonation>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Donation>)> {
    let new_donation = json_body(request)?;
    let donation = state.donations.create(&auth.uid, new_donation).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn update_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
    request: Result<Json<DonationUpdate>, JsonRejection>,
) -> AppResult<Json<Donation>> {
    let id = parse_id(&donation_id, "donation_id")?;
    let update = json_body(request)?;
    Ok(Json(state.donations.update(id, update).await?))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
) -> AppResult<Json<i64>> {
    let id = parse_id(&donation_id, "donation_id")?;
    Ok(Json(state.donations.delete(id).await?))
}
