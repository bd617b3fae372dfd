use crate::auth::AuthContext;
use crate::error::AppResult;
use crate::http::handlers::common::{json_body, parse_id};
use crate::models::{NewPiggy, Piggy, PiggyUpdate, PiggyWithDonations};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

pub async fn list_piggies(State(state): State<AppState>) -> AppResult<Json<Vec<Piggy>>> {
    Ok(Json(state.piggies.list().await?))
}

pub async fn get_piggy(
    State(state): State<AppState>,
    Path(piggy_id): Path<String>,
) -> AppResult<Json<PiggyWithDonations>> {
    let id = parse_id(&piggy_id, "piggy_id")?;
    Ok(Json(state.piggies.get(id).await?))
}

pub async fn create_piggy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Result<Json<NewPiggy>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Piggy>)> {
    let new_piggy = json_body(request)?;
    let piggy = state.piggies.create(&auth.uid, new_piggy).await?;
    Ok((StatusCode::CREATED, Json(piggy)))
}

pub async fn update_piggy(
    State(state): State<AppState>,
    Path(piggy_id): Path<String>,
    request: Result<Json<PiggyUpdate>, JsonRejection>,
) -> AppResult<Json<Piggy>> {
    let id = parse_id(&piggy_id, "piggy_id")?;
    let update = json_body(request)?;
    Ok(Json(state.piggies.update(id, update).await?))
}

pub async fn delete_piggy(
    State(state): State<AppState>,
    Path(piggy_id): Path<String>,
) -> AppResult<Json<i64>> {
    let id = parse_id(&piggy_id, "piggy_id")?;
    Ok(Json(state.piggies.delete(id).await?))
}
