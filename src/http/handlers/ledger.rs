use crate::error::AppResult;
use crate::services::LedgerStatus;
use crate::AppState;
use axum::extract::State;
use axum::Json;

/// Network, program and counters of the piggy program
pub async fn status(State(state): State<AppState>) -> AppResult<Json<LedgerStatus>> {
    Ok(Json(state.ledger.status().await?))
}
