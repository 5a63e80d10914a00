use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::OkResponse;
use super::repo_types::{DateKey, MealSlot, RecordPatch, TimesheetRecord};
use super::services;
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn data_routes() -> Router<AppState> {
    Router::new()
        .route("/data", get(list_all).delete(clear_all))
        .route("/data/:date_key", post(update_record))
}

pub(crate) fn parse_date_key(raw: &str) -> AppResult<DateKey> {
    DateKey::parse(raw).ok_or_else(|| AppError::BadRequest(format!("invalid date key {raw:?}, expected YYYY-MM-DD")))
}

pub(crate) fn parse_meal(raw: &str) -> AppResult<MealSlot> {
    MealSlot::parse(raw).ok_or_else(|| AppError::BadRequest(format!("invalid meal {raw:?}, expected 1-4")))
}

#[instrument(skip(state))]
pub async fn list_all(State(state): State<AppState>) -> AppResult<Json<BTreeMap<String, TimesheetRecord>>> {
    Ok(Json(services::load_all(&state).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_record(
    State(state): State<AppState>,
    Path(date_key): Path<String>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> AppResult<Json<OkResponse>> {
    let date_key = parse_date_key(&date_key)?;
    let Json(patch) = payload?;
    state.records.upsert(&date_key, &patch).await?;
    Ok(Json(OkResponse::ok()))
}

#[instrument(skip(state))]
pub async fn clear_all(State(state): State<AppState>) -> AppResult<Json<OkResponse>> {
    services::clear_all(&state).await?;
    info!("timesheet cleared");
    Ok(Json(OkResponse::ok()))
}
