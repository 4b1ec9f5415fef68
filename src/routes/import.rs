use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::UserId;
use crate::services::import::ImportReport;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    user_id: UserId,
}

/// Handler for the CSV bulk import; the body is the raw CSV document
pub async fn import_csv(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> AppResult<Json<ImportReport>> {
    let report = state.importer.import(body.as_bytes(), params.user_id).await?;
    Ok(Json(report))
}
