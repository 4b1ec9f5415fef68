use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{CuratorRatingEntry, MovieId};
use crate::state::AppState;

/// Handler for listing curator ratings with movie info, highest score first
pub async fn list_curator(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CuratorRatingEntry>>> {
    let entries = state.ratings.list_curator().await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub external_id: String,
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub movie_id: MovieId,
}

/// Handler for the auto-ingest path: ensure the movie exists locally and
/// upsert its curator rating
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> AppResult<Json<IngestResponse>> {
    let movie_id = state
        .ingestion
        .ingest_curator_rating(&request.external_id, request.score)
        .await?;
    Ok(Json(IngestResponse { movie_id }))
}

/// Handler for removing the curator rating of a movie
pub async fn remove(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
) -> AppResult<StatusCode> {
    let removed = state.ratings.remove_curator(movie_id).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "No curator rating for movie {}",
            movie_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
