use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{MovieId, Rating, UserId};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub score: i32,
}

/// Handler for creating or overwriting a user rating
pub async fn upsert(
    State(state): State<AppState>,
    Json(request): Json<RateRequest>,
) -> AppResult<Json<Rating>> {
    let rating = state
        .ratings
        .rate(request.user_id, request.movie_id, request.score)
        .await?;
    Ok(Json(rating))
}

/// Handler for fetching one user's rating of one movie
pub async fn get_one(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(UserId, MovieId)>,
) -> AppResult<Json<Rating>> {
    let rating = state.ratings.get(user_id, movie_id).await?.ok_or_else(|| {
        AppError::NotFound(format!(
            "No rating by user {} for movie {}",
            user_id, movie_id
        ))
    })?;
    Ok(Json(rating))
}

/// Handler for listing all of one user's ratings
pub async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Vec<Rating>>> {
    let ratings = state.ratings.list_by_user(user_id).await?;
    Ok(Json(ratings))
}

/// Handler for removing a rating; 404 when the pair never existed
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, movie_id)): Path<(UserId, MovieId)>,
) -> AppResult<StatusCode> {
    let removed = state.ratings.remove(user_id, movie_id).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "No rating by user {} for movie {}",
            user_id, movie_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
