use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{CuratorRatingEntry, MovieId, Rater, Rating, UserId};
use crate::services::aggregation::AggregationEngine;
use crate::store::{MovieCatalog, RatingStore};

/// User score bounds (the curator channel uses a 1-100 scale instead)
pub const USER_SCORE_MIN: i32 = 1;
pub const USER_SCORE_MAX: i32 = 10;

/// Rating operations for both channels
///
/// Score validation happens here, before the store, which is deliberately
/// scale-agnostic. Every mutation refreshes the movie's denormalized
/// aggregates.
pub struct RatingService {
    catalog: Arc<dyn MovieCatalog>,
    ratings: Arc<dyn RatingStore>,
    aggregation: Arc<AggregationEngine>,
}

impl RatingService {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        ratings: Arc<dyn RatingStore>,
        aggregation: Arc<AggregationEngine>,
    ) -> Self {
        Self {
            catalog,
            ratings,
            aggregation,
        }
    }

    /// Creates or overwrites a user's rating for a local movie
    pub async fn rate(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        score: i32,
    ) -> AppResult<Rating> {
        if !(USER_SCORE_MIN..=USER_SCORE_MAX).contains(&score) {
            return Err(AppError::InvalidInput(format!(
                "Score must be {}-{}",
                USER_SCORE_MIN, USER_SCORE_MAX
            )));
        }

        if self.catalog.find_by_id(movie_id).await?.is_none() {
            return Err(AppError::NotFound(format!("No movie with id {}", movie_id)));
        }

        let rating = self
            .ratings
            .upsert(Rater::User(user_id), movie_id, score)
            .await?;
        self.aggregation.refresh_movie_aggregates(movie_id).await?;

        Ok(rating)
    }

    pub async fn get(&self, user_id: UserId, movie_id: MovieId) -> AppResult<Option<Rating>> {
        self.ratings.get(Rater::User(user_id), movie_id).await
    }

    pub async fn list_by_user(&self, user_id: UserId) -> AppResult<Vec<Rating>> {
        self.ratings.list_for_rater(Rater::User(user_id)).await
    }

    /// Returns false when the pair never existed; aggregates are untouched
    /// in that case
    pub async fn remove(&self, user_id: UserId, movie_id: MovieId) -> AppResult<bool> {
        self.remove_for(Rater::User(user_id), movie_id).await
    }

    /// Removes the curator rating for a movie
    pub async fn remove_curator(&self, movie_id: MovieId) -> AppResult<bool> {
        self.remove_for(Rater::Curator, movie_id).await
    }

    /// All curator ratings joined with movie info, highest score first
    pub async fn list_curator(&self) -> AppResult<Vec<CuratorRatingEntry>> {
        let ratings = self.ratings.list_for_rater(Rater::Curator).await?;

        let mut entries = Vec::with_capacity(ratings.len());
        for rating in ratings {
            if let Some(movie) = self.catalog.find_by_id(rating.movie_id).await? {
                entries.push(CuratorRatingEntry {
                    movie_id: movie.movie_id,
                    external_id: movie.external_id,
                    title: movie.title,
                    poster_url: movie.poster_url,
                    score: rating.score,
                });
            }
        }
        entries.sort_by(|a, b| b.score.cmp(&a.score));

        Ok(entries)
    }

    async fn remove_for(&self, rater: Rater, movie_id: MovieId) -> AppResult<bool> {
        let removed = self.ratings.remove(rater, movie_id).await?;
        if removed {
            self.aggregation.refresh_movie_aggregates(movie_id).await?;
        }
        Ok(removed)
    }
}
