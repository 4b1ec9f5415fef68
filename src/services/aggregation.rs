use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{MovieId, Rater, Rating, TrendingEntry};
use crate::store::{MovieCatalog, RatingStore};

/// Derives aggregate views from rating rows
///
/// Aggregates are always computed from the rating rows at read time; the
/// denormalized columns on the movie row are a convenience copy that this
/// engine refreshes after every rating mutation.
pub struct AggregationEngine {
    catalog: Arc<dyn MovieCatalog>,
    ratings: Arc<dyn RatingStore>,
}

impl AggregationEngine {
    pub fn new(catalog: Arc<dyn MovieCatalog>, ratings: Arc<dyn RatingStore>) -> Self {
        Self { catalog, ratings }
    }

    /// Mean score and row count over every rating for the movie.
    ///
    /// The curator rating participates in this pool; callers wanting a
    /// curator-free average must filter `list_for_movie` themselves.
    pub async fn average_and_count(&self, movie_id: MovieId) -> AppResult<(f64, i32)> {
        let rows = self.ratings.list_for_movie(movie_id).await?;
        Ok(average_of(&rows))
    }

    /// The curator's score for the movie, if one exists.
    ///
    /// This is not an aggregate: it is surfaced separately and never stands
    /// in for the user average.
    pub async fn curator_rating(&self, movie_id: MovieId) -> AppResult<Option<i32>> {
        let rating = self.ratings.get(Rater::Curator, movie_id).await?;
        Ok(rating.map(|r| r.score))
    }

    /// Recomputes the denormalized aggregate columns for one movie
    pub async fn refresh_movie_aggregates(&self, movie_id: MovieId) -> AppResult<()> {
        let (average, count) = self.average_and_count(movie_id).await?;
        self.catalog.update_aggregates(movie_id, average, count).await
    }

    /// Ranked trending view over all current ratings
    ///
    /// Highest average first, ties broken by rating count. A single
    /// 100-score rating does not outrank ten 95s: the count only matters
    /// among equal averages. Deliberately not confidence-adjusted.
    pub async fn trending(&self, limit: usize) -> AppResult<Vec<TrendingEntry>> {
        let all = self.ratings.list_all().await?;
        let ranked = rank_by_average(&all, limit);

        let mut entries = Vec::with_capacity(ranked.len());
        for (movie_id, average, count) in ranked {
            // A rating row without its movie means a torn-down fixture or a
            // mid-delete race; skip rather than fail the whole view
            if let Some(movie) = self.catalog.find_by_id(movie_id).await? {
                entries.push(TrendingEntry {
                    movie_id,
                    external_id: movie.external_id,
                    title: movie.title,
                    poster_url: movie.poster_url,
                    average_rating: average,
                    rating_count: count,
                });
            }
        }

        Ok(entries)
    }
}

/// Mean and count of a rating slice; (0.0, 0) when empty
pub fn average_of(rows: &[Rating]) -> (f64, i32) {
    if rows.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = rows.iter().map(|r| i64::from(r.score)).sum();
    (sum as f64 / rows.len() as f64, rows.len() as i32)
}

/// Groups ratings by movie and ranks them: average descending, count
/// descending among equal averages, movie id as the final stable key
fn rank_by_average(rows: &[Rating], limit: usize) -> Vec<(MovieId, f64, i32)> {
    let mut per_movie: HashMap<MovieId, (i64, i32)> = HashMap::new();
    for rating in rows {
        let entry = per_movie.entry(rating.movie_id).or_insert((0, 0));
        entry.0 += i64::from(rating.score);
        entry.1 += 1;
    }

    let mut ranked: Vec<(MovieId, f64, i32)> = per_movie
        .into_iter()
        .map(|(movie_id, (sum, count))| (movie_id, sum as f64 / f64::from(count), count))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(b.2.cmp(&a.2))
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(limit);
    ranked
}
