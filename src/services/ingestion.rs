use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{MovieId, NewMovie, Rater};
use crate::services::aggregation::AggregationEngine;
use crate::services::providers::MetadataProvider;
use crate::store::{MovieCatalog, RatingStore};

/// Curator score bounds (the user channel uses a 1-10 scale instead)
pub const CURATOR_SCORE_MIN: i32 = 1;
pub const CURATOR_SCORE_MAX: i32 = 100;

/// Materializes local movies from external metadata on first reference
///
/// The auto-ingest path: given an external id and a curator score, make sure
/// a local movie row exists (creating it from provider detail if needed) and
/// upsert the curator rating against it. Repeating a call with the same
/// external id resolves to the same local row and only re-runs the upsert.
pub struct IngestionService {
    catalog: Arc<dyn MovieCatalog>,
    ratings: Arc<dyn RatingStore>,
    provider: Arc<dyn MetadataProvider>,
    aggregation: Arc<AggregationEngine>,
}

impl IngestionService {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        ratings: Arc<dyn RatingStore>,
        provider: Arc<dyn MetadataProvider>,
        aggregation: Arc<AggregationEngine>,
    ) -> Self {
        Self {
            catalog,
            ratings,
            provider,
            aggregation,
        }
    }

    /// Ensures the movie exists locally and upserts its curator rating,
    /// returning the (stable) local movie id
    pub async fn ingest_curator_rating(
        &self,
        external_id: &str,
        score: i32,
    ) -> AppResult<MovieId> {
        if !(CURATOR_SCORE_MIN..=CURATOR_SCORE_MAX).contains(&score) {
            return Err(AppError::InvalidInput(format!(
                "Curator score must be {}-{}",
                CURATOR_SCORE_MIN, CURATOR_SCORE_MAX
            )));
        }

        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(AppError::InvalidInput(
                "External id cannot be empty".to_string(),
            ));
        }

        let movie_id = self.ensure_local(external_id).await?;
        self.ratings
            .upsert(Rater::Curator, movie_id, score)
            .await?;
        self.aggregation.refresh_movie_aggregates(movie_id).await?;

        tracing::info!(
            external_id = %external_id,
            movie_id = movie_id,
            score = score,
            "Curator rating ingested"
        );

        Ok(movie_id)
    }

    /// Resolves an external id to a local movie, creating the row if needed.
    ///
    /// The provider fetch happens before any write. A `Conflict` from the
    /// insert means a concurrent ingest created the row between our lookup
    /// and our insert; re-entering at the lookup finds it.
    async fn ensure_local(&self, external_id: &str) -> AppResult<MovieId> {
        let mut conflicts = 0;
        loop {
            if let Some(movie) = self.catalog.find_by_external_id(external_id).await? {
                return Ok(movie.movie_id);
            }

            let detail = self.provider.get_by_id(external_id).await?;

            match self.catalog.insert(NewMovie::from(detail)).await {
                Ok(movie_id) => return Ok(movie_id),
                Err(AppError::Conflict(msg)) if conflicts < 2 => {
                    conflicts += 1;
                    tracing::debug!(
                        external_id = %external_id,
                        "Concurrent ingest won the insert race; re-resolving ({})",
                        msg
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalDetail, Movie};
    use crate::services::providers::MockMetadataProvider;
    use crate::store::{MemoryCatalog, MemoryRatingStore, MockMovieCatalog};

    fn detail(external_id: &str, title: &str) -> ExternalDetail {
        ExternalDetail {
            external_id: external_id.to_string(),
            title: title.to_string(),
            poster_path: Some("/poster.jpg".to_string()),
            overview: Some("An overview".to_string()),
            release_date: Some("2010-07-16".to_string()),
            cast: vec![],
        }
    }

    fn service_with(
        provider: MockMetadataProvider,
    ) -> (Arc<MemoryCatalog>, Arc<MemoryRatingStore>, IngestionService) {
        let catalog = Arc::new(MemoryCatalog::new());
        let ratings = Arc::new(MemoryRatingStore::new());
        let aggregation = Arc::new(AggregationEngine::new(catalog.clone(), ratings.clone()));
        let service = IngestionService::new(
            catalog.clone(),
            ratings.clone(),
            Arc::new(provider),
            aggregation,
        );
        (catalog, ratings, service)
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected_without_provider_call() {
        let provider = MockMetadataProvider::new(); // panics if called
        let (_, _, service) = service_with(provider);

        for score in [0, 101, -5] {
            let result = service.ingest_curator_rating("27205", score).await;
            assert!(matches!(result, Err(AppError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_ingest_creates_movie_from_provider_detail() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_get_by_id()
            .times(1)
            .returning(|id| Ok(detail(id, "Inception")));
        let (catalog, ratings, service) = service_with(provider);

        let movie_id = service.ingest_curator_rating("27205", 97).await.unwrap();

        let movie = catalog.find_by_id(movie_id).await.unwrap().unwrap();
        assert_eq!(movie.external_id, Some("27205".to_string()));
        assert_eq!(movie.title, "Inception");
        assert_eq!(movie.release_year, Some(2010));

        let rating = ratings.get(Rater::Curator, movie_id).await.unwrap().unwrap();
        assert_eq!(rating.score, 97);
    }

    #[tokio::test]
    async fn test_repeat_ingest_is_idempotent() {
        let mut provider = MockMetadataProvider::new();
        // the second call must resolve locally without touching the provider
        provider
            .expect_get_by_id()
            .times(1)
            .returning(|id| Ok(detail(id, "Inception")));
        let (catalog, ratings, service) = service_with(provider);

        let first = service.ingest_curator_rating("27205", 80).await.unwrap();
        let second = service.ingest_curator_rating("27205", 95).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            catalog.search_title("Inception").await.unwrap().len(),
            1,
            "repeat ingest must not duplicate the movie row"
        );

        let rating = ratings.get(Rater::Curator, first).await.unwrap().unwrap();
        assert_eq!(rating.score, 95, "latest score wins");
        assert_eq!(ratings.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_not_found_propagates() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_get_by_id()
            .returning(|id| Err(AppError::NotFound(format!("no movie {}", id))));
        let (catalog, _, service) = service_with(provider);

        let result = service.ingest_curator_rating("404404", 50).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(catalog.search_title("a").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_insert_race_recovers_by_re_lookup() {
        // Scripted catalog: lookup misses, insert conflicts (someone else won
        // the race), second lookup finds the winner's row
        let mut catalog = MockMovieCatalog::new();
        let mut lookups = 0;
        catalog.expect_find_by_external_id().returning(move |_| {
            lookups += 1;
            if lookups == 1 {
                Ok(None)
            } else {
                Ok(Some(Movie {
                    movie_id: 41,
                    external_id: Some("27205".to_string()),
                    title: "Inception".to_string(),
                    poster_url: None,
                    overview: None,
                    release_year: Some(2010),
                    average_rating: 0.0,
                    rating_count: 0,
                }))
            }
        });
        catalog
            .expect_insert()
            .times(1)
            .returning(|_| Err(AppError::Conflict("external id taken".to_string())));
        catalog.expect_update_aggregates().returning(|_, _, _| Ok(()));

        let mut provider = MockMetadataProvider::new();
        provider
            .expect_get_by_id()
            .times(1)
            .returning(|id| Ok(detail(id, "Inception")));

        let catalog: Arc<dyn MovieCatalog> = Arc::new(catalog);
        let ratings = Arc::new(MemoryRatingStore::new());
        let aggregation = Arc::new(AggregationEngine::new(
            catalog.clone(),
            ratings.clone(),
        ));
        let service = IngestionService::new(
            catalog,
            ratings.clone(),
            Arc::new(provider),
            aggregation,
        );

        let movie_id = service.ingest_curator_rating("27205", 88).await.unwrap();
        assert_eq!(movie_id, 41);

        let rating = ratings.get(Rater::Curator, 41).await.unwrap().unwrap();
        assert_eq!(rating.score, 88);
    }
}
