use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{Movie, MovieDetail, MovieId, Rater, SearchEntry, UserId};
use crate::services::providers::MetadataProvider;
use crate::store::{MovieCatalog, RatingStore};

/// Resolves identity between local catalog records and external metadata
///
/// Search produces one merged candidate list: local matches first (they carry
/// rating context), external hits appended and tagged not-yet-ingested. No
/// cross-source de-duplication is attempted when a local record has no
/// external id; such a title legitimately appears twice, once per origin,
/// and downstream consumers expect that.
pub struct IdentityResolver {
    catalog: Arc<dyn MovieCatalog>,
    ratings: Arc<dyn RatingStore>,
    provider: Arc<dyn MetadataProvider>,
}

impl IdentityResolver {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        ratings: Arc<dyn RatingStore>,
        provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            catalog,
            ratings,
            provider,
        }
    }

    /// Merged local+external candidate list for a free-text query
    pub async fn resolve_search(&self, query: &str) -> AppResult<Vec<SearchEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let local = self.catalog.search_title(query).await?;
        let mut entries: Vec<SearchEntry> = local.iter().map(SearchEntry::from).collect();

        match self.provider.search(query).await {
            Ok(hits) => entries.extend(hits.into_iter().map(SearchEntry::from)),
            // An unreachable provider degrades the merge to local-only
            // results; it must not take the whole search down
            Err(AppError::Upstream(msg)) => {
                tracing::warn!(
                    query = %query,
                    error = %msg,
                    "Metadata provider search failed; serving local results only"
                );
            }
            Err(e) => return Err(e),
        }

        tracing::debug!(
            query = %query,
            local = local.len(),
            merged = entries.len(),
            "Search merge completed"
        );

        Ok(entries)
    }

    /// Exact-identity lookup: a local surrogate key if one matches, otherwise
    /// the id is treated as an external identifier.
    ///
    /// Fails with `NotFound` only when both lookups miss.
    pub async fn get_detail(&self, id: &str, viewer: Option<UserId>) -> AppResult<MovieDetail> {
        if let Ok(movie_id) = id.parse::<MovieId>() {
            if let Some(movie) = self.catalog.find_by_id(movie_id).await? {
                return self.local_detail(movie, viewer).await;
            }
        }

        let detail = match self.provider.get_by_id(id).await {
            Ok(detail) => detail,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound(format!(
                    "No local or external movie with id {}",
                    id
                )))
            }
            Err(e) => return Err(e),
        };

        let release_year = detail.release_year();
        Ok(MovieDetail {
            movie_id: None,
            external_id: Some(detail.external_id),
            title: detail.title,
            poster_url: detail.poster_path,
            overview: detail.overview,
            release_year,
            cast: detail.cast,
            user_rating: None,
            curator_rating: None,
        })
    }

    async fn local_detail(&self, movie: Movie, viewer: Option<UserId>) -> AppResult<MovieDetail> {
        let mut overview = movie.overview.clone();
        let mut cast = Vec::new();

        // Cast credits live only upstream; enrichment failure falls back to
        // the persisted fields
        if let Some(external_id) = &movie.external_id {
            match self.provider.get_by_id(external_id).await {
                Ok(detail) => {
                    overview = detail.overview.or(overview);
                    cast = detail.cast;
                }
                Err(e) => {
                    tracing::warn!(
                        movie_id = movie.movie_id,
                        external_id = %external_id,
                        error = %e,
                        "Detail enrichment failed; serving local fields only"
                    );
                }
            }
        }

        let user_rating = match viewer {
            Some(user_id) => self
                .ratings
                .get(Rater::User(user_id), movie.movie_id)
                .await?
                .map(|r| r.score),
            None => None,
        };
        let curator_rating = self
            .ratings
            .get(Rater::Curator, movie.movie_id)
            .await?
            .map(|r| r.score);

        Ok(MovieDetail {
            movie_id: Some(movie.movie_id),
            external_id: movie.external_id,
            title: movie.title,
            poster_url: movie.poster_url,
            overview,
            release_year: movie.release_year,
            cast,
            user_rating,
            curator_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CastMember, ExternalDetail, ExternalSearchHit, NewMovie, SearchOrigin};
    use crate::services::providers::MockMetadataProvider;
    use crate::store::{MemoryCatalog, MemoryRatingStore};

    fn new_movie(title: &str, external_id: Option<&str>, year: Option<i32>) -> NewMovie {
        NewMovie {
            external_id: external_id.map(str::to_string),
            title: title.to_string(),
            poster_url: None,
            overview: None,
            release_year: year,
        }
    }

    fn hit(external_id: &str, title: &str, date: &str) -> ExternalSearchHit {
        ExternalSearchHit {
            external_id: external_id.to_string(),
            title: title.to_string(),
            poster_path: None,
            release_date: Some(date.to_string()),
        }
    }

    fn resolver_with(
        provider: MockMetadataProvider,
    ) -> (Arc<MemoryCatalog>, Arc<MemoryRatingStore>, IdentityResolver) {
        let catalog = Arc::new(MemoryCatalog::new());
        let ratings = Arc::new(MemoryRatingStore::new());
        let resolver =
            IdentityResolver::new(catalog.clone(), ratings.clone(), Arc::new(provider));
        (catalog, ratings, resolver)
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_any_lookup() {
        let provider = MockMetadataProvider::new();
        let (_, _, resolver) = resolver_with(provider);

        let result = resolver.resolve_search("  ").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_merge_lists_local_first_then_external() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .returning(|_| Ok(vec![hit("27205", "Inception", "2010-07-16")]));
        let (catalog, _, resolver) = resolver_with(provider);

        catalog
            .insert(new_movie("Inception Fan Cut", None, Some(2012)))
            .await
            .unwrap();

        let entries = resolver.resolve_search("inception").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].origin, SearchOrigin::Local);
        assert_eq!(entries[0].title, "Inception Fan Cut");
        assert_eq!(entries[1].origin, SearchOrigin::External);
        assert_eq!(entries[1].movie_id, None);
    }

    #[tokio::test]
    async fn test_merge_keeps_unlinked_duplicate_titles() {
        // The same real-world movie exists locally without an external id
        // and externally with one; both entries survive, unmerged
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .returning(|_| Ok(vec![hit("27205", "Inception", "2010-07-16")]));
        let (catalog, _, resolver) = resolver_with(provider);

        catalog
            .insert(new_movie("Inception", None, Some(2010)))
            .await
            .unwrap();

        let entries = resolver.resolve_search("Inception").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].external_id, None);
        assert_eq!(entries[1].external_id, Some("27205".to_string()));
    }

    #[tokio::test]
    async fn test_provider_outage_degrades_to_local_results() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_search()
            .returning(|_| Err(AppError::Upstream("connection refused".to_string())));
        let (catalog, _, resolver) = resolver_with(provider);

        catalog
            .insert(new_movie("Inception", None, Some(2010)))
            .await
            .unwrap();

        let entries = resolver.resolve_search("Inception").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, SearchOrigin::Local);
    }

    #[tokio::test]
    async fn test_detail_for_local_movie_attaches_ratings_and_cast() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_get_by_id().returning(|_| {
            Ok(ExternalDetail {
                external_id: "27205".to_string(),
                title: "Inception".to_string(),
                poster_path: None,
                overview: Some("Dreams within dreams".to_string()),
                release_date: Some("2010-07-16".to_string()),
                cast: vec![CastMember {
                    name: "Leonardo DiCaprio".to_string(),
                    character: "Cobb".to_string(),
                }],
            })
        });
        let (catalog, ratings, resolver) = resolver_with(provider);

        let movie_id = catalog
            .insert(new_movie("Inception", Some("27205"), Some(2010)))
            .await
            .unwrap();
        ratings.upsert(Rater::User(5), movie_id, 9).await.unwrap();
        ratings.upsert(Rater::Curator, movie_id, 97).await.unwrap();

        let detail = resolver
            .get_detail(&movie_id.to_string(), Some(5))
            .await
            .unwrap();
        assert_eq!(detail.movie_id, Some(movie_id));
        assert_eq!(detail.user_rating, Some(9));
        assert_eq!(detail.curator_rating, Some(97));
        assert_eq!(detail.cast.len(), 1);
        assert_eq!(detail.overview, Some("Dreams within dreams".to_string()));
    }

    #[tokio::test]
    async fn test_detail_enrichment_outage_serves_local_fields() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_get_by_id()
            .returning(|_| Err(AppError::Upstream("timeout".to_string())));
        let (catalog, _, resolver) = resolver_with(provider);

        let movie_id = catalog
            .insert(NewMovie {
                external_id: Some("27205".to_string()),
                title: "Inception".to_string(),
                poster_url: Some("/p.jpg".to_string()),
                overview: Some("Stored overview".to_string()),
                release_year: Some(2010),
            })
            .await
            .unwrap();

        let detail = resolver
            .get_detail(&movie_id.to_string(), None)
            .await
            .unwrap();
        assert_eq!(detail.title, "Inception");
        assert_eq!(detail.overview, Some("Stored overview".to_string()));
        assert!(detail.cast.is_empty());
    }

    #[tokio::test]
    async fn test_detail_falls_back_to_external_identifier() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_get_by_id().returning(|id| {
            assert_eq!(id, "27205");
            Ok(ExternalDetail {
                external_id: "27205".to_string(),
                title: "Inception".to_string(),
                poster_path: None,
                overview: None,
                release_date: Some("2010-07-16".to_string()),
                cast: vec![],
            })
        });
        let (_, _, resolver) = resolver_with(provider);

        let detail = resolver.get_detail("27205", None).await.unwrap();
        assert_eq!(detail.movie_id, None);
        assert_eq!(detail.external_id, Some("27205".to_string()));
        assert_eq!(detail.release_year, Some(2010));
    }

    #[tokio::test]
    async fn test_detail_not_found_anywhere() {
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_get_by_id()
            .returning(|id| Err(AppError::NotFound(format!("no movie {}", id))));
        let (_, _, resolver) = resolver_with(provider);

        let result = resolver.get_detail("99999", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
