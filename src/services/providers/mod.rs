/// External metadata provider abstraction
///
/// The provider knows nothing about local surrogate keys; it only speaks
/// external identifiers. Failures are split per the error taxonomy: an
/// unknown id is `NotFound`, transport problems and 5xx responses are
/// `Upstream`, and callers decide whether to degrade or propagate.
use crate::{
    error::AppResult,
    models::{ExternalDetail, ExternalSearchHit},
};

pub mod tmdb;

/// Trait for movie metadata providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Free-text movie search
    async fn search(&self, query: &str) -> AppResult<Vec<ExternalSearchHit>>;

    /// Full detail (with cast credits) for one external id
    ///
    /// Fails with `NotFound` when the provider does not know the id.
    async fn get_by_id(&self, external_id: &str) -> AppResult<ExternalDetail>;

    /// The provider's trending feed
    async fn trending(&self) -> AppResult<Vec<ExternalSearchHit>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
