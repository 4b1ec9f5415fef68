use std::sync::Arc;

use crate::services::aggregation::AggregationEngine;
use crate::services::import::CsvImporter;
use crate::services::ingestion::IngestionService;
use crate::services::providers::MetadataProvider;
use crate::services::ratings::RatingService;
use crate::services::resolver::IdentityResolver;
use crate::store::{MovieCatalog, RatingStore};

/// Shared application state: the engine services wired over one catalog, one
/// rating store and one metadata provider.
///
/// Everything hangs off the three ports, so production (Postgres + TMDB) and
/// tests (in-memory stores + scripted provider) build the same state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn MovieCatalog>,
    pub provider: Arc<dyn MetadataProvider>,
    pub resolver: Arc<IdentityResolver>,
    pub aggregation: Arc<AggregationEngine>,
    pub ratings: Arc<RatingService>,
    pub ingestion: Arc<IngestionService>,
    pub importer: Arc<CsvImporter>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn MovieCatalog>,
        ratings: Arc<dyn RatingStore>,
        provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        let aggregation = Arc::new(AggregationEngine::new(catalog.clone(), ratings.clone()));
        let resolver = Arc::new(IdentityResolver::new(
            catalog.clone(),
            ratings.clone(),
            provider.clone(),
        ));
        let rating_service = Arc::new(RatingService::new(
            catalog.clone(),
            ratings.clone(),
            aggregation.clone(),
        ));
        let ingestion = Arc::new(IngestionService::new(
            catalog.clone(),
            ratings.clone(),
            provider.clone(),
            aggregation.clone(),
        ));
        let importer = Arc::new(CsvImporter::new(
            catalog.clone(),
            ratings,
            provider.clone(),
            aggregation.clone(),
        ));

        Self {
            catalog,
            provider,
            resolver,
            aggregation,
            ratings: rating_service,
            ingestion,
            importer,
        }
    }
}
