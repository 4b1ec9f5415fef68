use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{MovieId, NewMovie, Rater, UserId};
use crate::services::aggregation::AggregationEngine;
use crate::services::providers::MetadataProvider;
use crate::store::{MovieCatalog, RatingStore};

/// One CSV row: `Title,Year,Rating`
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Title")]
    title: String,
    #[serde(alias = "Year")]
    year: i32,
    #[serde(alias = "Rating")]
    rating: i32,
}

/// What happened to one input row
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome {
    /// The rating was upserted against this local movie
    Imported { movie_id: MovieId },
    /// No local or external match; nothing was written
    Skipped { reason: String },
    /// The row was malformed or a store/provider call failed
    Failed { reason: String },
}

/// Import summary: totals plus one outcome per input row, in input order
#[derive(Debug, Clone, Serialize, Default)]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl ImportReport {
    fn record(&mut self, outcome: RowOutcome) {
        self.total_rows += 1;
        match &outcome {
            RowOutcome::Imported { .. } => self.imported += 1,
            RowOutcome::Skipped { .. } => self.skipped += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Bulk-imports historical ratings from CSV by fuzzy title+year matching
///
/// Each row resolves to a local movie (exact title+year), or to an external
/// hit with the same year and case-insensitively equal title which is then
/// ingested, or to nothing. A row that resolves to nothing writes nothing;
/// a later row for the same movie overwrites an earlier one (plain upsert
/// semantics). No row failure aborts the rest of the stream: the whole
/// file is always processed and every row's outcome is reported.
pub struct CsvImporter {
    catalog: Arc<dyn MovieCatalog>,
    ratings: Arc<dyn RatingStore>,
    provider: Arc<dyn MetadataProvider>,
    aggregation: Arc<AggregationEngine>,
}

impl CsvImporter {
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

    /// Processes an entire CSV document for one target user
    pub async fn import(&self, data: &[u8], user_id: UserId) -> AppResult<ImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(data);

        let mut report = ImportReport::default();

        for row in reader.deserialize::<CsvRow>() {
            let outcome = match row {
                Ok(row) => self.import_row(row, user_id).await,
                Err(e) => RowOutcome::Failed {
                    reason: format!("malformed row: {}", e),
                },
            };
            report.record(outcome);
        }

        tracing::info!(
            user_id = user_id,
            total = report.total_rows,
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            "CSV import completed"
        );

        Ok(report)
    }

    async fn import_row(&self, row: CsvRow, user_id: UserId) -> RowOutcome {
        let title = row.title.trim();
        if title.is_empty() {
            return RowOutcome::Skipped {
                reason: "blank title".to_string(),
            };
        }

        let movie_id = match self.resolve_row(title, row.year).await {
            Ok(Some(movie_id)) => movie_id,
            Ok(None) => {
                return RowOutcome::Skipped {
                    reason: format!("no match for \"{}\" ({})", title, row.year),
                }
            }
            Err(e) => {
                return RowOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if let Err(e) = self
            .ratings
            .upsert(Rater::User(user_id), movie_id, row.rating)
            .await
        {
            return RowOutcome::Failed {
                reason: e.to_string(),
            };
        }

        match self.aggregation.refresh_movie_aggregates(movie_id).await {
            Ok(()) => RowOutcome::Imported { movie_id },
            Err(e) => RowOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Local exact title+year match, else the first external hit with the
    /// same year and a case-insensitively equal title (ingested on the spot)
    async fn resolve_row(&self, title: &str, year: i32) -> AppResult<Option<MovieId>> {
        if let Some(movie) = self.catalog.find_by_title_year(title, year).await? {
            return Ok(Some(movie.movie_id));
        }

        let hits = self.provider.search(title).await?;
        let matched = hits.into_iter().find(|hit| {
            hit.release_year() == Some(year) && hit.title.eq_ignore_ascii_case(title)
        });

        let Some(hit) = matched else {
            return Ok(None);
        };

        let external_id = hit.external_id.clone();
        match self.catalog.insert(NewMovie::from(hit)).await {
            Ok(movie_id) => Ok(Some(movie_id)),
            // A concurrent import (or ingest) of the same movie won the
            // insert; use its row
            Err(AppError::Conflict(_)) => Ok(self
                .catalog
                .find_by_external_id(&external_id)
                .await?
                .map(|m| m.movie_id)),
            Err(e) => Err(e),
        }
    }
}
