//! Batch orchestration
//!
//! Fetches run concurrently (bounded, order preserving); transform and load
//! run one pokemon at a time in ID order. A failure on one pokemon is logged
//! and counted, and the batch moves on.

use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::EtlResult;
use crate::extract::PokeApiClient;
use crate::load::Loader;
use crate::models::{IdRange, RawPokemon};
use crate::transform::transform;

/// Outcome counts of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub start_id: i64,
    pub end_id: i64,
    /// IDs in the requested range
    pub requested: usize,
    /// Pokemon whose primary document was fetched
    pub extracted: usize,
    pub loaded: usize,
    /// NotFound upstream, or nothing to load after transform
    pub skipped: usize,
    /// Rejected by the loader
    pub failed: usize,
    /// Stopped early on request
    pub cancelled: bool,
    /// Never started processing (invalid range or schema provisioning failed)
    pub aborted: bool,
    pub duration_seconds: f64,
}

impl PipelineReport {
    fn new(range: IdRange) -> Self {
        Self {
            start_id: range.start,
            end_id: range.end,
            requested: range.len(),
            ..Self::default()
        }
    }

    /// A run succeeds when it was not aborted and loaded at least one pokemon
    pub fn is_success(&self) -> bool {
        !self.aborted && self.loaded > 0
    }

    /// IDs that reached the end of the pipeline, whatever the outcome
    pub fn processed(&self) -> usize {
        self.skipped + self.loaded + self.failed
    }
}

/// Extract, transform and load a range of pokemon
#[derive(Clone)]
pub struct EtlPipeline {
    client: PokeApiClient,
    loader: Loader,
    fetch_concurrency: usize,
}

impl EtlPipeline {
    pub fn new(client: PokeApiClient, loader: Loader, fetch_concurrency: usize) -> Self {
        Self {
            client,
            loader,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config, pool: SqlitePool) -> EtlResult<Self> {
        let client = PokeApiClient::new(config.api.clone())?;
        Ok(Self::new(
            client,
            Loader::new(pool),
            config.pipeline.fetch_concurrency,
        ))
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Run the batch over `range`
    ///
    /// The schema is provisioned before any fetch. Cancellation is honoured
    /// between pokemon; a load in progress always commits or rolls back first.
    pub async fn run(&self, range: IdRange, cancel: &CancellationToken) -> PipelineReport {
        let started = Instant::now();
        let mut report = PipelineReport::new(range);

        info!(
            range = %range,
            fetch_concurrency = self.fetch_concurrency,
            "Starting ETL run"
        );

        if let Err(e) = range.validate() {
            error!(range = %range, error = %e, "Invalid id range, aborting run");
            report.aborted = true;
            return report;
        }

        if let Err(e) = db::provision_schema(self.loader.pool()).await {
            error!(error = %e, "Store is not ready, aborting run");
            report.aborted = true;
            return report;
        }

        let client = &self.client;
        let mut fetched = std::pin::pin!(stream::iter(range.ids())
            .map(|pokemon_id| async move { (pokemon_id, client.extract(pokemon_id).await) })
            .buffered(self.fetch_concurrency));

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(processed = report.processed(), "Run cancelled, stopping before next pokemon");
                    report.cancelled = true;
                    break;
                },
                next = fetched.next() => next,
            };

            let Some((pokemon_id, raw)) = next else {
                break;
            };

            self.process(pokemon_id, raw, &mut report).await;
        }

        report.duration_seconds = started.elapsed().as_secs_f64();

        info!(
            requested = report.requested,
            extracted = report.extracted,
            loaded = report.loaded,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            duration_secs = report.duration_seconds,
            "ETL run finished"
        );

        report
    }

    async fn process(&self, pokemon_id: i64, raw: Option<RawPokemon>, report: &mut PipelineReport) {
        let Some(raw) = raw else {
            report.skipped += 1;
            return;
        };
        report.extracted += 1;

        let transformed = transform(&raw);
        if transformed.pokemon.is_none() {
            warn!(pokemon_id, "Nothing to load after transform, skipping");
            report.skipped += 1;
            return;
        }

        match self.loader.load(&transformed).await {
            Ok(_) => report.loaded += 1,
            Err(e) => {
                error!(pokemon_id, error = %e, "Skipping pokemon after load failure");
                report.failed += 1;
            },
        }
    }
}
