//! Dex ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch pipeline that pulls pokemon from PokeAPI and loads them into a
//! relational catalog.
//!
//! # Stages
//!
//! - **Extract** ([`extract`]): HTTP fetch with retry and backoff, following
//!   species and evolution-chain links
//! - **Transform** ([`transform`]): pure mapping of raw JSON to records
//! - **Load** ([`load`]): one transaction per pokemon with upserts
//! - **Orchestrate** ([`pipeline`]): bounded concurrent fetch, serialized load
//!
//! # Example
//!
//! ```no_run
//! use dex_etl::{config::Config, db, pipeline::EtlPipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let pipeline = EtlPipeline::from_config(&config, pool.clone())?;
//!
//!     let report = pipeline.run(config.pipeline.range, &CancellationToken::new()).await;
//!     println!("loaded {} pokemon", report.loaded);
//!
//!     db::close_pool(&pool).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod transform;

pub use error::{EtlError, EtlResult, LoadError};
pub use extract::PokeApiClient;
pub use load::{LoadSummary, Loader};
pub use models::{IdRange, RawPokemon, TransformedPokemon};
pub use pipeline::{EtlPipeline, PipelineReport};
