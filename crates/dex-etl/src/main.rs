//! Dex ETL - PokeAPI to SQL catalog loader

use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dex_common::logging::{init_logging, LogConfig, LogLevel};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dex_etl::{
    config::Config,
    db,
    models::IdRange,
    pipeline::EtlPipeline,
    server::{self, AppState},
};

#[derive(Parser, Debug)]
#[command(name = "dex-etl")]
#[command(author, version, about = "Load pokemon from PokeAPI into a SQL catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one batch and exit
    Run {
        /// First pokemon id (inclusive)
        #[arg(long, env = "ETL_START_ID")]
        start: Option<i64>,

        /// Last pokemon id (inclusive)
        #[arg(long, env = "ETL_END_ID")]
        end: Option<i64>,
    },

    /// Serve the HTTP trigger API
    Serve,
}

/// Crate logs follow the CLI level; dependencies stay quieter
fn filter_directives(level: LogLevel) -> String {
    format!("dex_etl={},tower_http=info,sqlx=warn", level)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dex-etl")
        .filter_directives(filter_directives(log_level))
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let config = Config::load()?;
    let pool = db::create_pool(&config.database).await?;
    let pipeline = EtlPipeline::from_config(&config, pool.clone())?;
    let shutdown = CancellationToken::new();

    let exit_code = match cli.command {
        Command::Run { start, end } => {
            let range = IdRange::new(
                start.unwrap_or(config.pipeline.range.start),
                end.unwrap_or(config.pipeline.range.end),
            )?;

            let cancel = shutdown.clone();
            tokio::spawn(async move {
                server::shutdown_signal().await;
                warn!("Cancelling run after the current pokemon");
                cancel.cancel();
            });

            let report = pipeline.run(range, &shutdown).await;
            if report.is_success() {
                info!(loaded = report.loaded, "ETL run succeeded");
                ExitCode::SUCCESS
            } else {
                error!(
                    loaded = report.loaded,
                    failed = report.failed,
                    aborted = report.aborted,
                    "ETL run failed"
                );
                ExitCode::FAILURE
            }
        },
        Command::Serve => {
            let addr: SocketAddr =
                format!("{}:{}", config.server.host, config.server.port).parse()?;
            let state = AppState::new(pipeline, config.pipeline.range, shutdown.clone());
            let app = server::create_router(state);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Trigger API listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    server::shutdown_signal().await;
                    shutdown.cancel();
                })
                .await?;

            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        },
    };

    db::close_pool(&pool).await;
    Ok(exit_code)
}
