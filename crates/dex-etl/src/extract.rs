//! PokeAPI fetcher
//!
//! Every request is a GET bounded by a connect timeout and an overall timeout.
//! Server errors, timeouts and connection failures are retried with
//! exponential backoff; anything left over is reported as NotFound (`None`)
//! so the caller can skip the resource and keep the batch going.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ApiConfig;
use crate::error::EtlResult;
use crate::models::RawPokemon;
use crate::transform::link_url;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Why a single attempt failed
#[derive(Debug)]
enum FetchFailure {
    Status(StatusCode),
    Timeout(reqwest::Error),
    Connect(reqwest::Error),
    Decode(serde_json::Error),
    Other(reqwest::Error),
}

impl FetchFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout(err)
        } else if err.is_connect() {
            FetchFailure::Connect(err)
        } else {
            FetchFailure::Other(err)
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            FetchFailure::Status(status) => status.is_server_error(),
            FetchFailure::Timeout(_) | FetchFailure::Connect(_) => true,
            FetchFailure::Decode(_) | FetchFailure::Other(_) => false,
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Status(status) => write!(f, "HTTP {}", status),
            FetchFailure::Timeout(e) => write!(f, "timed out: {}", e),
            FetchFailure::Connect(e) => write!(f, "connection error: {}", e),
            FetchFailure::Decode(e) => write!(f, "malformed JSON: {}", e),
            FetchFailure::Other(e) => write!(f, "request error: {}", e),
        }
    }
}

/// HTTP client for the PokeAPI catalog
#[derive(Clone)]
pub struct PokeApiClient {
    client: Client,
    config: ApiConfig,
}

impl PokeApiClient {
    pub fn new(config: ApiConfig) -> EtlResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `{base_url}pokemon/{id}`, tolerating a base URL without trailing slash
    pub fn pokemon_url(&self, pokemon_id: i64) -> String {
        format!("{}/pokemon/{}", self.config.base_url.trim_end_matches('/'), pokemon_id)
    }

    /// Fetch the primary pokemon document; `None` means NotFound
    pub async fn fetch_pokemon(&self, pokemon_id: i64) -> Option<Value> {
        let url = self.pokemon_url(pokemon_id);
        self.fetch_json(&url).await
    }

    /// Fetch a document through a URL embedded in a previously fetched one
    pub async fn fetch_linked(&self, url: &str) -> Option<Value> {
        if let Err(e) = url::Url::parse(url) {
            warn!(url, error = %e, "Linked resource URL is not absolute, skipping");
            return None;
        }
        self.fetch_json(url).await
    }

    /// Fetch the pokemon, then its species, then the species' evolution chain
    ///
    /// Returns `None` only when the primary document is unavailable. Missing
    /// links or unavailable linked documents leave the matching field empty.
    pub async fn extract(&self, pokemon_id: i64) -> Option<RawPokemon> {
        info!(pokemon_id, "Extracting pokemon");

        let Some(pokemon) = self.fetch_pokemon(pokemon_id).await else {
            warn!(pokemon_id, "Skipping pokemon: primary resource unavailable");
            return None;
        };

        let species = match link_url(&pokemon, "species") {
            Some(url) => self.fetch_linked(url).await,
            None => {
                warn!(pokemon_id, "Species URL not found, skipping species extraction");
                None
            },
        };

        let evolution_chain = match species.as_ref().and_then(|s| link_url(s, "evolution_chain")) {
            Some(url) => self.fetch_linked(url).await,
            None => {
                warn!(pokemon_id, "Evolution chain URL not found, skipping evolution chain extraction");
                None
            },
        };

        Some(RawPokemon {
            pokemon: Some(pokemon),
            species,
            evolution_chain,
        })
    }

    /// GET with retry; `None` once the failure is final
    async fn fetch_json(&self, url: &str) -> Option<Value> {
        let attempts = self.config.retries.saturating_add(1);

        for attempt in 1..=attempts {
            let failure = match self.try_fetch(url).await {
                Ok(value) => {
                    if !self.config.request_delay.is_zero() {
                        tokio::time::sleep(self.config.request_delay).await;
                    }
                    return Some(value);
                },
                Err(failure) => failure,
            };

            if !failure.is_retryable() {
                match failure {
                    FetchFailure::Status(status) if status == StatusCode::NOT_FOUND => {
                        warn!(url, "Resource not found (HTTP 404)");
                    },
                    other => error!(url, error = %other, "Request failed, not retrying"),
                }
                return None;
            }

            if attempt == attempts {
                error!(url, attempts, error = %failure, "Request failed after all retries");
                return None;
            }

            let backoff = self.backoff(attempt);
            warn!(
                url,
                attempt,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "Request failed, retrying"
            );
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
        }

        None
    }

    async fn try_fetch(&self, url: &str) -> Result<Value, FetchFailure> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await.map_err(FetchFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }

        let body = response.bytes().await.map_err(FetchFailure::from_reqwest)?;
        serde_json::from_slice(&body).map_err(FetchFailure::Decode)
    }

    /// `backoff_factor * 2^(retry - 1)`, capped
    fn backoff(&self, retry: u32) -> Duration {
        let multiplier = 1u32 << retry.saturating_sub(1).min(16);
        self.config.backoff_factor.saturating_mul(multiplier).min(MAX_BACKOFF)
    }
}
