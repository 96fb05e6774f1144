//! Common test utilities for dex-etl integration tests
//!
//! - Throwaway SQLite databases in a temp directory, schema provisioned
//! - A mocked PokeAPI built on `wiremock`
//! - JSON fixtures shaped like real PokeAPI responses

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use dex_etl::config::{ApiConfig, DatabaseConfig};
use dex_etl::db;

/// SQLite database that lives as long as the value
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    /// Fresh database without schema
    pub async fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("pokedex.db").display()),
            max_connections: 2,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
        };
        let pool = db::create_pool(&config).await.unwrap();
        Self { pool, _dir: dir }
    }

    /// Fresh database with the catalog schema
    pub async fn provisioned() -> Self {
        let test_db = Self::empty().await;
        db::provision_schema(&test_db.pool).await.unwrap();
        test_db
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// `(type_name)` of a pokemon, ordered by name
    pub async fn type_names(&self, pokemon_id: i64) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT t.type_name FROM pokemon_types pt \
             JOIN types t ON t.type_id = pt.type_id \
             WHERE pt.pokemon_id = ? ORDER BY t.type_name",
        )
        .bind(pokemon_id)
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }

    pub async fn pokemon_name(&self, pokemon_id: i64) -> Option<String> {
        sqlx::query_scalar("SELECT name FROM pokemon WHERE pokemon_id = ?")
            .bind(pokemon_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap()
    }
}

/// Client settings pointed at the mock server, with no sleeps
pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig::default()
        .with_base_url(format!("{}/api/v2/", server.uri()))
        .without_delays()
        .with_retries(2)
}

pub fn species_url(server: &MockServer, id: i64) -> String {
    format!("{}/api/v2/pokemon-species/{}/", server.uri(), id)
}

pub fn evolution_chain_url(server: &MockServer, id: i64) -> String {
    format!("{}/api/v2/evolution-chain/{}/", server.uri(), id)
}

/// Primary pokemon document linking to species `id`
pub fn pokemon_json(server: &MockServer, id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "height": 7,
        "weight": 69,
        "base_experience": 64,
        "is_default": true,
        "species": {"name": name, "url": species_url(server, id)},
        "types": [
            {"slot": 1, "type": {"name": "grass", "url": "https://pokeapi.co/api/v2/type/12/"}},
            {"slot": 2, "type": {"name": "poison", "url": "https://pokeapi.co/api/v2/type/4/"}}
        ],
        "abilities": [
            {"ability": {"name": "overgrow"}, "is_hidden": false, "slot": 1},
            {"ability": {"name": "chlorophyll"}, "is_hidden": true, "slot": 3}
        ],
        "stats": [
            {"stat": {"name": "hp"}, "base_stat": 45, "effort": 0},
            {"stat": {"name": "attack"}, "base_stat": 49, "effort": 0},
            {"stat": {"name": "special-attack"}, "base_stat": 65, "effort": 1}
        ]
    })
}

pub fn species_json(server: &MockServer, id: i64, chain_id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("species-{id}"),
        "evolution_chain": {"url": evolution_chain_url(server, chain_id)}
    })
}

pub fn evolution_chain_json(chain_id: i64) -> Value {
    json!({
        "id": chain_id,
        "chain": {"species": {"name": "bulbasaur"}, "evolves_to": []}
    })
}

pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a pokemon with its species and evolution chain (chain id = pokemon id)
pub async fn mount_pokemon(server: &MockServer, id: i64, name: &str) {
    mount_pokemon_document(server, id, pokemon_json(server, id, name)).await;
}

/// Mount an arbitrary primary document with its species and evolution chain
pub async fn mount_pokemon_document(server: &MockServer, id: i64, pokemon: Value) {
    mount_json(server, &format!("/api/v2/pokemon/{id}"), pokemon).await;
    mount_json(
        server,
        &format!("/api/v2/pokemon-species/{id}/"),
        species_json(server, id, id),
    )
    .await;
    mount_json(
        server,
        &format!("/api/v2/evolution-chain/{id}/"),
        evolution_chain_json(id),
    )
    .await;
}
