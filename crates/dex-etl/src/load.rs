//! Transactional loader for transformed pokemon
//!
//! One pokemon is one transaction: the primary row, then tags and their
//! associations, then stats. Any store error rolls the whole pokemon back.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, error, info, warn};

use crate::error::LoadError;
use crate::models::{PokemonRecord, StatRecord, TagKind, TagRecord, TransformedPokemon};

/// What a successful load wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub pokemon_id: i64,
    pub types_linked: usize,
    pub abilities_linked: usize,
    pub stats_written: usize,
    /// Child elements skipped because they could not be stored
    pub skipped: usize,
}

/// Writes transformed pokemon to the store
#[derive(Clone)]
pub struct Loader {
    pool: SqlitePool,
}

impl Loader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load one pokemon in its own transaction
    ///
    /// Input problems are reported before the store is touched. On a store
    /// error the transaction is rolled back and nothing of this pokemon is
    /// persisted.
    pub async fn load(&self, item: &TransformedPokemon) -> Result<LoadSummary, LoadError> {
        let (pokemon_id, _) = validate(item)?;

        let mut tx = self.pool.begin().await?;

        match Self::load_in_tx(&mut tx, item).await {
            Ok(summary) => {
                tx.commit().await?;
                info!(
                    pokemon_id,
                    types = summary.types_linked,
                    abilities = summary.abilities_linked,
                    stats = summary.stats_written,
                    skipped = summary.skipped,
                    "Loaded pokemon"
                );
                Ok(summary)
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        pokemon_id,
                        rollback_error = %rollback_err,
                        "Failed to roll back transaction"
                    );
                }
                error!(pokemon_id, error = %e, "Failed to load pokemon, rolled back");
                Err(e)
            },
        }
    }

    /// Load one pokemon inside a caller-owned transaction
    ///
    /// The caller decides whether to commit or roll back.
    pub async fn load_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        item: &TransformedPokemon,
    ) -> Result<LoadSummary, LoadError> {
        let (pokemon_id, record) = validate(item)?;

        let mut summary = LoadSummary {
            pokemon_id,
            ..LoadSummary::default()
        };

        upsert_pokemon(tx, pokemon_id, record, item).await?;

        let (linked, skipped) = link_tags(tx, pokemon_id, TagKind::Type, &item.types).await?;
        summary.types_linked = linked;
        summary.skipped += skipped;

        let (linked, skipped) =
            link_tags(tx, pokemon_id, TagKind::Ability, &item.abilities).await?;
        summary.abilities_linked = linked;
        summary.skipped += skipped;

        for stat in &item.stats {
            if upsert_stat(tx, pokemon_id, stat).await? {
                summary.stats_written += 1;
            } else {
                summary.skipped += 1;
            }
        }

        Ok(summary)
    }
}

/// Primary record and its ID, or why the item cannot be loaded
fn validate(item: &TransformedPokemon) -> Result<(i64, &PokemonRecord), LoadError> {
    let record = item
        .pokemon
        .as_ref()
        .ok_or_else(|| LoadError::InvalidInput("no pokemon record to load".to_string()))?;

    let pokemon_id = record
        .pokemon_id
        .ok_or_else(|| LoadError::InvalidInput("pokemon record has no id".to_string()))?;

    Ok((pokemon_id, record))
}

async fn upsert_pokemon(
    tx: &mut Transaction<'_, Sqlite>,
    pokemon_id: i64,
    record: &PokemonRecord,
    item: &TransformedPokemon,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pokemon (
            pokemon_id, name, height, weight, base_experience, is_default,
            species_id, evolution_chain_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (pokemon_id) DO UPDATE SET
            name = excluded.name,
            height = excluded.height,
            weight = excluded.weight,
            base_experience = excluded.base_experience,
            is_default = excluded.is_default,
            species_id = excluded.species_id,
            evolution_chain_id = excluded.evolution_chain_id,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(pokemon_id)
    .bind(record.name.as_deref())
    .bind(record.height)
    .bind(record.weight)
    .bind(record.base_experience)
    .bind(record.is_default)
    .bind(item.species_id)
    .bind(item.evolution_chain_id)
    .execute(&mut **tx)
    .await?;

    debug!(pokemon_id, "Upserted pokemon row");
    Ok(())
}

/// Resolve every tag and link it to the pokemon; returns `(linked, skipped)`
async fn link_tags(
    tx: &mut Transaction<'_, Sqlite>,
    pokemon_id: i64,
    kind: TagKind,
    tags: &[TagRecord],
) -> Result<(usize, usize), sqlx::Error> {
    let (link_table, tag_column) = kind.link_table();
    let insert_link = format!(
        "INSERT INTO {link_table} (pokemon_id, {tag_column}) VALUES (?, ?) ON CONFLICT DO NOTHING"
    );

    let mut linked = 0;
    let mut skipped = 0;

    for tag in tags {
        if tag.name.trim().is_empty() {
            warn!(pokemon_id, kind = kind.label(), "Skipping tag with empty name");
            skipped += 1;
            continue;
        }

        let tag_id = get_or_create_tag(tx, kind, &tag.name).await?;

        sqlx::query(&insert_link)
            .bind(pokemon_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
        linked += 1;
    }

    Ok((linked, skipped))
}

/// Look up a tag by name, creating it if it does not exist yet
async fn get_or_create_tag(
    tx: &mut Transaction<'_, Sqlite>,
    kind: TagKind,
    name: &str,
) -> Result<i64, sqlx::Error> {
    let (table, id_column, name_column) = kind.tag_table();
    let select = format!("SELECT {id_column} FROM {table} WHERE {name_column} = ?");

    let existing: Option<i64> = sqlx::query_scalar(&select)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    sqlx::query(&format!(
        "INSERT INTO {table} ({name_column}) VALUES (?) ON CONFLICT ({name_column}) DO NOTHING"
    ))
    .bind(name)
    .execute(&mut **tx)
    .await?;

    // Re-select in case another writer created it concurrently
    let id: i64 = sqlx::query_scalar(&select)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

    debug!(kind = kind.label(), name, id, "Created tag");
    Ok(id)
}

/// Upsert on `(pokemon_id, stat_name)`; `false` when the stat was skipped
async fn upsert_stat(
    tx: &mut Transaction<'_, Sqlite>,
    pokemon_id: i64,
    stat: &StatRecord,
) -> Result<bool, sqlx::Error> {
    let Some(base_stat) = stat.base_stat else {
        warn!(pokemon_id, stat = %stat.name, "Skipping stat without base value");
        return Ok(false);
    };

    if stat.name.trim().is_empty() {
        warn!(pokemon_id, "Skipping stat with empty name");
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO pokemon_stats (pokemon_id, stat_name, base_stat, effort)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (pokemon_id, stat_name) DO UPDATE SET
            base_stat = excluded.base_stat,
            effort = excluded.effort
        "#,
    )
    .bind(pokemon_id)
    .bind(&stat.name)
    .bind(base_stat)
    .bind(stat.effort)
    .execute(&mut **tx)
    .await?;

    Ok(true)
}
