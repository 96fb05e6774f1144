//! Loader tests against a throwaway SQLite catalog

mod common;

use common::TestDb;
use dex_etl::error::LoadError;
use dex_etl::load::Loader;
use dex_etl::models::{PokemonRecord, StatRecord, TagRecord, TransformedPokemon};

fn record(id: i64, name: Option<&str>) -> PokemonRecord {
    PokemonRecord {
        pokemon_id: Some(id),
        name: name.map(str::to_string),
        height: Some(7),
        weight: Some(69),
        base_experience: Some(64),
        is_default: true,
    }
}

fn bulbasaur() -> TransformedPokemon {
    TransformedPokemon {
        pokemon: Some(record(1, Some("bulbasaur"))),
        types: vec![TagRecord::new("grass")],
        abilities: vec![TagRecord::new("overgrow")],
        stats: vec![StatRecord::new("hp", 45, 0)],
        species_id: Some(1),
        evolution_chain_id: Some(1),
    }
}

#[tokio::test]
async fn test_load_bulbasaur() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let summary = loader.load(&bulbasaur()).await.unwrap();
    assert_eq!(summary.pokemon_id, 1);
    assert_eq!(summary.types_linked, 1);
    assert_eq!(summary.abilities_linked, 1);
    assert_eq!(summary.stats_written, 1);
    assert_eq!(summary.skipped, 0);

    let (name, height, weight, base_experience, is_default, species_id): (
        String,
        Option<i64>,
        Option<i64>,
        Option<i64>,
        bool,
        Option<i64>,
    ) = sqlx::query_as(
        "SELECT name, height, weight, base_experience, is_default, species_id \
         FROM pokemon WHERE pokemon_id = 1",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(name, "bulbasaur");
    assert_eq!((height, weight, base_experience), (Some(7), Some(69), Some(64)));
    assert!(is_default);
    assert_eq!(species_id, Some(1));

    assert_eq!(db.type_names(1).await, vec!["grass".to_string()]);

    let ability: String = sqlx::query_scalar(
        "SELECT a.ability_name FROM pokemon_abilities pa \
         JOIN abilities a ON a.ability_id = pa.ability_id WHERE pa.pokemon_id = 1",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(ability, "overgrow");

    let (stat_name, base_stat, effort): (String, i64, i64) = sqlx::query_as(
        "SELECT stat_name, base_stat, effort FROM pokemon_stats WHERE pokemon_id = 1",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!((stat_name.as_str(), base_stat, effort), ("hp", 45, 0));
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    loader.load(&bulbasaur()).await.unwrap();
    loader.load(&bulbasaur()).await.unwrap();

    assert_eq!(db.count("pokemon").await, 1);
    assert_eq!(db.count("types").await, 1);
    assert_eq!(db.count("abilities").await, 1);
    assert_eq!(db.count("pokemon_types").await, 1);
    assert_eq!(db.count("pokemon_abilities").await, 1);
    assert_eq!(db.count("pokemon_stats").await, 1);
}

#[tokio::test]
async fn test_reload_overwrites_scalars_and_stats() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());
    loader.load(&bulbasaur()).await.unwrap();

    let mut updated = bulbasaur();
    if let Some(pokemon) = updated.pokemon.as_mut() {
        pokemon.weight = Some(70);
    }
    updated.stats = vec![StatRecord::new("hp", 50, 1)];
    loader.load(&updated).await.unwrap();

    let weight: Option<i64> = sqlx::query_scalar("SELECT weight FROM pokemon WHERE pokemon_id = 1")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(weight, Some(70));

    let (base_stat, effort): (i64, i64) =
        sqlx::query_as("SELECT base_stat, effort FROM pokemon_stats WHERE pokemon_id = 1")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!((base_stat, effort), (50, 1));
    assert_eq!(db.count("pokemon_stats").await, 1);
}

#[tokio::test]
async fn test_tags_are_shared_between_pokemon() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let ivysaur = TransformedPokemon {
        pokemon: Some(record(2, Some("ivysaur"))),
        types: vec![TagRecord::new("grass"), TagRecord::new("poison")],
        ..TransformedPokemon::default()
    };

    loader.load(&bulbasaur()).await.unwrap();
    loader.load(&ivysaur).await.unwrap();

    assert_eq!(db.count("types").await, 2);
    assert_eq!(db.count("pokemon_types").await, 3);
    assert_eq!(
        db.type_names(2).await,
        vec!["grass".to_string(), "poison".to_string()]
    );

    let grass_ids: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT type_id) FROM pokemon_types pt \
         JOIN types t USING (type_id) WHERE t.type_name = 'grass'",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(grass_ids, 1);
}

#[tokio::test]
async fn test_same_name_in_both_namespaces_is_independent() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let item = TransformedPokemon {
        pokemon: Some(record(3, Some("venusaur"))),
        types: vec![TagRecord::new("thick-fat")],
        abilities: vec![TagRecord::new("thick-fat")],
        ..TransformedPokemon::default()
    };
    loader.load(&item).await.unwrap();

    assert_eq!(db.count("types").await, 1);
    assert_eq!(db.count("abilities").await, 1);
}

#[tokio::test]
async fn test_missing_record_is_invalid_input() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let err = loader.load(&TransformedPokemon::default()).await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidInput(_)));
    assert_eq!(db.count("pokemon").await, 0);
}

#[tokio::test]
async fn test_missing_id_is_invalid_input() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let mut item = bulbasaur();
    if let Some(pokemon) = item.pokemon.as_mut() {
        pokemon.pokemon_id = None;
    }

    let err = loader.load(&item).await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidInput(_)));
    assert_eq!(db.count("types").await, 0);
}

#[tokio::test]
async fn test_missing_name_rolls_back_everything() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let item = TransformedPokemon {
        pokemon: Some(record(25, None)),
        types: vec![TagRecord::new("electric")],
        stats: vec![StatRecord::new("speed", 90, 2)],
        ..TransformedPokemon::default()
    };

    let err = loader.load(&item).await.unwrap_err();
    assert!(err.is_store_error());

    assert_eq!(db.count("pokemon").await, 0);
    assert_eq!(db.count("types").await, 0);
    assert_eq!(db.count("pokemon_types").await, 0);
    assert_eq!(db.count("pokemon_stats").await, 0);

    // The pool is still usable afterwards
    loader.load(&bulbasaur()).await.unwrap();
    assert_eq!(db.pokemon_name(1).await.as_deref(), Some("bulbasaur"));
}

#[tokio::test]
async fn test_empty_children_are_skipped() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let item = TransformedPokemon {
        pokemon: Some(record(4, Some("charmander"))),
        types: vec![TagRecord::new(""), TagRecord::new("fire")],
        abilities: vec![TagRecord::new("  ")],
        stats: vec![
            StatRecord::new("", 39, 0),
            StatRecord {
                name: "attack".to_string(),
                base_stat: None,
                effort: 0,
            },
            StatRecord::new("speed", 65, 1),
        ],
        ..TransformedPokemon::default()
    };

    let summary = loader.load(&item).await.unwrap();
    assert_eq!(summary.types_linked, 1);
    assert_eq!(summary.abilities_linked, 0);
    assert_eq!(summary.stats_written, 1);
    assert_eq!(summary.skipped, 4);

    assert_eq!(db.type_names(4).await, vec!["fire".to_string()]);
    assert_eq!(db.count("abilities").await, 0);
    assert_eq!(db.count("pokemon_stats").await, 1);
}

#[tokio::test]
async fn test_pokemon_without_children() {
    let db = TestDb::provisioned().await;
    let loader = Loader::new(db.pool.clone());

    let item = TransformedPokemon {
        pokemon: Some(PokemonRecord {
            pokemon_id: Some(132),
            name: Some("ditto".to_string()),
            height: None,
            weight: None,
            base_experience: None,
            is_default: false,
        }),
        ..TransformedPokemon::default()
    };

    let summary = loader.load(&item).await.unwrap();
    assert_eq!(summary.stats_written, 0);
    assert_eq!(db.pokemon_name(132).await.as_deref(), Some("ditto"));
}

#[tokio::test]
async fn test_load_in_caller_transaction() {
    let db = TestDb::provisioned().await;

    let mut tx = db.pool.begin().await.unwrap();
    Loader::load_in_tx(&mut tx, &bulbasaur()).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(db.count("pokemon").await, 0);

    let mut tx = db.pool.begin().await.unwrap();
    Loader::load_in_tx(&mut tx, &bulbasaur()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(db.count("pokemon").await, 1);
}

#[tokio::test]
async fn test_unprovisioned_store_is_store_error() {
    let db = TestDb::empty().await;
    let loader = Loader::new(db.pool.clone());

    let err = loader.load(&bulbasaur()).await.unwrap_err();
    assert!(err.is_store_error());
}
