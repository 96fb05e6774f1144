//! Raw PokeAPI JSON to relational records
//!
//! [`transform`] is pure: it never fails and keeps no state between calls.
//! Malformed nested elements are dropped one at a time with a warning; their
//! siblings are kept in their original order.

use serde_json::Value;
use tracing::{info, warn};

use crate::models::{PokemonRecord, RawPokemon, StatRecord, TagRecord, TransformedPokemon};

/// Map fetched documents to the relational shape
///
/// Returns an empty result (`pokemon: None`, no children) when the primary
/// document is absent; callers must check before loading.
pub fn transform(raw: &RawPokemon) -> TransformedPokemon {
    let Some(pokemon) = raw.pokemon.as_ref() else {
        warn!("No pokemon document to transform");
        return TransformedPokemon::default();
    };

    let pokemon_id = pokemon.get("id").and_then(Value::as_i64);

    let record = PokemonRecord {
        pokemon_id,
        name: pokemon.get("name").and_then(Value::as_str).map(str::to_string),
        height: pokemon.get("height").and_then(Value::as_i64),
        weight: pokemon.get("weight").and_then(Value::as_i64),
        base_experience: pokemon.get("base_experience").and_then(Value::as_i64),
        is_default: pokemon.get("is_default").and_then(Value::as_bool).unwrap_or(false),
    };

    let species_id = raw
        .species
        .as_ref()
        .and_then(|species| resource_url(species, pokemon, "species"))
        .and_then(|url| parse_resource_id(url, "species", pokemon_id));

    let evolution_chain_id = match (raw.evolution_chain.as_ref(), raw.species.as_ref()) {
        (Some(chain), Some(species)) => resource_url(chain, species, "evolution_chain"),
        (Some(chain), None) => chain.get("url").and_then(Value::as_str),
        (None, _) => None,
    }
    .and_then(|url| parse_resource_id(url, "evolution_chain", pokemon_id));

    TransformedPokemon {
        types: tag_list(pokemon, "types", "type", pokemon_id),
        abilities: tag_list(pokemon, "abilities", "ability", pokemon_id),
        stats: stat_list(pokemon, pokemon_id),
        pokemon: Some(record),
        species_id,
        evolution_chain_id,
    }
}

/// `doc[field].url` when it is a non-empty string
pub(crate) fn link_url<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field)?
        .get("url")?
        .as_str()
        .filter(|url| !url.trim().is_empty())
}

/// A linked resource's own `url`, or the link in `parent` that pointed at it
fn resource_url<'a>(resource: &'a Value, parent: &'a Value, link_field: &str) -> Option<&'a str> {
    resource
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| link_url(parent, link_field))
}

/// Trailing path segment of a resource URL as an integer ID
///
/// `https://pokeapi.co/api/v2/pokemon-species/1/` -> `1`
pub fn parse_trailing_id(url: &str) -> Option<i64> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .parse()
        .ok()
}

fn parse_resource_id(url: &str, field: &str, pokemon_id: Option<i64>) -> Option<i64> {
    let id = parse_trailing_id(url);
    if id.is_none() {
        warn!(pokemon_id, field, url, "Could not parse resource id from URL");
    }
    id
}

/// Entries of `pokemon[list_field]` whose `entry[item_field].name` is present
fn tag_list(
    pokemon: &Value,
    list_field: &str,
    item_field: &str,
    pokemon_id: Option<i64>,
) -> Vec<TagRecord> {
    let Some(entries) = pokemon.get(list_field).and_then(Value::as_array) else {
        info!(pokemon_id, field = list_field, "No list data found");
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let name = entry
                .get(item_field)
                .and_then(|item| item.get("name"))
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty());

            match name {
                Some(name) => Some(TagRecord::new(name)),
                None => {
                    warn!(
                        pokemon_id,
                        field = list_field,
                        index,
                        entry = %entry,
                        "Dropping malformed entry"
                    );
                    None
                },
            }
        })
        .collect()
}

fn stat_list(pokemon: &Value, pokemon_id: Option<i64>) -> Vec<StatRecord> {
    let Some(entries) = pokemon.get("stats").and_then(Value::as_array) else {
        info!(pokemon_id, field = "stats", "No list data found");
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let name = entry
                .get("stat")
                .and_then(|stat| stat.get("name"))
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty());
            let base_stat = entry.get("base_stat").and_then(Value::as_i64);

            match (name, base_stat) {
                (Some(name), Some(base_stat)) => {
                    let effort = entry.get("effort").and_then(Value::as_i64).unwrap_or(0);
                    Some(StatRecord::new(name, base_stat, effort))
                },
                _ => {
                    warn!(
                        pokemon_id,
                        field = "stats",
                        index,
                        entry = %entry,
                        "Dropping malformed entry"
                    );
                    None
                },
            }
        })
        .collect()
}
