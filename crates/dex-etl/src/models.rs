//! Pipeline data models
//!
//! Raw documents flow from the fetcher as untyped JSON; the transformer turns
//! them into the flat records defined here, which the loader writes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dex_common::{DexError, Result};

/// Inclusive range of upstream pokemon IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: i64,
    pub end: i64,
}

impl IdRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start < 1 {
            return Err(DexError::Config(format!(
                "start id must be at least 1, got {}",
                self.start
            )));
        }
        if self.start > self.end {
            return Err(DexError::Config(format!(
                "start id {} is greater than end id {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Number of IDs covered; zero for an inverted range
    pub fn len(&self) -> usize {
        usize::try_from(self.end - self.start + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> std::ops::RangeInclusive<i64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for IdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Documents fetched for one pokemon ID
///
/// `species` and `evolution_chain` are `None` when the link was absent or the
/// linked fetch came back NotFound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPokemon {
    pub pokemon: Option<Value>,
    pub species: Option<Value>,
    pub evolution_chain: Option<Value>,
}

impl RawPokemon {
    pub fn new(pokemon: Value) -> Self {
        Self {
            pokemon: Some(pokemon),
            ..Self::default()
        }
    }
}

/// Primary pokemon row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonRecord {
    pub pokemon_id: Option<i64>,
    /// Required by the store; a missing name surfaces as a load failure.
    pub name: Option<String>,
    pub height: Option<i64>,
    pub weight: Option<i64>,
    pub base_experience: Option<i64>,
    pub is_default: bool,
}

/// Reference to a shared type or ability tag by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
}

impl TagRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One base stat of a pokemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub name: String,
    pub base_stat: Option<i64>,
    pub effort: i64,
}

impl StatRecord {
    pub fn new(name: impl Into<String>, base_stat: i64, effort: i64) -> Self {
        Self {
            name: name.into(),
            base_stat: Some(base_stat),
            effort,
        }
    }
}

/// Relational shape of one pokemon, ready to load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformedPokemon {
    pub pokemon: Option<PokemonRecord>,
    pub types: Vec<TagRecord>,
    pub abilities: Vec<TagRecord>,
    pub stats: Vec<StatRecord>,
    pub species_id: Option<i64>,
    pub evolution_chain_id: Option<i64>,
}

impl TransformedPokemon {
    pub fn pokemon_id(&self) -> Option<i64> {
        self.pokemon.as_ref().and_then(|p| p.pokemon_id)
    }
}

/// The two independent tag namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Type,
    Ability,
}

impl TagKind {
    pub fn label(self) -> &'static str {
        match self {
            TagKind::Type => "type",
            TagKind::Ability => "ability",
        }
    }

    /// `(table, id column, name column)` of the tag table
    pub(crate) fn tag_table(self) -> (&'static str, &'static str, &'static str) {
        match self {
            TagKind::Type => ("types", "type_id", "type_name"),
            TagKind::Ability => ("abilities", "ability_id", "ability_name"),
        }
    }

    /// `(table, tag id column)` of the pokemon association table
    pub(crate) fn link_table(self) -> (&'static str, &'static str) {
        match self {
            TagKind::Type => ("pokemon_types", "type_id"),
            TagKind::Ability => ("pokemon_abilities", "ability_id"),
        }
    }
}
