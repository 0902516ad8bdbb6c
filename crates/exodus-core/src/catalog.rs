//! Guild catalog: a normalized, name-sorted view of the host's guild list.
//!
//! The catalog's stored order is load-bearing: it defines the execution
//! order of a batch run, so normalization sorts by case-insensitive name
//! with a stable tie-break on the source order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single guild as the engine sees it.
///
/// Identity is `id`; the record is immutable once loaded and replaced
/// wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

impl Guild {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The normalized guild list for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    guilds: Vec<Guild>,
}

impl Catalog {
    /// Builds a catalog from raw host guild objects.
    ///
    /// Entries without a usable `id` (non-empty string or integer) or a
    /// usable `name` are dropped. Both fields are coerced to strings. The
    /// result is sorted by case-insensitive name ascending; ties keep the
    /// source's relative order.
    pub fn from_raw(raw: Vec<Value>) -> Self {
        let mut guilds: Vec<Guild> = raw.iter().filter_map(guild_from_value).collect();
        // Vec::sort_by is stable, which the ordering contract relies on.
        guilds.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Self { guilds }
    }

    /// Builds a catalog from already-normalized guilds, applying the same
    /// ordering rule.
    pub fn from_guilds(mut guilds: Vec<Guild>) -> Self {
        guilds.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Self { guilds }
    }

    /// The guilds in stored (execution) order.
    pub fn guilds(&self) -> &[Guild] {
        &self.guilds
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.iter()
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guilds.iter().any(|g| g.id == id)
    }

    /// Display name for an id, if the guild is present.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.guilds
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.name.as_str())
    }

    /// Case-insensitive substring filter on the guild name.
    ///
    /// An empty or whitespace-only query returns the full list unchanged.
    pub fn filter(&self, query: &str) -> Vec<Guild> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.guilds.clone();
        }
        self.guilds
            .iter()
            .filter(|g| g.name.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }
}

/// Extracts a `{id, name}` record from one raw host object.
///
/// Returns `None` for anything that does not carry both fields in a usable
/// shape; malformed entries are filtered silently at this layer.
fn guild_from_value(value: &Value) -> Option<Guild> {
    let id = coerce_to_string(value.get("id")?)?;
    let name = coerce_to_string(value.get("name")?)?;
    Some(Guild { id, name })
}

fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
