//! Selection state over the guild catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Guild};

/// A mapping from guild id to selected-state.
///
/// Absence of a key is equivalent to `false`. The set is a pure value: the
/// session layer decides when mutation is allowed (never during a run) and
/// when to persist it. Ids referencing guilds no longer in the catalog are
/// harmless; they simply never make it into a run request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    entries: HashMap<String, bool>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the flag for `id`, leaving all other entries unchanged.
    /// Returns the new state.
    pub fn toggle(&mut self, id: &str) -> bool {
        let flag = self.entries.entry(id.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    /// Marks every given guild selected; guilds outside the given view keep
    /// whatever state they had.
    pub fn select_all<'a, I>(&mut self, guilds: I)
    where
        I: IntoIterator<Item = &'a Guild>,
    {
        for guild in guilds {
            self.entries.insert(guild.id.clone(), true);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of ids currently selected.
    pub fn count(&self) -> usize {
        self.entries.values().filter(|selected| **selected).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    /// Builds the ordered work list for a run: catalog order restricted to
    /// selected ids. Selected ids absent from the catalog are skipped.
    pub fn run_request(&self, catalog: &Catalog) -> Vec<String> {
        catalog
            .iter()
            .filter(|guild| self.is_selected(&guild.id))
            .map(|guild| guild.id.clone())
            .collect()
    }
}
