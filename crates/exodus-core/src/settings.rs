//! Persisted engine settings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::selection::SelectionSet;

/// Default inter-step delay between leave calls.
pub const DEFAULT_DELAY_MS: u64 = 900;

/// Settings read at session start and written on every change.
///
/// Absence of a persistence backend must not crash the session; last-used
/// in-memory values apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Milliseconds to wait between consecutive leave calls.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// The persisted selection, keyed by guild id. Survives refreshes; ids
    /// no longer in the catalog are ignored by run-request construction.
    #[serde(default)]
    pub selection: SelectionSet,
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            selection: SelectionSet::default(),
        }
    }
}

/// Storage backend for [`Settings`].
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Loads the current settings; backends return defaults when nothing has
    /// been stored yet.
    async fn load(&self) -> Result<Settings>;

    /// Persists the given settings.
    async fn save(&self, settings: &Settings) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_is_900ms() {
        assert_eq!(Settings::default().delay_ms, 900);
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let settings: Settings = toml::from_str("").unwrap();

        assert_eq!(settings.delay_ms, DEFAULT_DELAY_MS);
        assert_eq!(settings.selection.count(), 0);
    }

    #[test]
    fn test_roundtrip_preserves_selection() {
        let mut settings = Settings::default();
        settings.delay_ms = 1200;
        settings.selection.toggle("g1");

        let encoded = toml::to_string(&settings).unwrap();
        let decoded: Settings = toml::from_str(&encoded).unwrap();

        assert_eq!(decoded, settings);
        assert!(decoded.selection.is_selected("g1"));
    }
}
