//! TOML-backed settings repository.
//!
//! Loads once at construction into an in-memory cache, then writes through
//! on every save. File IO runs on the blocking pool so async callers never
//! stall on the filesystem.

use std::sync::Arc;

use tokio::sync::Mutex;

use exodus_core::error::{ExodusError, Result};
use exodus_core::settings::{Settings, SettingsRepository};

use crate::paths::ExodusPaths;
use crate::toml_store::TomlFile;

pub struct TomlSettingsRepository {
    /// Cached settings, refreshed on every save.
    cache: Arc<Mutex<Settings>>,
    file: Arc<TomlFile<Settings>>,
}

impl TomlSettingsRepository {
    /// Opens (or initializes) the settings file under the given paths.
    ///
    /// A missing file yields defaults; a corrupt file is an error so the
    /// caller can decide whether to fall back to in-memory settings.
    pub fn new(paths: &ExodusPaths) -> Result<Self> {
        let path = paths
            .settings_file()
            .map_err(|e| ExodusError::config(e.to_string()))?;
        let file = TomlFile::new(path);
        let initial = file.load()?.unwrap_or_default();

        Ok(Self {
            cache: Arc::new(Mutex::new(initial)),
            file: Arc::new(file),
        })
    }
}

#[async_trait::async_trait]
impl SettingsRepository for TomlSettingsRepository {
    async fn load(&self) -> Result<Settings> {
        Ok(self.cache.lock().await.clone())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        {
            let mut cache = self.cache.lock().await;
            *cache = settings.clone();
        }

        let file = self.file.clone();
        let to_save = settings.clone();
        tokio::task::spawn_blocking(move || {
            file.update(Settings::default(), move |stored| *stored = to_save)
        })
        .await
        .map_err(|e| ExodusError::internal(format!("settings save task failed: {e}")))??;

        tracing::debug!(target: "exodus::settings", "settings saved");
        Ok(())
    }
}
