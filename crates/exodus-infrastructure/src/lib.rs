//! Storage and platform plumbing for the exodus engine.

pub mod paths;
pub mod settings_repository;
pub mod toml_store;

pub use paths::ExodusPaths;
pub use settings_repository::TomlSettingsRepository;
pub use toml_store::TomlFile;
