//! Configuration service implementation.
//!
//! Loads the root configuration from `~/.config/studia/config.toml` and
//! caches it.

use crate::paths::StudiaPaths;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use studia_core::config::RootConfig;
use studia_core::error::{Result, StudiaError};

/// Configuration service that loads and caches the root configuration.
///
/// A missing or empty file yields the defaults; a malformed file is logged
/// and also falls back to defaults in `get_config`.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Creates a ConfigService reading the default config file.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a ConfigService reading an explicit file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> RootConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[ConfigService] Falling back to defaults: {}", e);
                RootConfig::default()
            }
        };

        {
            let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    /// Reads and parses the config file without touching the cache.
    pub fn try_load(&self) -> Result<RootConfig> {
        let config_path = self.config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "[ConfigService] No config file at {:?}, using defaults",
                config_path
            );
            return Ok(RootConfig::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            return Ok(RootConfig::default());
        }

        let config: RootConfig = toml::from_str(&content)?;
        validate(&config)?;
        Ok(config)
    }

    /// Writes `config` to the config file, creating parent directories.
    pub fn save(&self, config: &RootConfig) -> Result<()> {
        let config_path = self.config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(config)?;
        std::fs::write(&config_path, toml_string)?;
        self.invalidate_cache();
        Ok(())
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => StudiaPaths::new(None)
                .config_file()
                .map_err(|e| StudiaError::config(e.to_string())),
        }
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &RootConfig) -> Result<()> {
    if config.engine.completion_override_ratio < 1.0 {
        return Err(StudiaError::config(format!(
            "completion_override_ratio must be >= 1.0 (got {})",
            config.engine.completion_override_ratio
        )));
    }
    if config.engine.event_capacity == 0 {
        return Err(StudiaError::config("event_capacity must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
        assert_eq!(service.get_config(), RootConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("nested/config.toml"));

        let mut config = RootConfig::default();
        config.engine.stream_timeout_ms = 1234;
        config.logging.level = "debug".to_string();
        service.save(&config).expect("Should save config");

        assert_eq!(service.get_config(), config);
    }

    #[test]
    fn test_cache_until_invalidated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let service = ConfigService::with_path(path.clone());
        assert_eq!(service.get_config().engine.stream_timeout_ms, 10_000);

        std::fs::write(&path, "[engine]\nstream_timeout_ms = 500\n").unwrap();
        assert_eq!(service.get_config().engine.stream_timeout_ms, 10_000);

        service.invalidate_cache();
        assert_eq!(service.get_config().engine.stream_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\ncompletion_override_ratio = 0.5\n").unwrap();

        let service = ConfigService::with_path(path);
        let err = service.try_load().unwrap_err();
        assert!(matches!(err, StudiaError::Config(_)));
        // get_config falls back to defaults
        assert_eq!(service.get_config().engine.completion_override_ratio, 1.5);
    }
}
