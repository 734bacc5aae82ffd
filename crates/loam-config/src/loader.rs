use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use loam_core::{LoamError, Result};

use crate::schema::LoamConfig;

/// Loads the loam configuration and hands out snapshots.
pub struct ConfigLoader {
    config: Arc<RwLock<LoamConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > LOAM_CONFIG env > ~/.loam/loam.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("LOAM_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".loam")
            .join("loam.toml")
    }

    /// Load the config from disk, falling back to defaults when the file is
    /// absent. Env overrides are applied after the parse; validation failures
    /// are hard errors, warnings are logged.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<LoamConfig>(&raw).map_err(|e| {
                LoamError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            LoamConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(LoamError::Config(e)),
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a snapshot of the current config.
    pub fn get(&self) -> LoamConfig {
        self.config.read().clone()
    }

    /// Path the config was resolved from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides. API keys fill in only when the config file
    /// leaves them unset — the file takes priority, env is the fallback.
    fn apply_env_overrides(mut config: LoamConfig) -> LoamConfig {
        if let Ok(v) = std::env::var("LOAM_EXECUTOR_PROVIDER") {
            config.executor.provider = v;
        }
        if let Ok(v) = std::env::var("LOAM_EXECUTOR_MODEL") {
            config.executor.model = v;
        }
        if let Ok(v) = std::env::var("LOAM_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("LOAM_SIMILARITY_METHOD") {
            config.memory.similarity_method = v;
        }
        if let Ok(v) = std::env::var("LOAM_STORAGE_THRESHOLD") {
            if let Ok(threshold) = v.parse::<f64>() {
                config.memory.storage_threshold = threshold;
            }
        }
        if config.executor.api_key.is_none() {
            config.executor.api_key = std::env::var("LOAM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        if config.embedding.api_key.is_none() {
            config.embedding.api_key = std::env::var("LOAM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&self) -> Result<()> {
        if !self.config_path.exists() {
            return Err(LoamError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.config_path)?;
        let new_config = toml::from_str::<LoamConfig>(&raw).map_err(|e| {
            LoamError::Config(format!(
                "failed to parse {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        let new_config = Self::apply_env_overrides(new_config);
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
