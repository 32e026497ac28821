use std::path::{Path, PathBuf};
use serde::Deserialize;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// A service silent longer than this is displayed as DOWN
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_secs: u64,
    /// A service silent longer than this is deleted outright
    #[serde(default = "default_expiry_timeout")]
    pub expiry_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/service-registry/registry.db")
}

fn default_liveness_timeout() -> u64 {
    60
}

fn default_expiry_timeout() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: default_liveness_timeout(),
            expiry_timeout_secs: default_expiry_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; a missing file yields the
    /// built-in defaults (every field is defaultable).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.registry.liveness_timeout_secs, 60);
        assert_eq!(config.registry.expiry_timeout_secs, 60);
        assert_eq!(config.api.listen, "0.0.0.0:5000");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [registry]
            expiry_timeout_secs = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.registry.expiry_timeout_secs, 300);
        assert_eq!(config.registry.liveness_timeout_secs, 60);
        assert_eq!(config.api.listen, "0.0.0.0:5000");
    }
}
