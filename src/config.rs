//! Service configuration.
//!
//! Loaded once at startup from a TOML file (`config.toml` in the working
//! directory, or the path in `APK_TRIAGE_CONFIG`), falling back to the
//! defaults when no file exists. The risk policy table lives here as well:
//! it is deserialized once and passed by reference into the classifier,
//! never mutated afterwards.

use crate::risk::RiskPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable naming an alternative configuration file.
const CONFIG_ENV: &str = "APK_TRIAGE_CONFIG";

/// Default upload ceiling, in bytes (100 MiB).
const DEFAULT_MAX_UPLOAD: u64 = 100 * 1024 * 1024;

/// Full service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub reputation: ReputationConfig,
    pub policy: RiskPolicy,
}

impl Config {
    /// Loads the configuration from `$APK_TRIAGE_CONFIG` or `config.toml`,
    /// using the defaults when neither file exists.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".to_owned());
        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!("configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Reads and parses the configuration file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("could not read {}", path.as_ref().display()))?;
        toml::from_str(&content)
            .with_context(|| format!("could not parse {}", path.as_ref().display()))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Port the server listens on.
    pub port: u16,
    /// Folder where uploads are staged during analysis.
    pub uploads_folder: PathBuf,
    /// Maximum accepted upload size, in bytes.
    pub max_upload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            uploads_folder: PathBuf::from("uploads"),
            max_upload_size: DEFAULT_MAX_UPLOAD,
        }
    }
}

/// Settings for the optional reputation lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReputationConfig {
    /// API key for the reputation service; lookups stay disabled while this
    /// is unset.
    pub api_key: Option<String>,
    /// Base URL of the reputation service.
    pub api_url: String,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://www.virustotal.com/api/v3".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::path::PathBuf;

    #[test]
    fn it_default_config() {
        let config = Config::default();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.server.uploads_folder, PathBuf::from("uploads"));
        assert!(config.reputation.api_key.is_none());
        assert_eq!(config.policy.dangerous_permissions.len(), 18);
        assert!(!config.policy.benign_hosts.is_empty());
    }

    #[test]
    fn it_parse_config() {
        let toml = r#"
            [server]
            port = 8080
            max_upload_size = 1048576

            [reputation]
            api_key = "secret"

            [policy]
            permission_weight = 2.0
        "#;

        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_upload_size, 1_048_576);
        assert_eq!(config.server.uploads_folder, PathBuf::from("uploads"));
        assert_eq!(config.reputation.api_key.as_deref(), Some("secret"));
        assert!((config.policy.permission_weight - 2.0).abs() < f32::EPSILON);
        assert!((config.policy.url_weight_cap - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn it_reject_unknown_keys() {
        let toml = r#"
            [server]
            prot = 8080
        "#;

        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
