//! Configuration system for rote.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{LearnError, LearnResult};

/// Main learning engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Path to the progress database (learning states + review history).
    pub db_path: PathBuf,
    /// Session size used when a query does not specify one.
    pub default_session_limit: u32,
    /// History page size used when a query does not specify one.
    pub default_history_limit: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        let rote_dir = dirs::home_dir()
            .map(|h| h.join(".rote"))
            .unwrap_or_else(|| PathBuf::from(".rote"));

        Self {
            db_path: rote_dir.join("progress.db"),
            default_session_limit: 20,
            default_history_limit: 50,
        }
    }
}

impl LearningConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> LearnResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| LearnError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| LearnError::Configuration(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| LearnError::Configuration(e.to_string()))
            }
            _ => Err(LearnError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ROTE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(limit) = std::env::var("ROTE_SESSION_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.default_session_limit = limit;
            }
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> LearningConfigBuilder {
        LearningConfigBuilder::default()
    }
}

/// Builder for LearningConfig.
#[derive(Default)]
pub struct LearningConfigBuilder {
    config: LearningConfig,
}

impl LearningConfigBuilder {
    /// Set the progress database path.
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = path;
        self
    }

    /// Set the default session limit.
    pub fn default_session_limit(mut self, limit: u32) -> Self {
        self.config.default_session_limit = limit;
        self
    }

    /// Set the default history page size.
    pub fn default_history_limit(mut self, limit: u32) -> Self {
        self.config.default_history_limit = limit;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LearningConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LearningConfig::default();
        assert_eq!(config.default_session_limit, 20);
        assert_eq!(config.default_history_limit, 50);
        assert!(config.db_path.ends_with("progress.db"));
    }

    #[test]
    fn test_builder() {
        let config = LearningConfig::builder()
            .db_path(PathBuf::from("/tmp/test.db"))
            .default_session_limit(10)
            .build();

        assert_eq!(config.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.default_session_limit, 10);
        assert_eq!(config.default_history_limit, 50);
    }

    #[test]
    fn test_from_file_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rote.toml");
        std::fs::write(&path, "db_path = \"/tmp/rote.db\"\ndefault_session_limit = 5\n").unwrap();

        let config = LearningConfig::from_file(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/rote.db"));
        assert_eq!(config.default_session_limit, 5);
        // Unspecified fields fall back to defaults
        assert_eq!(config.default_history_limit, 50);
    }

    #[test]
    fn test_from_file_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rote.ini");
        std::fs::write(&path, "db_path=/tmp/rote.db").unwrap();

        let err = LearningConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, LearnError::Configuration(_)));
    }
}
