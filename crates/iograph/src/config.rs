// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration and runtime environment.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::api::ApiSnapshot;
use crate::id::Identifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What the API layer does at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    /// No archetypes, no validation.
    #[default]
    Off,
    /// Build archetypes so the API snapshot can be captured.
    Generate,
    /// Build archetypes and check every new element against a reference
    /// snapshot.
    Validate,
}

/// `[api]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub mode: ApiMode,

    /// Reference snapshot (JSON) used in validate mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IographConfig {
    /// Root identifier segment of the application.
    #[serde(default = "default_root")]
    pub root: String,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub api: ApiConfig,
}

fn default_root() -> String {
    "app".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl Default for IographConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            log_level: default_log_level(),
            api: ApiConfig::default(),
        }
    }
}

impl IographConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with the given API mode.
    pub fn with_api_mode(mode: ApiMode) -> Self {
        Self {
            api: ApiConfig {
                mode,
                reference: None,
            },
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Identifier::root(&self.root).map_err(|e| {
            ConfigError::Invalid(format!("root '{}' is not a valid segment: {}", self.root, e))
        })?;

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Unknown log level '{}' (expected one of {})",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.api.reference.is_some() && self.api.mode != ApiMode::Validate {
            log::warn!("[config] api.reference is only used in validate mode");
        }

        Ok(())
    }

    /// Read the reference snapshot named by `api.reference`.
    pub fn load_reference_api(&self) -> Result<Option<ApiSnapshot>, ConfigError> {
        match &self.api.reference {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Ok(Some(serde_json::from_str(&content)?))
            }
            None => Ok(None),
        }
    }
}

/// Configuration plus the "application started" flag.
///
/// Archetypes are only built before startup; containers created later
/// (for instance nested inside a dynamic element) skip them.
#[derive(Debug, Default)]
pub struct Environment {
    config: IographConfig,
    started: AtomicBool,
}

impl Environment {
    pub fn new(config: IographConfig) -> Self {
        Self {
            config,
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &IographConfig {
        &self.config
    }

    pub fn api_mode(&self) -> ApiMode {
        self.config.api.mode
    }

    pub fn root_id(&self) -> Result<Identifier, ConfigError> {
        Identifier::root(&self.config.root).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn mark_started(&self) {
        if !self.started.swap(true, Ordering::AcqRel) {
            log::info!("[env] application started");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn should_create_archetypes(&self) -> bool {
        self.config.api.mode != ApiMode::Off && !self.is_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = IographConfig::default();
        assert_eq!(config.root, "app");
        assert_eq!(config.api.mode, ApiMode::Off);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = IographConfig::from_toml_str(
            r#"
            root = "circuitSim"
            log_level = "debug"

            [api]
            mode = "validate"
            reference = "api/reference.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.root, "circuitSim");
        assert_eq!(config.api.mode, ApiMode::Validate);
        assert_eq!(
            config.api.reference.as_deref(),
            Some(Path::new("api/reference.json"))
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = IographConfig::default();
        config.root = "a.b".into();
        assert!(config.validate().is_err());

        let mut config = IographConfig::default();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        assert!(IographConfig::from_toml_str("[api]\nmode = \"sometimes\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[api]\nmode = \"generate\"").expect("write");
        let config = IographConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.mode, ApiMode::Generate);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_file() {
        let err = IographConfig::from_file("/nonexistent/iograph.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_archetypes_only_before_start() {
        let env = Environment::new(IographConfig::with_api_mode(ApiMode::Generate));
        assert!(env.should_create_archetypes());
        env.mark_started();
        assert!(!env.should_create_archetypes());

        let off = Environment::default();
        assert!(!off.should_create_archetypes());
    }

    #[test]
    fn test_config_serialization() {
        let config = IographConfig::with_api_mode(ApiMode::Generate);
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert!(toml_str.contains("mode = \"generate\""));
        assert!(!toml_str.contains("reference"));
    }
}
