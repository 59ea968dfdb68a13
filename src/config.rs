//! # Run Configuration
//!
//! Settings for one migration run, loaded from environment variables and
//! overridden from the command line.
//!
//! The resulting [`RunConfig`] is built once in `main` and passed by reference
//! to every component. Nothing reads the environment after startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How generated resources are exposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationMode {
    /// Public resources only, served on generated test hostnames
    Test,
    /// Public and private resources, served on generated test hostnames
    TestWithPrivate,
    /// Original hostnames, real ingress classes
    #[default]
    Production,
}

impl MigrationMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationMode::Test => "test",
            MigrationMode::TestWithPrivate => "test-with-private",
            MigrationMode::Production => "production",
        }
    }

    /// Both test modes replace hostnames and TLS secrets
    #[must_use]
    pub fn is_test(&self) -> bool {
        matches!(self, MigrationMode::Test | MigrationMode::TestWithPrivate)
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "test" => Ok(MigrationMode::Test),
            "test-with-private" => Ok(MigrationMode::TestWithPrivate),
            "production" | "" => Ok(MigrationMode::Production),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown migration mode specified: '{0}'")]
    UnknownMode(String),
    #[error("missing test subdomain or test secret for mode '{0}' (set TEST_DOMAIN and TEST_SECRET)")]
    MissingTestSettings(MigrationMode),
}

/// Configuration of a single migration run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Migration mode, persisted in the status ledger
    pub mode: MigrationMode,
    /// Base domain for generated test hostnames (test modes only)
    pub test_domain: String,
    /// TLS secret attached to every generated test hostname (test modes only)
    pub test_secret: String,
    /// When true nothing is created, updated or deleted on the cluster
    pub read_only: bool,
    /// Record written resources and dump them as YAML after the run
    pub dump_resources: bool,
    /// Directory receiving logs and dumped resources
    pub output_dir: Option<PathBuf>,
    /// Log format (json, text)
    pub log_format: String,
    /// Server supports `pathType` (Kubernetes 1.18+)
    pub enhancements_enabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::Production,
            test_domain: String::new(),
            test_secret: String::new(),
            read_only: true,
            dump_resources: true,
            output_dir: None,
            log_format: "text".to_string(),
            enhancements_enabled: true,
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownMode`] when `MIGRATION_MODE` holds an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mode: env_var_or_default_str("MIGRATION_MODE", "production").parse()?,
            test_domain: env_var_or_default_str("TEST_DOMAIN", ""),
            test_secret: env_var_or_default_str("TEST_SECRET", ""),
            read_only: env_var_or_default_bool("READ_ONLY", true),
            dump_resources: env_var_or_default_bool("DUMP_RESOURCES", true),
            output_dir: std::env::var("OUTPUT_DIR").ok().map(PathBuf::from),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            enhancements_enabled: true,
        })
    }

    /// Test modes cannot run without a domain and a secret for the test hosts
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTestSettings`] when either value is empty in a test mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.is_test() && (self.test_domain.is_empty() || self.test_secret.is_empty()) {
            return Err(ConfigError::MissingTestSettings(self.mode));
        }
        Ok(())
    }
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing_defaults_to_production() {
        assert_eq!("".parse::<MigrationMode>(), Ok(MigrationMode::Production));
        assert_eq!("test".parse::<MigrationMode>(), Ok(MigrationMode::Test));
        assert_eq!(
            "test-with-private".parse::<MigrationMode>(),
            Ok(MigrationMode::TestWithPrivate)
        );
        assert!("staging".parse::<MigrationMode>().is_err());
    }

    #[test]
    fn test_mode_serializes_kebab_case() {
        let json = serde_json::to_string(&MigrationMode::TestWithPrivate).unwrap();
        assert_eq!(json, "\"test-with-private\"");
    }

    #[test]
    fn test_validate_requires_test_settings_in_test_modes() {
        let mut config = RunConfig {
            mode: MigrationMode::Test,
            ..RunConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingTestSettings(MigrationMode::Test))
        );

        config.test_domain = "test.example.com".to_string();
        config.test_secret = "test-secret".to_string();
        assert!(config.validate().is_ok());

        let production = RunConfig::default();
        assert!(production.validate().is_ok());
    }
}
