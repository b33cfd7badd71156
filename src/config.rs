// Configuration File Support
//
// This module provides configuration file parsing for shell-guard.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/shell-guard/config.toml

use crate::policy::PatternLibrary;
use crate::tools::{ExecutorConfig, DEFAULT_SHELL, MAX_OUTPUT_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Policy additions and overrides
    pub policy: PolicyConfig,

    /// Executor configuration
    pub executor: ExecutorSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Policy configuration
///
/// Everything here is applied on top of the built-in pattern library once,
/// before the policy engine is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Replaces the built-in allowlist when set
    pub allowlist: Option<Vec<String>>,

    /// Added to the allowlist (after any replacement)
    pub extra_allowlist: Vec<String>,

    /// Added to the high-risk keywords
    pub extra_keywords: Vec<String>,

    /// Added to the sensitive path patterns
    pub extra_sensitive_paths: Vec<String>,
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Timeout in seconds, 0 for none
    pub timeout_secs: u64,

    /// Maximum captured bytes per stream
    pub max_output_size: usize,

    /// Shell used to run commands
    pub shell: String,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            max_output_size: MAX_OUTPUT_SIZE,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. If the config file does not exist, returns the
    /// default configuration with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/shell-guard/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "shell-guard") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("shell-guard")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SHELL_GUARD_LOG_LEVEL
    /// - SHELL_GUARD_LOG_FORMAT
    /// - SHELL_GUARD_TIMEOUT_SECS
    /// - SHELL_GUARD_SHELL
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("SHELL_GUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SHELL_GUARD_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(timeout) = lookup("SHELL_GUARD_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.trim().parse::<u64>() {
                self.executor.timeout_secs = timeout;
            }
        }
        if let Some(shell) = lookup("SHELL_GUARD_SHELL") {
            if !shell.trim().is_empty() {
                self.executor.shell = shell;
            }
        }
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.executor.shell.trim().is_empty() {
            anyhow::bail!("Executor shell must not be empty");
        }
        if self.executor.max_output_size == 0 {
            anyhow::bail!("Executor max_output_size must be > 0");
        }

        self.pattern_library()
            .validate()
            .context("Invalid policy configuration")?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Built-in pattern library with the policy section applied
    pub fn pattern_library(&self) -> PatternLibrary {
        let mut library = PatternLibrary::default();
        if let Some(ref allowlist) = self.policy.allowlist {
            library.replace_allowlist(allowlist.clone());
        }
        library.extend_allowlist(self.policy.extra_allowlist.iter().cloned());
        library.extend_keywords(self.policy.extra_keywords.iter().cloned());
        library.extend_sensitive_paths(self.policy.extra_sensitive_paths.iter().cloned());
        library
    }

    /// Executor configuration derived from the executor section
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_timeout(self.executor.timeout_secs)
            .with_max_output_size(self.executor.max_output_size)
            .with_shell(self.executor.shell.clone())
    }
}
