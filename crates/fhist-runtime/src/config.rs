#![forbid(unsafe_code)]

//! History configuration.
//!
//! Captures how a router history is built as a single [`HistoryConfig`],
//! loadable from TOML or JSON at startup (TOML behind the `config` feature).
//!
//! ```toml
//! # fhist.toml
//! mode = "hash"
//! base = "/app/"
//! capture_scroll_on_unload = true
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("fhist.toml")?;
//! let config = HistoryConfig::from_json_str(json)?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which history flavor to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Path-based routing on the host stack.
    #[default]
    Web,
    /// Fragment-based routing on the host stack.
    Hash,
    /// In-process stack, no host.
    Memory,
}

/// Top-level history configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub mode: HistoryMode,
    /// Base path (or hash base). `None` derives it from the host.
    pub base: Option<String>,
    /// Record the scroll position into the current slot before unload.
    pub capture_scroll_on_unload: bool,
    /// Warn when the host slot was overwritten by foreign code.
    pub warn_on_foreign_state: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            mode: HistoryMode::Web,
            base: None,
            capture_scroll_on_unload: true,
            warn_on_foreign_state: cfg!(debug_assertions),
        }
    }
}

impl HistoryConfig {
    /// Configuration for `mode` with `base` and default flags.
    #[must_use]
    pub fn new(mode: HistoryMode, base: Option<&str>) -> Self {
        Self {
            mode,
            base: base.map(str::to_owned),
            ..Self::default()
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.checked()
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Problems with this configuration. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(base) = &self.base {
            if base.matches('#').count() > 1 {
                errors.push(format!("base must contain at most one '#', got {base:?}"));
            }
            if self.mode == HistoryMode::Memory && base.contains('#') {
                errors.push(format!("memory mode does not use a hash base, got {base:?}"));
            }
        }
        errors
    }

    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors raised while loading or applying a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The configured mode cannot be built by this constructor.
    #[error("history mode {0:?} is not supported here")]
    UnsupportedMode(HistoryMode),
}
