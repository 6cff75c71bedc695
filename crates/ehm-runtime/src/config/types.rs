//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::ConfigError;
use ehm_event::UnhandledResume;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// This is the unified configuration after applying all layers.
///
/// # Example
///
/// ```
/// use ehm_runtime::config::EhmConfig;
/// use ehm_event::UnhandledResume;
///
/// let config = EhmConfig::default();
/// assert_eq!(config.resume.unhandled, UnhandledResume::Ignore);
/// assert!(config.diagnostics.stderr);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EhmConfig {
    /// Resumption behaviour.
    pub resume: ResumeConfig,

    /// Where fatal and unhandled diagnostics go.
    pub diagnostics: DiagnosticsConfig,

    /// Async delivery queue behaviour.
    pub queue: QueueConfig,
}

impl EhmConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Applies a file layer: every key the layer sets overrides `self`.
    pub fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(unhandled) = layer.resume.unhandled {
            self.resume.unhandled = unhandled;
        }
        if let Some(stderr) = layer.diagnostics.stderr {
            self.diagnostics.stderr = stderr;
        }
        if let Some(warn_on_discard) = layer.queue.warn_on_discard {
            self.queue.warn_on_discard = warn_on_discard;
        }
    }
}

/// Resumption configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResumeConfig {
    /// Policy for a resumption no handler matches, unless the event
    /// overrides it.
    pub unhandled: UnhandledResume,
}

/// Diagnostic output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Also print fatal diagnostics to standard error.
    ///
    /// Diagnostics always go through `tracing`; this adds a plain
    /// stderr line for hosts that install no subscriber.
    pub stderr: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { stderr: true }
    }
}

/// Async queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Warn when a context ends with undelivered messages.
    ///
    /// When off the discard count is logged at debug level.
    pub warn_on_discard: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            warn_on_discard: true,
        }
    }
}

/// One configuration file as written.
///
/// Keys missing from the file stay `None` and leave lower layers alone,
/// so a file can set a value back to its default.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigLayer {
    /// `[resume]` keys present in the file.
    pub resume: ResumeLayer,
    /// `[diagnostics]` keys present in the file.
    pub diagnostics: DiagnosticsLayer,
    /// `[queue]` keys present in the file.
    pub queue: QueueLayer,
}

impl ConfigLayer {
    /// Deserializes a layer from TOML.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// `[resume]` section of a [`ConfigLayer`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResumeLayer {
    pub unhandled: Option<UnhandledResume>,
}

/// `[diagnostics]` section of a [`ConfigLayer`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsLayer {
    pub stderr: Option<bool>,
}

/// `[queue]` section of a [`ConfigLayer`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueLayer {
    pub warn_on_discard: Option<bool>,
}
