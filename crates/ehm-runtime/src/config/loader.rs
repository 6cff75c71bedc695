//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.ehm/config.toml`)
//! 3. Explicit config file ([`ConfigLoader::with_file`])
//! 4. Environment variables (`EHM_*`)
//!
//! Each layer overrides the previous.

use super::{default_config_path, ConfigError, ConfigLayer, EhmConfig};
use ehm_event::UnhandledResume;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding `resume.unhandled`.
pub const ENV_UNHANDLED_RESUME: &str = "EHM_UNHANDLED_RESUME";
/// Environment variable overriding `diagnostics.stderr`.
pub const ENV_DIAGNOSTICS_STDERR: &str = "EHM_DIAGNOSTICS_STDERR";
/// Environment variable overriding `queue.warn_on_discard`.
pub const ENV_QUEUE_WARN_ON_DISCARD: &str = "EHM_QUEUE_WARN_ON_DISCARD";

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($field:expr, $var:expr) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use ehm_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_file("/etc/myapp/ehm.toml")
///     .skip_env_vars()
///     .load()?;
/// # Ok::<(), ehm_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.ehm/config.toml).
    global_config_path: Option<PathBuf>,

    /// Explicit config file layered over the global one.
    file: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip global config loading.
    skip_global: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Adds an explicit config file, applied after the global config.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// or an `EHM_*` variable holds an invalid value.
    /// Missing config files are silently ignored.
    pub fn load(&self) -> Result<EhmConfig, ConfigError> {
        let mut config = EhmConfig::default();

        // Layer 1: Global config
        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_layer) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.apply(&global_layer);
            }
        }

        // Layer 2: Explicit file
        if let Some(ref path) = self.file {
            if let Some(file_layer) = self.load_file(path)? {
                debug!(path = %path.display(), "Loaded config file");
                config.apply(&file_layer);
            }
        }

        // Layer 3: Environment variables
        if !self.skip_env {
            self.apply_env_vars(&mut config)?;
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let layer =
            ConfigLayer::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(layer))
    }

    /// Applies environment variable overrides.
    fn apply_env_vars(&self, config: &mut EhmConfig) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var(ENV_UNHANDLED_RESUME) {
            config.resume.unhandled = parse_policy(&val).ok_or_else(|| {
                ConfigError::invalid_env_var(ENV_UNHANDLED_RESUME, "expected ignore|terminate")
            })?;
        }

        parse_env_bool!(config.diagnostics.stderr, ENV_DIAGNOSTICS_STDERR);
        parse_env_bool!(config.queue.warn_on_discard, ENV_QUEUE_WARN_ON_DISCARD);

        Ok(())
    }
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_policy(s: &str) -> Option<UnhandledResume> {
    match s.trim().to_lowercase().as_str() {
        "ignore" => Some(UnhandledResume::Ignore),
        "terminate" => Some(UnhandledResume::Terminate),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write config file");
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect("load defaults");

        assert_eq!(config, EhmConfig::default());
    }

    #[test]
    fn load_global_config() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(
            temp.path(),
            "config.toml",
            r#"
[resume]
unhandled = "terminate"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .expect("load global");

        assert_eq!(config.resume.unhandled, UnhandledResume::Terminate);
        assert!(config.diagnostics.stderr);
    }

    #[test]
    fn file_overrides_global() {
        let temp = TempDir::new().expect("temp dir");
        let global = create_config_file(
            temp.path(),
            "global.toml",
            r#"
[resume]
unhandled = "terminate"

[diagnostics]
stderr = false
"#,
        );
        let local = create_config_file(
            temp.path(),
            "local.toml",
            r#"
[queue]
warn_on_discard = false
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global)
            .with_file(&local)
            .skip_env_vars()
            .load()
            .expect("load layered");

        // From global (not overridden locally)
        assert_eq!(config.resume.unhandled, UnhandledResume::Terminate);
        assert!(!config.diagnostics.stderr);
        // From local
        assert!(!config.queue.warn_on_discard);
    }

    #[test]
    fn file_can_reset_global_to_default() {
        let temp = TempDir::new().expect("temp dir");
        let global = create_config_file(
            temp.path(),
            "global.toml",
            r#"
[resume]
unhandled = "terminate"

[diagnostics]
stderr = false
"#,
        );
        let local = create_config_file(
            temp.path(),
            "local.toml",
            r#"
[resume]
unhandled = "ignore"

[diagnostics]
stderr = true
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global)
            .with_file(&local)
            .skip_env_vars()
            .load()
            .expect("load layered");

        assert_eq!(config.resume.unhandled, UnhandledResume::Ignore);
        assert!(config.diagnostics.stderr);
        assert!(config.queue.warn_on_discard);
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_file("/nonexistent/other.toml")
            .skip_env_vars()
            .load()
            .expect("missing files are ignored");

        assert_eq!(config, EhmConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(temp.path(), "bad.toml", "[resume\nunhandled =");

        let err = ConfigLoader::new()
            .skip_global_config()
            .with_file(&path)
            .skip_env_vars()
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn parse_policy_values() {
        assert_eq!(parse_policy("ignore"), Some(UnhandledResume::Ignore));
        assert_eq!(parse_policy(" Terminate "), Some(UnhandledResume::Terminate));
        assert_eq!(parse_policy("abort"), None);
    }
}
