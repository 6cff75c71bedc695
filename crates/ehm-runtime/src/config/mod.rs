//! Runtime configuration with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌──────────────────────────────────────────┐
//! │  1. Environment Variables (EHM_*)        │  Runtime override
//! ├──────────────────────────────────────────┤
//! │  2. Explicit File (with_file)            │
//! ├──────────────────────────────────────────┤
//! │  3. Global Config (~/.ehm/config.toml)   │  User defaults
//! ├──────────────────────────────────────────┤
//! │  4. Default Values (compile-time)        │  Fallback
//! └──────────────────────────────────────────┘
//! ```
//!
//! The dispatch engine reads the process-wide config through [`current`].
//! Hosts load a config once at startup and [`install`] it; until then the
//! defaults apply.
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `EHM_UNHANDLED_RESUME` | `resume.unhandled` | `ignore` / `terminate` |
//! | `EHM_DIAGNOSTICS_STDERR` | `diagnostics.stderr` | bool |
//! | `EHM_QUEUE_WARN_ON_DISCARD` | `queue.warn_on_discard` | bool |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.ehm/config.toml
//!
//! [resume]
//! unhandled = "ignore"
//!
//! [diagnostics]
//! stderr = true
//!
//! [queue]
//! warn_on_discard = true
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{
    ConfigLoader, ENV_DIAGNOSTICS_STDERR, ENV_QUEUE_WARN_ON_DISCARD, ENV_UNHANDLED_RESUME,
};
pub use types::{
    ConfigLayer, DiagnosticsConfig, DiagnosticsLayer, EhmConfig, QueueConfig, QueueLayer,
    ResumeConfig, ResumeLayer,
};

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Default global config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ehm")
}

/// Default global config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

fn active() -> &'static RwLock<Arc<EhmConfig>> {
    static ACTIVE: OnceLock<RwLock<Arc<EhmConfig>>> = OnceLock::new();
    ACTIVE.get_or_init(|| RwLock::new(Arc::new(EhmConfig::default())))
}

/// Replaces the process-wide configuration.
///
/// Takes effect for every raise started afterwards, on every thread.
pub fn install(config: EhmConfig) {
    *active().write() = Arc::new(config);
}

/// Returns the process-wide configuration.
#[must_use]
pub fn current() -> Arc<EhmConfig> {
    Arc::clone(&active().read())
}
