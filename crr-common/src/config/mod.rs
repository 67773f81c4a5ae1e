//! Configuration system for the reporter.
//!
//! This module provides:
//! - TOML configuration file loading and validation
//! - Environment variable overrides with type safety
//! - Source tracking for debugging

pub mod env;
pub mod file;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use file::{
    BuildConfig, ConfigError, DEFAULT_AUTOMATION_USER_ID, DEFAULT_PRODUCT_VERSION, ReporterConfig,
    RunConfig, ServerConfig,
};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
