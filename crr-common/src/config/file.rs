//! Reporter configuration file.
//!
//! ```toml
//! [server]
//! url = "https://bugzilla.example.com/tr_jsonrpc.cgi"
//! username = "ci@example.com"
//! password = "secret"
//! cookie_file = "~/.cache/crr/cookies.json"
//!
//! [build]
//! branch = "master"
//! commit = "3f2a9c1"
//! milestone = "M3"
//! date = "2024-05-01"
//!
//! [run]
//! environment = "qemux86-64"
//! product_version = "unspecified"
//! automation_user_id = 1
//! ```
//!
//! Every field can be overridden through a `CRR_*` environment variable;
//! [`ReporterConfig::apply_env_overrides`] records where each override came
//! from so `--verbose` runs can explain the effective configuration.

use super::env::{EnvError, EnvParser};
use super::source::{ConfigSource, Sourced};
use crate::errors::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default product version attached to automated runs.
pub const DEFAULT_PRODUCT_VERSION: &str = "unspecified";

/// Default automation user owning runs and case runs.
pub const DEFAULT_AUTOMATION_USER_ID: u64 = 1;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid environment overrides: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),
}

impl ConfigError {
    /// Catalog code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ConfigNotFound,
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Validation(_) => ErrorCode::ConfigValidationError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
        }
    }
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Complete reporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Where each overridden field came from; fields absent here are
    /// file values or defaults.
    #[serde(skip)]
    pub provenance: BTreeMap<&'static str, ConfigSource>,
}

/// Endpoint and credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Where to persist session cookies between invocations.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("cookie_file", &self.cookie_file)
            .finish()
    }
}

/// Identity of the build under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub milestone: String,
    /// Build date used in the automated run summary; today (UTC) when unset.
    #[serde(default)]
    pub date: Option<String>,
}

/// Run placement and ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub environment: String,
    #[serde(default = "default_product_version")]
    pub product_version: String,
    #[serde(default = "default_automation_user_id")]
    pub automation_user_id: u64,
    /// Resolve the automation user from this login instead of the fixed id.
    #[serde(default)]
    pub automation_login: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            environment: String::new(),
            product_version: default_product_version(),
            automation_user_id: DEFAULT_AUTOMATION_USER_ID,
            automation_login: None,
        }
    }
}

fn default_product_version() -> String {
    DEFAULT_PRODUCT_VERSION.to_string()
}

fn default_automation_user_id() -> u64 {
    DEFAULT_AUTOMATION_USER_ID
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl ReporterConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(cookie_file) = config.server.cookie_file.take() {
            let expanded = super::env::expand_home(&cookie_file.to_string_lossy());
            config.server.cookie_file = Some(expanded);
        }
        tracing::debug!(path = %path.display(), "Loaded reporter configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `CRR_*` environment overrides on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let mut parser = EnvParser::new();

        let strings: [(&'static str, &str, fn(&mut Self) -> &mut String); 8] = [
            ("server.url", "URL", |c| &mut c.server.url),
            ("server.username", "USERNAME", |c| &mut c.server.username),
            ("server.password", "PASSWORD", |c| &mut c.server.password),
            ("build.branch", "BRANCH", |c| &mut c.build.branch),
            ("build.commit", "COMMIT", |c| &mut c.build.commit),
            ("build.milestone", "MILESTONE", |c| &mut c.build.milestone),
            ("run.environment", "ENVIRONMENT", |c| &mut c.run.environment),
            ("run.product_version", "PRODUCT_VERSION", |c| {
                &mut c.run.product_version
            }),
        ];
        for (field, var, slot) in strings {
            if let Sourced {
                value: Some(value),
                source,
                ..
            } = parser.get_optional_string(var)
            {
                *slot(self) = value;
                self.provenance.insert(field, source);
            }
        }

        if let Sourced {
            value: Some(date),
            source,
            ..
        } = parser.get_optional_string("BUILD_DATE")
        {
            self.build.date = Some(date);
            self.provenance.insert("build.date", source);
        }

        if let Sourced {
            value: Some(login),
            source,
            ..
        } = parser.get_optional_string("AUTOMATION_LOGIN")
        {
            self.run.automation_login = Some(login);
            self.provenance.insert("run.automation_login", source);
        }

        let user = parser.get_u64_range(
            "AUTOMATION_USER_ID",
            self.run.automation_user_id,
            1,
            u64::MAX,
        );
        if user.is_explicit() {
            self.run.automation_user_id = user.value;
            self.provenance.insert("run.automation_user_id", user.source);
        }

        let cookie_file = parser.get_optional_path("COOKIE_FILE");
        if cookie_file.is_explicit() {
            self.server.cookie_file = cookie_file.value;
            self.provenance.insert("server.cookie_file", cookie_file.source);
        }

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(())
    }

    /// Record a command-line override.
    pub fn set_from_cli(&mut self, field: &'static str, apply: impl FnOnce(&mut Self)) {
        apply(self);
        self.provenance.insert(field, ConfigSource::CommandLine);
    }

    /// Effective source of a field.
    pub fn source_of(&self, field: &str) -> ConfigSource {
        self.provenance
            .get(field)
            .copied()
            .unwrap_or(ConfigSource::File)
    }

    /// Check that everything needed to open a session and bind a product is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let url = self.server.url.trim();
        if url.is_empty() {
            problems.push("server.url is required".to_string());
        } else if !has_http_scheme(url) {
            problems.push(format!("server.url must use http or https: '{url}'"));
        }

        let required = [
            ("server.username", &self.server.username),
            ("server.password", &self.server.password),
            ("build.branch", &self.build.branch),
            ("build.commit", &self.build.commit),
            ("run.environment", &self.run.environment),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            }
        }

        if self.run.automation_user_id == 0 {
            problems.push("run.automation_user_id must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
url = "https://tcms.example.com/tr_jsonrpc.cgi"
username = "ci@example.com"
password = "hunter2"

[build]
branch = "master"
commit = "abc123"
milestone = "M2"

[run]
environment = "qemux86-64"
"#;

    fn clear_crr_env() {
        for var in [
            "CRR_URL",
            "CRR_USERNAME",
            "CRR_PASSWORD",
            "CRR_BRANCH",
            "CRR_COMMIT",
            "CRR_MILESTONE",
            "CRR_ENVIRONMENT",
            "CRR_PRODUCT_VERSION",
            "CRR_BUILD_DATE",
            "CRR_AUTOMATION_LOGIN",
            "CRR_AUTOMATION_USER_ID",
            "CRR_COOKIE_FILE",
        ] {
            // SAFETY: Tests are serialized via env_test_lock
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.server.username, "ci@example.com");
        assert_eq!(config.build.commit, "abc123");
        assert_eq!(config.run.product_version, DEFAULT_PRODUCT_VERSION);
        assert_eq!(config.run.automation_user_id, DEFAULT_AUTOMATION_USER_ID);
        assert!(config.build.date.is_none());
        assert!(config.server.cookie_file.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config.server);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = ReporterConfig::from_toml_str("[server]\nurl = \"ftp://x\"\n").unwrap();
        let err = config.validate().unwrap_err();
        let ConfigError::Validation(problems) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(problems.iter().any(|p| p.contains("http or https")));
        assert!(problems.iter().any(|p| p == "server.username is required"));
        assert!(problems.iter().any(|p| p == "build.commit is required"));
        assert!(problems.iter().any(|p| p == "run.environment is required"));
        assert_eq!(err.code(), ErrorCode::ConfigValidationError);
    }

    #[test]
    fn test_validate_accepts_uppercase_scheme() {
        let mut config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        config.server.url = "HTTPS://tcms.example.com/tr_jsonrpc.cgi".to_string();
        config.validate().unwrap();

        config.server.url = "Ftp://tcms.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReporterConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert_eq!(err.code(), ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_load_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nurl = ").unwrap();
        let err = ReporterConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();
        let config = ReporterConfig::load(file.path()).unwrap();
        assert_eq!(config.run.environment, "qemux86-64");
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let _guard = env_test_lock();
        clear_crr_env();

        // SAFETY: Tests are serialized via env_test_lock
        unsafe {
            std::env::set_var("CRR_BRANCH", "release");
            std::env::set_var("CRR_PASSWORD", "from-env");
            std::env::set_var("CRR_AUTOMATION_USER_ID", "42");
            std::env::set_var("CRR_BUILD_DATE", "2024-01-02");
        }

        let mut config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.build.branch, "release");
        assert_eq!(config.server.password, "from-env");
        assert_eq!(config.run.automation_user_id, 42);
        assert_eq!(config.build.date.as_deref(), Some("2024-01-02"));
        assert_eq!(config.source_of("build.branch"), ConfigSource::Environment);
        assert_eq!(config.source_of("build.commit"), ConfigSource::File);

        clear_crr_env();
    }

    #[test]
    fn test_env_override_errors_are_reported() {
        let _guard = env_test_lock();
        clear_crr_env();

        // SAFETY: Tests are serialized via env_test_lock
        unsafe { std::env::set_var("CRR_AUTOMATION_USER_ID", "zero") };

        let mut config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        let err = config.apply_env_overrides().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigEnvError);
        assert!(err.to_string().contains("CRR_AUTOMATION_USER_ID"));

        clear_crr_env();
    }

    #[test]
    fn test_cli_override_records_source() {
        let mut config = ReporterConfig::from_toml_str(SAMPLE).unwrap();
        config.set_from_cli("build.commit", |c| c.build.commit = "fff".to_string());
        assert_eq!(config.build.commit, "fff");
        assert_eq!(config.source_of("build.commit"), ConfigSource::CommandLine);
    }
}
