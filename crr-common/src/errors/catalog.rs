//! Error Catalog for the Case Run Reporter
//!
//! Every failure surfaced to an operator maps onto one stable code
//! (CRR-E001 through CRR-E599) with a message template and remediation
//! steps, so CI logs can be grepped and explained after the fact.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                               |
//! |------------|-------------|-------------------------------------------|
//! | E001-E099  | Config      | Configuration file and environment errors |
//! | E100-E199  | Transport   | HTTP and wire-level failures              |
//! | E200-E299  | Auth        | Login and identity resolution             |
//! | E300-E399  | Remote      | Application faults raised by the service  |
//! | E400-E499  | Reconcile   | Resource lookup and context state errors  |
//! | E500-E599  | Internal    | Internal/unexpected errors                |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every reporter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file not found
    ConfigNotFound,
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,

    // =========================================================================
    // Transport Errors (E100-E199)
    // =========================================================================
    /// Endpoint URL uses a scheme other than http or https
    TransportUnsupportedScheme,
    /// Connection to the endpoint could not be established or was dropped
    TransportConnectionFailed,
    /// Endpoint answered with a non-2xx HTTP status
    TransportHttpStatus,
    /// Endpoint answered with a body that is not a valid RPC response
    TransportMalformedResponse,

    // =========================================================================
    // Auth Errors (E200-E299)
    // =========================================================================
    /// Login was rejected by the service
    AuthLoginRejected,
    /// Automation user login could not be resolved to an id
    AuthUserLookupFailed,

    // =========================================================================
    // Remote Errors (E300-E399)
    // =========================================================================
    /// The service returned an application fault for a call
    RemoteCallFault,
    /// A request failed local validation before it was sent
    RemoteInvalidRequest,

    // =========================================================================
    // Reconcile Errors (E400-E499)
    // =========================================================================
    /// No product matches the requested name
    ReconcileProductNotFound,
    /// No test plan matches the product/branch pattern
    ReconcileTestPlanNotFound,
    /// No automated test case matches the requested alias
    ReconcileTestCaseNotFound,
    /// A lookup matched more than one remote resource
    ReconcileAmbiguous,
    /// An operation was invoked in the wrong context state
    ReconcileInvalidState,
    /// A match pattern could not be compiled
    ReconcilePatternError,
    /// A required resource of another kind does not exist
    ReconcileResourceNotFound,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// Logging system error
    InternalLoggingError,
    /// Cookie store could not be loaded or saved
    InternalCookieStore,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            // Config (001-099)
            Self::ConfigNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigValidationError => 4,
            Self::ConfigEnvError => 5,

            // Transport (100-199)
            Self::TransportUnsupportedScheme => 100,
            Self::TransportConnectionFailed => 101,
            Self::TransportHttpStatus => 102,
            Self::TransportMalformedResponse => 103,

            // Auth (200-299)
            Self::AuthLoginRejected => 200,
            Self::AuthUserLookupFailed => 201,

            // Remote (300-399)
            Self::RemoteCallFault => 300,
            Self::RemoteInvalidRequest => 301,

            // Reconcile (400-499)
            Self::ReconcileProductNotFound => 400,
            Self::ReconcileTestPlanNotFound => 401,
            Self::ReconcileTestCaseNotFound => 402,
            Self::ReconcileAmbiguous => 403,
            Self::ReconcileInvalidState => 404,
            Self::ReconcilePatternError => 405,
            Self::ReconcileResourceNotFound => 406,

            // Internal (500-599)
            Self::InternalLoggingError => 500,
            Self::InternalCookieStore => 501,
        }
    }

    /// Returns the formatted error code string (e.g., "CRR-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("CRR-E{:03}", self.code_number())
    }

    /// Parse a code string such as `CRR-E403`, `E403` or `403`.
    pub fn parse(code: &str) -> Option<Self> {
        let trimmed = code.trim().to_ascii_uppercase();
        let digits = trimmed
            .strip_prefix("CRR-")
            .unwrap_or(&trimmed)
            .trim_start_matches('E');
        let number: u16 = digits.parse().ok()?;
        Self::all()
            .iter()
            .copied()
            .find(|candidate| candidate.code_number() == number)
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Transport,
            200..=299 => ErrorCategory::Auth,
            300..=399 => ErrorCategory::Remote,
            400..=499 => ErrorCategory::Reconcile,
            _ => ErrorCategory::Internal,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the error message template.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "Configuration file not found",
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has an invalid value",

            Self::TransportUnsupportedScheme => "Endpoint URL scheme is not http or https",
            Self::TransportConnectionFailed => "Could not reach the RPC endpoint",
            Self::TransportHttpStatus => "RPC endpoint answered with an HTTP error status",
            Self::TransportMalformedResponse => "RPC endpoint returned a malformed response",

            Self::AuthLoginRejected => "Login was rejected by the test-management service",
            Self::AuthUserLookupFailed => "Automation user login could not be resolved",

            Self::RemoteCallFault => "The test-management service rejected a call",
            Self::RemoteInvalidRequest => "A request failed validation before being sent",

            Self::ReconcileProductNotFound => "Product not found",
            Self::ReconcileTestPlanNotFound => "No test plan matches the product and branch",
            Self::ReconcileTestCaseNotFound => "No automated test case matches the alias",
            Self::ReconcileAmbiguous => "Lookup matched more than one remote resource",
            Self::ReconcileInvalidState => "Operation invoked before its context was bound",
            Self::ReconcilePatternError => "Match pattern could not be compiled",
            Self::ReconcileResourceNotFound => "Required remote resource not found",

            Self::InternalLoggingError => "Logging system error",
            Self::InternalCookieStore => "Cookie store could not be loaded or saved",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigNotFound => &[
                "Pass the configuration path with --config",
                "Or set CRR_CONFIG to the configuration file",
            ],
            Self::ConfigReadError => &[
                "Check file permissions on the configuration file",
                "Make sure the path points at a regular file",
            ],
            Self::ConfigParseError => &[
                "Validate the file with a TOML linter",
                "Check for unquoted strings and unbalanced brackets",
            ],
            Self::ConfigValidationError => &[
                "Fill in every required field reported in the error",
                "The server url must start with http:// or https://",
            ],
            Self::ConfigEnvError => &[
                "Check the CRR_* environment variables for typos",
                "Unset the variable to fall back to the file value",
            ],
            Self::TransportUnsupportedScheme => &[
                "Use an http:// or https:// endpoint URL",
            ],
            Self::TransportConnectionFailed => &[
                "Check that the endpoint host is reachable from this machine",
                "Verify proxy and TLS settings",
                "Retry the job; this layer does not retry on its own",
            ],
            Self::TransportHttpStatus => &[
                "Verify the endpoint path points at the RPC handler",
                "Check the web server logs for the reported status",
            ],
            Self::TransportMalformedResponse => &[
                "Verify the endpoint speaks JSON-RPC",
                "Check for an intercepting proxy or login page",
            ],
            Self::AuthLoginRejected => &[
                "Check the username and password",
                "Make sure the account is enabled on the service",
            ],
            Self::AuthUserLookupFailed => &[
                "Check the configured automation_login",
                "Or set automation_user_id explicitly",
            ],
            Self::RemoteCallFault => &[
                "Read the fault message for the rejected field",
                "Check that the account has permission for the operation",
            ],
            Self::RemoteInvalidRequest => &[
                "Identifiers must be positive and names non-empty",
            ],
            Self::ReconcileProductNotFound => &[
                "Check the product name for typos (matching is exact)",
            ],
            Self::ReconcileTestPlanNotFound => &[
                "Create a plan named '<product>: ... <branch> branch'",
                "Check that the branch name matches the plan name",
            ],
            Self::ReconcileTestCaseNotFound => &[
                "Check the case alias in the bound test plan",
                "Make sure the case is flagged as automated",
            ],
            Self::ReconcileAmbiguous => &[
                "Rename or deactivate duplicates so exactly one resource matches",
            ],
            Self::ReconcileInvalidState => &[
                "Bind a product before binding a case run",
                "Bind a case run before executing it",
            ],
            Self::ReconcilePatternError => &[
                "Report this as a bug together with the offending name",
            ],
            Self::ReconcileResourceNotFound => &[
                "Check that the referenced resource exists on the service",
            ],
            Self::InternalLoggingError => &[
                "Check that CRR_LOG_FILE points at a writable location",
            ],
            Self::InternalCookieStore => &[
                "Delete the cookie file; the next run re-authenticates",
            ],
        }
    }

    /// Returns all error codes for iteration.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::TransportUnsupportedScheme,
            Self::TransportConnectionFailed,
            Self::TransportHttpStatus,
            Self::TransportMalformedResponse,
            Self::AuthLoginRejected,
            Self::AuthUserLookupFailed,
            Self::RemoteCallFault,
            Self::RemoteInvalidRequest,
            Self::ReconcileProductNotFound,
            Self::ReconcileTestPlanNotFound,
            Self::ReconcileTestCaseNotFound,
            Self::ReconcileAmbiguous,
            Self::ReconcileInvalidState,
            Self::ReconcilePatternError,
            Self::ReconcileResourceNotFound,
            Self::InternalLoggingError,
            Self::InternalCookieStore,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration errors (E001-E099)
    Config,
    /// HTTP and wire errors (E100-E199)
    Transport,
    /// Login errors (E200-E299)
    Auth,
    /// Service faults (E300-E399)
    Remote,
    /// Lookup and state errors (E400-E499)
    Reconcile,
    /// Internal/unexpected errors (E500-E599)
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Transport => "Transport",
            Self::Auth => "Authentication",
            Self::Remote => "Remote",
            Self::Reconcile => "Reconciliation",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "CRR-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
