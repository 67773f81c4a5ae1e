//! Reconciliation errors.

use crate::context::ContextState;
use crr_common::ErrorCode;
use crr_session::SessionError;
use std::fmt;
use thiserror::Error;

/// The remote resource a resolution step was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Product,
    TestPlan,
    Environment,
    Build,
    TestRun,
    TestCase,
    User,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::TestPlan => "test plan",
            Self::Environment => "environment",
            Self::Build => "build",
            Self::TestRun => "test run",
            Self::TestCase => "test case",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{kind} not found: {key}")]
    NotFound { kind: ResourceKind, key: String },

    #[error("{count} {kind} candidates match '{key}', expected exactly one")]
    Ambiguous {
        kind: ResourceKind,
        key: String,
        count: usize,
    },

    #[error("cannot {operation} while {actual}; requires {required}")]
    InvalidState {
        operation: &'static str,
        required: ContextState,
        actual: ContextState,
    },

    #[error("invalid match pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ReconcileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Session(inner) => inner.code(),
            Self::NotFound { kind, .. } => match kind {
                ResourceKind::Product => ErrorCode::ReconcileProductNotFound,
                ResourceKind::TestPlan => ErrorCode::ReconcileTestPlanNotFound,
                ResourceKind::TestCase => ErrorCode::ReconcileTestCaseNotFound,
                ResourceKind::User => ErrorCode::AuthUserLookupFailed,
                _ => ErrorCode::ReconcileResourceNotFound,
            },
            Self::Ambiguous { .. } => ErrorCode::ReconcileAmbiguous,
            Self::InvalidState { .. } => ErrorCode::ReconcileInvalidState,
            Self::Pattern { .. } => ErrorCode::ReconcilePatternError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}
