//! Session-layer errors.
//!
//! Transport failures (the request never produced a usable RPC response)
//! are kept apart from application faults (the service understood the call
//! and refused it) so callers can decide what is worth retrying. This layer
//! itself never retries.

use crr_common::ErrorCode;
use crr_common::util::render_params;
use serde_json::Value;
use thiserror::Error;

/// Application-level fault returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fault {code}: {message}")]
pub struct RpcFault {
    pub code: i64,
    pub message: String,
}

/// Network or HTTP level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("{url} answered HTTP {status}")]
    HttpStatus {
        url: String,
        status: u16,
        /// First part of the response body, for diagnostics.
        body: String,
    },

    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("unexpected result shape for {verb}: {reason}")]
    UnexpectedShape { verb: String, reason: String },
}

impl TransportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Connection { .. } => ErrorCode::TransportConnectionFailed,
            Self::HttpStatus { .. } => ErrorCode::TransportHttpStatus,
            Self::MalformedResponse { .. } | Self::UnexpectedShape { .. } => {
                ErrorCode::TransportMalformedResponse
            }
        }
    }
}

/// Everything that can go wrong opening or using a session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("unsupported endpoint scheme in '{url}' (expected http:// or https://)")]
    UnsupportedScheme { url: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("login as '{username}' rejected: {fault}")]
    Authentication { username: String, fault: RpcFault },

    /// `params` are already redacted.
    #[error("error while executing '{verb}({})': {fault}", render_params(.params))]
    RemoteCall {
        verb: String,
        params: Vec<Value>,
        #[source]
        fault: RpcFault,
    },

    #[error("invalid {verb} request: {reason}")]
    InvalidRequest { verb: &'static str, reason: String },
}

impl SessionError {
    /// Only transport failures are worth retrying by a caller. A result
    /// that decoded but does not fit its type fails the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(inner) => !matches!(inner, TransportError::UnexpectedShape { .. }),
            _ => false,
        }
    }

    /// The fault carried by a remote call error, if any.
    pub fn fault(&self) -> Option<&RpcFault> {
        match self {
            Self::RemoteCall { fault, .. } | Self::Authentication { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedScheme { .. } => ErrorCode::TransportUnsupportedScheme,
            Self::Transport(inner) => inner.code(),
            Self::Authentication { .. } => ErrorCode::AuthLoginRejected,
            Self::RemoteCall { .. } => ErrorCode::RemoteCallFault,
            Self::InvalidRequest { .. } => ErrorCode::RemoteInvalidRequest,
        }
    }
}
