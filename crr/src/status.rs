//! Case-run status codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A case-run status id as understood by the service.
///
/// The named constants cover the stock statuses. Other positive ids are
/// accepted and forwarded untouched; the service decides whether they exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseRunStatus(pub u32);

impl CaseRunStatus {
    pub const IDLE: Self = Self(1);
    pub const PASSED: Self = Self(2);
    pub const FAILED: Self = Self(3);
    pub const RUNNING: Self = Self(4);
    pub const PAUSED: Self = Self(5);
    pub const BLOCKED: Self = Self(6);
    pub const ERROR: Self = Self(7);

    const NAMED: [(&'static str, Self); 7] = [
        ("idle", Self::IDLE),
        ("passed", Self::PASSED),
        ("failed", Self::FAILED),
        ("running", Self::RUNNING),
        ("paused", Self::PAUSED),
        ("blocked", Self::BLOCKED),
        ("error", Self::ERROR),
    ];

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for CaseRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "status {}", self.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown case-run status '{0}' (expected a name such as passed/failed or a positive id)")]
pub struct ParseStatusError(pub String);

impl FromStr for CaseRunStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let alias = match lower.as_str() {
            "pass" => "passed",
            "fail" => "failed",
            other => other,
        };
        if let Some((_, status)) = Self::NAMED.iter().find(|(name, _)| *name == alias) {
            return Ok(*status);
        }
        match trimmed.parse::<u32>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ParseStatusError(trimmed.to_string())),
        }
    }
}
