//! Local mirrors of the remote test-management entities.
//!
//! The remote service hands back loosely typed attribute maps. Integers
//! sometimes arrive as strings, flags as `0`/`1` or booleans, and names as
//! `null`. The mirrors below accept all of those shapes and expose strongly
//! typed fields to the reconciliation engine.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                lenient_u64(deserializer).map(Self)
            }
        }
    };
}

remote_id!(
    /// Identifier of a product.
    ProductId
);
remote_id!(
    /// Identifier of a test plan.
    PlanId
);
remote_id!(
    /// Identifier of an environment.
    EnvironmentId
);
remote_id!(
    /// Identifier of a build.
    BuildId
);
remote_id!(
    /// Identifier of a test run.
    RunId
);
remote_id!(
    /// Identifier of a test case.
    CaseId
);
remote_id!(
    /// Identifier of a user account.
    UserId
);

/// A product; the root of every other entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

/// A test plan belonging to one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub plan_id: PlanId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

/// A product environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub environment_id: EnvironmentId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub isactive: bool,
}

/// A product build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub build_id: BuildId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub milestone: String,
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub isactive: bool,
}

/// A test run pinned to one build and one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub run_id: RunId,
    pub build_id: BuildId,
    pub environment_id: EnvironmentId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
}

/// A test case enumerated through its plan (or fetched by id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub case_id: CaseId,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub isautomated: bool,
}

/// Membership entry returned when listing the cases attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMember {
    pub case_id: CaseId,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    pub id: UserId,
}

fn default_true() -> bool {
    true
}

/// Accept `7`, `"7"` and `7.0` as the same identifier.
pub fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .ok_or_else(|| de::Error::custom(format!("expected unsigned integer, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("expected numeric string, got '{s}'"))),
        other => Err(de::Error::custom(format!("expected identifier, got {other}"))),
    }
}

/// Accept booleans, `0`/`1` and their string forms.
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            _ => Err(de::Error::custom(format!("expected flag, got '{s}'"))),
        },
        serde_json::Value::Null => Ok(false),
        other => Err(de::Error::custom(format!("expected flag, got {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_opt_string(deserializer).map(Option::unwrap_or_default)
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!("expected string, got {other}"))),
    }
}
