//! Shared types, configuration and logging for the Case Run Reporter.

pub mod config;
pub mod errors;
pub mod logging;
pub mod testing;
pub mod types;
pub mod util;

pub use config::{ConfigError, ConfigSource, ReporterConfig};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use types::{
    Build, BuildId, CaseId, Environment, EnvironmentId, LoginResult, PlanId, Product, ProductId,
    RunId, RunMember, TestCase, TestPlan, TestRun, UserId,
};
