//! Case run reporter.
//!
//! Reconciles a CI execution (product, branch, commit, environment, test
//! case) onto a remote test-management service: resolves or creates the
//! plan, environment, build and automated run it belongs to, then records
//! one case-run status.

#![forbid(unsafe_code)]

pub mod context;
pub mod driver;
pub mod error;
pub mod reconcile;
pub mod resolve;
pub mod status;

pub use context::{CaseRunContext, Context, ContextState, Created, ProductContext};
pub use driver::Driver;
pub use error::{ReconcileError, ResourceKind};
pub use reconcile::{CaseSelector, ExecutionIdentity, ExecutionReport};
pub use status::CaseRunStatus;
