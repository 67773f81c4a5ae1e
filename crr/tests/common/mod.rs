#![allow(dead_code)]

pub mod fake;

pub use crr_common::testing::init_test_logging;
pub use fake::FakeTestopia;

use crr::ExecutionIdentity;
use crr_common::UserId;

#[macro_export]
macro_rules! test_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "test", $($arg)*);
    };
}

pub const PRODUCT_ID: u64 = 10;
pub const PLAN_ID: u64 = 20;

/// master branch, commit abc123, environment qemux86.
pub fn identity() -> ExecutionIdentity {
    ExecutionIdentity {
        branch: "master".to_string(),
        commit: "abc123".to_string(),
        milestone: "M2".to_string(),
        environment: "qemux86".to_string(),
        product_version: "unspecified".to_string(),
        build_date: "2024-05-01".to_string(),
        automation_user: UserId::new(1),
    }
}

/// One product with one matching plan and nothing else.
pub fn bare_service() -> FakeTestopia {
    FakeTestopia::new()
        .with_product(PRODUCT_ID, "Yocto")
        .with_plan(PLAN_ID, PRODUCT_ID, "Yocto: 2.1 master branch")
        .with_plan(21, PRODUCT_ID, "Yocto: 2.1 dunfell branch")
}
