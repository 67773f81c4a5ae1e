//! Test logging.
//!
//! Call [`init_test_logging`] at the top of a test; repeated calls are no-ops.
//! `CRR_TEST_LOG_LEVEL` sets the filter (default `debug`).

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let level = std::env::var("CRR_TEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let filter = EnvFilter::try_new(format!(
            "crr={level},crr_session={level},crr_common={level},test={level}"
        ))
        .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .compact(),
            )
            .with(filter)
            .try_init();
    });
}
