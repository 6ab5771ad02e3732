#![allow(dead_code)]

use std::time::Duration;

// Logging is auto-installed for every test binary that includes this module
#[ctor::ctor]
fn init_logging() {
    backend_test_support::logging::init();
}

/// Generous per-message wait; messages normally arrive within milliseconds.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);
