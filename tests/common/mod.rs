#![allow(dead_code)]

pub use jobdag_test_utils::builders;
pub use jobdag_test_utils::fake_orchestrator;
pub use jobdag_test_utils::probes;
pub use jobdag_test_utils::{init_tracing, with_timeout};

use std::time::Duration;

use tokio::time::Instant;

/// `b - a`, or zero when `b` is earlier.
pub fn elapsed_between(a: Instant, b: Instant) -> Duration {
    b.saturating_duration_since(a)
}
