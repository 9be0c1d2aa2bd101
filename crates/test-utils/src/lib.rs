//! Shared helpers for jobdag's unit and integration tests.

pub mod builders;
pub mod fake_orchestrator;
pub mod probes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for a whole orchestration inside a test.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Filter directives come from `RUST_LOG`, then `JOBDAG_LOG`; without
/// either, only jobdag's own warnings are shown. Output of passing tests is
/// swallowed by the harness unless run with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_from_env(jobdag::logging::LOG_ENV_VAR))
            .unwrap_or_else(|_| EnvFilter::new("jobdag=warn"));

        // another harness may have installed one already
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Await `fut`, panicking if it outlives `limit`.
pub async fn within<F: Future>(limit: Duration, fut: F) -> F::Output {
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => output,
        Err(_) => panic!("test future still pending after {limit:?}"),
    }
}

/// [`within`] the default [`TEST_DEADLINE`].
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    within(TEST_DEADLINE, fut).await
}
