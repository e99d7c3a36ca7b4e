//! The application-facing entry point: resolves the process-wide
//! configured adapter and forwards to `adapter.schedule`.
//!
//! The configured adapter is global mutable state with a deliberately
//! narrow init/teardown rule: set once at process boot via [`configure`],
//! read by every call to [`schedule`], never reassigned in production
//! code. [`configure_for_test`] exists as an explicit escape hatch for
//! test suites that need to swap the adapter between cases, rather than
//! letting `configure` silently overwrite a previous value.

use std::sync::{Arc, RwLock};

use crate::error::{AdapterNotConfiguredError, SchedulingError};
use crate::record::{JobRecord, ScheduleSpec};
use crate::store::JobStore;

static ADAPTER: RwLock<Option<Arc<dyn JobStore>>> = RwLock::new(None);

/// Set the process-wide adapter. Intended to run once at boot.
///
/// # Panics
///
/// Panics if an adapter is already configured. Reassignment must go
/// through [`configure_for_test`] so the intent is explicit at call
/// sites, not implicit in a silent overwrite.
pub fn configure(adapter: Arc<dyn JobStore>) {
    let mut slot = ADAPTER.write().expect("adapter lock poisoned");
    assert!(
        slot.is_none(),
        "rw_jobs::scheduler::configure called twice; use configure_for_test to reassign"
    );
    *slot = Some(adapter);
}

/// Test-only escape hatch: overwrite the configured adapter unconditionally.
#[doc(hidden)]
pub fn configure_for_test(adapter: Arc<dyn JobStore>) {
    let mut slot = ADAPTER.write().expect("adapter lock poisoned");
    *slot = Some(adapter);
}

/// Clear the configured adapter. Test-only.
#[doc(hidden)]
pub fn reset_for_test() {
    let mut slot = ADAPTER.write().expect("adapter lock poisoned");
    *slot = None;
}

/// Serializes tests that touch the global adapter slot, since the Rust
/// test harness runs `#[tokio::test]` functions concurrently by default
/// and the slot in [`ADAPTER`] is shared process-wide.
#[doc(hidden)]
pub fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static GLOBAL_ADAPTER_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    GLOBAL_ADAPTER_TEST_LOCK
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

fn current() -> Result<Arc<dyn JobStore>, AdapterNotConfiguredError> {
    ADAPTER
        .read()
        .expect("adapter lock poisoned")
        .clone()
        .ok_or(AdapterNotConfiguredError)
}

/// Forward `spec` to the configured adapter's `schedule`, wrapping any
/// underlying failure in [`SchedulingError`].
pub async fn schedule(spec: ScheduleSpec) -> Result<JobRecord, SchedulingError> {
    let adapter = current().map_err(|e| SchedulingError(e.into()))?;
    adapter
        .schedule(spec)
        .await
        .map_err(SchedulingError)
}
