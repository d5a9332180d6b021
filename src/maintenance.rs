//! Background maintenance scaffolding shared by the pool and the key cache.
//!
//! ## Architecture
//!
//! Each component owns exactly one [`MaintenanceTask`]: a dedicated worker
//! thread that wakes on a fixed interval, runs the component's trim job, and
//! goes back to sleep. The worker sleeps on a condvar so a stop request wakes
//! it immediately instead of waiting out the interval.
//!
//! ## Shutdown Protocol
//!
//! `stop` sets the stop flag, notifies the worker, and waits up to a grace
//! period for the worker to acknowledge exit. A worker that acknowledges is
//! joined; one that does not (a wedged or long-running pass) is detached and
//! left to observe the flag on its own. Either way `stop` returns within the
//! grace bound and is idempotent.
//!
//! ## Failure Containment
//!
//! A trim pass that returns an error or panics is skipped; the loop keeps
//! running. The failure is converted to a [`MaintenanceError`], logged, and
//! handed to the component's failure hook if one is configured. Errors never
//! reach callers of the component's public operations.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::FailureHook;
use crate::error::MaintenanceError;

#[derive(Debug, Default)]
struct SignalState {
    stop: bool,
    exited: bool,
}

#[derive(Debug, Default)]
struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

/// Handle to a component's periodic maintenance worker.
pub(crate) struct MaintenanceTask {
    name: &'static str,
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceTask {
    /// Spawns a worker that runs `job` every `interval` until stopped.
    ///
    /// If the worker thread cannot be spawned the component simply runs
    /// without background trimming; callers' operations are unaffected.
    pub(crate) fn spawn<F>(
        name: &'static str,
        interval: Duration,
        hook: Option<FailureHook>,
        job: F,
    ) -> Self
    where
        F: FnMut() -> Result<(), MaintenanceError> + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let worker_signal = Arc::clone(&signal);
        let spawned = thread::Builder::new()
            .name(format!("poolkit-{name}"))
            .spawn(move || run_worker(name, interval, hook, worker_signal, job));

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(task = name, error = %err, "failed to spawn maintenance task");
                // Nothing will ever flip `exited`, so mark it up front to keep
                // `stop` from waiting out the grace period.
                signal.state.lock().exited = true;
                None
            },
        };

        Self { name, signal, handle }
    }

    /// Signals the worker to stop and waits up to `grace` for it to exit.
    ///
    /// Idempotent and callable from any thread. A worker that misses the
    /// grace window is detached, not joined.
    pub(crate) fn stop(&mut self, grace: Duration) {
        let mut state = self.signal.state.lock();
        state.stop = true;
        self.signal.condvar.notify_all();

        let deadline = Instant::now() + grace;
        while !state.exited {
            if self.signal.condvar.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        let exited = state.exited;
        drop(state);

        match self.handle.take() {
            Some(handle) if exited => {
                let _ = handle.join();
                debug!(task = self.name, "maintenance task stopped");
            },
            Some(handle) => {
                warn!(
                    task = self.name,
                    "maintenance task missed the shutdown grace period; detaching"
                );
                drop(handle);
            },
            None => {},
        }
    }
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) {
        // Best-effort stop without waiting; the worker observes the flag at
        // its next wake and exits on its own.
        let mut state = self.signal.state.lock();
        state.stop = true;
        self.signal.condvar.notify_all();
        drop(state);
        drop(self.handle.take());
    }
}

impl std::fmt::Debug for MaintenanceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceTask")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run_worker<F>(
    name: &'static str,
    interval: Duration,
    hook: Option<FailureHook>,
    signal: Arc<Signal>,
    mut job: F,
) where
    F: FnMut() -> Result<(), MaintenanceError>,
{
    debug!(task = name, ?interval, "maintenance task started");

    let mut state = signal.state.lock();
    loop {
        if state.stop {
            break;
        }

        let deadline = Instant::now() + interval;
        while !state.stop {
            if signal.condvar.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if state.stop {
            break;
        }
        drop(state);

        match panic::catch_unwind(AssertUnwindSafe(&mut job)) {
            Ok(Ok(())) => {},
            Ok(Err(err)) => report_failure(&err, hook.as_ref()),
            Err(payload) => {
                let err = MaintenanceError::new(name, panic_detail(payload.as_ref()));
                report_failure(&err, hook.as_ref());
            },
        }

        state = signal.state.lock();
    }

    state.exited = true;
    signal.condvar.notify_all();
    drop(state);
    debug!(task = name, "maintenance task exiting");
}

fn report_failure(err: &MaintenanceError, hook: Option<&FailureHook>) {
    warn!(component = err.component(), detail = err.detail(), "maintenance pass failed");
    if let Some(hook) = hook {
        hook(err);
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("trim pass panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("trim pass panicked: {msg}")
    } else {
        "trim pass panicked".to_string()
    }
}
