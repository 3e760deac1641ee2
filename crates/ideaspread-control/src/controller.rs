//! Run lifecycle controller: snapshots parameters, issues one request per
//! run, and owns the pending/success/failure state the panel renders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::params::{ParamEntry, ParameterStore, SimulationParameters};
use crate::service::{RunStatistics, STATUS_SUCCESS, SimulateReply, SimulationService, join_url};

/// Message shown when the service fails without supplying one of its own.
const FALLBACK_FAILURE: &str = "simulation request failed";

/// Injected configuration for a panel instance.
///
/// Both the default baseline and the service base location live here rather
/// than in module globals, so deployments (and tests) can substitute either.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Origin the service is reachable at, e.g. `http://127.0.0.1:5000` for
    /// local development or a relative prefix like `/api` behind a proxy.
    pub base_url: String,
    pub defaults: SimulationParameters,
    pub request_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            defaults: SimulationParameters::default(),
            // Runs render a video server-side; allow them plenty of time.
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Lifecycle of the current run. Exactly one variant is ever active; payloads
/// exist only on the terminal variants, so a consumer can never observe
/// `Pending` with stale statistics attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Pending,
    Success {
        /// Absolute, directly browsable media URL.
        media_url: String,
        statistics: RunStatistics,
    },
    Failed {
        message: String,
    },
}

struct ControllerInner {
    store: Mutex<ParameterStore>,
    state: Mutex<RunState>,
    /// Monotonically increasing run ids; only the latest may commit.
    run_seq: AtomicU64,
}

/// Shared handle driving runs against a [`SimulationService`].
///
/// Clones are cheap and observe the same store and lifecycle state, the way
/// UI surfaces and background tasks share one panel.
#[derive(Clone)]
pub struct RunController<S> {
    service: Arc<S>,
    base_url: String,
    inner: Arc<ControllerInner>,
}

impl<S: SimulationService> RunController<S> {
    pub fn new(config: PanelConfig, service: S) -> Self {
        Self {
            service: Arc::new(service),
            base_url: config.base_url,
            inner: Arc::new(ControllerInner {
                store: Mutex::new(ParameterStore::new(config.defaults)),
                state: Mutex::new(RunState::Idle),
                run_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.lock_state().clone()
    }

    /// Current parameter values.
    #[must_use]
    pub fn parameters(&self) -> SimulationParameters {
        self.lock_store().current().clone()
    }

    /// Per-field descriptors for the edit surface.
    #[must_use]
    pub fn parameter_entries(&self) -> Vec<ParamEntry> {
        self.lock_store().entries()
    }

    /// Edit a single parameter; see [`ParameterStore::set_field`].
    pub fn set_field(&self, name: &str, raw: &str) -> bool {
        self.lock_store().set_field(name, raw)
    }

    /// Drop all edits and restore the configured defaults.
    pub fn reset_parameters(&self) {
        self.lock_store().reset();
    }

    /// Execute one run: snapshot parameters, enter `Pending`, issue exactly
    /// one request, and resolve to `Success` or `Failed`.
    ///
    /// The snapshot is taken before the request leaves, so edits made while
    /// the run is pending never reach the in-flight body. Overlapping calls
    /// each restart the lifecycle; a resolution only commits if no newer run
    /// has started since (last run wins), so a stale response arriving late
    /// is discarded. Failures always land in `Failed` rather than
    /// propagating, keeping the state renderable.
    ///
    /// Returns the controller state after this run resolved, which for a
    /// superseded run is whatever the newer run produced.
    pub async fn run(&self) -> RunState {
        let snapshot = self.lock_store().current().clone();
        // Id allocation and the Pending write share the state lock; a
        // delayed Pending write could otherwise land on top of a newer
        // run's already-committed resolution.
        let run_id = {
            let mut state = self.lock_state();
            let run_id = self.inner.run_seq.fetch_add(1, Ordering::SeqCst) + 1;
            *state = RunState::Pending;
            run_id
        };
        debug!(run_id, "simulation run started");

        let resolution = match self.service.simulate(snapshot).await {
            Ok(reply) => interpret_reply(&self.base_url, reply),
            Err(err) => {
                warn!(run_id, error = %err, "simulation request failed");
                RunState::Failed {
                    message: err.to_string(),
                }
            }
        };

        let mut state = self.lock_state();
        if self.inner.run_seq.load(Ordering::SeqCst) == run_id {
            *state = resolution;
        } else {
            debug!(run_id, "discarding stale run resolution");
        }
        state.clone()
    }

    // Lifecycle state is plain data, so a poisoned lock is safe to keep
    // serving; recover rather than propagate.
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, ParameterStore> {
        self.inner.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a decoded reply onto the terminal lifecycle state.
///
/// Anything short of the success marker plus a complete payload counts as a
/// failure, surfacing the service-supplied message when one exists.
fn interpret_reply(base_url: &str, reply: SimulateReply) -> RunState {
    if reply.status == STATUS_SUCCESS
        && let (Some(path), Some(statistics)) = (reply.media_url, reply.statistics)
    {
        return RunState::Success {
            media_url: resolve_media_url(base_url, &path),
            statistics,
        };
    }
    RunState::Failed {
        message: reply.message.unwrap_or_else(|| FALLBACK_FAILURE.to_string()),
    }
}

/// Resolve the service-relative media path against the configured base. A
/// path that already carries a scheme is passed through untouched.
fn resolve_media_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        join_url(base_url, path)
    }
}
