//! # Runner options transported to the manager process.
//!
//! [`RunnerOptions`] is built once in the supervising process and travels,
//! unchanged, to the manager and from there to every worker (inside the
//! [`ManagerContext`](crate::ManagerContext) and
//! [`WorkerContext`](crate::WorkerContext) envelopes).
//!
//! ## Known extra options
//! The `extra` map is opaque to the supervisor. The manager honours:
//! - `graceful_timeout` (seconds, number): how long workers get to exit after
//!   SIGTERM before they are killed. Default 30.
//!
//! Everything else is handed to the [`ServiceFactory`](crate::ServiceFactory)
//! untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Extra-options key read by the manager (seconds).
pub const GRACEFUL_TIMEOUT_KEY: &str = "graceful_timeout";

const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokio runtime flavor used inside each worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFlavor {
    /// Single-threaded scheduler.
    CurrentThread,
    /// Work-stealing scheduler with one thread per core.
    MultiThread,
}

/// Options shared by the supervisor, the manager and the workers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunnerOptions {
    /// Pid of the supervising process; the manager treats any other parent as orphaning.
    pub root_pid: u32,
    /// Address the worker pool listens on (`host:port`).
    pub bind: String,
    /// Desired worker count (`None` = number of CPUs).
    pub workers: Option<usize>,
    /// Worker runtime flavor (`None` = multi-thread).
    pub runtime: Option<RuntimeFlavor>,
    /// Opaque extra options.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RunnerOptions {
    /// Creates options for the current process as root, bound to `bind`.
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            root_pid: std::process::id(),
            bind: bind.into(),
            workers: None,
            runtime: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the desired worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the worker runtime flavor.
    pub fn with_runtime(mut self, runtime: RuntimeFlavor) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Adds one opaque extra option.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Desired worker count with the CPU-count default applied (at least 1).
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Worker runtime flavor with the default applied.
    pub fn runtime_flavor(&self) -> RuntimeFlavor {
        self.runtime.unwrap_or(RuntimeFlavor::MultiThread)
    }

    /// Time workers get between SIGTERM and SIGKILL during a graceful stop.
    ///
    /// Non-numeric or negative values fall back to the default.
    pub fn graceful_timeout(&self) -> Duration {
        self.extra
            .get(GRACEFUL_TIMEOUT_KEY)
            .and_then(serde_json::Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_GRACEFUL_TIMEOUT)
    }
}
