//! # Orphan monitor.
//!
//! A dedicated OS thread that notices when the process that spawned us is
//! gone (we were re-parented) and asks the current process to stop.
//!
//! ```text
//! loop {
//!     ppid != root_pid ──► on_orphan(ppid)       (default: SIGTERM to self)
//!     wait(interval) or stop ──► break
//! }
//! ```
//!
//! ## Rules
//! - The first check happens immediately on start.
//! - The action fires on every mismatching check; monitoring continues.
//! - `stop()` wakes the thread at once and joins it. `Drop` does the same.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Default time between two parent checks.
pub const ORPHAN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Source of the current parent pid.
pub trait ParentProbe: Send + 'static {
    /// Pid of the current parent process.
    fn parent_pid(&self) -> u32;
}

/// Reads the parent pid from the OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsParent;

impl ParentProbe for OsParent {
    fn parent_pid(&self) -> u32 {
        std::os::unix::process::parent_id()
    }
}

type StopFlag = Arc<(Mutex<bool>, Condvar)>;

/// Running monitor thread.
pub struct OrphanMonitor {
    stop: StopFlag,
    thread: Option<JoinHandle<()>>,
}

impl OrphanMonitor {
    /// Watches the real parent; SIGTERMs this process when it is not `root_pid`.
    pub fn start(root_pid: u32) -> io::Result<Self> {
        Self::spawn(root_pid, ORPHAN_CHECK_INTERVAL, OsParent, terminate_self)
    }

    /// Fully parameterized monitor.
    pub fn spawn<P, A>(root_pid: u32, interval: Duration, probe: P, mut on_orphan: A) -> io::Result<Self>
    where
        P: ParentProbe,
        A: FnMut(u32) + Send + 'static,
    {
        let stop: StopFlag = Arc::new((Mutex::new(false), Condvar::new()));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("orphan-monitor".to_string())
            .spawn(move || {
                let (lock, cvar) = &*flag;
                loop {
                    let ppid = probe.parent_pid();
                    if ppid != root_pid {
                        warn!(root_pid, ppid, "parent process is gone");
                        on_orphan(ppid);
                    }

                    let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    let (guard, _) = cvar
                        .wait_timeout_while(guard, interval, |stopped| !*stopped)
                        .unwrap_or_else(PoisonError::into_inner);
                    if *guard {
                        break;
                    }
                }
                debug!(root_pid, "orphan monitor stopped");
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stops the thread and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let (lock, cvar) = &*self.stop;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
        if thread.join().is_err() {
            warn!("orphan monitor thread panicked");
        }
    }
}

impl Drop for OrphanMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn terminate_self(_ppid: u32) {
    if let Err(e) = signal::kill(Pid::this(), Signal::SIGTERM) {
        warn!(error = %e, "failed to signal self after orphaning");
    }
}
