//! # Manager process: worker pool owner.
//!
//! ```text
//! run <token>
//!   ├─► decode ManagerContext, start OrphanMonitor(root_pid)
//!   ├─► bind listener, spawn `desired` workers
//!   ├─► write readiness byte ─────────────────────────► supervisor
//!   └─► loop {
//!         worker reaped  → drop from table, respawn up to desired
//!                          (exit WORKER_BOOT_ERROR → stop pool, exit 3)
//!         SIGTTIN        → desired += 1, spawn
//!         SIGTTOU        → desired -= 1 (min 1), SIGTERM highest ids
//!         SIGTERM/INT/QUIT → graceful stop
//!       }
//! ```

mod orphan;
mod runtime;

pub use orphan::{ORPHAN_CHECK_INTERVAL, OrphanMonitor, OsParent, ParentProbe};
pub use runtime::run;
