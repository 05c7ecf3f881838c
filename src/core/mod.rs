//! Supervisor core: the restart loop and its control surface.
//!
//! Internal modules:
//! - [`supervisor`]: first launch, event fan-out wiring, [`SupervisorHandle`];
//! - [`actor`]: the supervision loop (exit → report → backoff → relaunch);
//! - [`config`]: [`SupervisorConfig`];
//! - [`state`]: observable [`SupervisorState`];
//! - [`handler`]: the [`ErrorHandler`] callback.

mod actor;
mod config;
mod handler;
mod state;
mod supervisor;

pub use config::SupervisorConfig;
pub use handler::{ErrorHandler, LogErrors};
pub use state::{SupervisorState, SupervisorStatus};
pub use supervisor::{Supervisor, SupervisorHandle};
