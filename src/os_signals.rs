//! OS signal handling for the child roles.
//!
//! [`StopSignals`] registers its listeners eagerly, so a termination signal
//! that arrives while the role is still booting is queued rather than killing
//! the process with the default action.
//!
//! ## Signals
//! - **SIGTERM** (sent by the supervisor, the manager and the orphan monitor)
//! - **SIGINT** (Ctrl-C in terminal, delivered to the whole process group)
//! - **SIGQUIT** (manager only; treated as a graceful stop)

use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};

/// Registered termination listeners.
pub struct StopSignals {
    sigterm: Signal,
    sigint: Signal,
    sigquit: Option<Signal>,
}

impl StopSignals {
    /// SIGTERM and SIGINT.
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigquit: None,
        })
    }

    /// SIGTERM, SIGINT and SIGQUIT.
    pub fn register_with_quit() -> io::Result<Self> {
        let mut signals = Self::register()?;
        signals.sigquit = Some(signal(SignalKind::quit())?);
        Ok(signals)
    }

    /// Waits for the next termination signal and returns its name.
    pub async fn recv(&mut self) -> &'static str {
        let sigquit = &mut self.sigquit;
        let quit = async move {
            match sigquit.as_mut() {
                Some(sig) => sig.recv().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
            _ = quit => "SIGQUIT",
        }
    }
}
