//! # The served application.
//!
//! A [`ServiceFactory`] is invoked once per worker process and returns a
//! [`Service`] that is ready to accept connections on the shared listener.
//!
//! ```text
//! worker boot ──► factory.create(&WorkerInfo) ──► service.serve(listener, token)
//!                      │ Err                            │ token cancelled (SIGTERM)
//!                      ▼                                ▼
//!              exit WORKER_BOOT_ERROR              service.close() ──► exit 0
//! ```
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use poolvisor::{BoxError, Service, ServiceFactory, WorkerInfo};
//!
//! struct Hello(u32);
//!
//! #[async_trait]
//! impl Service for Hello {
//!     async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), BoxError> {
//!         loop {
//!             tokio::select! {
//!                 _ = shutdown.cancelled() => return Ok(()),
//!                 accepted = listener.accept() => { let _ = accepted?; }
//!             }
//!         }
//!     }
//! }
//!
//! struct HelloFactory;
//!
//! #[async_trait]
//! impl ServiceFactory for HelloFactory {
//!     type Service = Hello;
//!
//!     async fn create(&self, info: &WorkerInfo) -> Result<Hello, BoxError> {
//!         Ok(Hello(info.id.get()))
//!     }
//! }
//! ```

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::options::RunnerOptions;
use crate::worker::WorkerId;

/// Error type returned by application code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a worker knows about itself when its service is created.
#[derive(Clone, Debug)]
pub struct WorkerInfo {
    /// Identity of this worker, stable for the worker's lifetime.
    pub id: WorkerId,
    /// Pid of the manager that spawned this worker.
    pub manager_pid: u32,
    /// Runner options, including the opaque extras.
    pub options: RunnerOptions,
}

/// Produces the service of one worker.
#[async_trait]
pub trait ServiceFactory: Send + Sync + 'static {
    /// Service type produced.
    type Service: Service;

    /// Builds the service; called exactly once per worker process.
    async fn create(&self, info: &WorkerInfo) -> Result<Self::Service, BoxError>;
}

/// A network service running inside one worker.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Serves connections until `shutdown` is cancelled.
    async fn serve(&self, listener: TcpListener, shutdown: CancellationToken)
    -> Result<(), BoxError>;

    /// Releases resources after serving stopped.
    async fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
