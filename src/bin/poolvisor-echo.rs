//! Demo host: every connection receives `worker=<id>\n` from the worker that
//! accepted it.
//!
//! ```text
//! poolvisor-echo [BIND] [WORKERS]
//! ```
//!
//! `RUST_LOG` controls log output (default `info`).
//!
//! Extra options read by the workers:
//! - `greeting`: template of the line sent to each client; must contain `{id}`.
//!   Default `worker={id}`.
//! - `linger_ms`: how long a stopping worker waits before it exits. Default 0.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use poolvisor::{
    BackoffPolicy, BoxError, LogWriter, RunnerOptions, Service, ServiceFactory, Supervisor,
    SupervisorConfig, SupervisorError, WorkerInfo,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_GREETING: &str = "worker={id}";

struct Echo {
    greeting: String,
    linger: Duration,
}

#[async_trait]
impl Service for Echo {
    async fn serve(&self, listener: TcpListener, stop: CancellationToken) -> Result<(), BoxError> {
        let greeting = format!("{}\n", self.greeting);
        loop {
            let (mut socket, peer) = tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted?,
            };
            let greeting = greeting.clone();
            tokio::spawn(async move {
                if let Err(e) = socket.write_all(greeting.as_bytes()).await {
                    warn!(%peer, error = %e, "write failed");
                }
            });
        }
    }

    async fn close(&self) -> Result<(), BoxError> {
        if !self.linger.is_zero() {
            info!(linger_ms = self.linger.as_millis() as u64, "lingering before exit");
            tokio::time::sleep(self.linger).await;
        }
        Ok(())
    }
}

struct EchoFactory;

#[async_trait]
impl ServiceFactory for EchoFactory {
    type Service = Echo;

    async fn create(&self, info: &WorkerInfo) -> Result<Echo, BoxError> {
        let template = match info.options.extra.get("greeting") {
            None => DEFAULT_GREETING,
            Some(value) => value.as_str().ok_or("greeting must be a string")?,
        };
        if !template.contains("{id}") {
            return Err(format!("greeting {template:?} has no {{id}} placeholder").into());
        }
        let linger = info
            .options
            .extra
            .get("linger_ms")
            .and_then(serde_json::Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or_default();

        Ok(Echo {
            greeting: template.replace("{id}", &info.id.to_string()),
            linger,
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Some(code) = poolvisor::run_child_role(EchoFactory) {
        return code;
    }

    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "127.0.0.1:7878".to_string());
    let mut options = RunnerOptions::new(bind);
    if let Some(workers) = args.next() {
        match workers.parse() {
            Ok(n) => options = options.with_workers(n),
            Err(e) => {
                error!(%workers, error = %e, "invalid worker count");
                return ExitCode::FAILURE;
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(supervise(options)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "supervisor failed");
            ExitCode::FAILURE
        }
    }
}

async fn supervise(options: RunnerOptions) -> Result<(), Box<dyn Error>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let cfg = SupervisorConfig {
        backoff: BackoffPolicy::fixed(Duration::from_secs(1)),
        terminate_timeout: Duration::from_secs(10),
        ..SupervisorConfig::default()
    };
    let handle = Supervisor::new(cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .with_error_handler(|err: &SupervisorError| warn!(label = err.as_label(), "{err}"))
        .start(options)
        .await?;
    info!(pid = handle.pid(), "pool is up");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    handle.shutdown().await;
    Ok(())
}
