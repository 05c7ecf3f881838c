//! A service served directly, without manager or pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use poolvisor::{BoxError, RunnerOptions, Service, ServiceFactory, WorkerError, WorkerInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

struct Hello {
    line: String,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Service for Hello {
    async fn serve(&self, listener: TcpListener, stop: CancellationToken) -> Result<(), BoxError> {
        loop {
            let (mut socket, _) = tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted?,
            };
            socket.write_all(self.line.as_bytes()).await?;
        }
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct HelloFactory {
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ServiceFactory for HelloFactory {
    type Service = Hello;

    async fn create(&self, info: &WorkerInfo) -> Result<Hello, BoxError> {
        Ok(Hello {
            line: format!("id={} manager={}", info.id, info.manager_pid),
            closed: Arc::clone(&self.closed),
        })
    }
}

struct Broken;

#[async_trait]
impl ServiceFactory for Broken {
    type Service = Hello;

    async fn create(&self, _info: &WorkerInfo) -> Result<Hello, BoxError> {
        Err("no database".into())
    }
}

fn free_addr() -> String {
    let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    scratch.local_addr().unwrap().to_string()
}

#[tokio::test]
async fn serves_as_first_worker_and_closes_on_shutdown() {
    let addr = free_addr();
    let closed = Arc::new(AtomicBool::new(false));
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(poolvisor::serve_in_process(
        RunnerOptions::new(addr.clone()),
        HelloFactory {
            closed: Arc::clone(&closed),
        },
        shutdown.clone(),
    ));

    let mut stream = None;
    for _ in 0..200 {
        if let Ok(s) = TcpStream::connect(&addr).await {
            stream = Some(s);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut line = String::new();
    stream
        .expect("server never accepted")
        .read_to_string(&mut line)
        .await
        .unwrap();
    assert_eq!(line, format!("id=1 manager={}", std::process::id()));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn factory_failure_is_a_boot_error() {
    let err = poolvisor::serve_in_process(
        RunnerOptions::new(free_addr()),
        Broken,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, WorkerError::Boot(_)), "{err:?}");
    assert_eq!(err.as_label(), "worker_boot");
}
