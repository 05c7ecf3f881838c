//! Manager process of the demo binary: respawn, scaling, boot failure and
//! graceful stop, observed through `/proc`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use poolvisor::{
    ExitReason, GRACEFUL_TIMEOUT_KEY, LaunchError, ManagerCommand, ManagerProcess, RunnerOptions,
    RuntimeFlavor, WORKER_ID_ENV,
};
use serde_json::json;

fn echo() -> ManagerCommand {
    ManagerCommand::new(env!("CARGO_BIN_EXE_poolvisor-echo"))
}

fn options(workers: usize) -> RunnerOptions {
    RunnerOptions::new("127.0.0.1:0")
        .with_workers(workers)
        .with_runtime(RuntimeFlavor::CurrentThread)
}

/// Live (non-zombie) children of `parent`, keyed by worker id.
fn workers_of(parent: u32) -> BTreeMap<u32, u32> {
    let mut out = BTreeMap::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return out;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
            continue;
        };
        // "pid (comm) state ppid ..."; comm may contain anything, so split after the last ')'.
        let Some((_, rest)) = stat.rsplit_once(')') else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let state = fields.next();
        let ppid = fields.next().and_then(|p| p.parse::<u32>().ok());
        if ppid != Some(parent) || state == Some("Z") {
            continue;
        }
        if let Some(id) = worker_id_of(pid) {
            out.insert(id, pid);
        }
    }
    out
}

fn worker_id_of(pid: u32) -> Option<u32> {
    let environ = std::fs::read(format!("/proc/{pid}/environ")).ok()?;
    let prefix = format!("{WORKER_ID_ENV}=");
    environ
        .split(|b| *b == 0)
        .filter_map(|var| std::str::from_utf8(var).ok())
        .find_map(|var| var.strip_prefix(prefix.as_str()))
        .and_then(|id| id.parse().ok())
}

async fn wait_for_workers(
    manager: u32,
    what: &str,
    mut cond: impl FnMut(&BTreeMap<u32, u32>) -> bool,
) -> BTreeMap<u32, u32> {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let workers = workers_of(manager);
        if cond(&workers) {
            return workers;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}: {workers:?}");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn ids(workers: &BTreeMap<u32, u32>) -> Vec<u32> {
    workers.keys().copied().collect()
}

fn signal(pid: u32, sig: Signal) {
    kill(Pid::from_raw(pid as i32), sig).unwrap();
}

fn is_gone(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
}

async fn stop(mut manager: ManagerProcess) -> ExitReason {
    signal(manager.pid(), Signal::SIGTERM);
    tokio::time::timeout(Duration::from_secs(15), manager.wait())
        .await
        .expect("manager did not stop")
        .unwrap()
}

#[tokio::test]
async fn killed_worker_is_replaced_under_the_same_id() {
    let manager = poolvisor::launch(&echo(), &options(2)).await.unwrap();
    let pid = manager.pid();

    let before = wait_for_workers(pid, "two workers", |w| w.len() == 2).await;
    assert_eq!(ids(&before), vec![1, 2]);

    let victim = before[&1];
    signal(victim, Signal::SIGKILL);
    let after = wait_for_workers(pid, "replacement for id 1", |w| {
        w.len() == 2 && w.get(&1).is_some_and(|p| *p != victim)
    })
    .await;

    assert_eq!(ids(&after), vec![1, 2]);
    assert_eq!(after[&2], before[&2], "the surviving worker must be untouched");
    assert_eq!(stop(manager).await, ExitReason::Code(0));
}

#[tokio::test]
async fn ttin_and_ttou_scale_the_pool() {
    let manager = poolvisor::launch(&echo(), &options(2)).await.unwrap();
    let pid = manager.pid();
    wait_for_workers(pid, "two workers", |w| w.len() == 2).await;

    signal(pid, Signal::SIGTTIN);
    let grown = wait_for_workers(pid, "a third worker", |w| w.len() == 3).await;
    assert_eq!(ids(&grown), vec![1, 2, 3]);

    signal(pid, Signal::SIGTTOU);
    let shrunk = wait_for_workers(pid, "worker 3 retired", |w| ids(w) == vec![1, 2]).await;
    assert_eq!(shrunk[&1], grown[&1]);

    signal(pid, Signal::SIGTTOU);
    let single = wait_for_workers(pid, "worker 2 retired", |w| ids(w) == vec![1]).await;
    assert_eq!(single[&1], grown[&1]);

    // Not below one.
    signal(pid, Signal::SIGTTOU);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ids(&workers_of(pid)), vec![1]);

    assert_eq!(stop(manager).await, ExitReason::Code(0));
}

#[tokio::test]
async fn worker_boot_failure_halts_the_manager() {
    let opts = options(1).with_extra("greeting", json!("no placeholder"));
    let exit = match poolvisor::launch(&echo(), &opts).await {
        Ok(mut manager) => tokio::time::timeout(Duration::from_secs(15), manager.wait())
            .await
            .expect("manager kept running after a boot failure")
            .unwrap(),
        Err(LaunchError::Init(reason)) => reason,
        Err(other) => panic!("unexpected launch error: {other:?}"),
    };
    assert_eq!(exit, ExitReason::Code(poolvisor::WORKER_BOOT_ERROR));
}

#[tokio::test]
async fn lingering_workers_are_killed_after_graceful_timeout() {
    let opts = options(2)
        .with_extra(GRACEFUL_TIMEOUT_KEY, json!(0.5))
        .with_extra("linger_ms", json!(60_000));
    let manager = poolvisor::launch(&echo(), &opts).await.unwrap();
    let workers = wait_for_workers(manager.pid(), "two workers", |w| w.len() == 2).await;

    let started = Instant::now();
    assert_eq!(stop(manager).await, ExitReason::Code(0));
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "stop took {:?}",
        started.elapsed()
    );
    for pid in workers.values() {
        assert!(is_gone(*pid), "worker {pid} survived the manager");
    }
}
