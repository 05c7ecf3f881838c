//! Supervision loop against real `sh` managers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use poolvisor::{
    BackoffPolicy, EventKind, ExitReason, LaunchError, ManagerCommand, RunnerOptions, Supervisor,
    SupervisorConfig, SupervisorError, SupervisorState,
};

fn config(script: &str, backoff: Duration) -> SupervisorConfig {
    SupervisorConfig {
        backoff: BackoffPolicy::fixed(backoff),
        terminate_timeout: Duration::from_secs(5),
        command: ManagerCommand::new("sh").arg("-c").arg(script),
        ..SupervisorConfig::default()
    }
}

fn options() -> RunnerOptions {
    RunnerOptions::new("127.0.0.1:0").with_workers(1)
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn is_gone(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
}

#[tokio::test]
async fn initial_failure_is_returned_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let res = Supervisor::new(config("exit 7", Duration::from_millis(10)))
        .with_error_handler(move |_: &SupervisorError| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .start(options())
        .await;

    match res {
        Err(LaunchError::Init(ExitReason::Code(7))) => {}
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("launch should have failed"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_exit_is_reported_and_relaunched() {
    let exits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&exits);
    let handle = Supervisor::new(config("printf i >&3; exit 1", Duration::from_millis(20)))
        .with_error_handler(move |err: &SupervisorError| {
            assert!(matches!(err, SupervisorError::Exit(ExitReason::Code(1))), "{err:?}");
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .start(options())
        .await
        .unwrap();

    eventually("three reported exits", || exits.load(Ordering::SeqCst) >= 3).await;
    assert_ne!(handle.state(), SupervisorState::Cancelled);
    assert!(handle.status().attempt >= 3);
    handle.shutdown().await;
}

#[tokio::test]
async fn failed_relaunch_is_reported_and_retried() {
    let marker = std::env::temp_dir().join(format!("poolvisor-once-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);
    let script = format!(
        "if [ -e '{m}' ]; then exit 9; fi; touch '{m}'; printf i >&3; exit 1",
        m = marker.display()
    );

    let labels = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&labels);
    let handle = Supervisor::new(config(&script, Duration::from_millis(20)))
        .with_error_handler(move |err: &SupervisorError| {
            if let SupervisorError::Restart(launch) = err {
                assert_eq!(launch.init_exit(), Some(ExitReason::Code(9)));
            }
            seen.lock().unwrap().push(err.as_label());
        })
        .start(options())
        .await
        .unwrap();

    eventually("two failed relaunches", || labels.lock().unwrap().len() >= 3).await;
    handle.shutdown().await;
    let _ = std::fs::remove_file(&marker);

    let labels = labels.lock().unwrap();
    assert_eq!(labels[0], "supervisor_exit");
    assert!(labels[1..].iter().all(|l| *l == "supervisor_restart"), "{labels:?}");
}

#[tokio::test]
async fn panicking_handler_does_not_stop_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let handle = Supervisor::new(config("printf i >&3; exit 1", Duration::from_millis(20)))
        .with_error_handler(move |_: &SupervisorError| {
            seen.fetch_add(1, Ordering::SeqCst);
            panic!("handler bug");
        })
        .start(options())
        .await
        .unwrap();

    eventually("repeated callbacks", || calls.load(Ordering::SeqCst) >= 2).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_terminates_and_reaps_manager() {
    let handle = Supervisor::new(config("printf i >&3; exec sleep 30", Duration::from_secs(1)))
        .start(options())
        .await
        .unwrap();
    assert_eq!(handle.state(), SupervisorState::Supervising);
    let pid = handle.pid().unwrap();
    assert!(!is_gone(pid));

    let watch = handle.watch();
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown while supervising must complete");

    assert!(is_gone(pid));
    assert_eq!(watch.borrow().state, SupervisorState::Cancelled);
    assert_eq!(watch.borrow().pid, None);
}

#[tokio::test]
async fn stubborn_manager_is_killed_after_timeout() {
    let mut cfg = config(
        "trap '' TERM; printf i >&3; while :; do sleep 0.1; done",
        Duration::from_secs(1),
    );
    cfg.terminate_timeout = Duration::from_millis(300);

    let handle = Supervisor::new(cfg).start(options()).await.unwrap();
    let mut events = handle.subscribe();
    let pid = handle.pid().unwrap();
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    handle.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(is_gone(pid));

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::ManagerTerminating), "{kinds:?}");
    assert!(kinds.contains(&EventKind::ManagerKilled), "{kinds:?}");
    assert_eq!(kinds.last(), Some(&EventKind::SupervisorStopped));
}

#[tokio::test]
async fn cancellation_during_backoff_is_immediate() {
    let handle = Supervisor::new(config("printf i >&3; exit 1", Duration::from_secs(3600)))
        .start(options())
        .await
        .unwrap();

    let mut watch = handle.watch();
    tokio::time::timeout(
        Duration::from_secs(10),
        watch.wait_for(|s| s.state == SupervisorState::Backoff),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
        .await
        .unwrap();
    assert_eq!(watch.borrow().state, SupervisorState::Cancelled);
}

#[tokio::test]
async fn shutdown_during_stalled_relaunch_reaps_half_started_manager() {
    let dir = std::env::temp_dir();
    let marker = dir.join(format!("poolvisor-stall-{}", std::process::id()));
    let pidfile = dir.join(format!("poolvisor-stall-pid-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);
    let _ = std::fs::remove_file(&pidfile);
    // First launch becomes ready and exits; every relaunch hangs without readiness.
    let script = format!(
        "if [ -e '{m}' ]; then echo $$ > '{p}'; exec sleep 300; fi; touch '{m}'; printf i >&3; exit 1",
        m = marker.display(),
        p = pidfile.display()
    );

    let handle = Supervisor::new(config(&script, Duration::from_millis(20)))
        .start(options())
        .await
        .unwrap();
    let mut watch = handle.watch();
    tokio::time::timeout(
        Duration::from_secs(10),
        watch.wait_for(|s| s.state == SupervisorState::Launching),
    )
    .await
    .unwrap()
    .unwrap();
    eventually("relaunched manager pid", || {
        std::fs::read_to_string(&pidfile).is_ok_and(|s| s.trim().parse::<u32>().is_ok())
    })
    .await;
    let pid: u32 = std::fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown while launching must complete");
    let _ = std::fs::remove_file(&marker);
    let _ = std::fs::remove_file(&pidfile);

    assert!(is_gone(pid));
    assert_eq!(watch.borrow().state, SupervisorState::Cancelled);
}

#[tokio::test]
async fn panicking_subscriber_sees_each_event_once() {
    struct Faulty(AtomicUsize);

    #[async_trait::async_trait]
    impl poolvisor::Subscribe for Faulty {
        async fn on_event(&self, _ev: &poolvisor::Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("subscriber bug");
        }
        fn name(&self) -> &'static str {
            "faulty"
        }
    }

    let faulty = Arc::new(Faulty(AtomicUsize::new(0)));
    let handle = Supervisor::new(config("printf i >&3; exec sleep 30", Duration::from_secs(1)))
        .with_subscriber(faulty.clone())
        .start(options())
        .await
        .unwrap();
    let mut events = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(200)).await;
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .unwrap();

    // LaunchStarting, ManagerReady, ManagerTerminating, SupervisorStopped.
    assert_eq!(faulty.0.load(Ordering::SeqCst), 4);
    let mut panics = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::SubscriberPanicked {
            panics += 1;
        }
    }
    // Reports for the earliest events may predate `subscribe`; none may repeat.
    assert!((1..=4).contains(&panics), "{panics}");
}

#[tokio::test]
async fn dropping_the_handle_still_reaps_manager() {
    let handle = Supervisor::new(config("printf i >&3; exec sleep 30", Duration::from_secs(1)))
        .start(options())
        .await
        .unwrap();
    let pid = handle.pid().unwrap();
    drop(handle);

    eventually("manager reaped", || is_gone(pid)).await;
}

#[tokio::test]
async fn lifecycle_events_reach_subscribers_in_order() {
    let handle = Supervisor::new(config("printf i >&3; exit 1", Duration::from_millis(20)))
        .start(options())
        .await
        .unwrap();
    let mut events = handle.subscribe();

    let mut kinds = Vec::new();
    while kinds.len() < 4 {
        let ev = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap();
        kinds.push(ev.kind);
    }
    handle.shutdown().await;

    assert_eq!(
        kinds,
        vec![
            EventKind::ManagerExited,
            EventKind::BackoffScheduled,
            EventKind::LaunchStarting,
            EventKind::ManagerReady,
        ]
    );
}
