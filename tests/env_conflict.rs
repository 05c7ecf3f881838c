//! Runs in its own process: it edits the environment.

use poolvisor::{LaunchError, ManagerCommand, RunnerOptions, WORKER_ID_ENV, WorkerEnvError, launch};

#[tokio::test]
async fn preset_worker_id_refuses_launch() {
    // SAFETY: the only test in this binary; no other thread reads the environment.
    unsafe { std::env::set_var(WORKER_ID_ENV, "4") };

    let cmd = ManagerCommand::new("sh").arg("-c").arg("printf i >&3; exec sleep 30");
    let err = launch(&cmd, &RunnerOptions::new("127.0.0.1:0"))
        .await
        .unwrap_err();

    match err {
        LaunchError::ConfigConflict(WorkerEnvError::Conflict { var, value }) => {
            assert_eq!(var, WORKER_ID_ENV);
            assert_eq!(value, "4");
        }
        other => panic!("unexpected: {other:?}"),
    }
}
