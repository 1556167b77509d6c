use async_trait::async_trait;
use seqbench_node::errors::SupervisorError;
use seqbench_node::supervisor::{
    LaunchedWorker, Supervisor, SupervisorEvent, SupervisorState, WorkerExit, WorkerLauncher,
};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Launcher whose "processes" die when the test says so.
#[derive(Clone, Default)]
struct FakeLauncher {
    live: Arc<Mutex<Vec<(usize, u32, Option<oneshot::Sender<WorkerExit>>)>>>,
    launches: Arc<Mutex<u32>>,
    fail_at_launch: Option<u32>,
}

impl FakeLauncher {
    fn kill(&self, slot: usize) -> u32 {
        let mut live = self.live.lock().unwrap();
        let entry = live
            .iter_mut()
            .find(|(s, _, tx)| *s == slot && tx.is_some())
            .expect("no live worker in slot");
        let tx = entry.2.take().unwrap();
        tx.send(WorkerExit { code: None, signal: Some(9) }).unwrap();
        entry.1
    }

    fn alive(&self) -> Vec<(usize, u32)> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, tx)| tx.as_ref().map_or(false, |tx| !tx.is_closed()))
            .map(|(slot, pid, _)| (*slot, *pid))
            .collect()
    }

    fn launches(&self) -> u32 {
        *self.launches.lock().unwrap()
    }
}

#[async_trait]
impl WorkerLauncher for FakeLauncher {
    async fn launch(&mut self, slot: usize) -> io::Result<LaunchedWorker> {
        let n = {
            let mut launches = self.launches.lock().unwrap();
            *launches += 1;
            *launches
        };
        if self.fail_at_launch == Some(n) {
            return Err(io::Error::new(io::ErrorKind::Other, "fork failed"));
        }

        let pid = 1000 + n;
        let (tx, rx) = oneshot::channel();
        self.live.lock().unwrap().push((slot, pid, Some(tx)));
        Ok(LaunchedWorker { pid: Some(pid), exited: rx })
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SupervisorEvent>) -> SupervisorEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for supervisor event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_pool_fills_to_target() {
    let launcher = FakeLauncher::default();
    let (tx, mut events) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(launcher.clone(), 4)
        .with_events(tx)
        .with_shutdown_grace(Duration::from_millis(50));
    let mut state = supervisor.subscribe();
    assert_eq!(*state.borrow(), SupervisorState::Idle);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(supervisor.run(shutdown.clone()));

    for expected_slot in 0..4 {
        match next_event(&mut events).await {
            SupervisorEvent::Spawned { slot, .. } => assert_eq!(slot, expected_slot),
            other => panic!("unexpected event {:?}", other),
        }
    }
    state
        .wait_for(|s| *s == SupervisorState::Steady(4))
        .await
        .unwrap();
    assert_eq!(launcher.alive().len(), 4);

    shutdown.cancel();
    let restarts = handle.await.unwrap().unwrap();
    assert_eq!(restarts, 0);
    assert_eq!(*state.borrow(), SupervisorState::Stopped);
}

#[tokio::test]
async fn test_dead_worker_is_replaced_without_touching_others() {
    let launcher = FakeLauncher::default();
    let (tx, mut events) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(launcher.clone(), 3)
        .with_events(tx)
        .with_shutdown_grace(Duration::from_millis(50));
    let mut state = supervisor.subscribe();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(supervisor.run(shutdown.clone()));
    state
        .wait_for(|s| *s == SupervisorState::Steady(3))
        .await
        .unwrap();
    for _ in 0..3 {
        next_event(&mut events).await;
    }

    let before = launcher.alive();
    let dead_pid = launcher.kill(1);

    assert_eq!(
        next_event(&mut events).await,
        SupervisorEvent::Exited {
            slot: 1,
            pid: Some(dead_pid),
            exit: WorkerExit { code: None, signal: Some(9) },
        }
    );
    match next_event(&mut events).await {
        SupervisorEvent::Spawned { slot, pid } => {
            assert_eq!(slot, 1);
            assert_ne!(pid, Some(dead_pid));
        }
        other => panic!("unexpected event {:?}", other),
    }
    state
        .wait_for(|s| *s == SupervisorState::Steady(3))
        .await
        .unwrap();

    let after = launcher.alive();
    assert_eq!(after.len(), 3);
    assert_eq!(launcher.launches(), 4);
    // The two untouched workers are the same ones as before.
    for (slot, pid) in before.iter().filter(|(s, _)| *s != 1) {
        assert!(after.contains(&(*slot, *pid)));
    }

    shutdown.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn test_launch_failure_stops_supervisor() {
    let launcher = FakeLauncher {
        fail_at_launch: Some(2),
        ..Default::default()
    };
    let supervisor = Supervisor::new(launcher, 3);

    let err = supervisor.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn { slot: 1, .. }));
}

#[tokio::test]
async fn test_empty_pool_rejected() {
    let supervisor = Supervisor::new(FakeLauncher::default(), 0);
    assert!(matches!(
        supervisor.run(CancellationToken::new()).await,
        Err(SupervisorError::NoWorkers)
    ));
}

#[cfg(unix)]
mod processes {
    use super::*;
    use seqbench_node::supervisor::CommandLauncher;

    #[tokio::test]
    async fn test_killed_process_is_respawned() {
        let shutdown = CancellationToken::new();
        let launcher = CommandLauncher::new(
            "sh",
            vec!["-c".to_string(), "exec sleep 30".to_string()],
            shutdown.clone(),
        );
        let (tx, mut events) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(launcher, 2).with_events(tx);
        let handle = tokio::spawn(supervisor.run(shutdown.clone()));

        let mut pids = Vec::new();
        for _ in 0..2 {
            match next_event(&mut events).await {
                SupervisorEvent::Spawned { pid: Some(pid), .. } => pids.push(pid),
                other => panic!("unexpected event {:?}", other),
            }
        }

        let status = std::process::Command::new("kill")
            .args(["-9", &pids[0].to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        match next_event(&mut events).await {
            SupervisorEvent::Exited { slot, pid, exit } => {
                assert_eq!(slot, 0);
                assert_eq!(pid, Some(pids[0]));
                assert_eq!(exit.signal, Some(9));
            }
            other => panic!("unexpected event {:?}", other),
        }
        match next_event(&mut events).await {
            SupervisorEvent::Spawned { slot, pid } => {
                assert_eq!(slot, 0);
                assert!(pid.is_some());
                assert_ne!(pid, Some(pids[0]));
            }
            other => panic!("unexpected event {:?}", other),
        }

        shutdown.cancel();
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exiting_process_is_replaced() {
        let shutdown = CancellationToken::new();
        let launcher = CommandLauncher::new(
            "sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            shutdown.clone(),
        );
        let (tx, mut events) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(launcher, 1).with_events(tx);
        let handle = tokio::spawn(supervisor.run(shutdown.clone()));

        let mut exits = 0;
        let mut spawns = 0;
        while exits < 3 {
            match next_event(&mut events).await {
                SupervisorEvent::Spawned { .. } => spawns += 1,
                SupervisorEvent::Exited { exit, .. } => {
                    assert_eq!(exit.code, Some(3));
                    exits += 1;
                }
            }
        }
        assert!(spawns >= exits);

        shutdown.cancel();
        assert!(handle.await.unwrap().unwrap() >= 3);
    }

    async fn stop_single_worker(launcher: CommandLauncher, shutdown: CancellationToken) -> WorkerExit {
        let (tx, mut events) = mpsc::unbounded_channel();
        let supervisor = Supervisor::new(launcher, 1).with_events(tx);
        let handle = tokio::spawn(supervisor.run(shutdown.clone()));

        assert!(matches!(
            next_event(&mut events).await,
            SupervisorEvent::Spawned { slot: 0, .. }
        ));
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;

        shutdown.cancel();
        let exit = match next_event(&mut events).await {
            SupervisorEvent::Exited { slot, exit, .. } => {
                assert_eq!(slot, 0);
                exit
            }
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(handle.await.unwrap().unwrap(), 0);
        exit
    }

    #[tokio::test]
    async fn test_shutdown_lets_worker_exit_on_sigterm() {
        let shutdown = CancellationToken::new();
        let launcher = CommandLauncher::new(
            "sh",
            vec![
                "-c".to_string(),
                "trap 'kill $p; exit 7' TERM; sleep 30 & p=$!; wait $p".to_string(),
            ],
            shutdown.clone(),
        );

        let exit = stop_single_worker(launcher, shutdown).await;
        assert_eq!(exit, WorkerExit { code: Some(7), signal: None });
    }

    #[tokio::test]
    async fn test_shutdown_kills_worker_ignoring_sigterm() {
        let shutdown = CancellationToken::new();
        let launcher = CommandLauncher::new(
            "sh",
            vec![
                "-c".to_string(),
                "trap '' TERM; while true; do sleep 0.1; done".to_string(),
            ],
            shutdown.clone(),
        )
        .with_kill_grace(Duration::from_millis(200));

        let exit = stop_single_worker(launcher, shutdown).await;
        assert_eq!(exit.signal, Some(9));
    }
}
