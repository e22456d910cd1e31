//! Supervision of the local headless CLI server.
//!
//! The loop launches the process, runs a soft auth probe, waits for exit,
//! and restarts after a fixed backoff until the consecutive-error counter
//! hits its limit. State is published on a `watch` channel so the transport
//! can refuse calls while the server is not running.

mod launcher;
mod machine;

pub use launcher::{CliLauncher, ManagedChild, ProcessLauncher, AUTH_STATUS_PATH, CLI_TOKEN_ENV};
pub use machine::{SupervisedProcess, SupervisorMachine, SupervisorState};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use copilot_common::{BridgeEvent, EventBus};
use copilot_config::ProcessConfig;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, CommunicationKind};

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub process: Option<SupervisedProcess>,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub max_restarts: u32,
    pub restart_backoff: Duration,
    pub startup_delay: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &ProcessConfig) -> Self {
        Self {
            max_restarts: config.max_restarts,
            restart_backoff: Duration::from_secs(config.restart_backoff_secs),
            startup_delay: Duration::from_millis(config.startup_delay_ms),
        }
    }
}

pub struct ProcessSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    settings: SupervisorSettings,
    events: Arc<EventBus>,
}

enum Verification {
    Probed(Result<bool, BridgeError>),
    Exited(Result<Option<i32>, BridgeError>),
    Cancelled,
}

impl ProcessSupervisor {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        settings: SupervisorSettings,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            launcher,
            settings,
            events,
        }
    }

    /// Start supervising in a background task.
    pub fn spawn(self) -> SupervisorHandle {
        let (tx, rx) = watch::channel(SupervisorStatus {
            state: SupervisorState::Starting,
            process: None,
        });
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(tx, cancel.clone()));

        SupervisorHandle {
            status: rx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(self, tx: watch::Sender<SupervisorStatus>, cancel: CancellationToken) {
        let mut machine = SupervisorMachine::new(self.settings.max_restarts);
        let mut current: Option<SupervisedProcess> = None;
        let publish = |machine: &SupervisorMachine, process: &Option<SupervisedProcess>| {
            debug!(state = machine.state().name(), "supervisor transition");
            tx.send_replace(SupervisorStatus {
                state: machine.state().clone(),
                process: process.clone(),
            });
        };

        'supervise: loop {
            publish(&machine, &current);

            let mut child = match self.launcher.launch().await {
                Ok(child) => child,
                Err(e) => {
                    warn!(error = %e, "failed to launch local server");
                    machine.on_launch_failed(&e.to_string());
                    publish(&machine, &current);
                    if machine.state().is_terminal() || !self.backoff(&cancel).await {
                        break 'supervise;
                    }
                    machine.on_restart();
                    continue;
                }
            };

            let pid = child.pid();
            let last_exit_code = current.as_ref().and_then(|p| p.last_exit_code);
            current = Some(SupervisedProcess {
                pid,
                started_at: Utc::now(),
                restart_count: machine.restart_count(),
                last_exit_code,
            });
            info!(pid = ?pid, "local server started");
            self.events.publish(BridgeEvent::ProcessStarted {
                pid: pid.unwrap_or_default(),
            });

            machine.on_spawned();
            publish(&machine, &current);

            let verification = tokio::select! {
                _ = cancel.cancelled() => Verification::Cancelled,
                exit = child.wait() => Verification::Exited(exit),
                probe = self.verify() => Verification::Probed(probe),
            };

            let exit = match verification {
                Verification::Cancelled => {
                    child.kill().await;
                    break 'supervise;
                }
                Verification::Exited(exit) => exit,
                Verification::Probed(probe) => {
                    self.report_probe(probe);
                    machine.on_verified();
                    publish(&machine, &current);

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            child.kill().await;
                            break 'supervise;
                        }
                        exit = child.wait() => exit,
                    }
                }
            };

            let code = exit.unwrap_or_else(|e| {
                warn!(error = %e, "lost track of local server");
                None
            });
            if let Some(process) = current.as_mut() {
                process.last_exit_code = code;
            }
            self.events.publish(BridgeEvent::ProcessExited { code });

            match machine.on_exit(code).clone() {
                SupervisorState::Failed { reason } => {
                    error!(%reason, "local server supervision failed");
                    publish(&machine, &current);
                    self.events.publish(BridgeEvent::SupervisorFailed(reason));
                    return;
                }
                SupervisorState::Restarting { attempt } => {
                    warn!(
                        code = ?code,
                        attempt,
                        max = machine.max_restarts(),
                        "local server exited with error, restarting"
                    );
                }
                _ => info!("local server exited cleanly, restarting"),
            }
            publish(&machine, &current);

            if !self.backoff(&cancel).await {
                break 'supervise;
            }
            machine.on_restart();
        }

        machine.on_shutdown();
        publish(&machine, &current);
        if !machine.state().is_terminal() {
            info!("supervisor stopped");
            self.events.publish(BridgeEvent::SupervisorStopped);
        }
    }

    async fn verify(&self) -> Result<bool, BridgeError> {
        tokio::time::sleep(self.settings.startup_delay).await;
        self.launcher.probe().await
    }

    // Probe failures are soft: the first real call is authoritative.
    fn report_probe(&self, probe: Result<bool, BridgeError>) {
        let warning = match probe {
            Ok(true) => {
                debug!("auth probe passed");
                return;
            }
            Ok(false) => "local server reports no authenticated session".to_string(),
            Err(e) => format!("auth probe failed: {e}"),
        };
        warn!("{warning}");
        self.events.publish(BridgeEvent::ProbeWarning(warning));
    }

    /// Sleep out the restart backoff. Returns `false` when cancelled.
    async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.restart_backoff) => true,
        }
    }
}

/// Cheap, cloneable view of a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    status: watch::Receiver<SupervisorStatus>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SupervisorHandle {
    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.status.borrow().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    /// Wait until the server is `Running`. Fails fast once supervision
    /// has given up.
    pub async fn wait_until_running(&self, timeout: Duration) -> Result<(), BridgeError> {
        let mut rx = self.status.clone();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| {
                matches!(
                    s.state,
                    SupervisorState::Running | SupervisorState::Failed { .. }
                )
            }),
        )
        .await;

        let state = match settled {
            Ok(Ok(status)) => status.state.clone(),
            Ok(Err(_)) => {
                return Err(BridgeError::ProcessSupervision(
                    "supervisor is no longer running".into(),
                ))
            }
            Err(_) => {
                return Err(BridgeError::communication(
                    CommunicationKind::ProcessUnreachable,
                    format!("local server not running after {timeout:?}"),
                ))
            }
        };

        match state {
            SupervisorState::Failed { reason } => Err(BridgeError::ProcessSupervision(reason)),
            _ => Ok(()),
        }
    }

    /// Cancel supervision, kill the child, and wait for the loop to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLauncher;

    fn settings(max_restarts: u32) -> SupervisorSettings {
        SupervisorSettings {
            max_restarts,
            restart_backoff: Duration::ZERO,
            startup_delay: Duration::ZERO,
        }
    }

    async fn settle(handle: &SupervisorHandle, done: impl Fn(&SupervisorState) -> bool) {
        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| done(&s.state)))
            .await
            .expect("supervisor did not settle")
            .expect("status channel closed");
    }

    #[tokio::test]
    async fn reaches_running_and_shuts_down() {
        let launcher = Arc::new(FakeLauncher::new(vec![None]));
        let events = Arc::new(EventBus::new(32));
        let mut rx = events.subscribe();
        let handle =
            ProcessSupervisor::new(launcher.clone(), settings(5), Arc::clone(&events)).spawn();

        handle
            .wait_until_running(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(handle.status().process.unwrap().pid, Some(1000));

        handle.shutdown().await;
        assert_eq!(handle.state(), SupervisorState::Stopped);
        assert_eq!(launcher.kills(), 1);

        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            saw_stopped |= matches!(event, BridgeEvent::SupervisorStopped);
        }
        assert!(saw_stopped);
    }

    #[tokio::test]
    async fn fails_after_max_consecutive_error_exits() {
        let launcher = Arc::new(FakeLauncher::new(vec![Some(1); 10]));
        let events = Arc::new(EventBus::new(64));
        let mut rx = events.subscribe();
        let handle =
            ProcessSupervisor::new(launcher.clone(), settings(3), Arc::clone(&events)).spawn();

        settle(&handle, SupervisorState::is_terminal).await;
        assert_eq!(launcher.launches(), 3);

        let err = handle
            .wait_until_running(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProcessSupervision(_)));

        let mut failed = None;
        while let Ok(event) = rx.try_recv() {
            if let BridgeEvent::SupervisorFailed(reason) = event {
                failed = Some(reason);
            }
        }
        assert!(failed.unwrap().contains("3 consecutive failures"));
    }

    #[tokio::test]
    async fn clean_exit_resets_the_error_budget() {
        // Two errors, a clean exit, two more errors: never three in a row.
        let launcher = Arc::new(FakeLauncher::new(vec![
            Some(1),
            Some(1),
            Some(0),
            Some(1),
            Some(1),
            None,
        ]));
        let handle =
            ProcessSupervisor::new(launcher.clone(), settings(3), Arc::new(EventBus::default()))
                .spawn();

        // Earlier launches may briefly reach Running; wait for the last one.
        tokio::time::timeout(Duration::from_secs(5), async {
            while launcher.launches() < 6 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        handle
            .wait_until_running(Duration::from_secs(5))
            .await
            .unwrap();

        let process = handle.status().process.unwrap();
        assert_eq!(process.restart_count, 2);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn probe_failure_is_only_a_warning() {
        let launcher = Arc::new(
            FakeLauncher::new(vec![None]).with_probe(Err(BridgeError::communication(
                CommunicationKind::ProcessUnreachable,
                "refused",
            ))),
        );
        let events = Arc::new(EventBus::new(32));
        let mut rx = events.subscribe();
        let handle = ProcessSupervisor::new(launcher, settings(5), Arc::clone(&events)).spawn();

        handle
            .wait_until_running(Duration::from_secs(5))
            .await
            .unwrap();

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            warned |= matches!(event, BridgeEvent::ProbeWarning(_));
        }
        assert!(warned);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn launch_failures_exhaust_budget() {
        let launcher = Arc::new(FakeLauncher::failing("no such file"));
        let handle =
            ProcessSupervisor::new(launcher.clone(), settings(2), Arc::new(EventBus::default()))
                .spawn();

        settle(&handle, SupervisorState::is_terminal).await;
        assert_eq!(launcher.launches(), 2);
        handle.shutdown().await;
        assert!(handle.state().is_terminal());
    }
}
