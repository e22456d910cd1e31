//! Pure supervisor state machine. No I/O; the async loop in the parent
//! module feeds it events and acts on the resulting state.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Verifying,
    Running,
    Restarting { attempt: u32 },
    Stopped,
    Failed { reason: String },
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupervisorState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Verifying => "verifying",
            SupervisorState::Running => "running",
            SupervisorState::Restarting { .. } => "restarting",
            SupervisorState::Stopped => "stopped",
            SupervisorState::Failed { .. } => "failed",
        }
    }
}

/// The child currently (or most recently) under supervision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub restart_count: u32,
    pub last_exit_code: Option<i32>,
}

/// Transition table plus the consecutive-error counter that alone
/// decides when to give up.
#[derive(Debug, Clone)]
pub struct SupervisorMachine {
    state: SupervisorState,
    restart_count: u32,
    max_restarts: u32,
}

impl SupervisorMachine {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            state: SupervisorState::Starting,
            restart_count: 0,
            max_restarts,
        }
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// The process was launched; probe it next.
    pub fn on_spawned(&mut self) -> &SupervisorState {
        if matches!(self.state, SupervisorState::Starting) {
            self.state = SupervisorState::Verifying;
        }
        &self.state
    }

    /// The probe finished (pass or soft-fail).
    pub fn on_verified(&mut self) -> &SupervisorState {
        if matches!(self.state, SupervisorState::Verifying) {
            self.state = SupervisorState::Running;
        }
        &self.state
    }

    /// The process could not be launched at all. Counted like an error exit.
    pub fn on_launch_failed(&mut self, reason: &str) -> &SupervisorState {
        self.record_error(reason)
    }

    /// The process exited. `Some(0)` is clean; anything else, including a
    /// signal (`None`), is an error exit.
    pub fn on_exit(&mut self, code: Option<i32>) -> &SupervisorState {
        if self.state.is_terminal() {
            return &self.state;
        }
        match code {
            Some(0) => {
                self.restart_count = 0;
                self.state = SupervisorState::Stopped;
                &self.state
            }
            Some(code) => self.record_error(&format!("exited with code {code}")),
            None => self.record_error("terminated by signal"),
        }
    }

    /// Backoff elapsed; launch again.
    pub fn on_restart(&mut self) -> &SupervisorState {
        if matches!(
            self.state,
            SupervisorState::Restarting { .. } | SupervisorState::Stopped
        ) {
            self.state = SupervisorState::Starting;
        }
        &self.state
    }

    /// Operator shutdown. Terminal failures stay visible.
    pub fn on_shutdown(&mut self) -> &SupervisorState {
        if !self.state.is_terminal() {
            self.state = SupervisorState::Stopped;
        }
        &self.state
    }

    fn record_error(&mut self, reason: &str) -> &SupervisorState {
        self.restart_count += 1;
        self.state = if self.restart_count >= self.max_restarts {
            SupervisorState::Failed {
                reason: format!(
                    "gave up after {} consecutive failures (last: {reason})",
                    self.restart_count
                ),
            }
        } else {
            SupervisorState::Restarting {
                attempt: self.restart_count,
            }
        };
        &self.state
    }
}
