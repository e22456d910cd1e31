use serde::Serialize;
use tokio::sync::broadcast;

/// Operator-visible lifecycle events from the credential and process layers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum BridgeEvent {
    TokenRefreshed { expires_at: i64 },
    ProcessStarted { pid: u32 },
    ProcessExited { code: Option<i32> },
    ProbeWarning(String),
    SupervisorFailed(String),
    SupervisorStopped,
}

pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BridgeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
