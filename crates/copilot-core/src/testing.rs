//! In-crate fakes for the core's trait seams, plus a one-shot HTTP server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::auth::{ExchangedToken, TokenExchange};
use crate::error::BridgeError;
use crate::supervisor::{ManagedChild, ProcessLauncher};
use crate::transport::{ChatBackend, ChatRequest};
use crate::{BackendReply, TokenUsage};

// ---------------------------------------------------------------------------
// Token exchange
// ---------------------------------------------------------------------------

pub struct FakeExchange {
    script: Mutex<VecDeque<Result<ExchangedToken, BridgeError>>>,
    repeat: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeExchange {
    /// Every call succeeds with `secret`, valid for an hour.
    pub fn always(secret: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(secret.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Successive calls return successive secrets.
    pub fn sequence<const N: usize>(secrets: [&str; N]) -> Self {
        Self::scripted(secrets.iter().map(|s| Ok(Self::token(s))).collect())
    }

    pub fn scripted(script: Vec<Result<ExchangedToken, BridgeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn token(secret: &str) -> ExchangedToken {
        ExchangedToken {
            token: secret.to_string(),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for FakeExchange {
    async fn exchange(&self, _personal_token: &str) -> Result<ExchangedToken, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(secret) = &self.repeat {
            return Ok(Self::token(secret));
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::api(None, "exchange script exhausted")))
    }
}

// ---------------------------------------------------------------------------
// Chat backend
// ---------------------------------------------------------------------------

pub struct FakeBackend {
    script: Mutex<VecDeque<Result<String, BridgeError>>>,
    delay: Duration,
    requests: Mutex<Vec<ChatRequest>>,
    tokens: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn replies<const N: usize>(replies: [&str; N]) -> Self {
        Self::scripted(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn scripted(script: Vec<Result<String, BridgeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn send(&self, request: &ChatRequest, token: &str) -> Result<BackendReply, BridgeError> {
        let started = Instant::now();
        self.requests.lock().unwrap().push(request.clone());
        self.tokens.lock().unwrap().push(token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::api(Some(500), "backend script exhausted")));
        next.map(|content| BackendReply {
            content,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model: Some(request.model.clone()),
            latency: started.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Process launcher
// ---------------------------------------------------------------------------

pub struct FakeLauncher {
    /// Exit code per launch; `None` runs until killed. Launches past the
    /// end of the list run until killed.
    exits: Mutex<VecDeque<Option<i32>>>,
    launch_error: Option<String>,
    probe: Mutex<Result<bool, BridgeError>>,
    launches: AtomicUsize,
    kills: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(exits: Vec<Option<i32>>) -> Self {
        Self {
            exits: Mutex::new(exits.into()),
            launch_error: None,
            probe: Mutex::new(Ok(true)),
            launches: AtomicUsize::new(0),
            kills: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_probe(self, probe: Result<bool, BridgeError>) -> Self {
        *self.probe.lock().unwrap() = probe;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn ManagedChild>, BridgeError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.launch_error {
            return Err(BridgeError::ProcessSupervision(message.clone()));
        }
        let exit = self.exits.lock().unwrap().pop_front().flatten();
        Ok(Box::new(FakeChild {
            pid: 1000 + n as u32,
            exit,
            kills: Arc::clone(&self.kills),
        }))
    }

    async fn probe(&self) -> Result<bool, BridgeError> {
        self.probe.lock().unwrap().clone()
    }
}

struct FakeChild {
    pid: u32,
    exit: Option<i32>,
    kills: Arc<AtomicUsize>,
}

#[async_trait]
impl ManagedChild for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> Result<Option<i32>, BridgeError> {
        match self.exit {
            Some(code) => Ok(Some(code)),
            None => std::future::pending().await,
        }
    }

    async fn kill(&mut self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Serve one canned HTTP response on an ephemeral port. Returns the base
/// URL and a handle resolving to the raw request that was received.
pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });

    (base, handle)
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}
