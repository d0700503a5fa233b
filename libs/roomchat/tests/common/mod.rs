//! Common test utilities for RoomChat integration tests
//!
//! Provides a canned session service over HTTP, in-process session
//! providers and a scripted socket connector.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use roomchat::domain::ChatTarget;
use roomchat::infrastructure::client::session::Result as SessionResult;
use roomchat::{SessionApiError, SessionGrant, SessionProvider};
use roomsocket::{ConnectionError, Connector, Transport, TransportEvent, WsMessage};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// One request seen by [`MockSessionService`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Minimal HTTP session service answering every request with one canned response
pub struct MockSessionService {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSessionService {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let body = body.into();

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut stream).await else {
                        return;
                    };
                    recorded.lock().push(request);

                    let response = format!(
                        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?.to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();

    Some(RecordedRequest {
        request_line,
        authorization,
        body,
    })
}

/// In-process session provider with a fixed answer
pub struct StaticProvider {
    grant: Option<SessionGrant>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn granting(token: &str) -> Arc<Self> {
        Arc::new(Self {
            grant: Some(SessionGrant {
                token: token.to_string(),
                websocket_url: None,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            grant: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for StaticProvider {
    async fn create_session(&self, _target: &ChatTarget) -> SessionResult<SessionGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grant
            .clone()
            .ok_or_else(|| SessionApiError::Rejected("caller may not join this room".into()))
    }
}

/// Outcome of one scripted connect call
pub enum Step {
    Fail(ConnectionError),
    Open,
}

/// Test-side handle on one opened in-memory transport
#[derive(Clone)]
pub struct MockLink {
    sent: Arc<Mutex<Vec<WsMessage>>>,
    inbound: mpsc::UnboundedSender<Result<TransportEvent, ConnectionError>>,
}

impl MockLink {
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|message| message.as_text().map(str::to_string))
            .collect()
    }

    /// Parsed JSON commands written on this link
    pub fn sent_commands(&self) -> Vec<serde_json::Value> {
        self.sent_texts()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Ok(TransportEvent::Message(WsMessage::Text(text.into()))));
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push_text(value.to_string());
    }

    /// Simulate the server closing the connection
    pub fn remote_close(&self, code: u16) {
        let _ = self.inbound.send(Ok(TransportEvent::Closed {
            code: Some(code),
            reason: "remote close".into(),
        }));
    }
}

struct MockTransport {
    sent: Arc<Mutex<Vec<WsMessage>>>,
    inbound: mpsc::UnboundedReceiver<Result<TransportEvent, ConnectionError>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: WsMessage) -> Result<(), ConnectionError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, ConnectionError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self, _code: u16, _reason: &str) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// Connector that plays back a script, then refuses every further attempt
#[derive(Default)]
pub struct ScriptedConnector {
    steps: Mutex<VecDeque<Step>>,
    urls: Mutex<Vec<String>>,
    links: Mutex<Vec<MockLink>>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    /// URLs of every connect call
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn link(&self, index: usize) -> MockLink {
        self.links.lock()[index].clone()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ConnectionError> {
        self.urls.lock().push(url.to_string());
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::Fail(ConnectionError::Transport("connection refused".into())));

        match step {
            Step::Fail(error) => Err(error),
            Step::Open => {
                let (tx, rx) = mpsc::unbounded_channel();
                let link = MockLink {
                    sent: Arc::new(Mutex::new(Vec::new())),
                    inbound: tx,
                };
                let transport = MockTransport {
                    sent: link.sent.clone(),
                    inbound: rx,
                };
                self.links.lock().push(link);
                Ok(Box::new(transport))
            }
        }
    }
}
