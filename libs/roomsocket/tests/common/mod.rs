//! Common test utilities for RoomSocket integration tests
//!
//! Two doubles are provided: a real WebSocket server on localhost, and an
//! in-memory scripted connector for failure sequences under paused time.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use roomsocket::{ConnectionError, Connector, Transport, TransportEvent, WsMessage};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Notify};
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

/// Instruction pushed from a test to every connected client
#[derive(Debug, Clone)]
pub enum ServerCommand {
    Push(String),
    Close(u16),
}

/// A mock chat server for testing
///
/// Records the request URI of every handshake and every text frame it
/// receives. Tests push frames or close codes to all clients.
pub struct MockWsServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    commands: broadcast::Sender<ServerCommand>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let (commands, _) = broadcast::channel(64);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let server = Self {
            addr,
            requests: requests.clone(),
            received: received.clone(),
            connections: connections.clone(),
            commands: commands.clone(),
            shutdown: shutdown.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown.clone();
                                let requests = requests.clone();
                                let received = received.clone();
                                let connections = connections.clone();
                                let commands = commands.subscribe();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, requests, received, connections, commands, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        server
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        requests: Arc<Mutex<Vec<String>>>,
        received: Arc<Mutex<Vec<String>>>,
        connections: Arc<AtomicUsize>,
        mut commands: broadcast::Receiver<ServerCommand>,
        shutdown: Arc<Notify>,
    ) {
        use futures::{SinkExt, StreamExt};
        use std::borrow::Cow;
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        use tokio_tungstenite::tungstenite::Message;

        let record = requests.clone();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            record.lock().push(request.uri().to_string());
            Ok(response)
        };

        let ws_stream = match accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => received.lock().push(text),
                        Some(Ok(msg)) if msg.is_close() => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                command = commands.recv() => {
                    match command {
                        Ok(ServerCommand::Push(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerCommand::Close(code)) => {
                            let frame = CloseFrame { code: CloseCode::from(code), reason: Cow::Borrowed("server closing") };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        Err(_) => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Base WebSocket URL for a room kind
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn push(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Push(text.into()));
    }

    pub fn close_all(&self, code: u16) {
        let _ = self.commands.send(ServerCommand::Close(code));
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Outcome of one scripted connect call
pub enum Step {
    /// Fail immediately
    Fail(ConnectionError),
    /// Never complete (exercises the connect timeout)
    Hang,
    /// Open an in-memory transport
    Open,
}

/// Test-side handle on one opened in-memory transport
#[derive(Clone)]
pub struct MockLink {
    sent: Arc<Mutex<Vec<WsMessage>>>,
    inbound: mpsc::UnboundedSender<Result<TransportEvent, ConnectionError>>,
    fail_writes: Arc<AtomicBool>,
    closed_with: Arc<Mutex<Option<u16>>>,
}

impl MockLink {
    /// Text frames the socket wrote on this link
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|message| message.as_text().map(str::to_string))
            .collect()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Ok(TransportEvent::Message(WsMessage::Text(text.into()))));
    }

    /// Simulate the server closing the connection
    pub fn remote_close(&self, code: u16) {
        let _ = self.inbound.send(Ok(TransportEvent::Closed {
            code: Some(code),
            reason: "remote close".into(),
        }));
    }

    pub fn fail(&self, error: ConnectionError) {
        let _ = self.inbound.send(Err(error));
    }

    /// Make every later write fail
    pub fn break_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Close code the socket sent, if it closed this link
    pub fn closed_with(&self) -> Option<u16> {
        *self.closed_with.lock()
    }
}

struct MockTransport {
    sent: Arc<Mutex<Vec<WsMessage>>>,
    inbound: mpsc::UnboundedReceiver<Result<TransportEvent, ConnectionError>>,
    fail_writes: Arc<AtomicBool>,
    closed_with: Arc<Mutex<Option<u16>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: WsMessage) -> Result<(), ConnectionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("broken pipe".into()));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, ConnectionError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<(), ConnectionError> {
        *self.closed_with.lock() = Some(code);
        Ok(())
    }
}

/// Connector that plays back a script, then refuses every further attempt
#[derive(Default)]
pub struct ScriptedConnector {
    steps: Mutex<VecDeque<Step>>,
    attempts: Mutex<Vec<Instant>>,
    links: Mutex<Vec<MockLink>>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    /// Append more steps to the script
    pub fn then(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    /// When each connect call happened
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
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
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, ConnectionError> {
        self.attempts.lock().push(Instant::now());
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::Fail(ConnectionError::Transport("connection refused".into())));

        match step {
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
            Step::Open => {
                let (tx, rx) = mpsc::unbounded_channel();
                let link = MockLink {
                    sent: Arc::new(Mutex::new(Vec::new())),
                    inbound: tx,
                    fail_writes: Arc::new(AtomicBool::new(false)),
                    closed_with: Arc::new(Mutex::new(None)),
                };
                let transport = MockTransport {
                    sent: link.sent.clone(),
                    inbound: rx,
                    fail_writes: link.fail_writes.clone(),
                    closed_with: link.closed_with.clone(),
                };
                self.links.lock().push(link);
                Ok(Box::new(transport))
            }
        }
    }
}
