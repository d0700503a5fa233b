use crate::config::SocketConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::events::{EventBus, ListenerId, SocketEvent};
use crate::outbound_queue::OutboundQueue;
use crate::timer::Timer;
use crate::traits::*;
use crossbeam_channel::Receiver;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Internal command messages for socket control
enum SocketCommand {
    /// Explicit, caller-initiated connect
    Connect(oneshot::Sender<Result<()>>),
    /// Reset the attempt counter and start a fresh automatic cycle
    ForceReconnect(oneshot::Sender<Result<()>>),
    /// Transmit (or queue) a frame
    Send(OutboundFrame),
    /// Close everything; terminal
    Disconnect,
}

/// Socket metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub queued_frames: usize,
    pub reconnect_attempt: usize,
    pub connection_state: ConnectionState,
}

/// One persistent chat connection
///
/// The handle is cheap to call from any task; all transport I/O, timers
/// and queue mutations happen on a single background task, so they
/// never overlap.
///
/// Build with [`crate::builder()`]:
///
/// ```ignore
/// let socket = roomsocket::builder()
///     .config(ConnectionConfig::new("wss://chat.example.com/ws/watch-chat", token, room_id))
///     .reconnect_strategy(ExponentialBackoff::default())
///     .build()?;
///
/// socket.on("message", |event| println!("{:?}", event));
/// socket.connect().await?;
/// socket.send(OutboundFrame::chat("hello"))?;
/// ```
pub struct ChatSocket {
    config: Arc<SocketConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    events: Arc<EventBus>,
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Set once `disconnect()` has been requested
    terminated: AtomicBool,
}

impl ChatSocket {
    /// Spawn the socket task. Must be called inside a tokio runtime.
    ///
    /// The socket starts `DISCONNECTED`; nothing is opened until
    /// [`connect`](Self::connect) is called.
    pub(crate) fn spawn(config: SocketConfig) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let events = Arc::new(EventBus::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = SocketTask {
            config: Arc::clone(&config),
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            events: Arc::clone(&events),
            queue: OutboundQueue::new(),
            transport: None,
            pending: None,
            pending_explicit: false,
            awaiting_ack: false,
            connect_timer: Timer::new(),
            retry_timer: Timer::new(),
            attempts: 0,
            waiters: Vec::new(),
        };
        let task_handle = tokio::spawn(task.run(command_rx));

        Self {
            config,
            state,
            metrics,
            events,
            command_tx,
            task_handle: Mutex::new(Some(task_handle)),
            terminated: AtomicBool::new(false),
        }
    }

    /// Open the connection
    ///
    /// Resolves once the socket is `CONNECTED`. A failed explicit attempt
    /// is reported immediately and not retried. If a connect or reconnect
    /// cycle is already underway this waits for its outcome instead of
    /// starting a second attempt.
    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(SocketCommand::Connect(tx))?;
        rx.await
            .map_err(|e| SocketError::ChannelReceive(e.to_string()))?
    }

    /// Reset the attempt counter and reconnect with a fresh retry budget
    ///
    /// Drops the current transport if one is open. Resolves on the next
    /// successful connection, or with `ReconnectExhausted`.
    pub async fn force_reconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(SocketCommand::ForceReconnect(tx))?;
        rx.await
            .map_err(|e| SocketError::ChannelReceive(e.to_string()))?
    }

    /// Hand a frame to the socket
    ///
    /// Accepted while connected or while a connect cycle is underway (the
    /// frame is queued until the connection opens). Fails immediately with
    /// [`SendError::NotConnected`] otherwise.
    pub fn send(&self, frame: OutboundFrame) -> Result<()> {
        let state = self.state.get();
        if !state.accepts_frames() {
            return Err(SendError::NotConnected(state).into());
        }
        self.command(SocketCommand::Send(frame))
    }

    /// Close the transport with a normal-closure code, cancel pending
    /// timers and discard queued frames
    ///
    /// Terminal: the socket cannot be reconnected afterwards.
    pub fn disconnect(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(room = %self.config.connection.room_id, "Disconnect requested");
        // Task already gone: nothing to close
        let _ = self.command_tx.send(SocketCommand::Disconnect);
    }

    /// Disconnect and wait for the socket task to finish
    pub async fn shutdown(&self) {
        self.disconnect();
        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Socket task ended abnormally: {}", e);
            }
        }
    }

    /// Register a listener for events published under `name`
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.events.on(name, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Receive events published under `name` on a channel
    pub fn subscribe(&self, name: impl Into<String>) -> Receiver<SocketEvent> {
        self.events.subscribe(name)
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn room_id(&self) -> &str {
        &self.config.connection.room_id
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            queued_frames: self.metrics.queued_frames(),
            reconnect_attempt: self.metrics.reconnect_attempt(),
            connection_state: self.state.get(),
        }
    }

    fn command(&self, command: SocketCommand) -> Result<()> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(SocketError::InvalidState(
                "socket has been disconnected; create a new one".into(),
            ));
        }
        self.command_tx
            .send(command)
            .map_err(|e| SocketError::ChannelSend(e.to_string()))
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        // Ensure the task releases its transport and timers
        self.disconnect();
    }
}

type PendingConnect = BoxFuture<'static, std::result::Result<Box<dyn Transport>, ConnectionError>>;

/// State owned by the socket task
struct SocketTask {
    config: Arc<SocketConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    events: Arc<EventBus>,
    queue: OutboundQueue,
    /// Open transport (possibly still awaiting its handshake ack)
    transport: Option<Box<dyn Transport>>,
    /// Connect attempt in flight
    pending: Option<PendingConnect>,
    /// Whether the attempt in flight was a single-shot caller request
    pending_explicit: bool,
    /// Transport is open but the handshake ack has not arrived
    awaiting_ack: bool,
    connect_timer: Timer,
    retry_timer: Timer,
    /// Attempts made in the current reconnect cycle
    attempts: usize,
    waiters: Vec<oneshot::Sender<Result<()>>>,
}

impl SocketTask {
    /// Main socket loop
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<SocketCommand>) {
        debug!(room = %self.config.connection.room_id, "Socket task started");

        loop {
            let pending = &mut self.pending;
            let transport = &mut self.transport;
            let connect_timer = &mut self.connect_timer;
            let retry_timer = &mut self.retry_timer;

            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(SocketCommand::Disconnect) | None => {
                        self.teardown().await;
                        break;
                    }
                    Some(SocketCommand::Connect(reply)) => self.request_connect(reply),
                    Some(SocketCommand::ForceReconnect(reply)) => self.force_reconnect(reply).await,
                    Some(SocketCommand::Send(frame)) => self.send_frame(frame).await,
                },

                result = async {
                    match pending.as_mut() {
                        Some(attempt) => attempt.await,
                        None => std::future::pending().await,
                    }
                }, if pending.is_some() => {
                    self.pending = None;
                    self.on_attempt_result(result).await;
                }

                _ = connect_timer.fired(), if connect_timer.is_armed() => {
                    self.on_connect_timeout().await;
                }

                _ = retry_timer.fired(), if retry_timer.is_armed() => {
                    self.start_attempt(false);
                }

                event = async {
                    match transport.as_mut() {
                        Some(transport) => transport.next_event().await,
                        None => std::future::pending().await,
                    }
                }, if transport.is_some() => {
                    self.on_transport_event(event).await;
                }
            }
        }

        debug!(room = %self.config.connection.room_id, "Socket task exiting");
    }

    fn room(&self) -> &str {
        &self.config.connection.room_id
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.set(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(room = %self.room(), "Unexpected state transition {} -> {}", previous, next);
        }
        debug!(room = %self.room(), "State {} -> {}", previous, next);
        self.events.emit(&SocketEvent::StateChange { from: previous, to: next });
    }

    fn is_open(&self) -> bool {
        self.transport.is_some() && !self.awaiting_ack
    }

    fn cycle_in_progress(&self) -> bool {
        self.pending.is_some() || self.awaiting_ack || self.retry_timer.is_armed()
    }

    fn resolve_waiters(&mut self, outcome: Result<()>) {
        for waiter in self.waiters.drain(..) {
            // Caller stopped waiting
            let _ = waiter.send(outcome.clone());
        }
    }

    fn request_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.is_open() {
            let _ = reply.send(Ok(()));
            return;
        }

        self.waiters.push(reply);
        if self.cycle_in_progress() {
            debug!(room = %self.room(), "Connect requested during an active cycle, waiting on it");
            return;
        }
        self.start_attempt(true);
    }

    async fn force_reconnect(&mut self, reply: oneshot::Sender<Result<()>>) {
        info!(room = %self.room(), "Forcing reconnect");
        self.retry_timer.cancel();
        self.connect_timer.cancel();
        self.pending = None;
        self.awaiting_ack = false;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close(CLOSE_NORMAL, "reconnecting").await {
                debug!(room = %self.room(), "Close before reconnect failed: {}", e);
            }
        }

        self.attempts = 0;
        self.metrics.set_reconnect_attempt(0);
        self.waiters.push(reply);
        self.set_state(ConnectionState::Disconnected);
        self.start_attempt(false);
    }

    fn start_attempt(&mut self, explicit: bool) {
        self.set_state(ConnectionState::Connecting);
        info!(
            room = %self.room(),
            attempt = self.attempts,
            "Connecting to {}",
            self.config.connection.redacted()
        );

        let connector = Arc::clone(&self.config.connector);
        let url = self.config.url().to_string();
        self.pending = Some(Box::pin(async move { connector.connect(&url).await }));
        self.pending_explicit = explicit;
        self.connect_timer.schedule(self.config.connect_timeout);
    }

    async fn on_attempt_result(&mut self, result: std::result::Result<Box<dyn Transport>, ConnectionError>) {
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                if self.config.handshake_ack.is_some() {
                    // Connect timer keeps running until the ack arrives
                    self.awaiting_ack = true;
                    self.set_state(ConnectionState::Authenticating);
                } else {
                    self.connect_timer.cancel();
                    self.on_open().await;
                }
            }
            Err(e) => {
                self.connect_timer.cancel();
                self.on_attempt_failed(e);
            }
        }
    }

    async fn on_connect_timeout(&mut self) {
        let timeout = self.config.connect_timeout;
        if self.pending.take().is_none() && !self.awaiting_ack {
            return;
        }

        if self.awaiting_ack {
            warn!(room = %self.room(), "No handshake acknowledgment within {:?}", timeout);
            self.awaiting_ack = false;
            if let Some(mut transport) = self.transport.take() {
                let _ = transport.close(CLOSE_NORMAL, "handshake timeout").await;
            }
        }
        self.on_attempt_failed(ConnectionError::Timeout(timeout));
    }

    /// Transport open and authenticated
    async fn on_open(&mut self) {
        self.awaiting_ack = false;
        self.attempts = 0;
        self.metrics.set_reconnect_attempt(0);
        self.set_state(ConnectionState::Connected);
        info!(room = %self.room(), "Connected");

        if let Err(e) = self.flush_queue().await {
            error!(room = %self.room(), error = %e, "Flushing queued frames failed");
            self.events.emit(&SocketEvent::MessageSendError { error: e.to_string() });
            self.on_connection_lost(e);
            return;
        }

        self.events.emit(&SocketEvent::Connect);
        self.resolve_waiters(Ok(()));
    }

    async fn flush_queue(&mut self) -> std::result::Result<(), ConnectionError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        let result = self.queue.flush(&mut **transport, self.config.codec.as_ref()).await;
        if let Ok(written) = result {
            for _ in 0..written {
                self.metrics.increment_sent();
            }
        }
        self.metrics.set_queued(self.queue.len());
        result.map(|_| ())
    }

    fn on_attempt_failed(&mut self, error: ConnectionError) {
        warn!(
            room = %self.room(),
            attempt = self.attempts,
            error = %error,
            "Connect attempt failed"
        );
        self.events.emit(&SocketEvent::ConnectError {
            error: error.to_string(),
            attempt: self.attempts,
        });

        if self.pending_explicit {
            // Single-shot: report to the caller, no automatic retry
            self.pending_explicit = false;
            self.set_state(ConnectionState::Disconnected);
            self.resolve_waiters(Err(error.into()));
        } else {
            self.handle_reconnect(error);
        }
    }

    /// Decide between another retry and giving up
    fn handle_reconnect(&mut self, error: ConnectionError) {
        let strategy = &self.config.reconnect_strategy;
        let delay = if error.is_retryable() {
            strategy.next_delay(self.attempts)
        } else {
            None
        };

        match delay {
            Some(delay) => {
                self.attempts += 1;
                self.metrics.increment_reconnects();
                self.metrics.set_reconnect_attempt(self.attempts);
                self.set_state(ConnectionState::Reconnecting);
                info!(
                    room = %self.room(),
                    attempt = self.attempts,
                    "Reconnecting in {:?}",
                    delay
                );
                self.events.emit(&SocketEvent::Reconnecting {
                    attempt: self.attempts,
                    max_attempts: strategy.max_attempts(),
                    delay,
                });
                self.retry_timer.schedule(delay);
            }
            None => {
                let reason = error.to_string();
                self.set_state(ConnectionState::Failed);
                error!(
                    room = %self.room(),
                    attempts = self.attempts,
                    retryable = error.is_retryable(),
                    "Giving up on reconnection: {}",
                    reason
                );
                self.events.emit(&SocketEvent::MaxReconnectFailed {
                    attempts: self.attempts,
                    reason: reason.clone(),
                });
                let attempts = self.attempts;
                self.resolve_waiters(Err(SocketError::ReconnectExhausted { attempts, reason }));
            }
        }
    }

    async fn on_transport_event(&mut self, event: Option<std::result::Result<TransportEvent, ConnectionError>>) {
        match event {
            Some(Ok(TransportEvent::Message(message))) => {
                self.metrics.increment_received();
                let envelope = self.config.codec.decode(message);

                if self.awaiting_ack && self.config.handshake_ack.as_deref() == Some(envelope.kind.as_str()) {
                    debug!(room = %self.room(), "Handshake acknowledged");
                    self.connect_timer.cancel();
                    self.on_open().await;
                    return;
                }

                self.events.emit(&SocketEvent::Message(envelope));
            }
            Some(Ok(TransportEvent::Closed { code, reason })) => {
                info!(room = %self.room(), ?code, "Remote closed connection: {}", reason);
                if !self.awaiting_ack {
                    self.set_state(ConnectionState::Closed);
                }
                self.on_connection_lost(ConnectionError::Closed { code, reason });
            }
            Some(Err(e)) => {
                error!(room = %self.room(), error = %e, "WebSocket error");
                self.on_connection_lost(e);
            }
            None => {
                warn!(room = %self.room(), "WebSocket stream ended");
                self.on_connection_lost(ConnectionError::Closed {
                    code: None,
                    reason: "stream ended".into(),
                });
            }
        }
    }

    fn on_connection_lost(&mut self, error: ConnectionError) {
        self.transport = None;

        if self.awaiting_ack {
            self.awaiting_ack = false;
            self.connect_timer.cancel();
            self.on_attempt_failed(error);
            return;
        }

        self.set_state(ConnectionState::Disconnected);
        self.events.emit(&SocketEvent::Disconnect {
            code: error.close_code(),
            reason: error.to_string(),
        });
        // Reconnection after a drop is always automatic
        self.pending_explicit = false;
        self.handle_reconnect(error);
    }

    async fn send_frame(&mut self, frame: OutboundFrame) {
        if !self.is_open() {
            self.queue.enqueue(frame);
            self.metrics.set_queued(self.queue.len());
            debug!(room = %self.room(), queued = self.queue.len(), "Frame queued until connected");
            return;
        }

        let message = match self.config.codec.encode(&frame) {
            Ok(message) => message,
            Err(e) => {
                error!(room = %self.room(), error = %e, "Failed to encode frame");
                self.events.emit(&SocketEvent::MessageSendError { error: e.to_string() });
                return;
            }
        };

        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        match transport.send(message).await {
            Ok(()) => self.metrics.increment_sent(),
            Err(e) => {
                error!(room = %self.room(), error = %e, "Failed to send frame");
                self.events.emit(&SocketEvent::MessageSendError { error: e.to_string() });
                // Keep the frame for the next connection
                self.queue.requeue_front(frame);
                self.metrics.set_queued(self.queue.len());
                self.on_connection_lost(e);
            }
        }
    }

    async fn teardown(&mut self) {
        info!(room = %self.room(), "Closing socket");
        self.set_state(ConnectionState::Closing);
        self.retry_timer.cancel();
        self.connect_timer.cancel();
        self.pending = None;
        self.awaiting_ack = false;

        let had_transport = match self.transport.take() {
            Some(mut transport) => {
                if let Err(e) = transport.close(CLOSE_NORMAL, "client disconnect").await {
                    debug!(room = %self.room(), "Close handshake failed: {}", e);
                }
                true
            }
            None => false,
        };

        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(room = %self.room(), "Discarded {} queued frames on disconnect", dropped);
        }
        self.metrics.set_queued(0);

        self.set_state(ConnectionState::Disconnected);
        if had_transport {
            self.events.emit(&SocketEvent::Disconnect {
                code: Some(CLOSE_NORMAL),
                reason: ConnectionError::ClientClosed.to_string(),
            });
        }
        self.resolve_waiters(Err(ConnectionError::ClientClosed.into()));
    }
}
