//! Integration tests for reconnection behavior
//!
//! These tests drive a socket through scripted connect outcomes with the
//! tokio clock paused, so backoff and timeout timing is exact.

mod common;

use common::{wait_until, ScriptedConnector, Step};
use roomsocket::traits::reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
use roomsocket::{
    names, ChatSocket, ConnectionConfig, ConnectionError, ConnectionState, OutboundFrame, SocketError,
    SocketEvent, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
};
use std::sync::Arc;
use std::time::Duration;

fn socket_with(connector: Arc<ScriptedConnector>) -> ChatSocket {
    roomsocket::builder()
        .config(ConnectionConfig::new("ws://chat.test/ws/watch-chat", "session-token", "room-1"))
        .connector(connector)
        .build()
        .unwrap()
}

/// Connect once successfully, then drop the link from the server side
async fn connect_then_drop(socket: &ChatSocket, connector: &ScriptedConnector) {
    socket.connect().await.unwrap();
    assert_eq!(socket.connection_state(), ConnectionState::Connected);
    connector.link(0).remote_close(1006);
}

#[test]
fn test_exponential_backoff_full_sequence() {
    verbose_println!("Testing exponential backoff full sequence...");

    let strategy = ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_secs(30), Some(5));
    let expected_delays = [1000, 2000, 4000, 8000, 16000];

    for (attempt, &expected_ms) in expected_delays.iter().enumerate() {
        let delay = strategy.next_delay(attempt).unwrap();
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert_eq!(delay.as_millis(), expected_ms, "Unexpected delay at attempt {}", attempt);
    }

    assert!(strategy.next_delay(5).is_none(), "Should return None after max attempts");
}

#[test]
fn test_strategies_report_budget() {
    assert_eq!(ExponentialBackoff::default().max_attempts(), Some(5));
    assert_eq!(FixedDelay::new(Duration::from_millis(500), Some(3)).max_attempts(), Some(3));
    assert!(NeverReconnect.next_delay(0).is_none());
    assert!(!NeverReconnect.should_reconnect(0));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_budget_reaches_failed() {
    verbose_println!("Testing reconnect budget...");

    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());
    let reconnecting = socket.subscribe(names::RECONNECTING);
    let exhausted = socket.subscribe(names::MAX_RECONNECT_FAILED);

    connect_then_drop(&socket, &connector).await;

    let failed = wait_until(|| socket.connection_state() == ConnectionState::Failed, Duration::from_secs(120)).await;
    assert!(failed, "socket should give up after the retry budget");

    // One successful open plus five failed retries
    assert_eq!(connector.attempt_count(), 6);
    let attempts: Vec<usize> = reconnecting
        .try_iter()
        .filter_map(|event| match event {
            SocketEvent::Reconnecting { attempt, max_attempts, .. } => {
                assert_eq!(max_attempts, Some(5));
                Some(attempt)
            }
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);

    match exhausted.try_recv() {
        Ok(SocketEvent::MaxReconnectFailed { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected max_reconnect_failed, got {:?}", other),
    }

    // No sixth retry is ever scheduled
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count(), 6);
    assert_eq!(socket.connection_state(), ConnectionState::Failed);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    verbose_println!("Testing backoff timing...");

    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());

    socket.connect().await.unwrap();
    let dropped_at = tokio::time::Instant::now();
    connector.link(0).remote_close(1006);

    assert!(wait_until(|| connector.attempt_count() >= 3, Duration::from_secs(30)).await);
    let attempts = connector.attempts();

    let first_retry = attempts[1] - dropped_at;
    let second_retry = attempts[2] - attempts[1];
    verbose_println!("  Retry delays: {:?}, {:?}", first_retry, second_retry);

    assert!(first_retry >= Duration::from_millis(1000) && first_retry < Duration::from_millis(1100));
    assert!(second_retry >= Duration::from_millis(2000) && second_retry < Duration::from_millis(2100));

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_queued_frames_flush_in_order_after_reconnect() {
    verbose_println!("Testing queue ordering across reconnect...");

    let connector = ScriptedConnector::new(vec![Step::Open, Step::Open]);
    let socket = socket_with(connector.clone());

    connect_then_drop(&socket, &connector).await;
    assert!(wait_until(|| socket.connection_state() == ConnectionState::Reconnecting, Duration::from_millis(500)).await);

    socket.send(OutboundFrame::chat("A")).unwrap();
    socket.send(OutboundFrame::chat("B")).unwrap();
    socket.send(OutboundFrame::chat("C")).unwrap();
    assert!(wait_until(|| socket.metrics().queued_frames == 3, Duration::from_millis(500)).await);

    assert!(wait_until(|| socket.is_connected(), Duration::from_secs(5)).await);
    assert!(wait_until(|| connector.link(1).sent_texts().len() == 3, Duration::from_secs(1)).await);

    assert_eq!(connector.link(1).sent_texts(), vec!["A", "B", "C"]);
    assert!(connector.link(0).sent_texts().is_empty());
    assert_eq!(socket.metrics().queued_frames, 0);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_explicit_connect_failure_is_not_retried() {
    let connector = ScriptedConnector::new(vec![Step::Fail(ConnectionError::Transport("refused".into()))]);
    let socket = socket_with(connector.clone());
    let errors = socket.subscribe(names::CONNECT_ERROR);

    let result = socket.connect().await;
    assert!(matches!(result, Err(SocketError::Connection(ConnectionError::Transport(_)))));
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
    assert_eq!(errors.try_iter().count(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert!(socket.send(OutboundFrame::chat("hi")).is_err());

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let connector = ScriptedConnector::new(vec![Step::Hang]);
    let socket = socket_with(connector.clone());

    let started = tokio::time::Instant::now();
    let result = socket.connect().await;
    let elapsed = started.elapsed();

    assert!(matches!(
        result,
        Err(SocketError::Connection(ConnectionError::Timeout(timeout))) if timeout == Duration::from_secs(15)
    ));
    assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_millis(15_100));
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_joins_running_cycle() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());

    connect_then_drop(&socket, &connector).await;
    connector.then(Step::Fail(ConnectionError::Transport("refused".into())));
    connector.then(Step::Open);

    assert!(wait_until(|| socket.connection_state() == ConnectionState::Reconnecting, Duration::from_millis(500)).await);
    socket.connect().await.unwrap();

    assert!(socket.is_connected());
    // Initial open, one failed retry, one successful retry: no extra attempt from connect()
    assert_eq!(connector.attempt_count(), 3);
    assert_eq!(socket.metrics().reconnect_attempt, 0);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_policy_violation_close_is_terminal() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());
    let exhausted = socket.subscribe(names::MAX_RECONNECT_FAILED);

    socket.connect().await.unwrap();
    connector.link(0).remote_close(CLOSE_POLICY_VIOLATION);

    assert!(wait_until(|| socket.connection_state() == ConnectionState::Failed, Duration::from_secs(1)).await);
    assert_eq!(exhausted.try_iter().count(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count(), 1);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_force_reconnect_recovers_from_failed() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());

    socket.connect().await.unwrap();
    connector.link(0).remote_close(CLOSE_POLICY_VIOLATION);
    assert!(wait_until(|| socket.connection_state() == ConnectionState::Failed, Duration::from_secs(1)).await);

    connector.then(Step::Open);
    socket.force_reconnect().await.unwrap();

    assert!(socket.is_connected());
    assert_eq!(connector.link_count(), 2);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_force_reconnect_reports_exhaustion() {
    let connector = ScriptedConnector::new(vec![]);
    let socket = socket_with(connector.clone());

    let result = socket.force_reconnect().await;
    match result {
        Err(SocketError::ReconnectExhausted { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected ReconnectExhausted, got {:?}", other),
    }
    assert_eq!(socket.connection_state(), ConnectionState::Failed);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_retry() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());

    connect_then_drop(&socket, &connector).await;
    assert!(wait_until(|| socket.connection_state() == ConnectionState::Reconnecting, Duration::from_millis(500)).await);
    socket.send(OutboundFrame::chat("pending")).unwrap();

    socket.shutdown().await;
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempt_count(), 1, "no retry may fire after disconnect");
    assert_eq!(socket.metrics().queued_frames, 0);

    // Terminal: the instance cannot be reused
    assert!(matches!(socket.connect().await, Err(SocketError::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_with_normal_code() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = socket_with(connector.clone());
    let disconnects = socket.subscribe(names::DISCONNECT);

    socket.connect().await.unwrap();
    socket.shutdown().await;

    assert_eq!(connector.link(0).closed_with(), Some(CLOSE_NORMAL));
    match disconnects.try_recv() {
        Ok(SocketEvent::Disconnect { code, .. }) => assert_eq!(code, Some(CLOSE_NORMAL)),
        other => panic!("expected disconnect event, got {:?}", other),
    }

    // Idempotent
    socket.disconnect();
    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_requeues_frame() {
    let connector = ScriptedConnector::new(vec![Step::Open, Step::Open]);
    let socket = socket_with(connector.clone());
    let send_errors = socket.subscribe(names::MESSAGE_SEND_ERROR);

    socket.connect().await.unwrap();
    connector.link(0).break_writes();
    socket.send(OutboundFrame::chat("survives")).unwrap();

    assert!(wait_until(|| send_errors.len() == 1, Duration::from_millis(500)).await);
    assert!(wait_until(|| connector.link_count() == 2 && socket.is_connected(), Duration::from_secs(5)).await);
    assert!(wait_until(|| connector.link(1).sent_texts() == vec!["survives"], Duration::from_secs(1)).await);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handshake_ack_gates_connected() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = Arc::new(
        roomsocket::builder()
            .config(ConnectionConfig::new("ws://chat.test/ws/match-chat", "session-token", "room-2"))
            .connector(connector.clone())
            .handshake_ack("connected")
            .build()
            .unwrap(),
    );

    let pending = {
        let socket = socket.clone();
        tokio::spawn(async move { socket.connect().await })
    };

    assert!(wait_until(|| socket.connection_state() == ConnectionState::Authenticating, Duration::from_secs(1)).await);
    socket.send(OutboundFrame::chat("early")).unwrap();
    assert!(wait_until(|| socket.metrics().queued_frames == 1, Duration::from_millis(500)).await);
    assert!(connector.link(0).sent_texts().is_empty());

    connector.link(0).push_text(r#"{"type":"connected","payload":{}}"#);
    pending.await.unwrap().unwrap();

    assert!(socket.is_connected());
    assert_eq!(connector.link(0).sent_texts(), vec!["early"]);

    socket.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handshake_ack_timeout() {
    let connector = ScriptedConnector::new(vec![Step::Open]);
    let socket = roomsocket::builder()
        .config(ConnectionConfig::new("ws://chat.test/ws/match-chat", "session-token", "room-2"))
        .connector(connector.clone())
        .handshake_ack("connected")
        .build()
        .unwrap();

    let result = socket.connect().await;
    assert!(matches!(result, Err(SocketError::Connection(ConnectionError::Timeout(_)))));
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
    assert_eq!(connector.link(0).closed_with(), Some(CLOSE_NORMAL));

    socket.shutdown().await;
}
