//! Engine connection monitoring
//!
//! Tracks whether an engine handle is currently available and lets callers
//! wait for one with a timeout. A new handle is published every time the
//! engine (re)connects; after a domain reload the previous handle is dead
//! and must not be used again.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::{same_engine, EngineHandle};

/// Why no engine handle is available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No engine has connected yet
    NeverConnected,
    /// The engine went away but is expected back (domain reload, restart)
    Transient,
    /// The channel was closed for good
    Closed,
}

/// Current engine availability
#[derive(Clone)]
pub enum ConnectionState {
    Connected(EngineHandle),
    Disconnected(DisconnectReason),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    /// Whether this state holds exactly `handle`
    pub fn is_connected_to(&self, handle: &EngineHandle) -> bool {
        match self {
            ConnectionState::Connected(current) => same_engine(current, handle),
            ConnectionState::Disconnected(_) => false,
        }
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        match self {
            ConnectionState::Connected(handle) => Some(handle.clone()),
            ConnectionState::Disconnected(_) => None,
        }
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            ConnectionState::Connected(_) => None,
            ConnectionState::Disconnected(reason) => Some(*reason),
        }
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected(_) => f.write_str("Connected"),
            ConnectionState::Disconnected(reason) => {
                f.debug_tuple("Disconnected").field(reason).finish()
            }
        }
    }
}

/// Publishes engine availability to any number of waiters
#[derive(Debug)]
pub struct ConnectionMonitor {
    state_tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (state_tx, _) =
            watch::channel(ConnectionState::Disconnected(DisconnectReason::NeverConnected));
        Self { state_tx }
    }

    /// Publish a freshly connected engine handle
    pub fn connected(&self, handle: EngineHandle) {
        info!("Engine connected");
        self.state_tx.send_replace(ConnectionState::Connected(handle));
    }

    /// Publish that the engine handle is gone
    pub fn disconnected(&self, reason: DisconnectReason) {
        info!(?reason, "Engine disconnected");
        self.state_tx
            .send_replace(ConnectionState::Disconnected(reason));
    }

    pub fn is_connected(&self) -> bool {
        self.state_tx.borrow().is_connected()
    }

    /// Current state snapshot
    pub fn current(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes
    ///
    /// The returned receiver has already seen the current state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Wait up to `timeout` for a connected engine
    ///
    /// Returns immediately when already connected, otherwise `None` once the
    /// timeout elapses.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Option<EngineHandle> {
        let mut rx = self.subscribe();
        let current = rx.borrow_and_update().handle();
        if current.is_some() {
            return current;
        }

        debug!(timeout_ms = timeout.as_millis() as u64, "Waiting for engine connection");
        // Bound to a local so the wait future, which borrows `rx`, drops first
        let handle = match tokio::time::timeout(timeout, rx.wait_for(ConnectionState::is_connected))
            .await
        {
            Ok(Ok(state)) => state.handle(),
            Ok(Err(_)) | Err(_) => None,
        };
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn engine() -> EngineHandle {
        Arc::new(FakeEngine::new())
    }

    #[test]
    fn test_starts_never_connected() {
        let monitor = ConnectionMonitor::new();
        assert!(!monitor.is_connected());
        assert_eq!(
            monitor.current().disconnect_reason(),
            Some(DisconnectReason::NeverConnected)
        );
    }

    #[test]
    fn test_state_transitions() {
        let monitor = ConnectionMonitor::new();
        let handle = engine();

        monitor.connected(handle.clone());
        assert!(monitor.is_connected());
        assert!(monitor.current().is_connected_to(&handle));
        assert!(!monitor.current().is_connected_to(&engine()));

        monitor.disconnected(DisconnectReason::Transient);
        assert!(!monitor.is_connected());
        assert!(monitor.current().handle().is_none());
        assert_eq!(
            monitor.current().disconnect_reason(),
            Some(DisconnectReason::Transient)
        );
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_connected() {
        let monitor = ConnectionMonitor::new();
        let handle = engine();
        monitor.connected(handle.clone());

        let got = monitor
            .wait_for_connection(Duration::from_secs(0))
            .await
            .unwrap();
        assert!(same_engine(&got, &handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_connection() {
        let monitor = ConnectionMonitor::new();
        let start = Instant::now();

        let got = monitor
            .wait_for_connection(Duration::from_millis(500))
            .await;

        assert!(got.is_none());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_on_later_connection() {
        let monitor = Arc::new(ConnectionMonitor::new());
        let handle = engine();

        let publisher = {
            let monitor = monitor.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                monitor.connected(handle);
            })
        };

        let got = monitor
            .wait_for_connection(Duration::from_secs(30))
            .await
            .unwrap();
        assert!(same_engine(&got, &handle));
        publisher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ignores_transient_disconnects() {
        let monitor = Arc::new(ConnectionMonitor::new());
        let handle = engine();

        {
            let monitor = monitor.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                monitor.disconnected(DisconnectReason::Transient);
                tokio::time::sleep(Duration::from_millis(100)).await;
                monitor.connected(handle);
            });
        }

        let got = monitor.wait_for_connection(Duration::from_secs(1)).await;
        assert!(got.is_some());
    }
}
