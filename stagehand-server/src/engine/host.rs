use std::sync::Arc;

use tokio::sync::broadcast;

use stagehand_protocol::ConsoleLogEvent;

use crate::connection::ConnectionMonitor;
use crate::dispatcher::Dispatcher;

/// Console log lines buffered per subscriber before it starts lagging
const CONSOLE_CHANNEL_CAPACITY: usize = 1024;

/// Host-side state shared by every operation against one engine channel
///
/// Host adapters feed connection transitions into [`EngineHost::monitor`] and
/// console output into [`EngineHost::publish_console_log`]. The console source
/// lives on the host side and survives engine reloads.
#[derive(Clone)]
pub struct EngineHost {
    monitor: Arc<ConnectionMonitor>,
    dispatcher: Dispatcher,
    console_tx: broadcast::Sender<ConsoleLogEvent>,
}

impl EngineHost {
    /// Create a host and spawn its owner dispatcher
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (console_tx, _) = broadcast::channel(CONSOLE_CHANNEL_CAPACITY);
        Self {
            monitor: Arc::new(ConnectionMonitor::new()),
            dispatcher: Dispatcher::spawn(),
            console_tx,
        }
    }

    pub fn monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.monitor
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Subscribe to console log lines published from now on
    pub fn subscribe_console(&self) -> broadcast::Receiver<ConsoleLogEvent> {
        self.console_tx.subscribe()
    }

    /// Sender half of the console source, for adapters that forward logs
    pub fn console_sender(&self) -> broadcast::Sender<ConsoleLogEvent> {
        self.console_tx.clone()
    }

    /// Publish a console log line; dropped when nobody is collecting
    pub fn publish_console_log(&self, event: ConsoleLogEvent) {
        let _ = self.console_tx.send(event);
    }
}
