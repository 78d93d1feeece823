//! Console log collection during a compilation check

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stagehand_protocol::{ConsoleLogEvent, LogEventKind};

/// A console log line as returned with a compilation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(rename = "stackTrace")]
    pub stack_trace: String,
}

impl CollectedLogEntry {
    pub fn new(kind: LogEventKind, message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

impl From<ConsoleLogEvent> for CollectedLogEntry {
    fn from(event: ConsoleLogEvent) -> Self {
        Self::new(event.kind, event.message, event.stack_trace)
    }
}

/// Buffers console output from start until [`ConsoleLogCollector::stop`]
pub struct ConsoleLogCollector {
    cancel: CancellationToken,
    handle: JoinHandle<Vec<CollectedLogEntry>>,
}

impl ConsoleLogCollector {
    pub fn start(mut rx: broadcast::Receiver<ConsoleLogEvent>) -> Self {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut entries = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    received = rx.recv() => match received {
                        Ok(event) => entries.push(CollectedLogEntry::from(event)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Console log collector lagged, entries lost");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }

            // Pick up anything already queued when stop was requested
            loop {
                match rx.try_recv() {
                    Ok(event) => entries.push(CollectedLogEntry::from(event)),
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Console log collector lagged, entries lost");
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }

            debug!(count = entries.len(), "Console log collection finished");
            entries
        });

        Self { cancel, handle }
    }

    /// Stop collecting and return everything gathered so far
    pub async fn stop(self) -> Vec<CollectedLogEntry> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Console log collector task failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collects_events_until_stopped() {
        let (tx, rx) = broadcast::channel(16);
        let collector = ConsoleLogCollector::start(rx);

        tx.send(ConsoleLogEvent::new(LogEventKind::Warning, "obsolete API"))
            .unwrap();
        let mut error = ConsoleLogEvent::new(LogEventKind::Error, "CS0103: name does not exist");
        error.stack_trace = "Assets/Player.cs(12,5)".into();
        tx.send(error).unwrap();

        let entries = collector.stop().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "Warning");
        assert_eq!(entries[1].kind, "Error");
        assert_eq!(entries[1].stack_trace, "Assets/Player.cs(12,5)");
    }

    #[tokio::test]
    async fn test_ignores_events_after_stop() {
        let (tx, rx) = broadcast::channel(16);
        let collector = ConsoleLogCollector::start(rx);
        let entries = collector.stop().await;
        let _ = tx.send(ConsoleLogEvent::new(LogEventKind::Message, "late"));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_closed_source_ends_collection() {
        let (tx, rx) = broadcast::channel(16);
        let collector = ConsoleLogCollector::start(rx);
        tx.send(ConsoleLogEvent::new(LogEventKind::Message, "compiling"))
            .unwrap();
        drop(tx);

        let entries = collector.stop().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "compiling");
    }

    #[test]
    fn test_entry_json_field_names() {
        let entry = CollectedLogEntry::new(LogEventKind::Message, "done", "");
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"type":"Message","message":"done","stackTrace":""}"#
        );
    }
}
