//! Engine control channel interface
//!
//! [`EngineModel`] is the connected editor engine as seen through the control
//! channel. Every method mutates or reads channel state and must be invoked on
//! the owner context (see [`crate::dispatcher::Dispatcher`]); calls from any
//! other context are undefined behavior for the underlying transport.

mod host;

pub use host::EngineHost;

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

use stagehand_protocol::{
    AssemblyFilter, PlayState, RefreshKind, RunMethodData, RunMethodResponse, RunResult, TestMode,
    TestResultEvent,
};

use crate::aggregator::ResultAggregator;

/// Shared reference to a connected engine
pub type EngineHandle = Arc<dyn EngineModel>;

/// Errors raised by the control channel or the owner dispatcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The owner dispatcher has shut down
    #[error("owner dispatcher is not running")]
    DispatcherClosed,

    /// The engine dropped a started call without answering (e.g. domain reload)
    #[error("engine call was dropped before completing")]
    CallDropped,

    /// The engine answered a call with a failure
    #[error("engine rejected the call: {0}")]
    Rejected(String),

    /// An action running on the owner context panicked
    #[error("owner-context action panicked: {0}")]
    Panicked(String),
}

/// The connected editor engine
///
/// Mirrors the fixed RPC model exposed by the editor: a settable current
/// launch, a start call, a session-scoped abort, a refresh trigger, a compile
/// result query, method invocation and play-mode controls.
pub trait EngineModel: Send + Sync + 'static {
    /// Install the launch the next start call will run
    fn set_unit_test_launch(&self, launch: UnitTestLaunch) -> Result<(), EngineError>;

    /// Session id of the launch currently installed, if any
    fn current_launch_session(&self) -> Option<Uuid>;

    /// Start the installed launch; results arrive through its [`LaunchSink`]
    fn run_unit_test_launch(&self) -> Result<PendingCall<()>, EngineError>;

    /// Abort the launch identified by `session_id`
    fn abort_launch(&self, session_id: Uuid) -> Result<PendingCall<()>, EngineError>;

    /// Trigger an asset refresh, which recompiles changed scripts
    fn refresh(&self, kind: RefreshKind) -> Result<PendingCall<()>, EngineError>;

    /// Query whether the last compilation succeeded
    fn compilation_result(&self) -> Result<PendingCall<bool>, EngineError>;

    /// Invoke a static parameterless method by reflection
    fn run_method(&self, data: RunMethodData) -> Result<PendingCall<RunMethodResponse>, EngineError>;

    fn set_playing(&self, playing: bool) -> Result<(), EngineError>;

    fn set_paused(&self, paused: bool) -> Result<(), EngineError>;

    /// Advance play mode by one frame
    fn step_frame(&self) -> Result<(), EngineError>;

    fn play_state(&self) -> PlayState;
}

/// Pointer identity of two engine handles
pub(crate) fn same_engine(a: &EngineHandle, b: &EngineHandle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ==================== Pending Calls ====================

/// Result of a call started on the engine, resolved later by the engine
#[derive(Debug)]
pub struct PendingCall<T> {
    rx: oneshot::Receiver<Result<T, EngineError>>,
}

/// Engine-side half of a [`PendingCall`]
#[derive(Debug)]
pub struct CallResolver<T> {
    tx: oneshot::Sender<Result<T, EngineError>>,
}

impl<T> PendingCall<T> {
    /// Create an unresolved call and its resolver
    pub fn channel() -> (CallResolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (CallResolver { tx }, Self { rx })
    }

    /// A call that has already completed with `value`
    pub fn ready(value: T) -> Self {
        let (resolver, call) = Self::channel();
        resolver.resolve(value);
        call
    }

    /// A call that has already failed
    pub fn failed(message: impl Into<String>) -> Self {
        let (resolver, call) = Self::channel();
        resolver.reject(message);
        call
    }

    /// Wait for the engine to answer
    pub async fn wait(self) -> Result<T, EngineError> {
        self.rx.await.unwrap_or(Err(EngineError::CallDropped))
    }
}

impl<T> CallResolver<T> {
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(EngineError::Rejected(message.into())));
    }
}

// ==================== Test Launches ====================

/// Subscription through which the engine reports results for one launch
///
/// Scoped by a lifetime token owned by the launching attempt. Once that
/// attempt ends, everything delivered through the sink is dropped.
#[derive(Clone)]
pub struct LaunchSink {
    session_id: Uuid,
    aggregator: Arc<ResultAggregator>,
    lifetime: CancellationToken,
}

impl LaunchSink {
    pub(crate) fn new(
        session_id: Uuid,
        aggregator: Arc<ResultAggregator>,
        lifetime: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            aggregator,
            lifetime,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the launching attempt is still listening
    pub fn is_active(&self) -> bool {
        !self.lifetime.is_cancelled()
    }

    /// Report a per-test result event
    pub fn test_result(&self, event: TestResultEvent) {
        if !self.is_active() {
            trace!(session_id = %self.session_id, test_id = %event.test_id, "Dropping result for ended launch");
            return;
        }
        self.aggregator.record(event);
    }

    /// Report that the launch as a whole has finished
    pub fn run_finished(&self, result: RunResult) {
        if !self.is_active() {
            trace!(session_id = %self.session_id, "Dropping run result for ended launch");
            return;
        }
        self.aggregator.finish(result);
    }
}

impl std::fmt::Debug for LaunchSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchSink")
            .field("session_id", &self.session_id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A test launch handed to the engine
#[derive(Debug, Clone)]
pub struct UnitTestLaunch {
    pub session_id: Uuid,
    pub mode: TestMode,
    /// One filter per assembly
    pub filters: Vec<AssemblyFilter>,
    sink: LaunchSink,
}

impl UnitTestLaunch {
    /// Create a launch whose results flow into `sink`
    ///
    /// The sink is attached before the launch ever reaches the engine, so no
    /// early event can be missed.
    pub fn new(mode: TestMode, filters: Vec<AssemblyFilter>, sink: LaunchSink) -> Self {
        Self {
            session_id: sink.session_id(),
            mode,
            filters,
            sink,
        }
    }

    pub fn sink(&self) -> &LaunchSink {
        &self.sink
    }
}
