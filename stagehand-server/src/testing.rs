//! Scripted in-memory engine for tests

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use stagehand_protocol::{
    ConsoleLogEvent, EngineTestStatus, PlayState, RefreshKind, RunMethodData, RunMethodResponse,
    RunResult, TestResultEvent,
};

use crate::dispatcher::Dispatcher;
use crate::engine::{EngineError, EngineModel, PendingCall, UnitTestLaunch};

/// How the fake answers a call
#[derive(Debug, Clone)]
pub(crate) enum CallBehavior<T> {
    /// The started call completes with a value
    Complete(T),
    /// The started call fails
    Fail(String),
    /// The call never completes until [`FakeEngine::drop_pending`]
    Hang,
    /// The call is refused before it starts
    Reject(String),
}

struct FakeState {
    launches: Vec<UnitTestLaunch>,
    current_session: Option<Uuid>,
    aborted: Vec<Uuid>,
    start: CallBehavior<()>,
    abort: CallBehavior<()>,
    refresh: CallBehavior<()>,
    compile: CallBehavior<bool>,
    refresh_logs: Vec<ConsoleLogEvent>,
    run_method: CallBehavior<RunMethodResponse>,
    method_logs: Vec<ConsoleLogEvent>,
    method_calls: Vec<RunMethodData>,
    held: Vec<Box<dyn Any + Send>>,
    play: PlayState,
    compile_queries: usize,
}

pub(crate) struct FakeEngine {
    state: Mutex<FakeState>,
    launches_tx: watch::Sender<usize>,
    refreshes_tx: watch::Sender<usize>,
    off_owner_calls: AtomicUsize,
    console: Option<broadcast::Sender<ConsoleLogEvent>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let (launches_tx, _) = watch::channel(0);
        let (refreshes_tx, _) = watch::channel(0);
        Self {
            state: Mutex::new(FakeState {
                launches: Vec::new(),
                current_session: None,
                aborted: Vec::new(),
                start: CallBehavior::Complete(()),
                abort: CallBehavior::Complete(()),
                refresh: CallBehavior::Complete(()),
                compile: CallBehavior::Complete(true),
                refresh_logs: Vec::new(),
                run_method: CallBehavior::Complete(RunMethodResponse::invoked()),
                method_logs: Vec::new(),
                method_calls: Vec::new(),
                held: Vec::new(),
                play: PlayState::default(),
                compile_queries: 0,
            }),
            launches_tx,
            refreshes_tx,
            off_owner_calls: AtomicUsize::new(0),
            console: None,
        }
    }

    /// Publish refresh and method logs to this console source when those calls start
    pub fn with_console(mut self, console: broadcast::Sender<ConsoleLogEvent>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn set_start_behavior(&self, behavior: CallBehavior<()>) {
        self.state.lock().start = behavior;
    }

    pub fn set_abort_behavior(&self, behavior: CallBehavior<()>) {
        self.state.lock().abort = behavior;
    }

    pub fn set_refresh_behavior(&self, behavior: CallBehavior<()>) {
        self.state.lock().refresh = behavior;
    }

    pub fn set_compile_behavior(&self, behavior: CallBehavior<bool>) {
        self.state.lock().compile = behavior;
    }

    pub fn set_refresh_logs(&self, logs: Vec<ConsoleLogEvent>) {
        self.state.lock().refresh_logs = logs;
    }

    pub fn set_run_method_behavior(&self, behavior: CallBehavior<RunMethodResponse>) {
        self.state.lock().run_method = behavior;
    }

    pub fn set_method_logs(&self, logs: Vec<ConsoleLogEvent>) {
        self.state.lock().method_logs = logs;
    }

    pub fn method_calls(&self) -> Vec<RunMethodData> {
        self.state.lock().method_calls.clone()
    }

    /// Pretend another caller installed its own launch
    pub fn set_foreign_session(&self, session_id: Uuid) {
        self.state.lock().current_session = Some(session_id);
    }

    /// Drop every hung call, as a domain reload would
    pub fn drop_pending(&self) {
        self.state.lock().held.clear();
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().launches.len()
    }

    pub fn launch(&self, index: usize) -> UnitTestLaunch {
        self.state.lock().launches[index].clone()
    }

    pub fn aborted(&self) -> Vec<Uuid> {
        self.state.lock().aborted.clone()
    }

    pub fn compile_queries(&self) -> usize {
        self.state.lock().compile_queries
    }

    /// Calls that arrived from outside the owner context
    pub fn off_owner_calls(&self) -> usize {
        self.off_owner_calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_launches(&self, count: usize) {
        let mut rx = self.launches_tx.subscribe();
        let _ = rx.wait_for(|launches| *launches >= count).await;
    }

    pub async fn wait_for_refreshes(&self, count: usize) {
        let mut rx = self.refreshes_tx.subscribe();
        let _ = rx.wait_for(|refreshes| *refreshes >= count).await;
    }

    /// Report a result through the most recent launch
    pub fn emit(&self, test_id: &str, status: EngineTestStatus) {
        self.emit_event(TestResultEvent::new(test_id, status));
    }

    pub fn emit_event(&self, event: TestResultEvent) {
        let sink = self.latest_launch().sink().clone();
        sink.test_result(event);
    }

    /// Report completion of the most recent launch
    pub fn finish_run(&self, passed: bool) {
        let sink = self.latest_launch().sink().clone();
        sink.run_finished(RunResult { passed });
    }

    fn latest_launch(&self) -> UnitTestLaunch {
        let state = self.state.lock();
        state
            .launches
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no launch has been submitted"))
    }

    fn publish(&self, logs: Vec<ConsoleLogEvent>) {
        if let Some(console) = &self.console {
            for log in logs {
                let _ = console.send(log);
            }
        }
    }

    fn check_owner(&self) {
        if !Dispatcher::is_owner_context() {
            self.off_owner_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn answer<T: Send + 'static>(
        state: &mut FakeState,
        behavior: CallBehavior<T>,
    ) -> Result<PendingCall<T>, EngineError> {
        match behavior {
            CallBehavior::Complete(value) => Ok(PendingCall::ready(value)),
            CallBehavior::Fail(message) => Ok(PendingCall::failed(message)),
            CallBehavior::Hang => {
                let (resolver, call) = PendingCall::channel();
                state.held.push(Box::new(resolver));
                Ok(call)
            }
            CallBehavior::Reject(message) => Err(EngineError::Rejected(message)),
        }
    }
}

impl EngineModel for FakeEngine {
    fn set_unit_test_launch(&self, launch: UnitTestLaunch) -> Result<(), EngineError> {
        self.check_owner();
        let count = {
            let mut state = self.state.lock();
            state.current_session = Some(launch.session_id);
            state.launches.push(launch);
            state.launches.len()
        };
        self.launches_tx.send_replace(count);
        Ok(())
    }

    fn current_launch_session(&self) -> Option<Uuid> {
        self.check_owner();
        self.state.lock().current_session
    }

    fn run_unit_test_launch(&self) -> Result<PendingCall<()>, EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        let behavior = state.start.clone();
        Self::answer(&mut state, behavior)
    }

    fn abort_launch(&self, session_id: Uuid) -> Result<PendingCall<()>, EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        state.aborted.push(session_id);
        let behavior = state.abort.clone();
        Self::answer(&mut state, behavior)
    }

    fn refresh(&self, _kind: RefreshKind) -> Result<PendingCall<()>, EngineError> {
        self.check_owner();
        let (call, logs) = {
            let mut state = self.state.lock();
            let behavior = state.refresh.clone();
            let call = Self::answer(&mut state, behavior);
            (call, state.refresh_logs.clone())
        };
        self.publish(logs);
        self.refreshes_tx.send_modify(|count| *count += 1);
        call
    }

    fn compilation_result(&self) -> Result<PendingCall<bool>, EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        state.compile_queries += 1;
        let behavior = state.compile.clone();
        Self::answer(&mut state, behavior)
    }

    fn run_method(&self, data: RunMethodData) -> Result<PendingCall<RunMethodResponse>, EngineError> {
        self.check_owner();
        let (call, logs) = {
            let mut state = self.state.lock();
            state.method_calls.push(data);
            let behavior = state.run_method.clone();
            let call = Self::answer(&mut state, behavior);
            (call, state.method_logs.clone())
        };
        self.publish(logs);
        call
    }

    fn set_playing(&self, playing: bool) -> Result<(), EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        state.play.is_playing = playing;
        if !playing {
            state.play.is_paused = false;
        }
        Ok(())
    }

    fn set_paused(&self, paused: bool) -> Result<(), EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        if !state.play.is_playing {
            return Err(EngineError::Rejected("not in play mode".into()));
        }
        state.play.is_paused = paused;
        Ok(())
    }

    fn step_frame(&self) -> Result<(), EngineError> {
        self.check_owner();
        let mut state = self.state.lock();
        if !state.play.is_playing {
            return Err(EngineError::Rejected("not in play mode".into()));
        }
        state.play.is_paused = true;
        Ok(())
    }

    fn play_state(&self) -> PlayState {
        self.check_owner();
        self.state.lock().play
    }
}
