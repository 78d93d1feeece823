//! Owner-context dispatcher
//!
//! The engine control channel only tolerates mutations (subscribe, set,
//! start-call, abort) from a single owner context. [`Dispatcher`] is that
//! owner: a mailbox drained by one task, running submitted actions one at a
//! time in arrival order. Callers on any task submit an action and await its
//! result; nothing else touches channel state, so no locks are needed around
//! it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::engine::EngineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

tokio::task_local! {
    static OWNER_CONTEXT: ();
}

/// Handle to the owner mailbox; cheap to clone
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Spawn the owner task and return a handle to its mailbox
    ///
    /// The owner task exits once every handle has been dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(OWNER_CONTEXT.scope((), async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!("Owner dispatcher exiting");
        }));

        Self { tx }
    }

    /// Whether the caller is currently running on the owner context
    pub fn is_owner_context() -> bool {
        OWNER_CONTEXT.try_with(|_| ()).is_ok()
    }

    /// Run `action` on the owner context and wait for it to finish
    pub async fn run_on_owner<F>(&self, action: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<(), EngineError> + Send + 'static,
    {
        self.call_on_owner(action).await
    }

    /// Run `func` on the owner context and return its value
    ///
    /// Errors returned by `func` and panics raised inside it are delivered to
    /// the caller. If the caller stops waiting, the action still runs.
    pub async fn call_on_owner<T, F>(&self, func: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(func)) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "Owner-context action panicked");
                    Err(EngineError::Panicked(message))
                }
            };
            let _ = result_tx.send(result);
        });

        self.tx.send(job).map_err(|_| EngineError::DispatcherClosed)?;

        result_rx.await.unwrap_or(Err(EngineError::DispatcherClosed))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
