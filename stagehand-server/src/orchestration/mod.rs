//! Orchestration flows over the engine control channel
//!
//! Each flow validates its input, borrows the current engine handle from the
//! [`crate::connection::ConnectionMonitor`], funnels every channel mutation
//! through the [`crate::dispatcher::Dispatcher`], and converts whatever the
//! engine does into an [`OrchestrationError`] at this boundary.

mod compilation;
mod error;
mod play_control;
mod run_method;
mod test_run;


pub use compilation::CompilationCheckOrchestrator;
pub use error::{
    describe_duration, ConnectPhase, OrchestrationError, TimeoutStep, ASSEMBLY_NAMES_REQUIRED,
};
pub use play_control::{PlayAction, PlayControl};
pub use run_method::{
    format_method_error, required_name, RunMethodOrchestrator, ASSEMBLY_NAME_REQUIRED,
    METHOD_NAME_REQUIRED, TYPE_NAME_REQUIRED,
};
pub use test_run::TestRunOrchestrator;
