//! Job execution

pub mod engine;
pub mod executor;
pub mod log;
pub mod process;

pub use engine::{EngineError, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{CommandExecutor, CommandSpec, ExecutionError, NoopSink, OutputSink, OutputStream};
pub use log::JobLog;
pub use process::ShellExecutor;
