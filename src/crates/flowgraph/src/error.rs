//! Error types for pipeline assembly and scheduler lifecycle
//!
//! Message processing itself has no error channel: an invalid input is a
//! skipped cycle and a stage's transform owns its own failures. Errors here
//! only come from building a [`Pipeline`](crate::Pipeline), loading
//! [`FlowGraphConfig`](crate::FlowGraphConfig), or driving the
//! [`Scheduler`](crate::Scheduler) lifecycle out of order.

use thiserror::Error;

/// Convenience result type using [`FlowGraphError`]
pub type Result<T> = std::result::Result<T, FlowGraphError>;

/// Errors raised by the flowgraph engine
#[derive(Error, Debug)]
pub enum FlowGraphError {
    /// Pipeline structure is invalid
    ///
    /// Raised by [`PipelineBuilder::build`](crate::PipelineBuilder::build) when
    /// the chain does not start with exactly one source stage, contains no
    /// downstream stage, or repeats a stage name.
    #[error("Pipeline validation failed: {0}")]
    Validation(String),

    /// `start()` was called on a scheduler that is already running
    #[error("Scheduler already started")]
    AlreadyStarted,

    /// The scheduler was closed and cannot be started again
    #[error("Scheduler is closed")]
    Closed,

    /// `start()` was called outside a tokio runtime
    #[error("No tokio runtime: {0}")]
    Runtime(String),

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] tooling::ToolingError),
}

impl FlowGraphError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
