//! # flowgraph - Pipeline scheduler for message-batch ingestion
//!
//! `flowgraph` chains processing stages into a pipeline and drives it with a
//! fixed pair of tokio tasks. Stages exchange opaque message batches through
//! bounded queues; the engine knows nothing about what a batch contains
//! beyond whether it is the shutdown sentinel.
//!
//! ## Core Concepts
//!
//! - [`Stage`] - one unit of transformation. Implementations embed a
//!   [`BaseStage`] and override only what they change.
//! - [`Pipeline`] - an immutable chain of [`StageContext`]s rooted at exactly
//!   one source stage, built with [`PipelineBuilder`].
//! - [`Scheduler`] - starts the source worker and the chain worker, runs
//!   the close cascade, and exposes [`block_all`](Scheduler::block_all) /
//!   [`unblock_all`](Scheduler::unblock_all) for pausing stages.
//! - [`Batch`] - the provided message type: `Normal(items)` or `Shutdown`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowgraph::{Batch, BaseStage, Pipeline, Scheduler, Stage};
//!
//! let pipeline = Pipeline::builder()
//!     .stage(MySource::new(consumer))
//!     .stage(BaseStage::new("ddNode"))
//!     .stage(InsertBufferNode::new(buffer))
//!     .build()?;
//!
//! let scheduler = Scheduler::new(pipeline);
//! scheduler.start()?;
//!
//! // pause a stage to mutate what it owns
//! let node = scheduler.pipeline().find("insertBufferNode").unwrap();
//! node.block().await;
//! // ...
//! node.unblock();
//!
//! // after the source has emitted Batch::Shutdown
//! scheduler.wait().await;
//! scheduler.close();
//! ```
//!
//! ## Shutdown
//!
//! Workers stop when a stage's output contains [`Batch::Shutdown`] (or any
//! message whose [`Message::is_shutdown`] is true). The engine never creates
//! a sentinel itself. [`Scheduler::close`] only runs the stages' `close`
//! hooks.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod scheduler;
pub mod signal;
pub mod stage;

pub use config::FlowGraphConfig;
pub use context::StageContext;
pub use error::{FlowGraphError, Result};
pub use message::{contains_shutdown, Batch, Message};
pub use pipeline::{Pipeline, PipelineBuilder, FIRST_DOWNSTREAM_INDEX, SOURCE_INDEX};
pub use scheduler::{watchdog_name, Scheduler, WORKER_COUNT};
pub use signal::{ShutdownSignal, WaitGroup};
pub use stage::{default_is_valid_input, BaseStage, Stage};
