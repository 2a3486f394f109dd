//! Stage contract and the default stage behavior.
//!
//! A [`Stage`] is one unit of message transformation. Concrete stages embed a
//! [`BaseStage`] and return it from [`Stage::base`]; every other method has a
//! default that either reads from the base or does the pass-through thing, so
//! an implementation only overrides what it actually changes.
//!
//! ```rust,ignore
//! struct DeleteNode {
//!     base: BaseStage,
//!     deletes: parking_lot::Mutex<Vec<i64>>,
//! }
//!
//! #[async_trait]
//! impl Stage<Batch<Row>> for DeleteNode {
//!     fn base(&self) -> &BaseStage {
//!         &self.base
//!     }
//!
//!     async fn transform(&self, input: Vec<Batch<Row>>) -> Vec<Batch<Row>> {
//!         // apply deletes, then forward
//!         input
//!     }
//! }
//! ```

use crate::config::{FlowGraphConfig, DEFAULT_MAX_PARALLELISM, DEFAULT_MAX_QUEUE_LENGTH};
use crate::message::Message;
use async_trait::async_trait;

/// A processing unit in a pipeline.
#[async_trait]
pub trait Stage<M: Message>: Send + Sync {
    /// The embedded default behavior
    fn base(&self) -> &BaseStage;

    /// Identity; also keys the stage in the liveness watchdog
    fn name(&self) -> &str {
        self.base().name()
    }

    /// Inbound queue length requested for this stage
    fn max_queue_length(&self) -> usize {
        self.base().max_queue_length()
    }

    /// Declared parallelism; informational only
    fn max_parallelism(&self) -> usize {
        self.base().max_parallelism()
    }

    /// Admission gate checked before every [`transform`](Self::transform).
    ///
    /// `None` means no input could be read (the inbound queue is closed).
    fn is_valid_input(&self, input: Option<&[M]>) -> bool {
        default_is_valid_input(self.name(), input)
    }

    /// Turn one input into zero or more output batches.
    async fn transform(&self, input: Vec<M>) -> Vec<M> {
        input
    }

    /// Whether this stage produces messages instead of receiving them
    fn is_source(&self) -> bool {
        false
    }

    /// Called once before the workers start
    fn start(&self) {}

    /// Called once by the close cascade
    fn close(&self) {}
}

/// Default admission rule: exactly one batch.
///
/// An absent input is rejected with a diagnostic, an empty one is rejected
/// silently since idle cycles would otherwise flood the log, and more than
/// one batch is rejected with a warning.
pub fn default_is_valid_input<M>(name: &str, input: Option<&[M]>) -> bool {
    let Some(input) = input else {
        tracing::info!(stage = %name, "no input, type assertion failed because it's nil");
        return false;
    };

    match input.len() {
        0 => false,
        1 => true,
        len => {
            tracing::warn!(stage = %name, input_length = len, "Invalid operate message input");
            false
        }
    }
}

/// Default stage attributes and the pass-through stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseStage {
    name: String,
    max_queue_length: usize,
    max_parallelism: usize,
}

impl BaseStage {
    /// Create a base with the built-in queue and parallelism defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
        }
    }

    /// Create a base using the limits from `config`
    pub fn from_config(name: impl Into<String>, config: &FlowGraphConfig) -> Self {
        Self {
            name: name.into(),
            max_queue_length: config.max_queue_length,
            max_parallelism: config.max_parallelism,
        }
    }

    pub fn with_max_queue_length(mut self, n: usize) -> Self {
        self.max_queue_length = n;
        self
    }

    pub fn with_max_parallelism(mut self, n: usize) -> Self {
        self.max_parallelism = n;
        self
    }

    pub fn set_max_queue_length(&mut self, n: usize) {
        self.max_queue_length = n;
    }

    pub fn set_max_parallelism(&mut self, n: usize) {
        self.max_parallelism = n;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }
}

impl<M: Message> Stage<M> for BaseStage {
    fn base(&self) -> &BaseStage {
        self
    }
}
