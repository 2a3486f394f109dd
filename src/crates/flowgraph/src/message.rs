//! Messages exchanged between stages.
//!
//! The engine treats payloads as opaque. The only thing it asks of a message
//! is whether it is the shutdown sentinel, see [`Message::is_shutdown`].

use serde::{Deserialize, Serialize};

/// Capability every payload type moved through a pipeline must provide.
pub trait Message: Send + Sync + 'static {
    /// True for the distinguished batch that starts cooperative shutdown.
    fn is_shutdown(&self) -> bool;
}

/// A message batch: either a normal batch of items or the shutdown sentinel.
///
/// Using a dedicated variant keeps "nothing to do" (an empty `Normal`) apart
/// from "stop" (`Shutdown`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Batch<T> {
    /// Ordered payload items
    Normal(Vec<T>),
    /// Shutdown sentinel
    Shutdown,
}

impl<T> Batch<T> {
    /// Wrap items in a normal batch
    pub fn normal(items: impl IntoIterator<Item = T>) -> Self {
        Batch::Normal(items.into_iter().collect())
    }

    /// Items of a normal batch; `None` for the sentinel
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Batch::Normal(items) => Some(items),
            Batch::Shutdown => None,
        }
    }

    /// Consume into items; the sentinel yields `None`
    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Batch::Normal(items) => Some(items),
            Batch::Shutdown => None,
        }
    }

    /// Number of items; zero for the sentinel
    pub fn len(&self) -> usize {
        self.items().map_or(0, <[T]>::len)
    }

    /// True for an empty normal batch or the sentinel
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Sync + 'static> Message for Batch<T> {
    fn is_shutdown(&self) -> bool {
        matches!(self, Batch::Shutdown)
    }
}

/// Whether a stage output carries the shutdown sentinel.
pub fn contains_shutdown<M: Message>(output: &[M]) -> bool {
    output.iter().any(Message::is_shutdown)
}
