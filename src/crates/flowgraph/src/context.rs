//! Runtime context wrapping one stage.
//!
//! A [`StageContext`] owns the stage, its inbound queue, the arena index of
//! the next context, and the exclusion lock behind [`block`](StageContext::block)
//! and [`unblock`](StageContext::unblock). Workers take the lock in read mode
//! around every validate-and-transform cycle; `block` takes it in write mode
//! and keeps it until `unblock`, so no transform of that stage can start in
//! between.

use crate::message::Message;
use crate::stage::Stage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedRwLockWriteGuard, RwLock};
use tooling::logging::warn_if_slow;

struct Inbound<M> {
    tx: mpsc::Sender<Vec<M>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Vec<M>>>,
}

/// Live wrapper around a stage: queue, link, lock.
pub struct StageContext<M: Message> {
    stage: Box<dyn Stage<M>>,
    inbound: Option<Inbound<M>>,
    next: Option<usize>,
    exclusion: Arc<RwLock<()>>,
    held: Mutex<Option<OwnedRwLockWriteGuard<()>>>,
    block_warn_threshold: Duration,
}

impl<M: Message> StageContext<M> {
    /// Source stages get no inbound queue; every other stage gets a bounded
    /// queue of `max(1, max_queue_length)` so a zero length still means a
    /// blocking one-slot hand-off.
    pub(crate) fn new(
        stage: Box<dyn Stage<M>>,
        next: Option<usize>,
        block_warn_threshold: Duration,
    ) -> Self {
        let inbound = (!stage.is_source()).then(|| {
            let (tx, rx) = mpsc::channel(stage.max_queue_length().max(1));
            Inbound {
                tx,
                rx: tokio::sync::Mutex::new(rx),
            }
        });

        Self {
            stage,
            inbound,
            next,
            exclusion: Arc::new(RwLock::new(())),
            held: Mutex::new(None),
            block_warn_threshold,
        }
    }

    pub fn name(&self) -> &str {
        self.stage.name()
    }

    pub fn stage(&self) -> &dyn Stage<M> {
        self.stage.as_ref()
    }

    pub fn is_source(&self) -> bool {
        self.stage.is_source()
    }

    /// Arena index of the downstream context; `None` at the tail
    pub fn next(&self) -> Option<usize> {
        self.next
    }

    /// Capacity of the inbound queue, if the stage has one
    pub fn queue_capacity(&self) -> Option<usize> {
        self.inbound.as_ref().map(|inbound| inbound.tx.max_capacity())
    }

    /// Take exclusive access to the stage, pausing its transforms.
    ///
    /// Waits as long as it takes; a wait of at least the configured
    /// threshold is logged as a warning once the lock is acquired. Calling
    /// `block` twice without `unblock` in between waits forever. No-op for
    /// the source stage, which is stopped through its own shutdown signal.
    pub async fn block(&self) {
        if self.is_source() {
            return;
        }

        let guard = warn_if_slow(
            self.name(),
            self.block_warn_threshold,
            Arc::clone(&self.exclusion).write_owned(),
        )
        .await;
        *self.held.lock() = Some(guard);
        tracing::debug!(stage = %self.name(), "stage blocked");
    }

    /// Release the access taken by [`block`](Self::block). No-op for the source.
    pub fn unblock(&self) {
        if self.is_source() {
            return;
        }

        match self.held.lock().take() {
            Some(guard) => {
                drop(guard);
                tracing::debug!(stage = %self.name(), "stage unblocked");
            }
            None => {
                tracing::warn!(stage = %self.name(), "unblock called on a stage that is not blocked");
            }
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.held.lock().is_some()
    }

    /// Push a batch into this stage's inbound queue, waiting while it is full.
    ///
    /// Returns `false` when the stage has no queue or the queue was closed.
    pub async fn deliver(&self, batch: Vec<M>) -> bool {
        let Some(inbound) = &self.inbound else {
            return false;
        };

        match inbound.tx.send(batch).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(stage = %self.name(), "inbound queue closed, dropping batch");
                false
            }
        }
    }

    /// Receive the next inbound batch; `None` once the queue is closed and drained.
    pub(crate) async fn recv(&self) -> Option<Vec<M>> {
        let inbound = self.inbound.as_ref()?;
        inbound.rx.lock().await.recv().await
    }

    /// Stop accepting new batches. Already queued batches can still be received.
    pub(crate) async fn close_inbound(&self) {
        if let Some(inbound) = &self.inbound {
            inbound.rx.lock().await.close();
        }
    }

    /// Validate `input` and, if accepted, transform it, both under the read
    /// side of the exclusion lock. Returns `None` when the input was rejected.
    pub(crate) async fn process(&self, input: Option<Vec<M>>) -> Option<Vec<M>> {
        let _read = self.exclusion.read().await;
        if !self.stage.is_valid_input(input.as_deref()) {
            return None;
        }
        Some(self.stage.transform(input.unwrap_or_default()).await)
    }
}

impl<M: Message> std::fmt::Debug for StageContext<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("name", &self.name())
            .field("is_source", &self.is_source())
            .field("next", &self.next)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}
