//! The pipeline driver.
//!
//! A [`Scheduler`] runs a whole [`Pipeline`] on exactly two tokio tasks no
//! matter how many stages it has:
//!
//! ```text
//!  source worker                chain worker
//!  ┌──────────┐   queue   ┌──────────┐   queue   ┌──────────┐
//!  │  source  │ ────────▶ │ stage 1  │ ────────▶ │ stage 2  │ ─▶ ...
//!  └──────────┘           └──────────┘           └──────────┘
//! ```
//!
//! The source worker only drives the source stage. The chain worker walks
//! every other stage in order, one receive-transform-deliver step per stage,
//! and starts over from stage 1 when it reaches the tail. Non-source stages
//! therefore never run concurrently with each other, and for a given batch
//! stage *i* always finishes before stage *i + 1* sees its output.
//!
//! Bounded queues between stages are the only backpressure: a full queue
//! stalls whoever delivers into it.
//!
//! Shutdown is cooperative. When a stage emits the shutdown sentinel, the
//! worker that ran it fires its own shutdown signal and closes that stage's
//! inbound queue; the worker exits at the top of its next loop. The two
//! signals are independent, so a sentinel produced by the source and passed
//! down the chain stops both workers, while one produced further down only
//! stops the chain worker.

use crate::context::StageContext;
use crate::error::{FlowGraphError, Result};
use crate::message::{contains_shutdown, Message};
use crate::pipeline::{Pipeline, FIRST_DOWNSTREAM_INDEX, SOURCE_INDEX};
use crate::signal::{DoneGuard, ShutdownSignal, WaitGroup};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tooling::logging::LogGuard;
use tooling::watchdog::GroupChecker;

/// Number of worker tasks a started scheduler runs.
pub const WORKER_COUNT: usize = 2;

const WATCHDOG_GROUP: &str = "fgNode";

/// Name a stage is tracked under in the liveness watchdog.
pub fn watchdog_name(stage: &str) -> String {
    format!("flowgraph-node-{}", stage)
}

struct Shared<M: Message> {
    pipeline: Pipeline<M>,
    source_shutdown: ShutdownSignal,
    chain_shutdown: ShutdownSignal,
    close_wg: WaitGroup,
    checker: Option<GroupChecker>,
    // indexed like the pipeline arena
    watch_names: Vec<String>,
}

impl<M: Message> Shared<M> {
    fn check_in(&self, index: usize) {
        if let Some(checker) = &self.checker {
            checker.check(&self.watch_names[index]);
        }
    }

    fn remove(&self, index: usize) {
        if let Some(checker) = &self.checker {
            checker.remove(&self.watch_names[index]);
        }
    }

    fn ctx(&self, index: usize) -> &StageContext<M> {
        &self.pipeline[index]
    }
}

/// Drives a pipeline with one source worker and one chain worker.
pub struct Scheduler<M: Message> {
    shared: Arc<Shared<M>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<M: Message> Scheduler<M> {
    /// Create a scheduler for `pipeline`, using the configuration it was
    /// built with. The watchdog is built when that configuration enables it.
    pub fn new(pipeline: Pipeline<M>) -> Self {
        let config = pipeline.config();
        let checker = config.enable_tt_checker.then(|| {
            let interval = config.tt_check_interval;
            GroupChecker::new(WATCHDOG_GROUP, interval, move |list: &[String]| {
                tracing::warn!(
                    list = ?list,
                    duration = ?interval,
                    "some node(s) haven't received input"
                );
            })
        });
        let watch_names = pipeline.iter().map(|ctx| watchdog_name(ctx.name())).collect();

        Self {
            shared: Arc::new(Shared {
                pipeline,
                source_shutdown: ShutdownSignal::new(),
                chain_shutdown: ShutdownSignal::new(),
                close_wg: WaitGroup::new(),
                checker,
                watch_names,
            }),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn pipeline(&self) -> &Pipeline<M> {
        &self.shared.pipeline
    }

    /// The liveness watchdog, if enabled
    pub fn watchdog(&self) -> Option<&GroupChecker> {
        self.shared.checker.as_ref()
    }

    /// Run every stage's `start` hook and launch the two workers.
    ///
    /// # Errors
    ///
    /// [`FlowGraphError::Closed`] after [`close`](Self::close),
    /// [`FlowGraphError::AlreadyStarted`] on a second call,
    /// [`FlowGraphError::Runtime`] outside a tokio runtime. Nothing is
    /// started or counted when an error is returned.
    pub fn start(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FlowGraphError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FlowGraphError::Runtime(e.to_string()))?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(FlowGraphError::AlreadyStarted);
        }

        for ctx in self.shared.pipeline.iter() {
            ctx.stage().start();
        }
        if let Some(checker) = &self.shared.checker {
            checker.start();
        }

        // the source gets its own worker; every other stage shares one so the
        // task count stays fixed however long the chain is
        self.shared.close_wg.add(WORKER_COUNT);
        let mut handles = self.handles.lock();
        handles.push(runtime.spawn(run_source(Arc::clone(&self.shared))));
        handles.push(runtime.spawn(run_chain(Arc::clone(&self.shared))));

        tracing::info!(
            stages = ?self.shared.pipeline.names(),
            workers = WORKER_COUNT,
            "flow graph started"
        );
        Ok(())
    }

    /// Run the close cascade: every stage's `close` hook, source to tail.
    ///
    /// Idempotent. Does not fire the shutdown signals or interrupt workers;
    /// workers stop only when a stage emits the shutdown sentinel.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("flow graph already closed");
            return;
        }

        self.shared.pipeline.close_from(SOURCE_INDEX);
        if let Some(checker) = &self.shared.checker {
            checker.stop();
        }
        tracing::info!(stages = ?self.shared.pipeline.names(), "flow graph closed");
    }

    /// Wait for both workers to exit.
    ///
    /// Returns immediately if the scheduler was never started.
    pub async fn wait(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "flow graph worker terminated abnormally");
            }
        }
        self.shared.close_wg.wait().await;
    }

    /// Block every non-source stage, head to tail.
    pub async fn block_all(&self) {
        for ctx in self.shared.pipeline.walk_from(FIRST_DOWNSTREAM_INDEX) {
            ctx.block().await;
        }
    }

    /// Unblock every non-source stage, tail to head.
    pub fn unblock_all(&self) {
        let contexts: Vec<_> = self
            .shared
            .pipeline
            .walk_from(FIRST_DOWNSTREAM_INDEX)
            .collect();
        for ctx in contexts.into_iter().rev() {
            ctx.unblock();
        }
    }

    /// Workers launched by `start`; 0 before, [`WORKER_COUNT`] after.
    pub fn worker_count(&self) -> usize {
        if self.is_started() {
            WORKER_COUNT
        } else {
            0
        }
    }

    /// Workers that have not exited yet
    pub fn pending_workers(&self) -> usize {
        self.shared.close_wg.pending()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the source worker has seen the shutdown sentinel
    pub fn source_stopped(&self) -> bool {
        self.shared.source_shutdown.is_fired()
    }

    /// Whether the chain worker has seen the shutdown sentinel
    pub fn chain_stopped(&self) -> bool {
        self.shared.chain_shutdown.is_fired()
    }
}

impl<M: Message> std::fmt::Debug for Scheduler<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pipeline", &self.shared.pipeline)
            .field("started", &self.is_started())
            .field("closed", &self.is_closed())
            .field("pending_workers", &self.pending_workers())
            .finish()
    }
}

async fn run_source<M: Message>(shared: Arc<Shared<M>>) {
    let _done = DoneGuard(&shared.close_wg);
    let source = shared.ctx(SOURCE_INDEX);
    let _scope = LogGuard::new(format!("source worker {}", source.name()));
    let downstream = source.next().map(|index| shared.ctx(index));
    shared.check_in(SOURCE_INDEX);

    while !shared.source_shutdown.is_fired() {
        // a source produces its own input; the empty vec only feeds the
        // admission check, which source stages override
        let Some(output) = source.process(Some(Vec::new())).await else {
            tokio::task::yield_now().await;
            continue;
        };

        if contains_shutdown(&output) {
            if shared.source_shutdown.fire() {
                tracing::info!(stage = %source.name(), "source emitted shutdown, stopping source worker");
            }
            source.close_inbound().await;
        }

        if let Some(downstream) = downstream {
            downstream.deliver(output).await;
        }
        shared.check_in(SOURCE_INDEX);
    }

    shared.remove(SOURCE_INDEX);
}

async fn run_chain<M: Message>(shared: Arc<Shared<M>>) {
    let _done = DoneGuard(&shared.close_wg);
    let _scope = LogGuard::new("chain worker");
    let indices: Vec<usize> = (FIRST_DOWNSTREAM_INDEX..shared.pipeline.len()).collect();
    for &index in &indices {
        shared.check_in(index);
    }

    'pass: while !shared.chain_shutdown.is_fired() {
        let mut cursor = Some(FIRST_DOWNSTREAM_INDEX);

        while let Some(index) = cursor {
            let ctx = shared.ctx(index);
            let input = ctx.recv().await;

            let Some(output) = ctx.process(input).await else {
                // rejected: skip this cycle and restart the pass from stage 1
                tokio::task::yield_now().await;
                continue 'pass;
            };

            if contains_shutdown(&output) {
                if shared.chain_shutdown.fire() {
                    tracing::info!(stage = %ctx.name(), "stage emitted shutdown, stopping chain worker");
                }
                ctx.close_inbound().await;
            }

            if let Some(next) = ctx.next() {
                shared.ctx(next).deliver(output).await;
            }
            shared.check_in(index);
            cursor = ctx.next();
        }
    }

    for &index in &indices {
        shared.remove(index);
    }
}
