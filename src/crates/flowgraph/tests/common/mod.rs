//! Common test stages and setup

use async_trait::async_trait;
use flowgraph::{BaseStage, Batch, Stage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub type Msg = Batch<u32>;

/// Shared, ordered record of what the stages did
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Route stage diagnostics to the test output; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn label(batch: &Msg) -> String {
    match batch.items() {
        Some(items) => items
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => "shutdown".to_string(),
    }
}

/// Source fed from a channel; emits `Batch::Shutdown` once every sender is dropped.
pub struct ChannelSource {
    base: BaseStage,
    rx: tokio::sync::Mutex<mpsc::Receiver<Msg>>,
    produced: Arc<AtomicUsize>,
    events: EventLog,
}

impl ChannelSource {
    pub fn new(events: &EventLog) -> (Self, mpsc::Sender<Msg>) {
        let (tx, rx) = mpsc::channel(8);
        let source = Self {
            base: BaseStage::new("source"),
            rx: tokio::sync::Mutex::new(rx),
            produced: Arc::new(AtomicUsize::new(0)),
            events: Arc::clone(events),
        };
        (source, tx)
    }

    /// Counter of normal batches handed to the pipeline
    pub fn produced(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.produced)
    }
}

#[async_trait]
impl Stage<Msg> for ChannelSource {
    fn base(&self) -> &BaseStage {
        &self.base
    }

    fn is_valid_input(&self, _input: Option<&[Msg]>) -> bool {
        true
    }

    async fn transform(&self, _input: Vec<Msg>) -> Vec<Msg> {
        match self.rx.lock().await.recv().await {
            Some(msg) => {
                self.produced.fetch_add(1, Ordering::SeqCst);
                vec![msg]
            }
            None => vec![Batch::Shutdown],
        }
    }

    fn is_source(&self) -> bool {
        true
    }

    fn close(&self) {
        self.events.lock().push("source:close".to_string());
    }
}

/// Pass-through stage that records every item it forwards.
pub struct Recorder {
    base: BaseStage,
    events: EventLog,
    seen: Arc<Mutex<Vec<u32>>>,
    delay: Duration,
}

impl Recorder {
    pub fn new(name: &str, events: &EventLog) -> Self {
        Self {
            base: BaseStage::new(name),
            events: Arc::clone(events),
            seen: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn with_queue_length(mut self, len: usize) -> Self {
        self.base.set_max_queue_length(len);
        self
    }

    /// Sleep inside every transform
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Stage<Msg> for Recorder {
    fn base(&self) -> &BaseStage {
        &self.base
    }

    async fn transform(&self, input: Vec<Msg>) -> Vec<Msg> {
        let name = self.base.name();
        let tag = input.iter().map(label).collect::<Vec<_>>().join("|");
        self.events.lock().push(format!("{}:begin:{}", name, tag));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        for batch in &input {
            if let Some(items) = batch.items() {
                self.seen.lock().extend_from_slice(items);
            }
        }

        self.events.lock().push(format!("{}:end:{}", name, tag));
        input
    }

    fn close(&self) {
        self.events.lock().push(format!("{}:close", self.base.name()));
    }
}

/// Rejects any batch carrying an odd item; forwards the rest.
pub struct EvenFilter {
    base: BaseStage,
    transformed: Arc<Mutex<Vec<u32>>>,
}

impl EvenFilter {
    pub fn new(name: &str) -> Self {
        Self {
            base: BaseStage::new(name),
            transformed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn transformed(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.transformed)
    }
}

#[async_trait]
impl Stage<Msg> for EvenFilter {
    fn base(&self) -> &BaseStage {
        &self.base
    }

    fn is_valid_input(&self, input: Option<&[Msg]>) -> bool {
        if !flowgraph::default_is_valid_input(self.name(), input) {
            return false;
        }
        input
            .into_iter()
            .flatten()
            .filter_map(|batch| batch.items())
            .flatten()
            .all(|v| v % 2 == 0)
    }

    async fn transform(&self, input: Vec<Msg>) -> Vec<Msg> {
        for batch in &input {
            if let Some(items) = batch.items() {
                self.transformed.lock().extend_from_slice(items);
            }
        }
        input
    }
}

/// Replaces the batch carrying `stop_at` with the shutdown sentinel.
pub struct StopAt {
    base: BaseStage,
    stop_at: u32,
}

impl StopAt {
    pub fn new(name: &str, stop_at: u32) -> Self {
        Self {
            base: BaseStage::new(name),
            stop_at,
        }
    }
}

#[async_trait]
impl Stage<Msg> for StopAt {
    fn base(&self) -> &BaseStage {
        &self.base
    }

    async fn transform(&self, input: Vec<Msg>) -> Vec<Msg> {
        let hit = input
            .iter()
            .filter_map(|batch| batch.items())
            .flatten()
            .any(|v| *v == self.stop_at);
        if hit {
            vec![Batch::Shutdown]
        } else {
            input
        }
    }
}

/// Poll `cond` until it holds, panicking after five seconds.
pub async fn wait_until<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {}", what);
}
