//! Liveness watchdog
//!
//! A [`GroupChecker`] tracks the last time each named participant checked in.
//! A background reporter wakes up every `interval`, collects the names whose
//! last check-in is older than `interval` and hands them to a callback. The
//! checker never acts on stalled names itself; reporting is the whole job.
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::watchdog::GroupChecker;
//! use std::time::Duration;
//!
//! let checker = GroupChecker::new("fgNode", Duration::from_secs(120), |stalled| {
//!     tracing::warn!(list = ?stalled, "some node(s) haven't received input");
//! });
//! checker.start();
//! checker.check("flowgraph-node-ddNode");
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Default reporting interval.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(120);

type StalledCallback = dyn Fn(&[String]) + Send + Sync;

struct CheckerState {
    group: String,
    interval: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
    callback: Box<StalledCallback>,
}

impl CheckerState {
    fn stalled(&self) -> Vec<String> {
        let now = Instant::now();
        let mut list: Vec<String> = self
            .last_seen
            .lock()
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > self.interval)
            .map(|(name, _)| name.clone())
            .collect();
        list.sort();
        list
    }

    fn report(&self) {
        let list = self.stalled();
        if !list.is_empty() {
            (self.callback)(&list);
        }
    }
}

/// Tracks check-ins for a group of names and reports the stalled ones.
pub struct GroupChecker {
    state: Arc<CheckerState>,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl GroupChecker {
    /// Create a checker. The reporter does not run until [`start`](Self::start).
    pub fn new<F>(group: impl Into<String>, interval: Duration, callback: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(CheckerState {
                group: group.into(),
                interval,
                last_seen: Mutex::new(HashMap::new()),
                callback: Box::new(callback),
            }),
            reporter: Mutex::new(None),
        }
    }

    /// Group name used in log output
    pub fn group(&self) -> &str {
        &self.state.group
    }

    /// Reporting interval; also the staleness threshold
    pub fn interval(&self) -> Duration {
        self.state.interval
    }

    /// Register `name` or reset its timer.
    pub fn check(&self, name: &str) {
        let now = Instant::now();
        let mut last_seen = self.state.last_seen.lock();
        match last_seen.get_mut(name) {
            Some(seen) => *seen = now,
            None => {
                last_seen.insert(name.to_string(), now);
            }
        }
    }

    /// Stop tracking `name`.
    pub fn remove(&self, name: &str) {
        self.state.last_seen.lock().remove(name);
    }

    /// Names currently tracked, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.last_seen.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names whose last check-in is older than the interval, sorted.
    pub fn stalled(&self) -> Vec<String> {
        self.state.stalled()
    }

    /// Spawn the periodic reporter. Calling this while it already runs is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut reporter = self.reporter.lock();
        if reporter.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        *reporter = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + state.interval, state.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(group = %state.group, interval = ?state.interval, "watchdog reporter started");
            loop {
                ticker.tick().await;
                state.report();
            }
        }));
    }

    /// Stop the periodic reporter. Tracked names are kept.
    pub fn stop(&self) {
        if let Some(handle) = self.reporter.lock().take() {
            handle.abort();
            tracing::debug!(group = %self.state.group, "watchdog reporter stopped");
        }
    }

    /// Whether the reporter task is running
    pub fn is_running(&self) -> bool {
        self.reporter.lock().is_some()
    }
}

impl Drop for GroupChecker {
    fn drop(&mut self) {
        if let Some(handle) = self.reporter.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for GroupChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupChecker")
            .field("group", &self.state.group)
            .field("interval", &self.state.interval)
            .field("callback", &"<function>")
            .finish()
    }
}
