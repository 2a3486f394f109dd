//! Logging utilities
//!
//! Helpers for structured logging with tracing.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Await `future` and warn if it took at least `threshold` to complete.
///
/// The future always runs to completion; the threshold only decides whether
/// a warning naming `name` and the elapsed wait is emitted afterwards.
///
/// # Example
///
/// ```rust,ignore
/// use tooling::logging::warn_if_slow;
/// use std::time::Duration;
///
/// let guard = warn_if_slow("insertNode", Duration::from_secs(10), lock.write()).await;
/// ```
pub async fn warn_if_slow<F, T>(name: &str, threshold: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let result = future.await;
    let elapsed = start.elapsed();

    if elapsed >= threshold {
        warn!(
            name = %name,
            wait = %format_duration(elapsed),
            "flow graph wait for long time"
        );
    } else {
        debug!(name = %name, elapsed = ?elapsed, "acquired");
    }

    result
}

/// RAII guard for logging scope entry and exit
///
/// ```rust
/// use tooling::logging::LogGuard;
///
/// fn drain() {
///     let _guard = LogGuard::new("drain");
///     // exit is logged when the guard drops
/// }
/// ```
pub struct LogGuard {
    name: String,
    start: Instant,
}

impl LogGuard {
    /// Create a new log guard
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!("Entering: {}", name);

        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Get elapsed time since guard creation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        debug!(
            "Exiting: {} (elapsed: {})",
            self.name,
            format_duration(self.start.elapsed())
        );
    }
}

/// Format duration in human-readable form
///
/// ```rust
/// use tooling::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
/// assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}
