//! Self-tuning polling loop.
//!
//! Runs a probe repeatedly, tracks a fast and a slow exponential moving
//! average of the probe duration, and sleeps for the target interval minus
//! the slow average between probes. The fast average reacts to transient
//! load for diagnostics; the slow average throttles the sleep, so the
//! long-run polling frequency converges to the target without oscillating
//! on single-cycle spikes.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::task::controller::TaskController;

/// Decay factors for the two duration averages.
const FAST_DECAY: f64 = 0.9;
const SLOW_DECAY: f64 = 0.999;

/// Probe duration statistics, updated after every cycle and never reset.
///
/// Written only by the loop's own task, read from anywhere through the
/// shared lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingStats {
    /// Fast-decaying average of probe duration.
    pub fast_average: Duration,
    /// Slow-decaying average of probe duration; throttles the sleep.
    pub slow_average: Duration,
    /// Number of completed probe cycles.
    pub cycles: u64,
}

/// A repeating task running a probe at a self-tuned cadence until its
/// controller is deactivated.
#[derive(Debug)]
pub struct PollingLoop {
    target_interval: Duration,
    controller: Arc<TaskController>,
    stats: Arc<RwLock<PollingStats>>,
}

impl PollingLoop {
    /// Create a polling loop with the given target interval and controller.
    pub fn new(target_interval: Duration, controller: Arc<TaskController>) -> Self {
        Self {
            target_interval,
            controller,
            stats: Arc::new(RwLock::new(PollingStats::default())),
        }
    }

    /// Shared statistics handle, readable from any task.
    pub fn stats(&self) -> Arc<RwLock<PollingStats>> {
        self.stats.clone()
    }

    /// Snapshot of the current statistics.
    pub fn stats_snapshot(&self) -> PollingStats {
        *self.stats.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Run the loop until the controller is deactivated, checked at the top
    /// of each cycle. Probe errors are logged and swallowed; a failing probe
    /// never kills the loop.
    pub async fn run<F, Fut>(&self, mut probe: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        debug!(target_interval = ?self.target_interval, "Polling loop started");

        while self.controller.is_active() {
            let started = Instant::now();
            if let Err(error) = probe().await {
                warn!(error = %error, "Probe failed; continuing");
            }
            let elapsed = started.elapsed();

            let slow_average = {
                let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
                stats.fast_average = stats.fast_average.mul_f64(FAST_DECAY)
                    + elapsed.mul_f64(1.0 - FAST_DECAY);
                stats.slow_average = stats.slow_average.mul_f64(SLOW_DECAY)
                    + elapsed.mul_f64(1.0 - SLOW_DECAY);
                stats.cycles += 1;
                stats.slow_average
            };

            let pause = self.target_interval.saturating_sub(slow_average);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.controller.await_deactivated() => {}
            }
        }

        debug!(stats = ?self.stats_snapshot(), "Polling loop stopped");
    }
}
