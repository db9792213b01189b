//! ⏱️ Scheduler State: the bookkeeping behind the one recurring timer.
//!
//! This struct never sleeps or spawns anything. It decides; the flush worker
//! owns the actual `tokio::time::Interval` and does what [`TimerCommand`] says.
//!
//! ```text
//!   Stopped ──insert──▶ Running(default) ──overload──▶ Running(accelerated)
//!      ▲                     │                               │
//!      └──── idle_miss_limit empty ticks ◀───────────────────┘
//! ```

use std::time::Duration;

use tracing::{info, warn};

/// 🎛️ What the worker should do with its timer after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerCommand {
    Keep,
    /// Start over immediately with this period.
    Restart(Duration),
    Stop,
}

#[derive(Debug)]
pub(crate) struct SchedulerState {
    running: bool,
    current_interval: Duration,
    default_interval: Duration,
    accelerated_interval: Duration,
    idle_miss_limit: u32,
    idle_misses: u32,
    rows_received: u64,
    rows_flushed: u64,
}

impl SchedulerState {
    pub(crate) fn new(
        default_interval: Duration,
        accelerated_interval: Duration,
        idle_miss_limit: u32,
    ) -> Self {
        // 🏎️ acceleration is detected by "current != default", so the two must differ
        let accelerated_interval = if accelerated_interval < default_interval {
            accelerated_interval
        } else {
            let fallback = (default_interval / 5).max(Duration::from_millis(1));
            warn!(
                "⚠️ accelerated interval {:?} is not faster than {:?}, using {:?}",
                accelerated_interval, default_interval, fallback
            );
            fallback
        };

        Self {
            running: false,
            current_interval: default_interval,
            default_interval,
            accelerated_interval,
            idle_miss_limit: idle_miss_limit.max(1),
            idle_misses: 0,
            rows_received: 0,
            rows_flushed: 0,
        }
    }

    /// 📥 Count a received row. Returns the period to start the timer with
    /// when this insert wakes a stopped scheduler.
    pub(crate) fn on_insert(&mut self) -> Option<Duration> {
        self.rows_received += 1;
        if self.running {
            return None;
        }
        self.running = true;
        self.idle_misses = 0;
        info!("⏱️ Flush timer started at {:?}", self.current_interval);
        Some(self.current_interval)
    }

    pub(crate) fn at_default_interval(&self) -> bool {
        self.current_interval == self.default_interval
    }

    /// 🏎️ Switch to the accelerated cadence. The old timer is cleared, which
    /// resets the counters like any other clear.
    pub(crate) fn accelerate(&mut self) -> Duration {
        self.current_interval = self.accelerated_interval;
        self.clear_counters();
        info!(
            "🏎️ Backlog detected, flush timer accelerated to {:?}",
            self.current_interval
        );
        self.current_interval
    }

    /// 📊 Account for one finished tick.
    pub(crate) fn record_tick(&mut self, had_data: bool) -> TimerCommand {
        if had_data {
            self.idle_misses = 0;
            return TimerCommand::Keep;
        }

        self.idle_misses += 1;
        if self.idle_misses >= self.idle_miss_limit {
            self.stop();
            return TimerCommand::Stop;
        }
        TimerCommand::Keep
    }

    /// 💤 Full clear: back to the default cadence, counters zeroed, stopped.
    pub(crate) fn stop(&mut self) {
        if self.running {
            info!(
                "💤 Flush timer stopped after {} idle ticks, {} received / {} flushed",
                self.idle_misses, self.rows_received, self.rows_flushed
            );
        }
        self.running = false;
        self.current_interval = self.default_interval;
        self.idle_misses = 0;
        self.clear_counters();
    }

    pub(crate) fn record_flushed(&mut self, rows: usize) {
        self.rows_flushed += rows as u64;
    }

    fn clear_counters(&mut self) {
        self.rows_received = 0;
        self.rows_flushed = 0;
    }

    pub(crate) fn running(&self) -> bool {
        self.running
    }

    pub(crate) fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub(crate) fn default_interval(&self) -> Duration {
        self.default_interval
    }

    pub(crate) fn idle_misses(&self) -> u32 {
        self.idle_misses
    }

    pub(crate) fn rows_received(&self) -> u64 {
        self.rows_received
    }

    pub(crate) fn rows_flushed(&self) -> u64 {
        self.rows_flushed
    }
}
