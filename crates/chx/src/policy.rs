//! 📏 The Flush Policy: how much of one batch leaves on this tick.
//!
//! With `max` rows per request:
//!
//! | buffered | at default interval | decision |
//! |---|---|---|
//! | `<= max + 100` | any | drain everything |
//! | `> max * 5` | yes | flush nothing, accelerate the timer |
//! | otherwise | any | drain exactly `max` from the front |
//!
//! Sustained overload first speeds up the cadence, then bites off `max` rows
//! per tick per key until the backlog is gone and the idle reset restores the
//! default cadence.

/// 🧮 Leeway above `max` that still goes out as one request.
pub(crate) const OVERFLOW_SLACK: usize = 100;

/// 🏎️ Multiple of `max` beyond which a batch counts as a backlog.
pub(crate) const BACKLOG_FACTOR: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushDecision {
    DrainAll,
    DrainSlice(usize),
    Accelerate,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlushPolicy {
    max_rows: usize,
}

impl FlushPolicy {
    pub(crate) fn new(max_rows: usize) -> Self {
        Self {
            max_rows: max_rows.max(1),
        }
    }

    pub(crate) fn decide(&self, buffered: usize, at_default_interval: bool) -> FlushDecision {
        if buffered <= self.max_rows.saturating_add(OVERFLOW_SLACK) {
            return FlushDecision::DrainAll;
        }
        if buffered > self.max_rows.saturating_mul(BACKLOG_FACTOR) && at_default_interval {
            return FlushDecision::Accelerate;
        }
        FlushDecision::DrainSlice(self.max_rows)
    }
}
