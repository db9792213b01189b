//! 🧠 The Flush Engine: buffer, scheduler, policy, composer and error sink
//! in one owned struct.
//!
//! Everything in here is synchronous. The engine never touches the network:
//! [`FlushEngine::tick`] hands back finished [`FlushJob`]s, somebody else
//! posts them, and the result comes back through [`FlushEngine::complete`].
//! A drained slice is out of the store before its job exists, so a slow
//! request can never race a later tick over the same rows.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::app_config::ClientConfig;
use crate::buffer::BufferStore;
use crate::common::{BufferKey, Row};
use crate::composers::{Composer, ComposerBackend};
use crate::errors::{ErrorSink, FlushFailure};
use crate::events::{ClientEvent, EventEmitter};
use crate::policy::{FlushDecision, FlushPolicy};
use crate::scheduler::{SchedulerState, TimerCommand};

/// 📦 One composed request, ready for the transport.
#[derive(Debug)]
pub(crate) struct FlushJob {
    pub destination: String,
    pub error_tag: String,
    pub query: String,
    pub body: String,
    pub rows: Vec<Row>,
}

/// 📬 A job plus what the transport said about it.
#[derive(Debug)]
pub(crate) struct FlushOutcome {
    pub job: FlushJob,
    pub result: Result<String, String>,
}

/// 🕐 Everything one tick produced.
#[derive(Debug)]
pub(crate) struct Tick {
    pub jobs: Vec<FlushJob>,
    pub timer: TimerCommand,
}

enum KeyFlush {
    Nothing,
    Accelerated(Duration),
    Job(FlushJob),
}

/// 📊 A point-in-time look at the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub running: bool,
    pub current_interval: Duration,
    pub default_interval: Duration,
    pub idle_misses: u32,
    /// Since the timer was last cleared.
    pub rows_received: u64,
    /// Since the timer was last cleared.
    pub rows_flushed: u64,
    pub buffered_rows: usize,
    pub buffered_batches: usize,
    pub failed_rounds: usize,
}

#[derive(Debug)]
pub(crate) struct FlushEngine {
    store: BufferStore,
    scheduler: SchedulerState,
    errors: ErrorSink,
    composer: ComposerBackend,
    policy: FlushPolicy,
    events: EventEmitter,
}

impl FlushEngine {
    pub(crate) fn new(config: &ClientConfig, events: EventEmitter) -> Self {
        Self {
            store: BufferStore::default(),
            scheduler: SchedulerState::new(
                config.flush_interval(),
                config.accelerated_interval(),
                config.idle_miss_limit,
            ),
            errors: ErrorSink::default(),
            composer: ComposerBackend::from_config(config),
            policy: FlushPolicy::new(config.max_rows()),
            events,
        }
    }

    /// 📥 Buffer one row. Returns the timer period when the scheduler has to
    /// be (re)started.
    pub(crate) fn insert(&mut self, destination: &str, row: Row, error_tag: &str) -> Option<Duration> {
        let key = BufferKey::new(destination, error_tag, self.composer.columns_for(&row));
        trace!("📥 row buffered under {}", key);

        let composer = &self.composer;
        self.store.append(key, row, |key| {
            composer.destination(&key.destination, key.columns.as_deref())
        });

        let started = self.scheduler.on_insert();
        if started.is_some() {
            self.events.log(|| "run timer from insert".to_string());
        }
        started
    }

    /// 🕐 One scheduler tick: visit every non-empty batch, then decide the timer's fate.
    pub(crate) fn tick(&mut self) -> Tick {
        let keys = self.store.non_empty_keys();
        debug!(
            "🕐 tick: {} batches, {} rows buffered",
            keys.len(),
            self.store.buffered_rows()
        );
        let received = self.scheduler.rows_received();
        let flushed = self.scheduler.rows_flushed();
        self.events
            .log(|| format!("received lines: {received}, inserted lines: {flushed}"));

        let mut jobs = Vec::with_capacity(keys.len());
        let mut timer = TimerCommand::Keep;
        for key in &keys {
            match self.flush_key(key) {
                KeyFlush::Job(job) => jobs.push(job),
                KeyFlush::Accelerated(period) => timer = TimerCommand::Restart(period),
                KeyFlush::Nothing => {}
            }
        }

        if keys.is_empty() {
            let misses = self.scheduler.idle_misses() + 1;
            self.events.log(|| format!("buffer is empty: {misses}"));
        }
        if self.scheduler.record_tick(!keys.is_empty()) == TimerCommand::Stop {
            self.events.log(|| "clear timer".to_string());
            timer = TimerCommand::Stop;
        }

        Tick { jobs, timer }
    }

    fn flush_key(&mut self, key: &BufferKey) -> KeyFlush {
        let buffered = self.store.len_of(key);
        if buffered == 0 {
            return KeyFlush::Nothing;
        }

        let take = match self
            .policy
            .decide(buffered, self.scheduler.at_default_interval())
        {
            FlushDecision::DrainAll => buffered,
            FlushDecision::DrainSlice(rows) => rows,
            FlushDecision::Accelerate => {
                self.events.log(|| format!("run storage optimizer for {key}"));
                return KeyFlush::Accelerated(self.scheduler.accelerate());
            }
        };

        let Some(slice) = self.store.drain(key, take) else {
            return KeyFlush::Nothing;
        };
        debug!(
            "🔪 {} rows drained from {}{}",
            slice.rows.len(),
            key,
            if slice.has_remainder { ", more waiting" } else { "" }
        );

        let query = slice.destination.statement.clone();
        match self.composer.compose(&slice.destination, &slice.rows) {
            Ok(body) => {
                self.events.log(|| format!("insert {query}"));
                KeyFlush::Job(FlushJob {
                    destination: slice.destination.table,
                    error_tag: slice.error_tag,
                    query,
                    body,
                    rows: slice.rows,
                })
            }
            Err(err) => {
                // composing failed, same fate as a failed request
                self.fail(FlushFailure {
                    destination: slice.destination.table,
                    error_tag: slice.error_tag,
                    query,
                    detail: format!("{err:#}"),
                    rows: slice.rows,
                });
                KeyFlush::Nothing
            }
        }
    }

    /// 📬 Apply a finished request: count it, or file it under its tag.
    pub(crate) fn complete(&mut self, outcome: FlushOutcome) {
        let FlushOutcome { job, result } = outcome;
        match result {
            Ok(_) => {
                let rows = job.rows.len();
                self.scheduler.record_flushed(rows);
                debug!("✅ {} rows landed in '{}'", rows, job.destination);
                self.events.log(|| format!("inserted: {rows}"));
                self.events.emit(ClientEvent::Inserted(rows));
            }
            Err(detail) => self.fail(FlushFailure {
                destination: job.destination,
                error_tag: job.error_tag,
                query: job.query,
                detail,
                rows: job.rows,
            }),
        }
    }

    fn fail(&mut self, failure: FlushFailure) {
        warn!("💀 flush failed: {}", failure);
        self.events.log(|| format!("insert error: {}", failure.detail));
        self.events.emit(ClientEvent::Error(failure.clone()));
        self.errors.record(failure);
    }

    /// 🛑 Stop the scheduler. Buffered rows stay where they are.
    pub(crate) fn stop(&mut self) {
        self.events.log(|| "close connection".to_string());
        self.scheduler.stop();
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            running: self.scheduler.running(),
            current_interval: self.scheduler.current_interval(),
            default_interval: self.scheduler.default_interval(),
            idle_misses: self.scheduler.idle_misses(),
            rows_received: self.scheduler.rows_received(),
            rows_flushed: self.scheduler.rows_flushed(),
            buffered_rows: self.store.buffered_rows(),
            buffered_batches: self.store.batch_count(),
            failed_rounds: self.errors.total(),
        }
    }

    pub(crate) fn errors(&self, tag: &str) -> Vec<FlushFailure> {
        self.errors.get(tag).to_vec()
    }

    pub(crate) fn drain_errors(&mut self, tag: &str) -> Vec<FlushFailure> {
        self.errors.drain(tag)
    }
}
