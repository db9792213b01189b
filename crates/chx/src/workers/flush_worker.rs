//! 🎬 *[a channel fills with rows. a timer ticks. somewhere, ClickHouse waits.]*
//!
//! 🗑️ The FlushWorker: sole owner of the [`FlushEngine`]. It listens to three
//! things at once: commands from the client, the flush timer, and verdicts
//! from requests already in the air. Only the requests run elsewhere; every
//! mutation of the buffer happens right here, one step at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::Worker;
use crate::common::Row;
use crate::engine::{FlushEngine, FlushJob, FlushOutcome, Stats};
use crate::errors::FlushFailure;
use crate::scheduler::TimerCommand;
use crate::transports::{Transport, TransportBackend};

/// ✉️ What the client can ask of the worker.
#[derive(Debug)]
pub(crate) enum Command {
    Insert {
        destination: String,
        row: Row,
        error_tag: String,
    },
    Stats(oneshot::Sender<Stats>),
    Errors {
        tag: String,
        drain: bool,
        reply: oneshot::Sender<Vec<FlushFailure>>,
    },
    Close,
}

#[derive(Debug)]
pub(crate) struct FlushWorker {
    engine: FlushEngine,
    commands: Receiver<Command>,
    transport: Arc<TransportBackend>,
}

impl FlushWorker {
    pub(crate) fn new(
        engine: FlushEngine,
        commands: Receiver<Command>,
        transport: Arc<TransportBackend>,
    ) -> Self {
        Self {
            engine,
            commands,
            transport,
        }
    }

    async fn run(self) -> Result<()> {
        let FlushWorker {
            mut engine,
            commands,
            transport,
        } = self;
        let (done_tx, done_rx) = async_channel::unbounded::<FlushOutcome>();
        let mut ticker: Option<Interval> = None;
        let mut in_flight = 0usize;

        debug!("📥 FlushWorker started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Ok(Command::Insert { destination, row, error_tag }) => {
                        if let Some(period) = engine.insert(&destination, row, &error_tag) {
                            ticker = Some(ticker_every(period));
                        }
                    }
                    Ok(Command::Stats(reply)) => {
                        let _ = reply.send(engine.stats());
                    }
                    Ok(Command::Errors { tag, drain, reply }) => {
                        let errors = if drain {
                            engine.drain_errors(&tag)
                        } else {
                            engine.errors(&tag)
                        };
                        let _ = reply.send(errors);
                    }
                    // closed on purpose, or every client handle is gone
                    Ok(Command::Close) | Err(_) => break,
                },
                () = next_tick(&mut ticker) => {
                    let tick = engine.tick();
                    for job in tick.jobs {
                        in_flight += 1;
                        spawn_flush(Arc::clone(&transport), job, done_tx.clone());
                    }
                    match tick.timer {
                        TimerCommand::Keep => {}
                        TimerCommand::Restart(period) => ticker = Some(ticker_every(period)),
                        TimerCommand::Stop => ticker = None,
                    }
                },
                Ok(outcome) = done_rx.recv() => {
                    in_flight -= 1;
                    engine.complete(outcome);
                },
            }
        }

        engine.stop();
        // 🛬 requests already in the air are never cancelled, their verdicts still count
        while in_flight > 0 {
            match done_rx.recv().await {
                Ok(outcome) => {
                    in_flight -= 1;
                    engine.complete(outcome);
                }
                Err(_) => break,
            }
        }

        let stats = engine.stats();
        info!(
            "🏁 FlushWorker closed with {} rows still buffered in {} batches",
            stats.buffered_rows, stats.buffered_batches
        );
        Ok(())
    }
}

impl Worker for FlushWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

/// ⏱️ First tick one full period from now, like any self-respecting interval timer.
fn ticker_every(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// 🚀 The only suspension point: post the job on its own task and report back.
fn spawn_flush(transport: Arc<TransportBackend>, mut job: FlushJob, done: Sender<FlushOutcome>) {
    tokio::spawn(async move {
        let body = std::mem::take(&mut job.body);
        let result = transport
            .post(&job.query, Some(body))
            .await
            .map_err(|err| format!("{err:#}"));
        let _ = done.send(FlushOutcome { job, result }).await;
    });
}
