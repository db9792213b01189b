//! 🧵 Workers: the ones who actually do the work while the Client takes all
//! the credit in the sprint retro.
//!
//! Exactly one worker exists per client: the [`FlushWorker`], sole owner of
//! the engine. Everything that mutates the buffer happens on its task, which
//! is why nothing in the engine needs a lock.

use anyhow::Result;
use tokio::task::JoinHandle;

mod flush_worker;
pub(crate) use flush_worker::{Command, FlushWorker};

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
