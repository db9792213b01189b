//! 📣 The Event Channel: the engine's only voice to the outside world.
//!
//! The engine holds an [`EventEmitter`]; the caller holds the receiving end.
//! Nobody listening? The events go nowhere and nobody blocks. That is the
//! whole contract.

use crate::errors::FlushFailure;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// 💀 A flush round failed. Its rows are gone from the buffer.
    Error(FlushFailure),
    /// 🔊 Diagnostics, only when `enable_log` is set.
    Log(String),
    /// ✅ One flush round landed this many rows.
    Inserted(usize),
}

/// 📡 The receiving end, handed out by [`crate::Client::new`].
///
/// ⚠️ The channel is unbounded. Read it or drop it: a receiver that is held
/// but never read keeps every event, `Log` lines included, in memory.
pub type EventReceiver = async_channel::Receiver<ClientEvent>;

#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: async_channel::Sender<ClientEvent>,
    enable_log: bool,
}

impl EventEmitter {
    /// 🏗️ An unbounded channel: emitting never waits on the observer.
    pub(crate) fn channel(enable_log: bool) -> (Self, EventReceiver) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx, enable_log }, rx)
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // a closed channel means nobody cares anymore, which is allowed
        let _ = self.tx.try_send(event);
    }

    /// 🔊 Only builds the message when someone asked for logs.
    pub(crate) fn log(&self, message: impl FnOnce() -> String) {
        if self.enable_log {
            self.emit(ClientEvent::Log(message()));
        }
    }
}
