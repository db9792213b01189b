//! 🦆 chx: a write-buffering ingestion client for ClickHouse over HTTP.
//!
//! Rows go in one at a time through [`Client::insert`]. They wait in a buffer
//! keyed by destination and error tag, and a self-tuning timer ships them as
//! bulk `INSERT` requests. Outcomes come back on the [`EventReceiver`].

pub mod app_config;
pub mod client;
pub mod common;
pub mod composers;

pub mod errors;
pub mod events;

mod buffer;
mod engine;
mod policy;
mod scheduler;
mod transports;
mod workers;

pub use app_config::{ClientConfig, InsertMode, RowFraming, load_config};
pub use client::{Client, DEFAULT_ERROR_TAG};
pub use common::Row;
pub use engine::Stats;
pub use errors::FlushFailure;
pub use events::{ClientEvent, EventReceiver};
