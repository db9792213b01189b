//! 🎼 The Composers module: rows in, wire-format request bodies out.
//!
//! A composer has three jobs, all deterministic:
//! - say which columns (if any) belong in a row's buffer key,
//! - build the [`Destination`] descriptor the first time a batch is born,
//! - compose a drained slice of rows into one request body, row `i` of the
//!   input landing at position `i` of the output.
//!
//! 🧠 Knowledge graph:
//! - **JSONEachRow** ([`JsonEachRowComposer`]): row objects, NDJSON or JSON array framing.
//! - **CSV** ([`CsvComposer`]): typed rows, explicit column list, every field quoted.
//! - Resolution: [`ComposerBackend::from_config`], trait → concrete impls → enum dispatcher.
//!
//! 🦆 (the duck composes... symphonies? payloads? both? the duck has no comment.)

use anyhow::Result;

use crate::app_config::{ClientConfig, InsertMode};
use crate::common::{Destination, Row};

pub mod csv;
pub mod json_each_row;

pub use csv::CsvComposer;
pub use json_each_row::JsonEachRowComposer;

/// 🎼 Turns buffered rows into a request body for one destination.
pub trait Composer: std::fmt::Debug {
    /// 🔑 The column list that partitions the buffer, or `None` if any row
    /// shape may share a batch.
    fn columns_for(&self, row: &Row) -> Option<Vec<String>>;

    /// 🎯 Build the descriptor (and its insert statement) for a new batch.
    fn destination(&self, table: &str, columns: Option<&[String]>) -> Destination;

    /// 📦 Compose the rows into one wire-ready body.
    fn compose(&self, destination: &Destination, rows: &[Row]) -> Result<String>;
}

/// 🎭 The polymorphic composer, resolved once from config.
#[derive(Debug, Clone)]
pub enum ComposerBackend {
    JsonEachRow(JsonEachRowComposer),
    Csv(CsvComposer),
}

impl ComposerBackend {
    /// 🔧 Resolve the composer from the client config.
    ///
    /// | InsertMode | Composer | Format |
    /// |---|---|---|
    /// | RowObject | JsonEachRowComposer | `FORMAT JSONEachRow` |
    /// | TypedRow | CsvComposer | `FORMAT CSV` |
    pub fn from_config(config: &ClientConfig) -> Self {
        match config.insert_mode {
            InsertMode::RowObject => Self::JsonEachRow(JsonEachRowComposer::new(config.row_framing)),
            InsertMode::TypedRow => Self::Csv(CsvComposer),
        }
    }
}

impl Composer for ComposerBackend {
    fn columns_for(&self, row: &Row) -> Option<Vec<String>> {
        match self {
            Self::JsonEachRow(c) => c.columns_for(row),
            Self::Csv(c) => c.columns_for(row),
        }
    }

    fn destination(&self, table: &str, columns: Option<&[String]>) -> Destination {
        match self {
            Self::JsonEachRow(c) => c.destination(table, columns),
            Self::Csv(c) => c.destination(table, columns),
        }
    }

    #[inline]
    fn compose(&self, destination: &Destination, rows: &[Row]) -> Result<String> {
        match self {
            Self::JsonEachRow(c) => c.compose(destination, rows),
            Self::Csv(c) => c.compose(destination, rows),
        }
    }
}
