//! 💀 The Error Sink: where failed flush rounds go to be remembered.
//!
//! Failures are bucketed by error-partition tag, never by table, so a caller
//! can route "billing" rows and "telemetry" rows into separate buckets even
//! when both land in the same table. Lists only grow; draining is the
//! caller's job ([`crate::Client::drain_errors`]).

use std::collections::HashMap;

use crate::common::Row;

/// 💀 One flush round that did not make it.
///
/// The same shape is emitted for every insert mode: what went wrong, the
/// statement that was sent, and the rows that went down with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    pub destination: String,
    pub error_tag: String,
    pub query: String,
    pub detail: String,
    pub rows: Vec<Row>,
}

impl std::fmt::Display for FlushFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rows for '{}' (tag '{}') failed on `{}`: {}",
            self.rows.len(),
            self.destination,
            self.error_tag,
            self.query,
            self.detail
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct ErrorSink {
    by_tag: HashMap<String, Vec<FlushFailure>>,
}

impl ErrorSink {
    pub(crate) fn record(&mut self, failure: FlushFailure) {
        self.by_tag
            .entry(failure.error_tag.clone())
            .or_default()
            .push(failure);
    }

    pub(crate) fn get(&self, tag: &str) -> &[FlushFailure] {
        self.by_tag.get(tag).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn drain(&mut self, tag: &str) -> Vec<FlushFailure> {
        self.by_tag.remove(tag).unwrap_or_default()
    }

    pub(crate) fn total(&self) -> usize {
        self.by_tag.values().map(Vec::len).sum()
    }
}
