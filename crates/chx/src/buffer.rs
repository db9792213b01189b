//! 🪣 The Buffer Store: where rows wait in line like it's the DMV.
//!
//! One entry per [`BufferKey`]. An entry exists iff it holds at least one row;
//! a drain that empties it deletes the key on the spot. Rows leave from the
//! front, so whatever came in first goes out first. Always. 🦆

use std::collections::{BTreeMap, VecDeque};

use crate::common::{BufferKey, Destination, Row};

/// 📦 The rows waiting for one key, plus everything needed to ship them.
#[derive(Debug)]
pub(crate) struct PendingBatch {
    pub destination: Destination,
    pub error_tag: String,
    pub rows: VecDeque<Row>,
}

/// 🚚 What a drain hands back: the oldest rows and whether any stayed behind.
#[derive(Debug)]
pub(crate) struct DrainedSlice {
    pub destination: Destination,
    pub error_tag: String,
    pub rows: Vec<Row>,
    pub has_remainder: bool,
}

#[derive(Debug, Default)]
pub(crate) struct BufferStore {
    batches: BTreeMap<BufferKey, PendingBatch>,
}

impl BufferStore {
    /// 📥 Append a row under `key`. `describe` runs only when the key is new,
    /// so the destination descriptor is built once per batch.
    pub(crate) fn append(
        &mut self,
        key: BufferKey,
        row: Row,
        describe: impl FnOnce(&BufferKey) -> Destination,
    ) {
        let batch = self.batches.entry(key).or_insert_with_key(|key| PendingBatch {
            destination: describe(key),
            error_tag: key.error_tag.clone(),
            rows: VecDeque::new(),
        });
        batch.rows.push_back(row);
    }

    /// 🔪 Remove up to `max_rows` rows from the front of the batch at `key`.
    ///
    /// Returns `None` when there is nothing to drain, which makes draining an
    /// absent key a no-op.
    pub(crate) fn drain(&mut self, key: &BufferKey, max_rows: usize) -> Option<DrainedSlice> {
        let batch = self.batches.get_mut(key)?;
        if batch.rows.is_empty() {
            self.batches.remove(key);
            return None;
        }

        if batch.rows.len() <= max_rows {
            // ✅ everything goes, and so does the key
            let batch = self.batches.remove(key)?;
            return Some(DrainedSlice {
                destination: batch.destination,
                error_tag: batch.error_tag,
                rows: batch.rows.into(),
                has_remainder: false,
            });
        }

        let rows: Vec<Row> = batch.rows.drain(..max_rows).collect();
        Some(DrainedSlice {
            destination: batch.destination.clone(),
            error_tag: batch.error_tag.clone(),
            rows,
            has_remainder: true,
        })
    }

    pub(crate) fn len_of(&self, key: &BufferKey) -> usize {
        self.batches.get(key).map_or(0, |batch| batch.rows.len())
    }

    /// Keys that currently hold rows, in key order.
    pub(crate) fn non_empty_keys(&self) -> Vec<BufferKey> {
        self.batches
            .iter()
            .filter(|(_, batch)| !batch.rows.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn buffered_rows(&self) -> usize {
        self.batches.values().map(|batch| batch.rows.len()).sum()
    }

    pub(crate) fn batch_count(&self) -> usize {
        self.batches.len()
    }
}
