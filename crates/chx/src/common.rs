//! 📦 Common data structures: the building blocks of chx.
//!
//! 🎬 A row walks into a buffer. The buffer asks "where are you going, and who
//! do I blame if it goes wrong?" The row shrugs. It is a JSON object. It has
//! keys. That is all it knows. This module gives it an identity anyway. 🦆

/// 📦 One row, as the producer hands it to us: a JSON object.
///
/// serde_json's default map keeps keys sorted, but the canonical column order
/// is computed explicitly in [`BufferKey`] derivation so nothing hinges on it.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// 🔑 The composite identity of a pending batch.
///
/// Two rows land in the same batch iff their keys are equal. `columns` is only
/// populated by the typed-row composer, because that format commits to one
/// column list per request and a row of a different shape would corrupt it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferKey {
    pub destination: String,
    pub error_tag: String,
    pub columns: Option<Vec<String>>,
}

impl BufferKey {
    pub fn new(destination: &str, error_tag: &str, columns: Option<Vec<String>>) -> Self {
        Self {
            destination: destination.to_string(),
            error_tag: error_tag.to_string(),
            columns,
        }
    }
}

impl std::fmt::Display for BufferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.destination, self.error_tag)?;
        if let Some(columns) = &self.columns {
            write!(f, "({})", columns.join(","))?;
        }
        Ok(())
    }
}

/// 🎯 Where a batch is headed, precomputed once when the batch is born.
///
/// `statement` is the `INSERT ... FORMAT ...` query the transport will carry.
/// `columns` mirrors the buffer key for typed rows, `None` for row objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub statement: String,
}

/// 🧮 The canonical column list of a row: its field names, sorted.
pub(crate) fn canonical_columns(row: &Row) -> Vec<String> {
    let mut columns: Vec<String> = row.keys().cloned().collect();
    columns.sort_unstable();
    columns
}
