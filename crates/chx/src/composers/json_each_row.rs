//! 📡 **JsonEachRowComposer**: row objects for `FORMAT JSONEachRow`.
//!
//! The statement names only the table; the wire format itself declares that
//! each item is a whole row object. Two framings are accepted by ClickHouse
//! here, newline-delimited and a plain JSON array, so both are offered.

use anyhow::{Context, Result};

use super::Composer;
use crate::app_config::RowFraming;
use crate::common::{Destination, Row};

#[derive(Debug, Clone, Copy)]
pub struct JsonEachRowComposer {
    framing: RowFraming,
}

impl JsonEachRowComposer {
    pub fn new(framing: RowFraming) -> Self {
        Self { framing }
    }
}

impl Composer for JsonEachRowComposer {
    fn columns_for(&self, _row: &Row) -> Option<Vec<String>> {
        None
    }

    fn destination(&self, table: &str, _columns: Option<&[String]>) -> Destination {
        Destination {
            table: table.to_string(),
            columns: None,
            statement: format!("INSERT INTO {table} FORMAT JSONEachRow"),
        }
    }

    fn compose(&self, destination: &Destination, rows: &[Row]) -> Result<String> {
        // 🧮 vibes-based capacity, close enough for small objects
        let mut payload = String::with_capacity(rows.len() * 64 + 2);

        if self.framing == RowFraming::JsonArray {
            payload.push('[');
        }
        for (i, row) in rows.iter().enumerate() {
            if self.framing == RowFraming::JsonArray && i > 0 {
                payload.push(',');
            }
            let item = serde_json::to_string(row).with_context(|| {
                format!(
                    "💀 Row {i} bound for '{}' refused to become JSON",
                    destination.table
                )
            })?;
            payload.push_str(&item);
            if self.framing == RowFraming::Ndjson {
                payload.push('\n');
            }
        }
        if self.framing == RowFraming::JsonArray {
            payload.push(']');
        }

        Ok(payload)
    }
}
