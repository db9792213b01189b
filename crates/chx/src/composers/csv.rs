//! 🧾 **CsvComposer**: typed rows as quoted CSV with an explicit column list.
//!
//! The first row of a new column set fixes the statement:
//! `INSERT INTO <table> (<c1>, <c2>, ...) FORMAT CSV`. Every later row in that
//! batch has the same columns (the buffer key guarantees it) and is reduced to
//! its values in column order, one line per row.
//!
//! Field rules:
//! - strings are quoted, embedded `"` doubled
//! - numbers and booleans are quoted verbatim as text
//! - `null` (or a missing column) is `\N`, ClickHouse's CSV NULL
//! - arrays and objects are quoted as their JSON text

use anyhow::{Context, Result};
use serde_json::Value;

use super::Composer;
use crate::common::{Destination, Row, canonical_columns};

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvComposer;

impl Composer for CsvComposer {
    fn columns_for(&self, row: &Row) -> Option<Vec<String>> {
        Some(canonical_columns(row))
    }

    fn destination(&self, table: &str, columns: Option<&[String]>) -> Destination {
        let columns = columns.map(<[String]>::to_vec).unwrap_or_default();
        Destination {
            table: table.to_string(),
            statement: format!("INSERT INTO {table} ({}) FORMAT CSV", columns.join(", ")),
            columns: Some(columns),
        }
    }

    fn compose(&self, destination: &Destination, rows: &[Row]) -> Result<String> {
        let columns = destination.columns.as_deref().unwrap_or_default();
        let mut payload = String::with_capacity(rows.len() * (columns.len() * 8 + 1));

        for row in rows {
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    payload.push(',');
                }
                match row.get(column) {
                    Some(value) => push_field(&mut payload, value).with_context(|| {
                        format!(
                            "💀 Column '{column}' bound for '{}' could not be written as CSV",
                            destination.table
                        )
                    })?,
                    None => payload.push_str("\\N"),
                }
            }
            payload.push('\n');
        }

        Ok(payload)
    }
}

fn push_field(payload: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => payload.push_str("\\N"),
        Value::String(s) => push_quoted(payload, s),
        Value::Number(n) => push_quoted(payload, &n.to_string()),
        Value::Bool(b) => push_quoted(payload, if *b { "true" } else { "false" }),
        nested @ (Value::Array(_) | Value::Object(_)) => {
            push_quoted(payload, &serde_json::to_string(nested)?)
        }
    }
    Ok(())
}

/// 🔍 Quote `text`, doubling every `"` inside it. memchr finds the quotes so
/// the common quote-free field is a single copy.
pub(crate) fn push_quoted(payload: &mut String, text: &str) {
    payload.push('"');
    let mut start = 0;
    for at in memchr::memchr_iter(b'"', text.as_bytes()) {
        payload.push_str(&text[start..=at]);
        payload.push('"');
        start = at + 1;
    }
    payload.push_str(&text[start..]);
    payload.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    /// Plain RFC 4180 field splitter, enough to read our own output back.
    fn parse_line(line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut chars = line.chars().peekable();
        let mut quoted = false;
        while let Some(c) = chars.next() {
            match (c, quoted) {
                ('"', false) => quoted = true,
                ('"', true) if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                ('"', true) => quoted = false,
                (',', false) => fields.push(std::mem::take(&mut field)),
                (c, _) => field.push(c),
            }
        }
        fields.push(field);
        fields
    }

    #[test]
    fn the_one_where_the_statement_lists_the_columns() {
        let composer = CsvComposer;
        let columns = composer.columns_for(&row(json!({"v": "x", "k": 1})));
        let destination = composer.destination("logs", columns.as_deref());
        assert_eq!(destination.statement, "INSERT INTO logs (k, v) FORMAT CSV");
        assert_eq!(destination.columns, Some(vec!["k".to_string(), "v".to_string()]));
    }

    #[test]
    fn the_one_where_embedded_quotes_get_doubled_and_come_back() -> Result<()> {
        let composer = CsvComposer;
        let input = row(json!({"a": 1, "b": "x\"y"}));
        let destination = composer.destination("t", composer.columns_for(&input).as_deref());

        let body = composer.compose(&destination, &[input])?;
        assert_eq!(body, "\"1\",\"x\"\"y\"\n");

        let fields = parse_line(body.trim_end_matches('\n'));
        assert_eq!(fields, vec!["1".to_string(), "x\"y".to_string()]);
        Ok(())
    }

    #[test]
    fn the_one_where_every_value_type_finds_its_costume() -> Result<()> {
        let composer = CsvComposer;
        let input = row(json!({
            "a_null": null,
            "b_bool": true,
            "c_float": 1.5,
            "d_list": [1, "two"],
            "e_text": "plain",
        }));
        let destination = composer.destination("t", composer.columns_for(&input).as_deref());
        let body = composer.compose(&destination, &[input])?;
        assert_eq!(
            body,
            "\\N,\"true\",\"1.5\",\"[1,\"\"two\"\"]\",\"plain\"\n"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_row_order_survives_composition() -> Result<()> {
        let composer = CsvComposer;
        let rows: Vec<Row> = (0..5).map(|n| row(json!({"n": n}))).collect();
        let destination = composer.destination("t", composer.columns_for(&rows[0]).as_deref());
        let body = composer.compose(&destination, &rows)?;
        assert_eq!(body, "\"0\"\n\"1\"\n\"2\"\n\"3\"\n\"4\"\n");
        Ok(())
    }

    #[test]
    fn the_one_where_quotes_at_the_edges_are_not_lost() {
        let mut payload = String::new();
        push_quoted(&mut payload, "\"edge\"");
        assert_eq!(payload, "\"\"\"edge\"\"\"");
    }
}
