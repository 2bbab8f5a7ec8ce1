//! # ReadRows Chunk Merging
//!
//! `ReadRows` streams rows as a sequence of cell chunks. A chunk only carries
//! the row key, family and qualifier when they change, a large value may be
//! split over several chunks (`valueSize` > 0 on all but the last), and
//! `resetRow` discards the row in progress. This module folds those chunks
//! back into whole [`Row`]s.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};

use super::client::{Row, RowCell};
use super::errors::{BigtableError, BigtableResult};

/// One message of the `ReadRows` response stream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRowsResponse {
    #[serde(default)]
    pub chunks: Vec<CellChunk>,
}

/// A piece of a cell as sent on the wire. Byte fields are base64.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChunk {
    #[serde(default)]
    pub row_key: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub qualifier: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp_micros: Option<i64>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub value_size: Option<i64>,
    #[serde(default)]
    pub reset_row: Option<bool>,
    #[serde(default)]
    pub commit_row: Option<bool>,
}

impl CellChunk {
    fn carries_cell(&self) -> bool {
        self.family_name.is_some()
            || self.qualifier.is_some()
            || self.timestamp_micros.is_some()
            || self.value.is_some()
            || self.value_size.is_some()
            || self.row_key.is_some()
    }
}

// proto3 JSON encodes int64 as a string but accepts numbers
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn decode_bytes(field: &str, raw: &str) -> BigtableResult<Vec<u8>> {
    STANDARD
        .decode(raw)
        .map_err(|e| BigtableError::Decode(format!("invalid base64 in {}: {}", field, e)))
}

/// Folds chunks into committed rows
#[derive(Debug, Default)]
pub struct RowMerger {
    committed: Vec<Row>,
    current: Option<Row>,
    family: Option<String>,
    qualifier: Option<Vec<u8>>,
    partial: Option<RowCell>,
}

impl RowMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&mut self, response: ReadRowsResponse) -> BigtableResult<()> {
        for chunk in response.chunks {
            self.push(chunk)?;
        }
        Ok(())
    }

    pub fn push(&mut self, chunk: CellChunk) -> BigtableResult<()> {
        if chunk.reset_row.unwrap_or(false) {
            if self.current.is_none() {
                return Err(BigtableError::Decode(
                    "resetRow received with no row in progress".to_string(),
                ));
            }
            self.reset();
            return Ok(());
        }

        if let Some(raw_key) = &chunk.row_key {
            if self.current.is_some() {
                return Err(BigtableError::Decode(
                    "new row key before previous row was committed".to_string(),
                ));
            }
            let key = decode_bytes("rowKey", raw_key)?;
            if let Some(last) = self.committed.last() {
                if key <= last.key {
                    return Err(BigtableError::Decode(
                        "row keys out of order".to_string(),
                    ));
                }
            }
            self.current = Some(Row {
                key,
                cells: Vec::new(),
            });
        }

        if self.current.is_none() {
            return Err(BigtableError::Decode(
                "chunk received with no row in progress".to_string(),
            ));
        }

        if chunk.carries_cell() {
            self.merge_cell(&chunk)?;
        }

        if chunk.commit_row.unwrap_or(false) {
            if self.partial.is_some() {
                return Err(BigtableError::Decode(
                    "row committed with a split value pending".to_string(),
                ));
            }
            if let Some(row) = self.current.take() {
                self.committed.push(row);
            }
            self.family = None;
            self.qualifier = None;
        }

        Ok(())
    }

    fn merge_cell(&mut self, chunk: &CellChunk) -> BigtableResult<()> {
        let value = match &chunk.value {
            Some(raw) => decode_bytes("value", raw)?,
            None => Vec::new(),
        };

        if let Some(cell) = self.partial.as_mut() {
            cell.value.extend_from_slice(&value);
        } else {
            if let Some(family) = &chunk.family_name {
                if chunk.qualifier.is_none() {
                    return Err(BigtableError::Decode(
                        "family changed without a qualifier".to_string(),
                    ));
                }
                self.family = Some(family.clone());
            }
            if let Some(raw) = &chunk.qualifier {
                self.qualifier = Some(decode_bytes("qualifier", raw)?);
            }
            let (Some(family), Some(qualifier)) = (&self.family, &self.qualifier) else {
                return Err(BigtableError::Decode(
                    "cell chunk without family or qualifier".to_string(),
                ));
            };
            self.partial = Some(RowCell {
                family: family.clone(),
                qualifier: qualifier.clone(),
                timestamp_micros: chunk.timestamp_micros.unwrap_or(0),
                value,
            });
        }

        if chunk.value_size.unwrap_or(0) == 0 {
            if let (Some(cell), Some(row)) = (self.partial.take(), self.current.as_mut()) {
                row.cells.push(cell);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.current = None;
        self.family = None;
        self.qualifier = None;
        self.partial = None;
    }

    /// Rows committed so far. Fails if the stream stopped mid-row.
    pub fn finish(self) -> BigtableResult<Vec<Row>> {
        if self.current.is_some() {
            return Err(BigtableError::Decode(
                "stream ended before the last row was committed".to_string(),
            ));
        }
        Ok(self.committed)
    }
}

/// Merge a full `ReadRows` response body (a JSON array of stream messages)
pub fn merge_responses(responses: Vec<ReadRowsResponse>) -> BigtableResult<Vec<Row>> {
    let mut merger = RowMerger::new();
    for response in responses {
        merger.push_response(response)?;
    }
    merger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    fn parse(body: serde_json::Value) -> Vec<ReadRowsResponse> {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_single_row_two_columns() {
        let body = json!([{
            "chunks": [
                {"rowKey": b64("0"), "familyName": "cf1", "qualifier": b64("age"),
                 "timestampMicros": "10", "value": b64("7")},
                {"qualifier": b64("name"), "timestampMicros": "20", "value": b64("v2")},
                {"timestampMicros": "10", "value": b64("v1"), "commitRow": true}
            ]
        }]);

        let rows = merge_responses(parse(body)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, b"0");
        let names: Vec<String> = rows[0]
            .cells_for("cf1", b"name")
            .map(RowCell::value_utf8)
            .collect();
        assert_eq!(names, vec!["v2", "v1"]);
        assert_eq!(rows[0].cells[0].timestamp_micros, 10);
    }

    #[test]
    fn test_split_value_is_concatenated() {
        let body = json!([
            {"chunks": [{"rowKey": b64("k"), "familyName": "cf", "qualifier": b64("q"),
                         "timestampMicros": 5, "value": b64("hel"), "valueSize": 5}]},
            {"chunks": [{"value": b64("lo"), "commitRow": true}]}
        ]);

        let rows = merge_responses(parse(body)).unwrap();
        assert_eq!(rows[0].cells.len(), 1);
        assert_eq!(rows[0].cells[0].value_utf8(), "hello");
    }

    #[test]
    fn test_reset_row_discards_progress() {
        let body = json!([{
            "chunks": [
                {"rowKey": b64("k"), "familyName": "cf", "qualifier": b64("q"), "value": b64("stale")},
                {"resetRow": true},
                {"rowKey": b64("k"), "familyName": "cf", "qualifier": b64("q"), "value": b64("fresh"),
                 "commitRow": true}
            ]
        }]);

        let rows = merge_responses(parse(body)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells.len(), 1);
        assert_eq!(rows[0].cells[0].value_utf8(), "fresh");
    }

    #[test]
    fn test_multiple_rows_in_order() {
        let body = json!([{
            "chunks": [
                {"rowKey": b64("a"), "familyName": "cf", "qualifier": b64("q"), "commitRow": true},
                {"rowKey": b64("b"), "familyName": "cf", "qualifier": b64("q"), "commitRow": true}
            ]
        }]);

        let rows = merge_responses(parse(body)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key_utf8(), "b");
    }

    #[test]
    fn test_empty_stream_has_no_rows() {
        let rows = merge_responses(parse(json!([]))).unwrap();
        assert!(rows.is_empty());
        let rows = merge_responses(parse(json!([{}]))).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_uncommitted_row_is_an_error() {
        let body = json!([{
            "chunks": [{"rowKey": b64("a"), "familyName": "cf", "qualifier": b64("q")}]
        }]);
        assert!(matches!(
            merge_responses(parse(body)),
            Err(BigtableError::Decode(_))
        ));
    }

    #[test]
    fn test_chunk_without_row_is_an_error() {
        let body = json!([{"chunks": [{"familyName": "cf", "qualifier": b64("q")}]}]);
        assert!(merge_responses(parse(body)).is_err());
    }

    #[test]
    fn test_out_of_order_keys_rejected() {
        let body = json!([{
            "chunks": [
                {"rowKey": b64("b"), "familyName": "cf", "qualifier": b64("q"), "commitRow": true},
                {"rowKey": b64("a"), "familyName": "cf", "qualifier": b64("q"), "commitRow": true}
            ]
        }]);
        assert!(merge_responses(parse(body)).is_err());
    }
}
