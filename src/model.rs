//! # Request Models
//!
//! JSON bodies accepted by the `/v1` endpoints. Field names are camelCase on
//! the wire.

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{LookupError, LookupResult};

/// One cell to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnData {
    pub column_family: String,
    pub column_name: String,
    pub column_value: String,
}

/// Cells to write to one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigtableTableData {
    pub table_name: String,
    pub row_key_id: String,
    #[serde(default)]
    pub data: Vec<ColumnData>,
}

impl BigtableTableData {
    /// Reject blank identifiers and empty cell lists
    pub fn validate(&self) -> LookupResult<()> {
        check_table_id(&self.table_name)?;
        require("rowKeyId", &self.row_key_id)?;
        if self.data.is_empty() {
            return Err(LookupError::validation("data must contain at least one column"));
        }
        for (i, column) in self.data.iter().enumerate() {
            require(&format!("data[{}].columnFamily", i), &column.column_family)?;
            require(&format!("data[{}].columnName", i), &column.column_name)?;
            require(&format!("data[{}].columnValue", i), &column.column_value)?;
        }
        Ok(())
    }
}

/// Body of `createTable`; the family falls back to the configured one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpBigtableTable {
    pub table_name: String,
    #[serde(default)]
    pub column_family: Option<String>,
}

/// Body of `deleteTable`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub table_list: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Longest table id Bigtable accepts
pub const MAX_TABLE_ID_LEN: usize = 50;

/// Table ids are `[_a-zA-Z0-9][-_.a-zA-Z0-9]*`, at most 50 characters,
/// on every backend.
pub(crate) fn check_table_id(table: &str) -> LookupResult<()> {
    require("tableName", table)?;
    let mut chars = table.chars();
    let first_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if first_ok && rest_ok && table.len() <= MAX_TABLE_ID_LEN {
        Ok(())
    } else {
        Err(LookupError::validation(format!(
            "invalid tableName '{}': expected [_a-zA-Z0-9][-_.a-zA-Z0-9]* of at most {} characters",
            table, MAX_TABLE_ID_LEN
        )))
    }
}

pub(crate) fn require(field: &str, value: &str) -> LookupResult<()> {
    if value.trim().is_empty() {
        Err(LookupError::validation(format!("{} must not be blank", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_body_uses_camel_case() {
        let body: BigtableTableData = serde_json::from_value(json!({
            "tableName": "t1",
            "rowKeyId": "0",
            "data": [{"columnFamily": "cf1", "columnName": "name", "columnValue": "v1"}]
        }))
        .unwrap();

        assert_eq!(body.table_name, "t1");
        assert_eq!(body.data[0].column_value, "v1");
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut body = BigtableTableData {
            table_name: "t1".to_string(),
            row_key_id: " ".to_string(),
            data: vec![],
        };
        assert!(matches!(body.validate(), Err(LookupError::Validation(m)) if m.contains("rowKeyId")));

        body.row_key_id = "0".to_string();
        assert!(body.validate().is_err());

        body.data.push(ColumnData {
            column_family: "cf1".to_string(),
            column_name: "".to_string(),
            column_value: "v".to_string(),
        });
        assert!(matches!(
            body.validate(),
            Err(LookupError::Validation(m)) if m == "data[0].columnName must not be blank"
        ));
    }

    #[test]
    fn test_missing_table_list_defaults_empty() {
        let config: TableConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.table_list.is_empty());

        let table: GcpBigtableTable = serde_json::from_value(json!({"tableName": "t1"})).unwrap();
        assert_eq!(table.column_family, None);
    }

    #[test]
    fn test_null_table_list_is_empty() {
        let config: TableConfig = serde_json::from_value(json!({"tableList": null})).unwrap();
        assert!(config.table_list.is_empty());
    }

    #[test]
    fn test_table_id_rules() {
        for ok in ["t1", "_t", "lookup-table.v2", "a"] {
            assert!(check_table_id(ok).is_ok(), "{}", ok);
        }
        let too_long = "t".repeat(MAX_TABLE_ID_LEN + 1);
        for bad in ["a b", "a/b", "-t", ".t", " ", too_long.as_str()] {
            assert!(
                matches!(check_table_id(bad), Err(LookupError::Validation(_))),
                "{}",
                bad
            );
        }
    }
}
