//! # Lookup Service
//!
//! Request-level entry points used by the HTTP handlers: validates request
//! bodies, fills in configured defaults and fans list requests out over
//! [`LookupOperations`].

use serde::Serialize;

use crate::errors::{LookupError, LookupResult};
use crate::model::{check_table_id, require, BigtableTableData, GcpBigtableTable, TableConfig};
use crate::operations::{
    CountOutcome, CreateTableOutcome, DeleteTableOutcome, LookupOperations, ReadOutcome,
    WriteOutcome,
};

/// Result of a multi-table delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KvLookupService {
    operations: LookupOperations,
    max_count_limit: u64,
}

impl KvLookupService {
    pub fn new(operations: LookupOperations, max_count_limit: u64) -> Self {
        Self {
            operations,
            max_count_limit,
        }
    }

    pub fn operations(&self) -> &LookupOperations {
        &self.operations
    }

    pub fn max_count_limit(&self) -> u64 {
        self.max_count_limit
    }

    pub async fn create_table(
        &self,
        instance_id: &str,
        request: &GcpBigtableTable,
    ) -> LookupResult<CreateTableOutcome> {
        check_table_id(&request.table_name)?;
        let family = request
            .column_family
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(self.operations.column_family());
        self.operations
            .create_table(instance_id, &request.table_name, family)
            .await
    }

    /// Delete each listed table in order. An empty list is rejected before
    /// any storage call.
    pub async fn delete_tables(
        &self,
        instance_id: &str,
        request: &TableConfig,
    ) -> LookupResult<DeleteSummary> {
        if request.table_list.is_empty() {
            return Err(LookupError::validation("tableList must not be empty"));
        }
        for table in &request.table_list {
            check_table_id(table)?;
        }

        let mut summary = DeleteSummary::default();
        for table in &request.table_list {
            match self.operations.delete_table(instance_id, table).await? {
                DeleteTableOutcome::Deleted => summary.deleted.push(table.clone()),
                DeleteTableOutcome::NotFound => summary.missing.push(table.clone()),
            }
        }
        Ok(summary)
    }

    pub async fn insert_data(
        &self,
        instance_id: &str,
        request: &BigtableTableData,
    ) -> LookupResult<WriteOutcome> {
        request.validate()?;
        self.operations
            .write_row(
                instance_id,
                &request.table_name,
                &request.row_key_id,
                &request.data,
            )
            .await
    }

    pub async fn read_cell_data(
        &self,
        instance_id: &str,
        table: &str,
        row_key: &str,
    ) -> LookupResult<ReadOutcome> {
        check_table_id(table)?;
        require("id", row_key)?;
        let outcome = self.operations.read_cell(instance_id, table, row_key).await?;
        if let ReadOutcome::Found(_) = &outcome {
            tracing::info!(instance = %instance_id, table = %table, row_key = %row_key, "cell retrieved");
        }
        Ok(outcome)
    }

    pub async fn count_rows(
        &self,
        instance_id: &str,
        table: &str,
        limit: u64,
    ) -> LookupResult<CountOutcome> {
        check_table_id(table)?;
        if limit == 0 || limit > self.max_count_limit {
            return Err(LookupError::validation(format!(
                "limit must be between 1 and {}",
                self.max_count_limit
            )));
        }
        self.operations.count_rows(instance_id, table, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bigtable::MemoryConnector;
    use crate::registry::ClientRegistry;

    fn service() -> KvLookupService {
        let registry =
            ClientRegistry::build(&MemoryConnector::new(), "proj", &["i1".to_string()]).unwrap();
        KvLookupService::new(LookupOperations::new(Arc::new(registry), "cf1", "name"), 100)
    }

    #[tokio::test]
    async fn test_create_table_defaults_family() {
        let service = service();
        let request = GcpBigtableTable {
            table_name: "t1".to_string(),
            column_family: None,
        };
        assert_eq!(
            service.create_table("i1", &request).await.unwrap(),
            CreateTableOutcome::Created
        );

        let data: BigtableTableData = serde_json::from_value(serde_json::json!({
            "tableName": "t1",
            "rowKeyId": "0",
            "data": [{"columnFamily": "cf1", "columnName": "name", "columnValue": "v1"}]
        }))
        .unwrap();
        service.insert_data("i1", &data).await.unwrap();
        assert_eq!(
            service.read_cell_data("i1", "t1", "0").await.unwrap(),
            ReadOutcome::Found("v1".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_tables_summary() {
        let service = service();
        for name in ["a", "b"] {
            let request = GcpBigtableTable {
                table_name: name.to_string(),
                column_family: Some("cf1".to_string()),
            };
            service.create_table("i1", &request).await.unwrap();
        }

        let summary = service
            .delete_tables(
                "i1",
                &TableConfig {
                    table_list: vec!["a".to_string(), "ghost".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(summary.deleted, vec!["a"]);
        assert_eq!(summary.missing, vec!["ghost"]);
    }

    #[tokio::test]
    async fn test_empty_delete_list_is_rejected_before_lookup() {
        let service = service();
        // unknown instance would be a 404; validation wins
        let err = service
            .delete_tables("unknown", &TableConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Validation(_)));
    }

    #[tokio::test]
    async fn test_count_limit_bounds() {
        let service = service();
        assert!(matches!(
            service.count_rows("i1", "t1", 0).await,
            Err(LookupError::Validation(_))
        ));
        assert!(matches!(
            service.count_rows("i1", "t1", 101).await,
            Err(LookupError::Validation(_))
        ));
        assert_eq!(
            service.count_rows("i1", "t1", 100).await.unwrap(),
            CountOutcome::TableNotFound
        );
    }

    #[tokio::test]
    async fn test_malformed_table_ids_fail_validation() {
        let service = service();
        let create = GcpBigtableTable {
            table_name: "a/b".to_string(),
            column_family: None,
        };
        assert!(matches!(
            service.create_table("i1", &create).await,
            Err(LookupError::Validation(_))
        ));
        assert!(matches!(
            service.read_cell_data("i1", "a b", "0").await,
            Err(LookupError::Validation(_))
        ));
        let delete = TableConfig {
            table_list: vec!["ok".to_string(), "../t".to_string()],
        };
        assert!(matches!(
            service.delete_tables("i1", &delete).await,
            Err(LookupError::Validation(_))
        ));
        assert_eq!(service.operations().registry().instance_ids().count(), 1);
    }
}
