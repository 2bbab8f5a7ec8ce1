//! # Lookup Operations
//!
//! Maps table and row operations onto Bigtable handles from the
//! [`ClientRegistry`]. Every operation returns an explicit outcome; the HTTP
//! layer decides how each outcome is reported.

use std::sync::Arc;

use crate::bigtable::{CreateInstanceRequest, RowMutation};
use crate::errors::LookupResult;
use crate::model::ColumnData;
use crate::registry::ClientRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTableOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTableOutcome {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { cells: usize },
    TableNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(String),
    TableNotFound,
    RowNotFound,
    CellNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountOutcome {
    Counted { count: u64, truncated: bool },
    TableNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceOutcome {
    Created,
    AlreadyExists,
}

/// Table and row operations over every registered instance.
///
/// Reads always target the configured `(column_family, column_qualifier)`
/// pair.
#[derive(Debug, Clone)]
pub struct LookupOperations {
    registry: Arc<ClientRegistry>,
    column_family: String,
    column_qualifier: String,
}

impl LookupOperations {
    pub fn new(
        registry: Arc<ClientRegistry>,
        column_family: impl Into<String>,
        column_qualifier: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            column_family: column_family.into(),
            column_qualifier: column_qualifier.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    pub fn column_qualifier(&self) -> &str {
        &self.column_qualifier
    }

    pub async fn create_table(
        &self,
        instance_id: &str,
        table: &str,
        column_family: &str,
    ) -> LookupResult<CreateTableOutcome> {
        let clients = self.registry.instance(instance_id)?;
        if clients.admin.table_exists(table).await? {
            tracing::info!(instance = %instance_id, table = %table, "table already exists");
            return Ok(CreateTableOutcome::AlreadyExists);
        }

        tracing::info!(instance = %instance_id, table = %table, family = %column_family, "creating table");
        match clients
            .admin
            .create_table(table, &[column_family.to_string()])
            .await
        {
            Ok(()) => {
                tracing::info!(instance = %instance_id, table = %table, "table created");
                Ok(CreateTableOutcome::Created)
            }
            // another creator won between the existence check and the create
            Err(e) if e.is_already_exists() => Ok(CreateTableOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_table(
        &self,
        instance_id: &str,
        table: &str,
    ) -> LookupResult<DeleteTableOutcome> {
        let clients = self.registry.instance(instance_id)?;
        tracing::info!(instance = %instance_id, table = %table, "deleting table");
        match clients.admin.delete_table(table).await {
            Ok(()) => {
                tracing::info!(instance = %instance_id, table = %table, "table deleted");
                Ok(DeleteTableOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(instance = %instance_id, table = %table, "delete of non-existent table ignored");
                Ok(DeleteTableOutcome::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write every cell in `cells` to `row_key` as one atomic row mutation
    pub async fn write_row(
        &self,
        instance_id: &str,
        table: &str,
        row_key: &str,
        cells: &[ColumnData],
    ) -> LookupResult<WriteOutcome> {
        let clients = self.registry.instance(instance_id)?;
        if !clients.admin.table_exists(table).await? {
            tracing::info!(instance = %instance_id, table = %table, "write to missing table");
            return Ok(WriteOutcome::TableNotFound);
        }

        let mutation = cells.iter().fold(RowMutation::create(table, row_key), |m, cell| {
            m.set_cell(
                cell.column_family.as_str(),
                cell.column_name.as_bytes(),
                cell.column_value.as_bytes(),
            )
        });

        match clients.data.mutate_row(mutation).await {
            Ok(()) => {
                tracing::info!(
                    instance = %instance_id,
                    table = %table,
                    row_key = %row_key,
                    cells = cells.len(),
                    "row written"
                );
                Ok(WriteOutcome::Written { cells: cells.len() })
            }
            // table dropped after the existence check
            Err(e) if e.is_not_found() => Ok(WriteOutcome::TableNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest value of the configured column in `row_key`
    pub async fn read_cell(
        &self,
        instance_id: &str,
        table: &str,
        row_key: &str,
    ) -> LookupResult<ReadOutcome> {
        let clients = self.registry.instance(instance_id)?;
        tracing::debug!(instance = %instance_id, table = %table, row_key = %row_key, "reading cell");

        let row = match clients.data.read_row(table, row_key.as_bytes()).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::info!(table = %table, row_key = %row_key, "no row for key");
                return Ok(ReadOutcome::RowNotFound);
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(table = %table, "read from missing table");
                return Ok(ReadOutcome::TableNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let cell = row
            .cells_for(&self.column_family, self.column_qualifier.as_bytes())
            .next();
        Ok(match cell {
            Some(cell) => ReadOutcome::Found(cell.value_utf8()),
            None => ReadOutcome::CellNotFound,
        })
    }

    /// Count rows in `table`, stopping after `limit` rows. One extra row is
    /// scanned so a table holding exactly `limit` rows is not reported as
    /// truncated.
    pub async fn count_rows(
        &self,
        instance_id: &str,
        table: &str,
        limit: u64,
    ) -> LookupResult<CountOutcome> {
        let clients = self.registry.instance(instance_id)?;
        match clients.data.scan_row_keys(table, limit.saturating_add(1)).await {
            Ok(rows) => {
                let scanned = rows.len() as u64;
                Ok(CountOutcome::Counted {
                    count: scanned.min(limit),
                    truncated: scanned > limit,
                })
            }
            Err(e) if e.is_not_found() => Ok(CountOutcome::TableNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Create `instance_id` with one cluster in `zone` unless it exists
    pub async fn ensure_instance(
        &self,
        instance_id: &str,
        cluster_id: &str,
        zone: &str,
    ) -> LookupResult<InstanceOutcome> {
        let admin = self.registry.instance_admin();
        if admin.instance_exists(instance_id).await? {
            return Ok(InstanceOutcome::AlreadyExists);
        }

        tracing::info!(instance = %instance_id, cluster = %cluster_id, zone = %zone, "creating instance");
        let request = CreateInstanceRequest::of(instance_id, cluster_id, zone)
            .add_label("name", "kvlookup");
        match admin.create_instance(request).await {
            Ok(()) => Ok(InstanceOutcome::Created),
            Err(e) if e.is_already_exists() => Ok(InstanceOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }
}
