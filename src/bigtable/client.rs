//! # Bigtable Client Handles
//!
//! Capability-typed handles over a Bigtable deployment. Table administration,
//! row data access and instance administration are separate traits so each
//! caller only holds the capability it needs.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::BigtableResult;

/// A single cell version read back from a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCell {
    pub family: String,
    pub qualifier: Vec<u8>,
    pub timestamp_micros: i64,
    pub value: Vec<u8>,
}

impl RowCell {
    /// Cell value decoded as UTF-8, replacing invalid sequences
    pub fn value_utf8(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// A row read back from a table.
///
/// Cells are grouped by family and qualifier; within one column the newest
/// version comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: Vec<u8>,
    pub cells: Vec<RowCell>,
}

impl Row {
    /// All versions of the `(family, qualifier)` column, newest first
    pub fn cells_for<'a>(
        &'a self,
        family: &'a str,
        qualifier: &'a [u8],
    ) -> impl Iterator<Item = &'a RowCell> + 'a {
        self.cells
            .iter()
            .filter(move |c| c.family == family && c.qualifier == qualifier)
    }

    pub fn key_utf8(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Set one cell at the server-assigned timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCell {
    pub family: String,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
}

impl SetCell {
    pub fn new(
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }
}

/// Mutations applied atomically to one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    pub table: String,
    pub row_key: Vec<u8>,
    pub cells: Vec<SetCell>,
}

impl RowMutation {
    pub fn create(table: impl Into<String>, row_key: impl Into<Vec<u8>>) -> Self {
        Self {
            table: table.into(),
            row_key: row_key.into(),
            cells: Vec::new(),
        }
    }

    pub fn set_cell(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.cells.push(SetCell::new(family, qualifier, value));
        self
    }
}

/// Parameters for provisioning a new instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstanceRequest {
    pub instance_id: String,
    pub cluster_id: String,
    pub zone: String,
    pub serve_nodes: u32,
    pub labels: Vec<(String, String)>,
}

impl CreateInstanceRequest {
    /// One SSD node in `zone`
    pub fn of(
        instance_id: impl Into<String>,
        cluster_id: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            cluster_id: cluster_id.into(),
            zone: zone.into(),
            serve_nodes: 1,
            labels: Vec::new(),
        }
    }

    pub fn add_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }
}

/// Table administration scoped to one instance
#[async_trait]
pub trait TableAdmin: Send + Sync {
    /// Instance this handle is bound to
    fn instance_id(&self) -> &str;

    async fn table_exists(&self, table: &str) -> BigtableResult<bool>;

    /// Create `table` with the given column families.
    ///
    /// Fails with `AlreadyExists` when the table is present.
    async fn create_table(&self, table: &str, families: &[String]) -> BigtableResult<()>;

    /// Fails with `NotFound` when the table is absent.
    async fn delete_table(&self, table: &str) -> BigtableResult<()>;
}

/// Row reads and writes scoped to one instance
#[async_trait]
pub trait DataClient: Send + Sync {
    fn instance_id(&self) -> &str;

    /// Apply every mutation in `mutation` to its row atomically
    async fn mutate_row(&self, mutation: RowMutation) -> BigtableResult<()>;

    /// `Ok(None)` when the row holds no cells
    async fn read_row(&self, table: &str, row_key: &[u8]) -> BigtableResult<Option<Row>>;

    /// Read at most `limit` rows in key order with cell values stripped
    async fn scan_row_keys(&self, table: &str, limit: u64) -> BigtableResult<Vec<Row>>;
}

/// Project-wide instance administration
#[async_trait]
pub trait InstanceAdmin: Send + Sync {
    fn project_id(&self) -> &str;

    async fn instance_exists(&self, instance_id: &str) -> BigtableResult<bool>;

    async fn create_instance(&self, request: CreateInstanceRequest) -> BigtableResult<()>;
}

/// Builds client handles for a Bigtable deployment
pub trait BigtableConnector: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    fn table_admin(&self, project_id: &str, instance_id: &str)
        -> BigtableResult<Arc<dyn TableAdmin>>;

    fn data_client(&self, project_id: &str, instance_id: &str)
        -> BigtableResult<Arc<dyn DataClient>>;

    fn instance_admin(&self, project_id: &str) -> BigtableResult<Arc<dyn InstanceAdmin>>;
}
