//! # In-Memory Bigtable
//!
//! A process-local stand-in for a Bigtable deployment, used for local runs
//! and tests. It keeps the behaviors callers depend on:
//! - tables are scoped per `(project, instance)`
//! - writes to an undeclared column family are rejected
//! - every `SetCell` adds a new version; reads return newest first
//! - a `MutateRow` either applies every cell or none

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::client::{
    BigtableConnector, CreateInstanceRequest, DataClient, InstanceAdmin, Row, RowCell,
    RowMutation, TableAdmin,
};
use super::errors::{BigtableError, BigtableResult};

type ColumnKey = (String, Vec<u8>);

#[derive(Debug, Clone)]
struct CellVersion {
    timestamp_micros: i64,
    value: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    families: BTreeSet<String>,
    rows: BTreeMap<Vec<u8>, BTreeMap<ColumnKey, Vec<CellVersion>>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // keyed by "projects/{p}/instances/{i}/tables/{t}"
    tables: HashMap<String, MemoryTable>,
    instances: HashSet<String>,
}

/// Shared in-memory deployment; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryBigtable {
    state: Arc<RwLock<MemoryState>>,
    clock: Arc<AtomicI64>,
}

fn table_path(project_id: &str, instance_id: &str, table: &str) -> String {
    format!("projects/{}/instances/{}/tables/{}", project_id, instance_id, table)
}

fn instance_path(project_id: &str, instance_id: &str) -> String {
    format!("projects/{}/instances/{}", project_id, instance_id)
}

fn poisoned() -> BigtableError {
    BigtableError::Internal("in-memory bigtable state poisoned".to_string())
}

impl MemoryBigtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly increasing microsecond timestamps
    fn next_timestamp(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        let mut last = self.clock.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .clock
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Number of tables across every instance
    pub fn table_count(&self) -> usize {
        self.state.read().map(|s| s.tables.len()).unwrap_or(0)
    }
}

/// Connector handing out handles over one [`MemoryBigtable`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    backend: MemoryBigtable,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: MemoryBigtable) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &MemoryBigtable {
        &self.backend
    }
}

impl BigtableConnector for MemoryConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn table_admin(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> BigtableResult<Arc<dyn TableAdmin>> {
        Ok(Arc::new(MemoryInstanceHandle::new(
            self.backend.clone(),
            project_id,
            instance_id,
        )))
    }

    fn data_client(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> BigtableResult<Arc<dyn DataClient>> {
        Ok(Arc::new(MemoryInstanceHandle::new(
            self.backend.clone(),
            project_id,
            instance_id,
        )))
    }

    fn instance_admin(&self, project_id: &str) -> BigtableResult<Arc<dyn InstanceAdmin>> {
        Ok(Arc::new(MemoryInstanceAdmin {
            backend: self.backend.clone(),
            project_id: project_id.to_string(),
        }))
    }
}

/// Table admin and data access for one instance of the in-memory deployment
#[derive(Debug, Clone)]
pub struct MemoryInstanceHandle {
    backend: MemoryBigtable,
    project_id: String,
    instance_id: String,
}

impl MemoryInstanceHandle {
    fn new(backend: MemoryBigtable, project_id: &str, instance_id: &str) -> Self {
        Self {
            backend,
            project_id: project_id.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    fn path(&self, table: &str) -> String {
        table_path(&self.project_id, &self.instance_id, table)
    }
}

#[async_trait]
impl TableAdmin for MemoryInstanceHandle {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    async fn table_exists(&self, table: &str) -> BigtableResult<bool> {
        let state = self.backend.state.read().map_err(|_| poisoned())?;
        Ok(state.tables.contains_key(&self.path(table)))
    }

    async fn create_table(&self, table: &str, families: &[String]) -> BigtableResult<()> {
        if table.trim().is_empty() {
            return Err(BigtableError::InvalidArgument(
                "table id must not be empty".to_string(),
            ));
        }
        let path = self.path(table);
        let mut state = self.backend.state.write().map_err(|_| poisoned())?;
        if state.tables.contains_key(&path) {
            return Err(BigtableError::AlreadyExists(path));
        }
        let table = MemoryTable {
            families: families.iter().cloned().collect(),
            rows: BTreeMap::new(),
        };
        state.tables.insert(path, table);
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> BigtableResult<()> {
        let path = self.path(table);
        let mut state = self.backend.state.write().map_err(|_| poisoned())?;
        match state.tables.remove(&path) {
            Some(_) => Ok(()),
            None => Err(BigtableError::NotFound(path)),
        }
    }
}

#[async_trait]
impl DataClient for MemoryInstanceHandle {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    async fn mutate_row(&self, mutation: RowMutation) -> BigtableResult<()> {
        let path = self.path(&mutation.table);
        let mut state = self.backend.state.write().map_err(|_| poisoned())?;
        let table = state
            .tables
            .get_mut(&path)
            .ok_or_else(|| BigtableError::NotFound(path.clone()))?;

        // Validate everything before touching the row
        if let Some(bad) = mutation
            .cells
            .iter()
            .find(|c| !table.families.contains(&c.family))
        {
            return Err(BigtableError::InvalidArgument(format!(
                "column family '{}' does not exist in {}",
                bad.family, path
            )));
        }
        if mutation.cells.is_empty() {
            return Err(BigtableError::InvalidArgument(
                "no mutations provided".to_string(),
            ));
        }

        let row = table.rows.entry(mutation.row_key).or_default();
        for cell in mutation.cells {
            let version = CellVersion {
                timestamp_micros: self.backend.next_timestamp(),
                value: cell.value,
            };
            row.entry((cell.family, cell.qualifier))
                .or_default()
                .insert(0, version);
        }
        Ok(())
    }

    async fn read_row(&self, table: &str, row_key: &[u8]) -> BigtableResult<Option<Row>> {
        let path = self.path(table);
        let state = self.backend.state.read().map_err(|_| poisoned())?;
        let table = state
            .tables
            .get(&path)
            .ok_or_else(|| BigtableError::NotFound(path.clone()))?;

        Ok(table
            .rows
            .get(row_key)
            .filter(|columns| !columns.is_empty())
            .map(|columns| Row {
                key: row_key.to_vec(),
                cells: flatten(columns, true),
            }))
    }

    async fn scan_row_keys(&self, table: &str, limit: u64) -> BigtableResult<Vec<Row>> {
        let path = self.path(table);
        let state = self.backend.state.read().map_err(|_| poisoned())?;
        let table = state
            .tables
            .get(&path)
            .ok_or_else(|| BigtableError::NotFound(path.clone()))?;

        Ok(table
            .rows
            .iter()
            .filter(|(_, columns)| !columns.is_empty())
            .take(limit as usize)
            .map(|(key, columns)| Row {
                key: key.clone(),
                cells: flatten(columns, false),
            })
            .collect())
    }
}

fn flatten(columns: &BTreeMap<ColumnKey, Vec<CellVersion>>, with_values: bool) -> Vec<RowCell> {
    columns
        .iter()
        .flat_map(|((family, qualifier), versions)| {
            versions.iter().map(move |v| RowCell {
                family: family.clone(),
                qualifier: qualifier.clone(),
                timestamp_micros: v.timestamp_micros,
                value: if with_values { v.value.clone() } else { Vec::new() },
            })
        })
        .collect()
}

/// Instance administration over the in-memory deployment
#[derive(Debug, Clone)]
pub struct MemoryInstanceAdmin {
    backend: MemoryBigtable,
    project_id: String,
}

#[async_trait]
impl InstanceAdmin for MemoryInstanceAdmin {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn instance_exists(&self, instance_id: &str) -> BigtableResult<bool> {
        let state = self.backend.state.read().map_err(|_| poisoned())?;
        Ok(state
            .instances
            .contains(&instance_path(&self.project_id, instance_id)))
    }

    async fn create_instance(&self, request: CreateInstanceRequest) -> BigtableResult<()> {
        let path = instance_path(&self.project_id, &request.instance_id);
        let mut state = self.backend.state.write().map_err(|_| poisoned())?;
        if !state.instances.insert(path.clone()) {
            return Err(BigtableError::AlreadyExists(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(backend: &MemoryBigtable, instance: &str) -> MemoryInstanceHandle {
        MemoryInstanceHandle::new(backend.clone(), "p", instance)
    }

    #[tokio::test]
    async fn test_create_and_delete_table() {
        let backend = MemoryBigtable::new();
        let h = handle(&backend, "i1");

        h.create_table("t1", &["cf1".to_string()]).await.unwrap();
        assert!(h.table_exists("t1").await.unwrap());

        let dup = h.create_table("t1", &["cf1".to_string()]).await;
        assert!(dup.unwrap_err().is_already_exists());

        h.delete_table("t1").await.unwrap();
        assert!(!h.table_exists("t1").await.unwrap());
        assert!(h.delete_table("t1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tables_are_scoped_per_instance() {
        let backend = MemoryBigtable::new();
        let a = handle(&backend, "a");
        let b = handle(&backend, "b");

        a.create_table("t1", &["cf1".to_string()]).await.unwrap();
        assert!(!b.table_exists("t1").await.unwrap());
        assert_eq!(backend.table_count(), 1);
    }

    #[tokio::test]
    async fn test_newest_version_first() {
        let backend = MemoryBigtable::new();
        let h = handle(&backend, "i1");
        h.create_table("t1", &["cf1".to_string()]).await.unwrap();

        h.mutate_row(RowMutation::create("t1", "0").set_cell("cf1", "name", "v1"))
            .await
            .unwrap();
        h.mutate_row(RowMutation::create("t1", "0").set_cell("cf1", "name", "v2"))
            .await
            .unwrap();

        let row = h.read_row("t1", b"0").await.unwrap().unwrap();
        let cells: Vec<&RowCell> = row.cells_for("cf1", b"name").collect();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].value, b"v2");
        assert!(cells[0].timestamp_micros > cells[1].timestamp_micros);
    }

    #[tokio::test]
    async fn test_unknown_family_rejects_whole_mutation() {
        let backend = MemoryBigtable::new();
        let h = handle(&backend, "i1");
        h.create_table("t1", &["cf1".to_string()]).await.unwrap();

        let mutation = RowMutation::create("t1", "0")
            .set_cell("cf1", "name", "v1")
            .set_cell("missing", "name", "v1");
        let err = h.mutate_row(mutation).await.unwrap_err();
        assert!(matches!(err, BigtableError::InvalidArgument(_)));
        assert!(h.read_row("t1", b"0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_missing_table_is_not_found() {
        let backend = MemoryBigtable::new();
        let h = handle(&backend, "i1");
        assert!(h.read_row("nope", b"0").await.unwrap_err().is_not_found());
        assert!(h.scan_row_keys("nope", 10).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_scan_respects_limit_and_strips_values() {
        let backend = MemoryBigtable::new();
        let h = handle(&backend, "i1");
        h.create_table("t1", &["cf1".to_string()]).await.unwrap();
        for key in ["a", "b", "c"] {
            h.mutate_row(RowMutation::create("t1", key).set_cell("cf1", "q", "value"))
                .await
                .unwrap();
        }

        let rows = h.scan_row_keys("t1", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, b"a");
        assert!(rows[0].cells.iter().all(|c| c.value.is_empty()));
    }

    #[tokio::test]
    async fn test_instance_admin() {
        let connector = MemoryConnector::new();
        let admin = connector.instance_admin("p").unwrap();
        assert!(!admin.instance_exists("i1").await.unwrap());

        admin
            .create_instance(CreateInstanceRequest::of("i1", "c1", "us-east4-a"))
            .await
            .unwrap();
        assert!(admin.instance_exists("i1").await.unwrap());

        let again = admin
            .create_instance(CreateInstanceRequest::of("i1", "c1", "us-east4-a"))
            .await;
        assert!(again.unwrap_err().is_already_exists());
    }
}
