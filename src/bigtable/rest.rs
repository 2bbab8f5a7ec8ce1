//! # Bigtable REST Connector
//!
//! Handles backed by the Bigtable v2 REST/JSON surface:
//! - table admin on `bigtableadmin.googleapis.com/v2/projects/*/instances/*/tables`
//! - row data on `bigtable.googleapis.com/v2/projects/*/instances/*/tables/*:{mutateRow,readRows}`
//! - instance admin on `bigtableadmin.googleapis.com/v2/projects/*/instances`
//!
//! Byte fields travel base64-encoded. `readRows` is a server stream, which the
//! REST surface returns as one JSON array of stream messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Map, Value};

use super::auth::TokenSource;
use super::chunks::{merge_responses, ReadRowsResponse};
use super::client::{
    BigtableConnector, CreateInstanceRequest, DataClient, InstanceAdmin, Row, RowMutation,
    TableAdmin,
};
use super::errors::{BigtableError, BigtableResult};

pub const DEFAULT_ADMIN_ENDPOINT: &str = "https://bigtableadmin.googleapis.com";
pub const DEFAULT_DATA_ENDPOINT: &str = "https://bigtable.googleapis.com";

/// Connection settings for the REST connector
#[derive(Debug)]
pub struct RestSettings {
    pub admin_endpoint: String,
    pub data_endpoint: String,
    pub tokens: TokenSource,
    pub request_timeout: Duration,
}

impl RestSettings {
    /// Google endpoints with the given token source
    pub fn google(tokens: TokenSource) -> Self {
        Self {
            admin_endpoint: DEFAULT_ADMIN_ENDPOINT.to_string(),
            data_endpoint: DEFAULT_DATA_ENDPOINT.to_string(),
            tokens,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct RestInner {
    client: reqwest::Client,
    admin_endpoint: String,
    data_endpoint: String,
    tokens: TokenSource,
}

impl RestInner {
    async fn send(&self, builder: RequestBuilder) -> BigtableResult<Response> {
        let builder = match self.tokens.authorization(&self.client).await? {
            Some(header) => builder.header(AUTHORIZATION, header),
            None => builder,
        };
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        Err(BigtableError::from_status(status, error_message(&body)))
    }
}

// Google APIs wrap failures as {"error": {"code", "message", "status"}}
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

/// Resource ids end up in URL paths, so only the characters Bigtable itself
/// accepts for ids are let through.
fn check_id(kind: &str, id: &str) -> BigtableResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(BigtableError::InvalidArgument(format!(
            "invalid {} id '{}'",
            kind, id
        )))
    }
}

/// Connector producing REST-backed handles that share one HTTP client
#[derive(Debug, Clone)]
pub struct RestConnector {
    inner: Arc<RestInner>,
}

impl RestConnector {
    pub fn new(settings: RestSettings) -> BigtableResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BigtableError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(RestInner {
                client,
                admin_endpoint: settings.admin_endpoint.trim_end_matches('/').to_string(),
                data_endpoint: settings.data_endpoint.trim_end_matches('/').to_string(),
                tokens: settings.tokens,
            }),
        })
    }
}

impl BigtableConnector for RestConnector {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn table_admin(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> BigtableResult<Arc<dyn TableAdmin>> {
        Ok(Arc::new(RestInstanceHandle::new(
            self.inner.clone(),
            project_id,
            instance_id,
        )?))
    }

    fn data_client(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> BigtableResult<Arc<dyn DataClient>> {
        Ok(Arc::new(RestInstanceHandle::new(
            self.inner.clone(),
            project_id,
            instance_id,
        )?))
    }

    fn instance_admin(&self, project_id: &str) -> BigtableResult<Arc<dyn InstanceAdmin>> {
        check_id("project", project_id)?;
        Ok(Arc::new(RestInstanceAdmin {
            inner: self.inner.clone(),
            project_id: project_id.to_string(),
        }))
    }
}

/// Table admin and data access for one instance over REST
#[derive(Debug, Clone)]
pub struct RestInstanceHandle {
    inner: Arc<RestInner>,
    project_id: String,
    instance_id: String,
}

impl RestInstanceHandle {
    fn new(inner: Arc<RestInner>, project_id: &str, instance_id: &str) -> BigtableResult<Self> {
        check_id("project", project_id)?;
        check_id("instance", instance_id)?;
        Ok(Self {
            inner,
            project_id: project_id.to_string(),
            instance_id: instance_id.to_string(),
        })
    }

    fn instance_name(&self) -> String {
        format!("projects/{}/instances/{}", self.project_id, self.instance_id)
    }

    fn admin_tables_url(&self) -> String {
        format!("{}/v2/{}/tables", self.inner.admin_endpoint, self.instance_name())
    }

    fn admin_table_url(&self, table: &str) -> BigtableResult<String> {
        check_id("table", table)?;
        Ok(format!("{}/{}", self.admin_tables_url(), table))
    }

    fn data_table_url(&self, table: &str, method: &str) -> BigtableResult<String> {
        check_id("table", table)?;
        Ok(format!(
            "{}/v2/{}/tables/{}:{}",
            self.inner.data_endpoint,
            self.instance_name(),
            table,
            method
        ))
    }

    async fn read_rows(&self, table: &str, body: Value) -> BigtableResult<Vec<Row>> {
        let url = self.data_table_url(table, "readRows")?;
        let response = self
            .inner
            .send(self.inner.client.post(url).json(&body))
            .await?;
        let messages: Vec<ReadRowsResponse> = response.json().await?;
        merge_responses(messages)
    }
}

#[async_trait]
impl TableAdmin for RestInstanceHandle {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    async fn table_exists(&self, table: &str) -> BigtableResult<bool> {
        let url = self.admin_table_url(table)?;
        let request = self
            .inner
            .client
            .get(url)
            .query(&[("view", "NAME_ONLY")]);
        match self.inner.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_table(&self, table: &str, families: &[String]) -> BigtableResult<()> {
        check_id("table", table)?;
        let column_families: Map<String, Value> = families
            .iter()
            .map(|family| (family.clone(), json!({})))
            .collect();
        let body = json!({
            "tableId": table,
            "table": { "columnFamilies": column_families },
        });

        let request = self.inner.client.post(self.admin_tables_url()).json(&body);
        self.inner.send(request).await?;
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> BigtableResult<()> {
        let url = self.admin_table_url(table)?;
        self.inner.send(self.inner.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl DataClient for RestInstanceHandle {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    async fn mutate_row(&self, mutation: RowMutation) -> BigtableResult<()> {
        let url = self.data_table_url(&mutation.table, "mutateRow")?;
        let mutations: Vec<Value> = mutation
            .cells
            .iter()
            .map(|cell| {
                json!({
                    "setCell": {
                        "familyName": cell.family,
                        "columnQualifier": STANDARD.encode(&cell.qualifier),
                        // server-assigned timestamp
                        "timestampMicros": "-1",
                        "value": STANDARD.encode(&cell.value),
                    }
                })
            })
            .collect();
        let body = json!({
            "rowKey": STANDARD.encode(&mutation.row_key),
            "mutations": mutations,
        });

        self.inner
            .send(self.inner.client.post(url).json(&body))
            .await?;
        Ok(())
    }

    async fn read_row(&self, table: &str, row_key: &[u8]) -> BigtableResult<Option<Row>> {
        let body = json!({
            "rows": { "rowKeys": [STANDARD.encode(row_key)] },
            "rowsLimit": "1",
        });
        let mut rows = self.read_rows(table, body).await?;
        Ok(rows.pop())
    }

    async fn scan_row_keys(&self, table: &str, limit: u64) -> BigtableResult<Vec<Row>> {
        let body = json!({
            "rowsLimit": limit.to_string(),
            "filter": {
                "chain": {
                    "filters": [
                        { "cellsPerRowLimitFilter": 1 },
                        { "stripValueTransformer": true },
                    ]
                }
            },
        });
        self.read_rows(table, body).await
    }
}

/// Instance administration for one project over REST
#[derive(Debug, Clone)]
pub struct RestInstanceAdmin {
    inner: Arc<RestInner>,
    project_id: String,
}

impl RestInstanceAdmin {
    fn instances_url(&self) -> String {
        format!(
            "{}/v2/projects/{}/instances",
            self.inner.admin_endpoint, self.project_id
        )
    }
}

#[async_trait]
impl InstanceAdmin for RestInstanceAdmin {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn instance_exists(&self, instance_id: &str) -> BigtableResult<bool> {
        check_id("instance", instance_id)?;
        let url = format!("{}/{}", self.instances_url(), instance_id);
        match self.inner.send(self.inner.client.get(url)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_instance(&self, request: CreateInstanceRequest) -> BigtableResult<()> {
        check_id("instance", &request.instance_id)?;
        check_id("cluster", &request.cluster_id)?;

        let labels: Map<String, Value> = request
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let mut clusters = Map::new();
        clusters.insert(
            request.cluster_id.clone(),
            json!({
                "location": format!("projects/{}/locations/{}", self.project_id, request.zone),
                "serveNodes": request.serve_nodes,
                "defaultStorageType": "SSD",
            }),
        );
        let body = json!({
            "instanceId": request.instance_id,
            "instance": {
                "displayName": request.instance_id,
                "type": "PRODUCTION",
                "labels": labels,
            },
            "clusters": clusters,
        });

        let response = self
            .inner
            .send(self.inner.client.post(self.instances_url()).json(&body))
            .await?;
        // Instance creation is a long-running operation; it is not awaited here.
        let operation: Value = response.json().await.unwrap_or(Value::Null);
        let operation_name = operation.get("name").and_then(Value::as_str).unwrap_or("");
        tracing::info!(
            instance = %request.instance_id,
            operation = %operation_name,
            "instance creation started"
        );
        Ok(())
    }
}
