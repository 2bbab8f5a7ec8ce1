//! Lookup HTTP Routes
//!
//! `/v1/{instanceID}/...` endpoints for table management, row writes, cell
//! reads and bounded row counts.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::errors::{ApiError, ApiResult};
use crate::model::{BigtableTableData, GcpBigtableTable, TableConfig};
use crate::operations::{CountOutcome, CreateTableOutcome, ReadOutcome, WriteOutcome};
use crate::service::KvLookupService;

pub const TABLE_EXISTS_MESSAGE: &str = "Table with same name exists in bigtable already";
pub const MISSING_TABLE_MESSAGE: &str = "Tried to insert data into table that doesn't exist";

// ==================
// Shared State
// ==================

/// State shared across lookup handlers
pub struct LookupState {
    pub service: KvLookupService,
}

impl LookupState {
    pub fn new(service: KvLookupService) -> Self {
        Self { service }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadCellQuery {
    pub table_name: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRowsQuery {
    pub table_name: String,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRowsResponse {
    pub table_name: String,
    pub count: u64,
    pub truncated: bool,
}

// ==================
// Lookup Routes
// ==================

/// Create lookup routes
pub fn lookup_routes(state: Arc<LookupState>) -> Router {
    Router::new()
        .route("/:instance_id/readCellData", get(read_cell_data_handler))
        .route("/:instance_id/createTable", post(create_table_handler))
        .route("/:instance_id/deleteTable", delete(delete_table_handler))
        .route("/:instance_id/insertData", post(insert_data_handler))
        .route("/:instance_id/countRows", get(count_rows_handler))
        .with_state(state)
}

fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

// ==================
// Handlers
// ==================

async fn read_cell_data_handler(
    State(state): State<Arc<LookupState>>,
    Path(instance_id): Path<String>,
    query: Result<Query<ReadCellQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    tracing::info!(instance = %instance_id, table = %query.table_name, id = %query.id, "read cell data");
    match state
        .service
        .read_cell_data(&instance_id, &query.table_name, &query.id)
        .await?
    {
        ReadOutcome::Found(value) => Ok(text(StatusCode::OK, value)),
        ReadOutcome::TableNotFound | ReadOutcome::RowNotFound | ReadOutcome::CellNotFound => {
            Err(ApiError::not_found())
        }
    }
}

async fn create_table_handler(
    State(state): State<Arc<LookupState>>,
    Path(instance_id): Path<String>,
    request: Result<Json<GcpBigtableTable>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = request?;
    match state.service.create_table(&instance_id, &request).await? {
        CreateTableOutcome::Created => Ok(StatusCode::OK.into_response()),
        CreateTableOutcome::AlreadyExists => {
            Ok(text(StatusCode::ALREADY_REPORTED, TABLE_EXISTS_MESSAGE))
        }
    }
}

async fn delete_table_handler(
    State(state): State<Arc<LookupState>>,
    Path(instance_id): Path<String>,
    request: Result<Json<TableConfig>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = request?;
    tracing::info!(instance = %instance_id, tables = ?request.table_list, "deleting tables");
    let summary = state.service.delete_tables(&instance_id, &request).await?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

async fn insert_data_handler(
    State(state): State<Arc<LookupState>>,
    Path(instance_id): Path<String>,
    request: Result<Json<BigtableTableData>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = request?;
    tracing::info!(instance = %instance_id, table = %request.table_name, id = %request.row_key_id, "writing row");
    match state.service.insert_data(&instance_id, &request).await? {
        WriteOutcome::Written { .. } => Ok(StatusCode::OK.into_response()),
        WriteOutcome::TableNotFound => Err(ApiError::NotFound(MISSING_TABLE_MESSAGE.to_string())),
    }
}

async fn count_rows_handler(
    State(state): State<Arc<LookupState>>,
    Path(instance_id): Path<String>,
    query: Result<Query<CountRowsQuery>, QueryRejection>,
) -> ApiResult<Json<CountRowsResponse>> {
    let Query(query) = query?;
    match state
        .service
        .count_rows(&instance_id, &query.table_name, query.limit)
        .await?
    {
        CountOutcome::Counted { count, truncated } => Ok(Json(CountRowsResponse {
            table_name: query.table_name,
            count,
            truncated,
        })),
        CountOutcome::TableNotFound => Err(ApiError::not_found()),
    }
}
