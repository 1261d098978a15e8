//! Postgres-backed document store.
//!
//! Each record table has the shape `(id UUID PK, tenant_id UUID, body JSONB,
//! updated_at)`, created by the migrations under `migrations/`. Table names
//! only ever come from [`Record::TABLE`](super::Record::TABLE) constants.
//!
//! ## Error Mapping
//!
//! | SQLx error | Result |
//! |------------|--------|
//! | Put hitting an id owned by another tenant | `TenantIsolation` |
//! | Unique violation (`23505`) | `Conflict` |
//! | Any other error | `Store` |

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use caretrack_core::TenantId;

use super::{DocumentStore, TABLES, WriteBatch, WriteOp};
use crate::error::InfraError;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

const UNIQUE_VIOLATION: &str = "23505";

fn database_error(operation: &str, code: Option<&str>, message: &str) -> InfraError {
    match code {
        Some(UNIQUE_VIOLATION) => InfraError::Conflict(format!("{operation}: {message}")),
        _ => InfraError::Store(format!("database error in {operation}: {message}")),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> InfraError {
    match err {
        sqlx::Error::Database(db_err) => database_error(operation, db_err.code().as_deref(), db_err.message()),
        sqlx::Error::PoolClosed => InfraError::Store(format!("connection pool closed in {operation}")),
        other => InfraError::Store(format!("sqlx error in {operation}: {other}")),
    }
}

fn checked_table(table: &'static str) -> Result<&'static str, InfraError> {
    if TABLES.contains(&table) {
        Ok(table)
    } else {
        Err(InfraError::Store(format!("unknown table '{table}'")))
    }
}

fn bodies(rows: Vec<sqlx::postgres::PgRow>, operation: &str) -> Result<Vec<JsonValue>, InfraError> {
    rows.iter()
        .map(|row| row.try_get::<JsonValue, _>("body").map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, InfraError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| InfraError::Store(format!("migration failed: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get(&self, table: &'static str, tenant_id: TenantId, id: Uuid) -> Result<Option<JsonValue>, InfraError> {
        let table = checked_table(table)?;
        let row = sqlx::query(&format!("SELECT body FROM {table} WHERE tenant_id = $1 AND id = $2"))
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.map(|r| r.try_get::<JsonValue, _>("body").map_err(|e| map_sqlx_error("get", e)))
            .transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list(&self, table: &'static str, tenant_id: TenantId) -> Result<Vec<JsonValue>, InfraError> {
        let table = checked_table(table)?;
        let rows = sqlx::query(&format!("SELECT body FROM {table} WHERE tenant_id = $1 ORDER BY id ASC"))
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        bodies(rows, "list")
    }

    #[instrument(skip(self), err)]
    async fn list_all(&self, table: &'static str) -> Result<Vec<JsonValue>, InfraError> {
        let table = checked_table(table)?;
        let rows = sqlx::query(&format!("SELECT body FROM {table} ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_all", e))?;
        bodies(rows, "list_all")
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()), err)]
    async fn write_batch(&self, batch: WriteBatch) -> Result<(), InfraError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        for op in batch.into_ops() {
            match op {
                WriteOp::Put { table, tenant_id, id, body } => {
                    let table = checked_table(table)?;
                    // The WHERE clause turns a cross-tenant id clash into a no-op,
                    // which is then reported instead of silently applied.
                    let result = sqlx::query(&format!(
                        "INSERT INTO {table} (id, tenant_id, body, updated_at) VALUES ($1, $2, $3, NOW()) \
                         ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW() \
                         WHERE {table}.tenant_id = EXCLUDED.tenant_id"
                    ))
                    .bind(id)
                    .bind(tenant_id.as_uuid())
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("put", e))?;
                    if result.rows_affected() == 0 {
                        return Err(InfraError::TenantIsolation(format!("{table}/{id} belongs to another tenant")));
                    }
                }
                WriteOp::Delete { table, tenant_id, id } => {
                    let table = checked_table(table)?;
                    sqlx::query(&format!("DELETE FROM {table} WHERE tenant_id = $1 AND id = $2"))
                        .bind(tenant_id.as_uuid())
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("delete", e))?;
                }
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn ping(&self) -> Result<(), InfraError> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}
