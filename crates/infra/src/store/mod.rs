//! Tenant-scoped document persistence.
//!
//! Every record type lives in its own table of JSON documents keyed by id,
//! with the owning tenant alongside. Reads are always tenant-scoped except
//! [`DocumentStore::list_all`], which platform-level code (seat approvals,
//! the tender check job) uses deliberately.
//!
//! Writes go through a [`WriteBatch`] so that a mutation, its side effects
//! and its audit entry land together or not at all.

mod memory;
mod postgres;
mod record;
mod records;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use caretrack_core::TenantId;

use crate::error::InfraError;

pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use record::{Record, TABLES};
pub use records::Records;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put {
        table: &'static str,
        tenant_id: TenantId,
        id: Uuid,
        body: JsonValue,
    },
    Delete {
        table: &'static str,
        tenant_id: TenantId,
        id: Uuid,
    },
}

impl WriteOp {
    pub fn table(&self) -> &'static str {
        match self {
            WriteOp::Put { table, .. } | WriteOp::Delete { table, .. } => table,
        }
    }
}

/// Ordered set of writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<&mut Self, InfraError> {
        self.ops.push(WriteOp::Put {
            table: R::TABLE,
            tenant_id: record.tenant_id(),
            id: record.uuid(),
            body: serde_json::to_value(record)?,
        });
        Ok(self)
    }

    pub fn delete<R: Record>(&mut self, record: &R) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            table: R::TABLE,
            tenant_id: record.tenant_id(),
            id: record.uuid(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, table: &'static str, tenant_id: TenantId, id: Uuid) -> Result<Option<JsonValue>, InfraError>;

    /// Documents of one tenant, oldest id first.
    async fn list(&self, table: &'static str, tenant_id: TenantId) -> Result<Vec<JsonValue>, InfraError>;

    /// Documents of every tenant, oldest id first.
    async fn list_all(&self, table: &'static str) -> Result<Vec<JsonValue>, InfraError>;

    /// Apply every op or none. A put may not move an existing id to another
    /// tenant.
    async fn write_batch(&self, batch: WriteBatch) -> Result<(), InfraError>;

    async fn ping(&self) -> Result<(), InfraError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn get(&self, table: &'static str, tenant_id: TenantId, id: Uuid) -> Result<Option<JsonValue>, InfraError> {
        (**self).get(table, tenant_id, id).await
    }

    async fn list(&self, table: &'static str, tenant_id: TenantId) -> Result<Vec<JsonValue>, InfraError> {
        (**self).list(table, tenant_id).await
    }

    async fn list_all(&self, table: &'static str) -> Result<Vec<JsonValue>, InfraError> {
        (**self).list_all(table).await
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<(), InfraError> {
        (**self).write_batch(batch).await
    }

    async fn ping(&self) -> Result<(), InfraError> {
        (**self).ping().await
    }
}
