use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use caretrack_core::TenantId;

use super::{DocumentStore, Record, WriteBatch};
use crate::error::InfraError;

/// Typed view over one document table.
pub struct Records<R> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Records<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

fn decode<R: Record>(doc: JsonValue) -> Result<R, InfraError> {
    serde_json::from_value(doc)
        .map_err(|e| InfraError::Serialization(format!("corrupt {} document: {e}", R::TABLE)))
}

impl<R: Record> Records<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn get(&self, tenant_id: TenantId, id: R::Id) -> Result<Option<R>, InfraError> {
        self.store
            .get(R::TABLE, tenant_id, id.into())
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<R>, InfraError> {
        self.store
            .list(R::TABLE, tenant_id)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn list_active(&self, tenant_id: TenantId) -> Result<Vec<R>, InfraError> {
        Ok(self
            .list(tenant_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active())
            .collect())
    }

    /// Rows of every tenant. Only for platform-level callers.
    pub async fn list_all(&self) -> Result<Vec<R>, InfraError> {
        self.store
            .list_all(R::TABLE)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn save(&self, record: &R) -> Result<(), InfraError> {
        let mut batch = WriteBatch::new();
        batch.put(record)?;
        self.store.write_batch(batch).await
    }
}
