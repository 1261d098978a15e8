use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use caretrack_core::TenantId;

use super::{DocumentStore, WriteBatch, WriteOp};
use crate::error::InfraError;

#[derive(Debug, Clone)]
struct Stored {
    tenant_id: TenantId,
    body: JsonValue,
}

/// In-memory document store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<BTreeMap<(&'static str, Uuid), Stored>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> InfraError {
    InfraError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, table: &'static str, tenant_id: TenantId, id: Uuid) -> Result<Option<JsonValue>, InfraError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&(table, id))
            .filter(|s| s.tenant_id == tenant_id)
            .map(|s| s.body.clone()))
    }

    async fn list(&self, table: &'static str, tenant_id: TenantId) -> Result<Vec<JsonValue>, InfraError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|((t, _), s)| *t == table && s.tenant_id == tenant_id)
            .map(|(_, s)| s.body.clone())
            .collect())
    }

    async fn list_all(&self, table: &'static str) -> Result<Vec<JsonValue>, InfraError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, s)| s.body.clone())
            .collect())
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<(), InfraError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        // Validate the whole batch before touching the map.
        for op in batch.ops() {
            let (table, tenant_id, id) = match op {
                WriteOp::Put { table, tenant_id, id, .. } | WriteOp::Delete { table, tenant_id, id } => {
                    (*table, *tenant_id, *id)
                }
            };
            if let Some(existing) = map.get(&(table, id)) {
                if existing.tenant_id != tenant_id {
                    return Err(InfraError::TenantIsolation(format!(
                        "{table}/{id} belongs to another tenant"
                    )));
                }
            }
        }

        for op in batch.into_ops() {
            match op {
                WriteOp::Put { table, tenant_id, id, body } => {
                    map.insert((table, id), Stored { tenant_id, body });
                }
                WriteOp::Delete { table, id, .. } => {
                    map.remove(&(table, id));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Record, Records};
    use caretrack_core::DomainResult;
    use caretrack_organisations::Organisation;
    use caretrack_teams::{Team, TeamDetails};
    use chrono::Utc;
    use std::sync::Arc;

    fn team(tenant: TenantId, name: &str) -> DomainResult<Team> {
        Team::create(
            tenant,
            TeamDetails {
                name: name.into(),
                description: None,
                parent_team_id: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn reads_are_tenant_scoped() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let teams = Records::<Team>::new(store.clone());
        let (a, b) = (TenantId::new(), TenantId::new());
        let north = team(a, "North").unwrap();
        teams.save(&north).await.unwrap();
        teams.save(&team(b, "South").unwrap()).await.unwrap();

        assert_eq!(teams.get(a, north.id).await.unwrap(), Some(north.clone()));
        assert_eq!(teams.get(b, north.id).await.unwrap(), None);
        assert_eq!(teams.list(a).await.unwrap(), vec![north]);
        assert_eq!(teams.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batches_are_all_or_nothing() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let (a, b) = (TenantId::new(), TenantId::new());
        let north = team(a, "North").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(&north).unwrap();
        store.write_batch(batch).await.unwrap();

        let mut hijacked = north.clone();
        hijacked.tenant_id = b;
        let fresh = team(b, "East").unwrap();
        let mut batch = WriteBatch::new();
        batch.put(&fresh).unwrap().put(&hijacked).unwrap();
        let err = store.write_batch(batch).await.unwrap_err();
        assert!(matches!(err, InfraError::TenantIsolation(_)));
        assert!(store.list(Team::TABLE, b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inactive_rows_drop_out_of_list_active() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let orgs = Records::<Organisation>::new(store);
        let mut org = Organisation::new("Acme Care", Utc::now()).unwrap();
        orgs.save(&org).await.unwrap();
        assert_eq!(orgs.list_active(org.id).await.unwrap().len(), 1);

        org.is_active = false;
        orgs.save(&org).await.unwrap();
        assert!(orgs.list_active(org.id).await.unwrap().is_empty());
        assert_eq!(orgs.list(org.id).await.unwrap().len(), 1);
    }
}
