//! In-memory store
//!
//! Rows live in `Arc<Mutex<HashMap>>` tables; every operation holds a table
//! lock only for the duration of one read or write. Clones share the tables.

use crate::error::StoreError;
use crate::filter::{AllocationFilter, BlockFilter};
use crate::lock::SyncLockGuard;
use crate::store_trait::Storer;
use chrono::Utc;
use ipam_model::{cidr, Allocation, Block, CloudConnection, CloudTracked, Pool};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

type Table<T> = Arc<Mutex<HashMap<Uuid, T>>>;

/// In-process `Storer`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    connections: Table<CloudConnection>,
    pools: Table<Pool>,
    blocks: Table<Block>,
    allocations: Table<Allocation>,
    sync_locks: Arc<Mutex<HashSet<Uuid>>>,
}

/// Initial contents for a `MemoryStore`, usually read from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub connections: Vec<CloudConnection>,
    #[serde(default)]
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl Seed {
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Seed(format!("failed to parse {}: {}", path.display(), e)))
    }
}

/// Releases a held sync lock on drop
struct HeldSyncLock {
    connection_id: Uuid,
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for HeldSyncLock {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.connection_id);
        debug!("Released sync lock for connection {}", self.connection_id);
    }
}

fn guard<T>(table: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    table.lock().map_err(|e| StoreError::Lock(e.to_string()))
}

fn insert_row<T: CloudTracked + Clone>(table: &Mutex<HashMap<Uuid, T>>, row: &T, kind: &str) -> Result<(), StoreError> {
    if row.id().is_nil() {
        return Err(StoreError::InvalidInput(format!("{} '{}' has no id", kind, row.name())));
    }
    let mut rows = guard(table)?;
    if rows.contains_key(&row.id()) {
        return Err(StoreError::Conflict(format!("{} {} already exists", kind, row.id())));
    }
    rows.insert(row.id(), row.clone());
    Ok(())
}

fn get_row<T: Clone>(table: &Mutex<HashMap<Uuid, T>>, id: Uuid, kind: &str) -> Result<T, StoreError> {
    guard(table)?
        .get(&id)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
}

fn replace_row<T: CloudTracked + Clone>(table: &Mutex<HashMap<Uuid, T>>, row: &T, kind: &str) -> Result<(), StoreError> {
    let mut rows = guard(table)?;
    match rows.get_mut(&row.id()) {
        Some(existing) => {
            *existing = row.clone();
            Ok(())
        }
        None => Err(StoreError::NotFound(format!("{} {}", kind, row.id()))),
    }
}

fn remove_row<T>(table: &Mutex<HashMap<Uuid, T>>, id: Uuid, kind: &str) -> Result<(), StoreError> {
    guard(table)?
        .remove(&id)
        .map(|_| ())
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))
}

/// Sets `deleted_at` unless it is already set
fn soft_delete_row<T: CloudTracked>(
    table: &Mutex<HashMap<Uuid, T>>,
    id: Uuid,
    kind: &str,
    mark: impl FnOnce(&mut T),
) -> Result<(), StoreError> {
    let mut rows = guard(table)?;
    let row = rows
        .get_mut(&id)
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, id)))?;
    if row.deleted_at().is_none() {
        mark(row);
    }
    Ok(())
}

/// Rows matching `keep`, ordered by name then id
fn list_rows<T: CloudTracked + Clone>(
    table: &Mutex<HashMap<Uuid, T>>,
    keep: impl Fn(&T) -> bool,
) -> Result<Vec<T>, StoreError> {
    let mut rows: Vec<T> = guard(table)?.values().filter(|row| keep(row)).cloned().collect();
    rows.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
    Ok(rows)
}

/// Rejects a native pool overlapping a live sibling (same organization and parent).
///
/// Callers hold the `pools` guard across this check and their write.
fn check_sibling_overlap(pools: &HashMap<Uuid, Pool>, pool: &Pool) -> Result<(), StoreError> {
    if pool.identity.has_external_id() || pool.cidr.is_empty() {
        return Ok(());
    }
    for sibling in pools.values() {
        if sibling.id == pool.id
            || sibling.deleted_at.is_some()
            || sibling.organization_id != pool.organization_id
            || sibling.parent_pool_id != pool.parent_pool_id
            || sibling.cidr.is_empty()
        {
            continue;
        }
        let overlapping =
            cidr::overlaps(&sibling.cidr, &pool.cidr).map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        if overlapping {
            return Err(StoreError::Conflict(format!(
                "pool '{}' ({}) overlaps sibling pool '{}' ({})",
                pool.name, pool.cidr, sibling.name, sibling.cidr
            )));
        }
    }
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every row of `seed`, assigning ids to rows that have none
    pub async fn load_seed(&self, seed: Seed) -> Result<(), StoreError> {
        let Seed {
            connections,
            pools,
            blocks,
            allocations,
        } = seed;
        info!(
            "Loading seed: {} connections, {} pools, {} blocks, {} allocations",
            connections.len(),
            pools.len(),
            blocks.len(),
            allocations.len()
        );

        for connection in connections {
            connection
                .validate()
                .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
            self.create_connection(&connection).await?;
        }
        for mut pool in pools {
            if pool.id.is_nil() {
                pool.id = self.generate_id();
            }
            self.create_pool(&pool).await?;
        }
        for mut block in blocks {
            if block.id.is_nil() {
                block.id = self.generate_id();
            }
            self.create_block(&block).await?;
        }
        for mut allocation in allocations {
            if allocation.id.is_nil() {
                allocation.id = self.generate_id();
            }
            self.create_allocation(&allocation).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storer for MemoryStore {
    async fn create_connection(&self, connection: &CloudConnection) -> Result<(), StoreError> {
        let mut connections = guard(&self.connections)?;
        if connections.contains_key(&connection.id) {
            return Err(StoreError::Conflict(format!("connection {} already exists", connection.id)));
        }
        connections.insert(connection.id, connection.clone());
        Ok(())
    }

    async fn get_connection(&self, id: Uuid) -> Result<CloudConnection, StoreError> {
        get_row(&self.connections, id, "connection")
    }

    async fn list_connections(&self) -> Result<Vec<CloudConnection>, StoreError> {
        let mut connections: Vec<CloudConnection> = guard(&self.connections)?.values().cloned().collect();
        connections.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(connections)
    }

    async fn update_connection(&self, connection: &CloudConnection) -> Result<(), StoreError> {
        let mut connections = guard(&self.connections)?;
        match connections.get_mut(&connection.id) {
            Some(existing) => {
                *existing = connection.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("connection {}", connection.id))),
        }
    }

    async fn create_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        if pool.id.is_nil() {
            return Err(StoreError::InvalidInput(format!("pool '{}' has no id", pool.name)));
        }
        let mut pools = guard(&self.pools)?;
        if pools.contains_key(&pool.id) {
            return Err(StoreError::Conflict(format!("pool {} already exists", pool.id)));
        }
        check_sibling_overlap(&pools, pool)?;
        pools.insert(pool.id, pool.clone());
        Ok(())
    }

    async fn get_pool(&self, id: Uuid) -> Result<Pool, StoreError> {
        get_row(&self.pools, id, "pool")
    }

    /// Re-checks sibling overlap when the update moves the pool (new CIDR or parent)
    async fn update_pool(&self, pool: &Pool) -> Result<(), StoreError> {
        let mut pools = guard(&self.pools)?;
        let moved = match pools.get(&pool.id) {
            Some(existing) => existing.cidr != pool.cidr || existing.parent_pool_id != pool.parent_pool_id,
            None => return Err(StoreError::NotFound(format!("pool {}", pool.id))),
        };
        if moved {
            check_sibling_overlap(&pools, pool)?;
        }
        pools.insert(pool.id, pool.clone());
        Ok(())
    }

    async fn delete_pool(&self, id: Uuid) -> Result<(), StoreError> {
        remove_row(&self.pools, id, "pool")
    }

    async fn soft_delete_pool(&self, id: Uuid) -> Result<(), StoreError> {
        soft_delete_row(&self.pools, id, "pool", |p| p.deleted_at = Some(Utc::now()))
    }

    async fn list_pools_by_organization(&self, organization_id: Uuid) -> Result<Vec<Pool>, StoreError> {
        list_rows(&self.pools, |p| p.organization_id == organization_id && p.deleted_at.is_none())
    }

    async fn list_pools_by_organization_including_deleted(&self, organization_id: Uuid) -> Result<Vec<Pool>, StoreError> {
        list_rows(&self.pools, |p| p.organization_id == organization_id)
    }

    async fn list_pools_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Pool>, StoreError> {
        list_rows(&self.pools, |p| p.is_pending_cloud_delete(connection_id))
    }

    async fn create_block(&self, block: &Block) -> Result<(), StoreError> {
        insert_row(&self.blocks, block, "block")
    }

    async fn get_block(&self, id: Uuid) -> Result<Block, StoreError> {
        get_row(&self.blocks, id, "block")
    }

    async fn update_block(&self, block: &Block) -> Result<(), StoreError> {
        replace_row(&self.blocks, block, "block")
    }

    async fn delete_block(&self, id: Uuid) -> Result<(), StoreError> {
        remove_row(&self.blocks, id, "block")
    }

    async fn soft_delete_block(&self, id: Uuid) -> Result<(), StoreError> {
        soft_delete_row(&self.blocks, id, "block", |b| b.deleted_at = Some(Utc::now()))
    }

    async fn list_blocks(&self, filter: &BlockFilter) -> Result<Vec<Block>, StoreError> {
        list_rows(&self.blocks, |b| b.deleted_at.is_none() && filter.matches(b))
    }

    async fn list_blocks_including_deleted(&self, filter: &BlockFilter) -> Result<Vec<Block>, StoreError> {
        list_rows(&self.blocks, |b| filter.matches(b))
    }

    async fn list_blocks_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Block>, StoreError> {
        list_rows(&self.blocks, |b| b.is_pending_cloud_delete(connection_id))
    }

    async fn create_allocation(&self, allocation: &Allocation) -> Result<(), StoreError> {
        insert_row(&self.allocations, allocation, "allocation")
    }

    async fn get_allocation(&self, id: Uuid) -> Result<Allocation, StoreError> {
        get_row(&self.allocations, id, "allocation")
    }

    async fn update_allocation(&self, allocation: &Allocation) -> Result<(), StoreError> {
        replace_row(&self.allocations, allocation, "allocation")
    }

    async fn delete_allocation(&self, id: Uuid) -> Result<(), StoreError> {
        remove_row(&self.allocations, id, "allocation")
    }

    async fn soft_delete_allocation(&self, id: Uuid) -> Result<(), StoreError> {
        soft_delete_row(&self.allocations, id, "allocation", |a| a.deleted_at = Some(Utc::now()))
    }

    async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>, StoreError> {
        list_rows(&self.allocations, |a| a.deleted_at.is_none() && filter.matches(a))
    }

    async fn list_allocations_including_deleted(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>, StoreError> {
        list_rows(&self.allocations, |a| filter.matches(a))
    }

    async fn list_allocations_pending_cloud_delete(&self, connection_id: Uuid) -> Result<Vec<Allocation>, StoreError> {
        list_rows(&self.allocations, |a| a.is_pending_cloud_delete(connection_id))
    }

    async fn try_acquire_sync_lock(&self, connection_id: Uuid) -> Result<Option<SyncLockGuard>, StoreError> {
        let mut held = guard(&self.sync_locks)?;
        if !held.insert(connection_id) {
            debug!("Sync lock for connection {} is already held", connection_id);
            return Ok(None);
        }
        let release = HeldSyncLock {
            connection_id,
            held: Arc::clone(&self.sync_locks),
        };
        Ok(Some(SyncLockGuard::new(connection_id, release)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::with_sync_lock;
    use ipam_model::ProviderIdentity;

    fn pool(org: Uuid, name: &str, cidr: &str) -> Pool {
        Pool::new(org, Uuid::new_v4(), name, cidr).with_id(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_pool_crud() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let mut p = pool(org, "prod", "10.0.0.0/16");
        store.create_pool(&p).await.unwrap();

        p.name = "production".to_string();
        store.update_pool(&p).await.unwrap();
        assert_eq!(store.get_pool(p.id).await.unwrap().name, "production");

        store.delete_pool(p.id).await.unwrap();
        assert!(matches!(store.get_pool(p.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_requires_id() {
        let store = MemoryStore::new();
        let p = Pool::new(Uuid::new_v4(), Uuid::new_v4(), "prod", "10.0.0.0/16");
        assert!(matches!(store.create_pool(&p).await, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_native_sibling_overlap_rejected() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        store.create_pool(&pool(org, "a", "10.0.0.0/16")).await.unwrap();

        let overlapping = pool(org, "b", "10.0.128.0/17");
        assert!(matches!(store.create_pool(&overlapping).await, Err(StoreError::Conflict(_))));

        // Other organizations and cloud-reported pools are not checked
        store.create_pool(&pool(Uuid::new_v4(), "c", "10.0.0.0/16")).await.unwrap();
        let cloud = pool(org, "d", "10.0.0.0/24")
            .with_identity(ProviderIdentity::linked("aws", "ipam-pool-1", Uuid::new_v4()));
        store.create_pool(&cloud).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_moving_native_pool_onto_sibling_is_rejected() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        store.create_pool(&pool(org, "a", "10.0.0.0/16")).await.unwrap();
        let mut b = pool(org, "b", "10.1.0.0/16");
        store.create_pool(&b).await.unwrap();

        b.cidr = "10.0.128.0/17".to_string();
        assert!(matches!(store.update_pool(&b).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.get_pool(b.id).await.unwrap().cidr, "10.1.0.0/16");

        // Re-parenting next to an overlapping pool is a move too
        let parent = pool(org, "parent", "10.2.0.0/16");
        store.create_pool(&parent).await.unwrap();
        let child = pool(org, "child", "10.1.0.0/17").with_parent(parent.id);
        store.create_pool(&child).await.unwrap();
        let mut detached = child.clone();
        detached.parent_pool_id = None;
        assert!(matches!(store.update_pool(&detached).await, Err(StoreError::Conflict(_))));

        // Edits that keep the CIDR and parent are not re-checked
        let mut renamed = store.get_pool(b.id).await.unwrap();
        renamed.name = "b-renamed".to_string();
        store.update_pool(&renamed).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_overlapping_creates_admit_one() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let creates: Vec<_> = ["10.0.0.0/16", "10.0.0.0/17"]
            .into_iter()
            .map(|cidr| {
                let store = store.clone();
                let candidate = pool(org, cidr, cidr);
                tokio::spawn(async move { store.create_pool(&candidate).await })
            })
            .collect();

        let mut created = 0;
        for create in creates {
            if create.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.list_pools_by_organization(org).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_and_pending_listing() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let linked = pool(org, "linked", "10.0.0.0/16")
            .with_identity(ProviderIdentity::linked("aws", "ipam-pool-1", conn));
        let native = pool(org, "native", "10.1.0.0/16");
        store.create_pool(&linked).await.unwrap();
        store.create_pool(&native).await.unwrap();

        store.soft_delete_pool(linked.id).await.unwrap();
        store.soft_delete_pool(native.id).await.unwrap();
        let first = store.get_pool(linked.id).await.unwrap().deleted_at;
        store.soft_delete_pool(linked.id).await.unwrap();
        assert_eq!(store.get_pool(linked.id).await.unwrap().deleted_at, first);

        assert!(store.list_pools_by_organization(org).await.unwrap().is_empty());
        assert_eq!(store.list_pools_by_organization_including_deleted(org).await.unwrap().len(), 2);

        let pending = store.list_pools_pending_cloud_delete(conn).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, linked.id);
    }

    #[tokio::test]
    async fn test_block_filter() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let env = Uuid::new_v4();
        let pool_id = Uuid::new_v4();
        let pooled = Block::new(org, "pooled", "10.0.1.0/24").with_id(Uuid::new_v4()).in_pool(pool_id);
        let orphan = Block::new(org, "orphan", "10.0.2.0/24").with_id(Uuid::new_v4()).in_environment(env);
        store.create_block(&pooled).await.unwrap();
        store.create_block(&orphan).await.unwrap();

        let by_pool = store.list_blocks(&BlockFilter::pool(pool_id)).await.unwrap();
        assert_eq!(by_pool.len(), 1);
        assert_eq!(by_pool[0].name, "pooled");

        let orphans = store
            .list_blocks(&BlockFilter::organization(org).environment(env).orphans())
            .await
            .unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].name, "orphan");
    }

    #[tokio::test]
    async fn test_lists_sorted_by_name() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        store.create_pool(&pool(org, "b", "10.1.0.0/16")).await.unwrap();
        store.create_pool(&pool(org, "a", "10.0.0.0/16")).await.unwrap();
        let names: Vec<String> = store
            .list_pools_by_organization(org)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sync_lock_is_exclusive_and_released_on_drop() {
        let store = MemoryStore::new();
        let conn = Uuid::new_v4();

        let guard = store.try_acquire_sync_lock(conn).await.unwrap();
        assert!(guard.is_some());
        assert!(store.try_acquire_sync_lock(conn).await.unwrap().is_none());
        assert!(store.try_acquire_sync_lock(Uuid::new_v4()).await.unwrap().is_some());

        drop(guard);
        assert!(store.try_acquire_sync_lock(conn).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_with_sync_lock_skips_when_held() {
        let store = MemoryStore::new();
        let conn = Uuid::new_v4();
        let _held = store.try_acquire_sync_lock(conn).await.unwrap();

        let mut called = false;
        let result = with_sync_lock(&store, conn, || {
            called = true;
            async { Ok::<_, StoreError>(()) }
        })
        .await
        .unwrap();
        assert!(result.is_none());
        assert!(!called);
    }

    #[tokio::test]
    async fn test_load_seed_assigns_ids() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let seed: Seed = serde_json::from_value(serde_json::json!({
            "connections": [{
                "id": Uuid::new_v4(),
                "organization_id": org,
                "provider": "inventory",
                "name": "lab",
            }],
            "pools": [{
                "organization_id": org,
                "environment_id": Uuid::new_v4(),
                "name": "lab",
                "cidr": "10.0.0.0/16",
            }],
        }))
        .unwrap();
        store.load_seed(seed).await.unwrap();

        assert_eq!(store.list_connections().await.unwrap().len(), 1);
        let pools = store.list_pools_by_organization(org).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert!(!pools[0].id.is_nil());
        assert_eq!(pools[0].identity.provider, "native");
    }
}
