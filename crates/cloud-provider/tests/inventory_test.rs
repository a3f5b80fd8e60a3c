//! Integration tests for the inventory provider
//!
//! Each test writes an inventory file to the system temp directory and pulls
//! it through `InventoryProvider` against an in-memory store.

use cloud_provider::{CloudProvider, InventoryProvider, ProviderError};
use ipam_model::{CloudConnection, Pool, ProviderIdentity};
use ipam_store::{MemoryStore, Storer};
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

fn write_inventory(contents: serde_json::Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!("inventory-{}.json", Uuid::new_v4()));
    std::fs::write(&path, contents.to_string()).expect("failed to write inventory file");
    path
}

fn connection(path: &PathBuf, environment_id: Uuid) -> CloudConnection {
    CloudConnection::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        InventoryProvider::ID,
        "lab",
        json!({
            "inventory_path": path,
            "environment_id": environment_id.to_string(),
        }),
    )
}

#[tokio::test]
async fn test_pull_all_tiers() {
    let path = write_inventory(json!({
        "pools": [
            { "external_id": "ipam-pool-1", "name": "Lab", "cidr": "10.0.0.0/16" },
            { "external_id": "ipam-pool-2", "name": "Lab East", "cidr": "10.0.0.0/17", "parent_external_id": "ipam-pool-1" },
        ],
        "blocks": [{ "external_id": "vpc-1", "name": "lab-vpc", "cidr": "10.0.1.0/24", "pool_external_id": "ipam-pool-1" }],
        "allocations": [{ "external_id": "subnet-1", "name": "lab-a", "cidr": "10.0.1.0/26", "block_external_id": "vpc-1" }],
    }));
    let env = Uuid::new_v4();
    let conn = connection(&path, env);
    let store = MemoryStore::new();
    let provider = InventoryProvider::new();

    let pools = provider.sync_pools(&conn).await.unwrap();
    assert_eq!(pools.create.len(), 2);
    assert_eq!(pools.create[0].name, "ipam-pool-1 (Lab)");
    assert_eq!(pools.create[0].environment_id, env);
    assert_eq!(pools.create[0].parent_external_id, None);
    assert_eq!(pools.create[1].parent_external_id.as_deref(), Some("ipam-pool-1"));
    assert_eq!(
        pools.current_external_ids,
        Some(vec!["ipam-pool-1".to_string(), "ipam-pool-2".to_string()])
    );

    // Blocks resolve their pool through the store
    let local_pool = Pool::new(conn.organization_id, env, "Lab", "10.0.0.0/16")
        .with_id(Uuid::new_v4())
        .with_identity(ProviderIdentity::linked(InventoryProvider::ID, "ipam-pool-1", conn.id));
    store.create_pool(&local_pool).await.unwrap();

    let blocks = provider.sync_blocks(&conn, &store).await.unwrap();
    assert_eq!(blocks.create.len(), 1);
    assert_eq!(blocks.create[0].pool_id, Some(local_pool.id));

    let allocations = provider
        .sync_allocations(&conn, &store, &blocks.create)
        .await
        .unwrap();
    assert_eq!(allocations.create.len(), 1);
    assert_eq!(allocations.create[0].block_name, "lab-vpc");
    assert_eq!(allocations.create[0].block_cidr, "10.0.1.0/24");

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_missing_inventory_path_is_config_error() {
    let conn = CloudConnection::new(Uuid::new_v4(), Uuid::new_v4(), InventoryProvider::ID, "lab", json!({}));
    let err = InventoryProvider::new().sync_pools(&conn).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_unreadable_inventory_is_api_error() {
    let path = std::env::temp_dir().join(format!("missing-{}.json", Uuid::new_v4()));
    let conn = connection(&path, Uuid::new_v4());
    let err = InventoryProvider::new().sync_pools(&conn).await.unwrap_err();
    assert!(matches!(err, ProviderError::Api(_)));
}

#[tokio::test]
async fn test_inventory_provider_is_pull_only() {
    let provider = InventoryProvider::new();
    assert!(provider.as_push().is_none());
    assert!(cloud_provider::push_capability(&provider).is_none());
}
