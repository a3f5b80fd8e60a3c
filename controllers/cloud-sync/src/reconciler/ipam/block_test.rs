//! Unit tests for the block diff applier

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use ipam_model::{Block, ConflictResolution, ProviderIdentity, SyncMode};
    use ipam_store::Storer;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_creates_blocks_with_resolved_pool() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.created, 1);

        let blocks = env.blocks().await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "app");
        assert_eq!(blocks[0].pool_id, Some(pool.id));
        assert_eq!(blocks[0].environment_id, Some(env.environment_id));
        assert_eq!(blocks[0].identity.external_id(), Some("vpc-1"));
    }

    #[tokio::test]
    async fn test_block_with_unknown_pool_lands_as_orphan() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", Some("ipam-pool-404"));

        env.reconciler.sync_blocks(&env.connection).await.unwrap();

        let blocks = env.blocks().await;
        assert!(blocks[0].is_orphan());
        assert_eq!(blocks[0].environment_id, Some(env.environment_id));
    }

    #[tokio::test]
    async fn test_block_sync_is_idempotent() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", Some("ipam-pool-1"));

        env.reconciler.sync_blocks(&env.connection).await.unwrap();
        let before = env.blocks().await;
        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.changes(), 0);
        assert_eq!(env.blocks().await, before);
    }

    #[tokio::test]
    async fn test_adopts_block_in_same_pool_keeping_local_name() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let local = env.add_local_block("app", "10.0.1.0/24", Some(&pool)).await;
        env.provider.add_block("vpc-1", "vpc-app", "10.0.1.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.adopted, 1);

        let adopted = env.store.get_block(local.id).await.unwrap();
        assert_eq!(adopted.name, "app");
        assert_eq!(adopted.identity.external_id(), Some("vpc-1"));
        assert_eq!(env.blocks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_adopts_orphan_block_in_same_environment() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let orphan = env.add_local_block("app", "", None).await;
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.adopted, 1);

        let adopted = env.store.get_block(orphan.id).await.unwrap();
        assert_eq!(adopted.pool_id, Some(pool.id));
        assert_eq!(adopted.cidr, "10.0.1.0/24");
    }

    #[tokio::test]
    async fn test_block_in_other_pool_or_cidr_is_not_adopted() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let other_pool = env.add_local_pool("staging", "10.1.0.0/16").await;
        let elsewhere = env.add_local_block("app", "10.0.1.0/24", Some(&other_pool)).await;
        let different_cidr = env.add_local_block("db", "10.0.2.0/24", Some(&pool)).await;
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.adopted, 0);
        assert!(!env.store.get_block(elsewhere.id).await.unwrap().identity.has_external_id());
        assert!(!env.store.get_block(different_cidr.id).await.unwrap().identity.has_external_id());
    }

    #[tokio::test]
    async fn test_block_of_other_connection_is_not_matched_by_external_id() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let foreign = Block::new(env.organization_id, "app", "10.0.1.0/24")
            .with_id(Uuid::new_v4())
            .with_identity(ProviderIdentity::linked(TEST_PROVIDER, "vpc-1", Uuid::new_v4()));
        env.store.create_block(&foreign).await.unwrap();
        env.provider.add_block("vpc-1", "app", "10.0.1.0/24", None);

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(env.store.get_block(foreign.id).await.unwrap(), foreign);
        assert_eq!(env.blocks().await.len(), 2);
    }

    #[tokio::test]
    async fn test_linked_block_keeps_local_values_when_ipam_wins() {
        let env = setup(SyncMode::ReadWrite, ConflictResolution::Ipam).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let linked = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        env.provider.add_block("vpc-1", "renamed", "10.0.9.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(env.store.get_block(linked.id).await.unwrap(), linked);
    }

    #[tokio::test]
    async fn test_missing_block_is_deleted_with_its_allocations() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let block = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        let linked = env.add_linked_allocation("web", "app", "10.0.1.0/26", "subnet-1").await;
        let native = env.add_local_allocation("manual", "app", "10.0.1.64/26").await;

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.deleted, 1);

        assert!(env.store.get_block(block.id).await.is_err());
        assert!(env.store.get_allocation(linked.id).await.is_err());
        assert!(env.store.get_allocation(native.id).await.is_ok());
        assert!(env.store.get_pool(pool.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_block_is_cleared_when_ipam_authoritative() {
        let env = setup(SyncMode::ReadWrite, ConflictResolution::Ipam).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let block = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        let allocation = env.add_linked_allocation("web", "app", "10.0.1.0/26", "subnet-1").await;

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.cleared, 1);

        let cleared = env.store.get_block(block.id).await.unwrap();
        assert!(!cleared.identity.has_external_id());
        assert_eq!(cleared.identity.connection_id, Some(env.connection.id));
        assert!(!env.store.get_allocation(allocation.id).await.unwrap().identity.has_external_id());
    }

    #[tokio::test]
    async fn test_missing_block_spares_allocations_of_same_named_block() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let gone = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        let kept = env.add_linked_block("app", "10.0.2.0/24", &pool, "vpc-2").await;
        let in_gone = env.add_linked_allocation_in("web", &gone, "10.0.1.0/26", "subnet-1").await;
        let in_kept = env.add_linked_allocation_in("web", &kept, "10.0.2.0/26", "subnet-2").await;
        env.provider.add_block("vpc-2", "app", "10.0.2.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.deleted, 1);

        assert!(env.store.get_block(gone.id).await.is_err());
        assert!(env.store.get_allocation(in_gone.id).await.is_err());
        assert_eq!(env.store.get_allocation(in_kept.id).await.unwrap(), in_kept);
    }

    #[tokio::test]
    async fn test_repush_clear_spares_allocations_of_same_named_block() {
        let env = setup(SyncMode::ReadWrite, ConflictResolution::Ipam).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let gone = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        let kept = env.add_linked_block("app", "10.0.2.0/24", &pool, "vpc-2").await;
        let in_gone = env.add_linked_allocation_in("web", &gone, "10.0.1.0/26", "subnet-1").await;
        let in_kept = env.add_linked_allocation_in("web", &kept, "10.0.2.0/26", "subnet-2").await;
        env.provider.add_block("vpc-2", "app", "10.0.2.0/24", Some("ipam-pool-1"));

        let report = env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert_eq!(report.cleared, 1);

        assert!(!env.store.get_allocation(in_gone.id).await.unwrap().identity.has_external_id());
        assert_eq!(env.store.get_allocation(in_kept.id).await.unwrap(), in_kept);
    }

    #[tokio::test]
    async fn test_no_block_prune_without_current_ids() {
        let env = setup(SyncMode::ReadOnly, ConflictResolution::Cloud).await;
        let pool = env.add_linked_pool("prod", "10.0.0.0/16", "ipam-pool-1").await;
        let block = env.add_linked_block("app", "10.0.1.0/24", &pool, "vpc-1").await;
        env.provider.withhold_current_ids();

        env.reconciler.sync_blocks(&env.connection).await.unwrap();
        assert!(env.store.get_block(block.id).await.is_ok());
    }
}
