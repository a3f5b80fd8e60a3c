//! Helper functions for the diff applier
//!
//! Matching rules used for adoption, and the field-merge rules applied when
//! a cloud resource lands on an existing local row.

use cloud_provider::CloudProvider;
use ipam_model::{Allocation, Block, CloudConnection, Pool, ProviderIdentity, NATIVE_PROVIDER};
use std::collections::HashSet;

/// Removes and returns the first candidate matching `matches`
///
/// Adoption is first-match: once taken, a candidate cannot match again.
pub fn take_first_match<T>(candidates: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    let position = candidates.iter().position(|candidate| matches(candidate))?;
    Some(candidates.remove(position))
}

/// Fills identity fields a provider may leave unset on observed entries
pub fn claim_identity(identity: &mut ProviderIdentity, connection: &CloudConnection) {
    if identity.connection_id.is_none() {
        identity.connection_id = Some(connection.id);
    }
    if identity.provider.is_empty() || identity.provider == NATIVE_PROVIDER {
        identity.provider = connection.provider.clone();
    }
}

/// CIDRs conflict only when both are known and differ
fn cidrs_conflict(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && a != b
}

/// Cloud pool and unlinked local pool are the same pool:
/// same environment, and an equivalent name or an equal (non-empty) CIDR.
pub fn pool_adoption_match(provider: &dyn CloudProvider, cloud: &Pool, local: &Pool) -> bool {
    if cloud.environment_id != local.environment_id {
        return false;
    }
    provider.names_match(&cloud.name, &local.name) || (!cloud.cidr.is_empty() && cloud.cidr == local.cidr)
}

/// Cloud block and unlinked local block are the same block:
/// compatible CIDRs and the same pool, or, for a local block without a pool,
/// the same environment.
pub fn block_adoption_match(cloud: &Block, local: &Block) -> bool {
    if cidrs_conflict(&cloud.cidr, &local.cidr) {
        return false;
    }
    match (cloud.pool_id, local.pool_id) {
        (Some(cloud_pool), Some(local_pool)) => cloud_pool == local_pool,
        (_, None) => cloud.environment_id.is_some() && cloud.environment_id == local.environment_id,
        (None, Some(_)) => false,
    }
}

/// Cloud allocation and unlinked local allocation are the same allocation:
/// compatible parent-block CIDRs and an equivalent block name.
pub fn allocation_adoption_match(provider: &dyn CloudProvider, cloud: &Allocation, local: &Allocation) -> bool {
    if cidrs_conflict(&cloud.block_cidr, &local.block_cidr) {
        return false;
    }
    provider.names_match(&cloud.block_name, &local.block_name)
}

/// Orders pulled pools so every parent in the batch precedes its sub-pools.
/// Entries caught in a parent cycle keep their reported order at the end.
pub fn parents_first(pools: Vec<Pool>) -> Vec<Pool> {
    let in_batch: HashSet<String> = pools
        .iter()
        .filter_map(|p| p.identity.external_id().map(str::to_string))
        .collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(pools.len());
    let mut pending = pools;

    while !pending.is_empty() {
        let (ready, waiting): (Vec<Pool>, Vec<Pool>) =
            pending.into_iter().partition(|pool| match pool.parent_external_id.as_deref() {
                Some(parent) if in_batch.contains(parent) => placed.contains(parent),
                _ => true,
            });
        if ready.is_empty() {
            ordered.extend(waiting);
            break;
        }
        placed.extend(ready.iter().filter_map(|p| p.identity.external_id().map(str::to_string)));
        ordered.extend(ready);
        pending = waiting;
    }
    ordered
}

/// Name a row keeps when a cloud resource lands on it, and the cloud name to
/// remember next to it.
///
/// An equivalent cloud name keeps the local name. So does the cloud name
/// remembered from an earlier sync: a row adopted under its own name keeps it
/// until the resource is renamed in the cloud.
fn resolve_name(provider: &dyn CloudProvider, local: &str, remembered: Option<&str>, cloud: &str) -> (String, Option<String>) {
    if provider.names_match(cloud, local) {
        (local.to_string(), None)
    } else if remembered == Some(cloud) {
        (local.to_string(), Some(cloud.to_string()))
    } else {
        (cloud.to_string(), None)
    }
}

/// Cloud name to remember when adopting a row under `local` name
fn adopted_name(provider: &dyn CloudProvider, local: &str, cloud: &str) -> Option<String> {
    (!provider.names_match(cloud, local)).then(|| cloud.to_string())
}

/// Cloud-wins update of an existing pool.
///
/// Unknown cloud values (empty CIDR, no parent) keep the local value.
pub fn merge_cloud_pool(provider: &dyn CloudProvider, existing: &Pool, cloud: &Pool) -> Pool {
    let mut merged = existing.clone();
    let (name, external_name) = resolve_name(
        provider,
        &existing.name,
        existing.identity.external_name.as_deref(),
        &cloud.name,
    );
    merged.name = name;
    if !cloud.cidr.is_empty() {
        merged.cidr = cloud.cidr.clone();
    }
    if !cloud.environment_id.is_nil() {
        merged.environment_id = cloud.environment_id;
    }
    if cloud.parent_pool_id.is_some() {
        merged.parent_pool_id = cloud.parent_pool_id;
    }
    merged.identity = cloud.identity.clone();
    merged.identity.external_name = external_name;
    merged
}

/// Cloud-wins update of an existing block
pub fn merge_cloud_block(provider: &dyn CloudProvider, existing: &Block, cloud: &Block) -> Block {
    let mut merged = existing.clone();
    let (name, external_name) = resolve_name(
        provider,
        &existing.name,
        existing.identity.external_name.as_deref(),
        &cloud.name,
    );
    merged.name = name;
    if !cloud.cidr.is_empty() {
        merged.cidr = cloud.cidr.clone();
    }
    if cloud.pool_id.is_some() {
        merged.pool_id = cloud.pool_id;
    }
    if cloud.environment_id.is_some() {
        merged.environment_id = cloud.environment_id;
    }
    merged.identity = cloud.identity.clone();
    merged.identity.external_name = external_name;
    merged
}

/// Cloud-wins update of an existing allocation
pub fn merge_cloud_allocation(provider: &dyn CloudProvider, existing: &Allocation, cloud: &Allocation) -> Allocation {
    let mut merged = existing.clone();
    let (name, external_name) = resolve_name(
        provider,
        &existing.name,
        existing.identity.external_name.as_deref(),
        &cloud.name,
    );
    merged.name = name;
    if !provider.names_match(&cloud.block_name, &existing.block_name) {
        merged.block_name = cloud.block_name.clone();
    }
    if !cloud.block_cidr.is_empty() {
        merged.block_cidr = cloud.block_cidr.clone();
    }
    if !cloud.cidr.is_empty() {
        merged.cidr = cloud.cidr.clone();
    }
    merged.identity = cloud.identity.clone();
    merged.identity.external_name = external_name;
    merged
}

/// Links an unlinked local pool to its cloud counterpart, keeping the local
/// name and (unless the cloud has none yet) taking the cloud CIDR.
pub fn adopt_pool(provider: &dyn CloudProvider, local: Pool, cloud: &Pool) -> Pool {
    let mut adopted = local;
    if !cloud.cidr.is_empty() {
        adopted.cidr = cloud.cidr.clone();
    }
    if cloud.parent_pool_id.is_some() {
        adopted.parent_pool_id = cloud.parent_pool_id;
    }
    adopted.identity = cloud.identity.clone();
    adopted.identity.external_name = adopted_name(provider, &adopted.name, &cloud.name);
    adopted
}

/// Links an unlinked local block; the local name is kept so allocations
/// referencing it by name still resolve.
pub fn adopt_block(provider: &dyn CloudProvider, local: Block, cloud: &Block) -> Block {
    let mut adopted = local;
    if adopted.name.is_empty() {
        adopted.name = cloud.name.clone();
    }
    if !cloud.cidr.is_empty() {
        adopted.cidr = cloud.cidr.clone();
    }
    if cloud.pool_id.is_some() {
        adopted.pool_id = cloud.pool_id;
    }
    if cloud.environment_id.is_some() {
        adopted.environment_id = cloud.environment_id;
    }
    adopted.identity = cloud.identity.clone();
    adopted.identity.external_name = adopted_name(provider, &adopted.name, &cloud.name);
    adopted
}

/// Links an unlinked local allocation, keeping its name and block reference
pub fn adopt_allocation(provider: &dyn CloudProvider, local: Allocation, cloud: &Allocation) -> Allocation {
    let mut adopted = local;
    if adopted.name.is_empty() {
        adopted.name = cloud.name.clone();
    }
    if !cloud.block_cidr.is_empty() {
        adopted.block_cidr = cloud.block_cidr.clone();
    }
    if !cloud.cidr.is_empty() {
        adopted.cidr = cloud.cidr.clone();
    }
    adopted.identity = cloud.identity.clone();
    adopted.identity.external_name = adopted_name(provider, &adopted.name, &cloud.name);
    adopted
}
