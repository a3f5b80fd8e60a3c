//! Display-name convention for cloud pools
//!
//! Cloud pools are reported as `"<external id> (<Name tag>)"`, while a user
//! who created the pool locally knows it by the bare name.

/// Name a provider reports for a pool with an optional name tag
pub fn display_name(external_id: &str, tag: &str) -> String {
    if tag.is_empty() {
        external_id.to_string()
    } else {
        format!("{} ({})", external_id, tag)
    }
}

/// Whether a cloud-reported name refers to the same resource as a local name
///
/// Equal names match; otherwise the cloud name must end in `" (<local>)"`.
pub fn names_match(cloud_name: &str, local_name: &str) -> bool {
    if cloud_name == local_name {
        return true;
    }
    if local_name.is_empty() {
        return false;
    }
    cloud_name
        .strip_suffix(')')
        .and_then(|rest| rest.strip_suffix(local_name))
        .is_some_and(|rest| rest.ends_with(" ("))
}
