//! CIDR containment and overlap checks

use crate::error::ModelError;
use ipnetwork::IpNetwork;

/// Parses a CIDR string (e.g. `10.0.0.0/16`)
pub fn parse(cidr: &str) -> Result<IpNetwork, ModelError> {
    cidr.trim()
        .parse::<IpNetwork>()
        .map_err(|e| ModelError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        })
}

/// Whether `cidr` lies entirely inside `supernet`. Mixed address families never contain each other.
pub fn contains(supernet: &str, cidr: &str) -> Result<bool, ModelError> {
    let outer = parse(supernet)?;
    let inner = parse(cidr)?;
    if outer.is_ipv4() != inner.is_ipv4() {
        return Ok(false);
    }
    Ok(outer.prefix() <= inner.prefix() && outer.contains(inner.network()))
}

/// Whether `a` and `b` share at least one address
pub fn overlaps(a: &str, b: &str) -> Result<bool, ModelError> {
    let left = parse(a)?;
    let right = parse(b)?;
    if left.is_ipv4() != right.is_ipv4() {
        return Ok(false);
    }
    Ok(left.contains(right.network()) || right.contains(left.network()))
}
