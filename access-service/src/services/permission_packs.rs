//! Pack application over an in-memory permission snapshot.
//!
//! Every module a pack covers is overwritten wholesale, both its actions and
//! its subview overrides. Modules the pack does not mention are left alone.

use std::collections::BTreeMap;

use crate::models::{PermissionMatrix, PermissionPack, RbacModule};

/// Subview overrides per module for one membership.
pub type SubviewOverrides = BTreeMap<RbacModule, BTreeMap<String, bool>>;

/// Membership permission state a pack is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackTarget {
    pub permissions: PermissionMatrix,
    pub subviews: SubviewOverrides,
}

pub fn apply_pack(pack: &PermissionPack, target: &PackTarget) -> PackTarget {
    let mut next = target.clone();
    for (module, grant) in &pack.modules {
        next.permissions.set(*module, grant.actions);
        next.subviews.insert(*module, grant.default_subviews.clone());
    }
    next
}
