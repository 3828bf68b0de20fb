//! The capability bounding set.
//!
//! The kernel only lets the bounding set shrink, so this view has no way to
//! add members. Removal is per capability because that is what the kernel
//! offers.

use std::collections::BTreeSet;

use lockdown_common::error::Result;
use lockdown_common::types::CapabilityId;

use crate::context::Context;
use crate::provider::CapabilityProvider;

/// Live view of the bounding set.
#[derive(Debug)]
pub struct BoundingSet<'a, P> {
    ctx: &'a Context<P>,
}

impl<'a, P: CapabilityProvider> BoundingSet<'a, P> {
    pub(crate) const fn new(ctx: &'a Context<P>) -> Self {
        Self { ctx }
    }

    /// Returns whether `id` is still in the bounding set.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot read the set.
    pub fn contains(&self, id: CapabilityId) -> Result<bool> {
        self.ctx.provider().bounding_contains(id)
    }

    /// Current members, restricted to supported capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot read the set.
    pub fn snapshot(&self) -> Result<BTreeSet<CapabilityId>> {
        let mut members = BTreeSet::new();
        for id in self.ctx.registry().supported() {
            if self.contains(*id)? {
                let _ = members.insert(*id);
            }
        }
        Ok(members)
    }

    /// Removes each of `ids`, one kernel call per capability.
    ///
    /// Removing a capability that is not a member is not an error.
    ///
    /// # Errors
    ///
    /// Returns the first removal the kernel rejects.
    pub fn remove(&self, ids: &BTreeSet<CapabilityId>) -> Result<()> {
        for id in ids {
            self.ctx.provider().bounding_drop(*id)?;
        }
        if !ids.is_empty() {
            tracing::debug!(count = ids.len(), "dropped from bounding set");
        }
        Ok(())
    }

    /// Removes every current member not in `keep`.
    ///
    /// The complement is taken against the live bounding set, so members
    /// of `keep` already gone are never re-requested.
    ///
    /// # Errors
    ///
    /// Returns the first removal the kernel rejects.
    pub fn restrict_to(&self, keep: &BTreeSet<CapabilityId>) -> Result<()> {
        let excess: BTreeSet<_> = self.snapshot()?.difference(keep).copied().collect();
        self.remove(&excess)
    }
}
