//! Permitted, effective, and inheritable capability sets.
//!
//! A [`CapabilitySet`] holds no membership of its own. Every read goes to
//! the provider, so it always reflects the live kernel state. Every
//! mutation computes the delta against that live state first and then
//! issues at most one batched write per direction, skipping no-op writes.

use std::collections::BTreeSet;

use lockdown_common::error::Result;
use lockdown_common::types::{CapSetKind, CapabilityId};

use crate::context::Context;
use crate::provider::CapabilityProvider;

/// Live view of one per-process flag set.
#[derive(Debug)]
pub struct CapabilitySet<'a, P> {
    ctx: &'a Context<P>,
    kind: CapSetKind,
}

impl<'a, P: CapabilityProvider> CapabilitySet<'a, P> {
    pub(crate) const fn new(ctx: &'a Context<P>, kind: CapSetKind) -> Self {
        Self { ctx, kind }
    }

    /// Returns whether `id` is currently a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot read the set.
    pub fn contains(&self, id: CapabilityId) -> Result<bool> {
        self.ctx.provider().query_capability_flag(self.kind, id)
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

    /// Adds `ids` that are not already members, in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected; nothing is applied then.
    pub fn add(&self, ids: &BTreeSet<CapabilityId>) -> Result<()> {
        let current = self.snapshot()?;
        let missing: BTreeSet<_> = ids.difference(&current).copied().collect();
        self.write(&missing, true)
    }

    /// Removes `ids` that are currently members, in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected; nothing is applied then.
    pub fn remove(&self, ids: &BTreeSet<CapabilityId>) -> Result<()> {
        let current = self.snapshot()?;
        let present: BTreeSet<_> = ids.intersection(&current).copied().collect();
        self.write(&present, false)
    }

    /// Pins membership to exactly `ids`.
    ///
    /// Sets what is missing, then clears what is extra. Applying the same
    /// target twice issues no writes the second time.
    ///
    /// # Errors
    ///
    /// Returns an error if either write is rejected.
    pub fn replace(&self, ids: &BTreeSet<CapabilityId>) -> Result<()> {
        let current = self.snapshot()?;
        let to_set: BTreeSet<_> = ids.difference(&current).copied().collect();
        let to_clear: BTreeSet<_> = current.difference(ids).copied().collect();
        self.write(&to_set, true)?;
        self.write(&to_clear, false)
    }

    fn write(&self, ids: &BTreeSet<CapabilityId>, value: bool) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        tracing::debug!(set = %self.kind, count = ids.len(), value, "updating capability set");
        self.ctx.provider().set_capability_flags(self.kind, ids, value)
    }
}
