//! Per-process handle bundle.
//!
//! There is one permitted, effective, and inheritable set, one bounding set,
//! and one securebits mask per process. Rather than hide them behind globals,
//! a [`Context`] owns the provider and the probed registry and hands out
//! lightweight views that read and write through the provider.

use lockdown_common::error::Result;
use lockdown_common::types::CapSetKind;

use crate::bounding::BoundingSet;
use crate::capability::CapabilitySet;
use crate::provider::CapabilityProvider;
use crate::registry::Registry;
use crate::securebits::SecureBitsController;

/// Provider plus the registry probed from it.
#[derive(Debug)]
pub struct Context<P> {
    provider: P,
    registry: Registry,
}

impl<P: CapabilityProvider> Context<P> {
    /// Probes the registry and wraps `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot list kernel capabilities.
    pub fn new(provider: P) -> Result<Self> {
        let registry = Registry::probe(&provider)?;
        Ok(Self { provider, registry })
    }

    /// The underlying provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The capability registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// View of one flag set.
    pub const fn capability_set(&self, kind: CapSetKind) -> CapabilitySet<'_, P> {
        CapabilitySet::new(self, kind)
    }

    /// View of the permitted set.
    pub const fn permitted(&self) -> CapabilitySet<'_, P> {
        self.capability_set(CapSetKind::Permitted)
    }

    /// View of the effective set.
    pub const fn effective(&self) -> CapabilitySet<'_, P> {
        self.capability_set(CapSetKind::Effective)
    }

    /// View of the inheritable set.
    pub const fn inheritable(&self) -> CapabilitySet<'_, P> {
        self.capability_set(CapSetKind::Inheritable)
    }

    /// View of the bounding set.
    pub const fn bounding(&self) -> BoundingSet<'_, P> {
        BoundingSet::new(self)
    }

    /// View of the securebits.
    pub const fn securebits(&self) -> SecureBitsController<'_, P> {
        SecureBitsController::new(self)
    }
}

#[cfg(target_os = "linux")]
impl Context<crate::linux::LinuxProvider> {
    /// Context over the calling process's real credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel capability list cannot be read.
    pub fn current() -> Result<Self> {
        Self::new(crate::linux::LinuxProvider::new())
    }
}
