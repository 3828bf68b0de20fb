//! Securebits: the per-process switches for legacy root semantics.
//!
//! Each switch has a lock bit. Once locked, the kernel refuses any change
//! to the switch for the rest of the process's life, so this controller
//! only ever turns switches on.

use lockdown_common::error::{LockdownError, Result};
use lockdown_common::types::{ControlOp, SecureBit, SecureBits};

use crate::context::Context;
use crate::provider::CapabilityProvider;

/// Reads and enables securebits.
#[derive(Debug)]
pub struct SecureBitsController<'a, P> {
    ctx: &'a Context<P>,
}

impl<'a, P: CapabilityProvider> SecureBitsController<'a, P> {
    pub(crate) const fn new(ctx: &'a Context<P>) -> Self {
        Self { ctx }
    }

    /// Current securebits mask.
    ///
    /// Bits this build does not know about are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`] if the query fails.
    pub fn read(&self) -> Result<SecureBits> {
        let raw = self.ctx.provider().control_get(ControlOp::SecureBits)?;
        Ok(SecureBits::from_bits_truncate(raw))
    }

    /// Returns whether `bit` is on.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`] if the query fails.
    pub fn is_set(&self, bit: SecureBit) -> Result<bool> {
        Ok(self.read()?.contains(bit.value()))
    }

    /// Returns whether `bit` is frozen.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`] if the query fails.
    pub fn is_locked(&self, bit: SecureBit) -> Result<bool> {
        Ok(self.read()?.contains(bit.locked()))
    }

    /// Turns `bit` on, and freezes it when `locked` is set.
    ///
    /// Other bits are preserved. Enabling a bit that is already on and
    /// locked rewrites the same mask and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`] if the mask cannot be read or
    /// the kernel rejects the new mask.
    pub fn enable(&self, bit: SecureBit, locked: bool) -> Result<()> {
        let current = self.read()?;
        let mut next = current | bit.value();
        if locked {
            next |= bit.locked();
        }
        self.ctx
            .provider()
            .control_set(ControlOp::SecureBits, next.bits())
            .map_err(|e| match e {
                LockdownError::Control { message, .. } => LockdownError::Control {
                    operation: "securebits",
                    message: format!("enabling {bit}: {message}"),
                },
                other => other,
            })?;
        tracing::debug!(%bit, locked, mask = next.bits(), "securebit enabled");
        Ok(())
    }

    /// Enables and locks `NOROOT`, `KEEP_CAPS`, and `NO_SETUID_FIXUP`.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`] on the first bit that fails.
    pub fn harden_root_semantics(&self) -> Result<()> {
        for bit in SecureBit::ALL {
            self.enable(bit, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimFault, SimulatedProvider};

    #[test]
    fn enable_sets_value_and_lock() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        ctx.securebits().enable(SecureBit::KeepCaps, true).unwrap();
        assert_eq!(
            sim.securebits(),
            SecureBits::KEEP_CAPS | SecureBits::KEEP_CAPS_LOCKED
        );
        assert!(ctx.securebits().is_locked(SecureBit::KeepCaps).unwrap());
    }

    #[test]
    fn enable_without_lock_leaves_bit_mutable() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        ctx.securebits().enable(SecureBit::NoRoot, false).unwrap();
        assert!(ctx.securebits().is_set(SecureBit::NoRoot).unwrap());
        assert!(!ctx.securebits().is_locked(SecureBit::NoRoot).unwrap());
    }

    #[test]
    fn enable_preserves_other_bits() {
        let sim = SimulatedProvider::root().with_securebits(SecureBits::NOROOT);
        let ctx = Context::new(&sim).unwrap();
        ctx.securebits().enable(SecureBit::NoSetuidFixup, true).unwrap();
        assert!(sim.securebits().contains(SecureBits::NOROOT));
    }

    #[test]
    fn enable_is_idempotent_once_locked() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        ctx.securebits().harden_root_semantics().unwrap();
        let hardened = sim.securebits();
        ctx.securebits().harden_root_semantics().unwrap();
        assert_eq!(sim.securebits(), hardened);
    }

    #[test]
    fn locked_bit_cannot_be_cleared() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        ctx.securebits().enable(SecureBit::NoRoot, true).unwrap();
        let err = ctx
            .provider()
            .control_set(ControlOp::SecureBits, SecureBits::NOROOT_LOCKED.bits())
            .unwrap_err();
        assert!(matches!(err, LockdownError::Control { .. }));
        assert!(ctx.securebits().is_set(SecureBit::NoRoot).unwrap());
    }

    #[test]
    fn read_failure_is_a_control_error() {
        let sim = SimulatedProvider::root().with_fault(SimFault::SecureBitsRead);
        let ctx = Context::new(&sim).unwrap();
        let err = ctx.securebits().read().unwrap_err();
        assert!(matches!(err, LockdownError::Control { .. }));
    }
}
