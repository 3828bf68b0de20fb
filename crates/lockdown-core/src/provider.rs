//! Boundary to the kernel primitives.
//!
//! The rest of the crate never issues a system call directly; it asks a
//! [`CapabilityProvider`]. Each method maps to one kernel operation, so
//! callers control exactly how many syscalls a higher-level operation costs.

use std::collections::BTreeSet;
use std::convert::Infallible;

use lockdown_common::error::Result;
use lockdown_common::types::{CapSetKind, CapabilityId, ControlOp};

/// Kernel primitives needed to drop privileges.
pub trait CapabilityProvider {
    /// Capability numbers the running kernel knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel cannot be queried.
    fn kernel_capabilities(&self) -> Result<BTreeSet<CapabilityId>>;

    /// Returns whether `id` is a member of the given flag set.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability state cannot be read.
    fn query_capability_flag(&self, kind: CapSetKind, id: CapabilityId) -> Result<bool>;

    /// Sets (`value == true`) or clears every capability in `ids` within
    /// one flag set, as a single kernel write.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the write. Nothing is applied
    /// in that case.
    fn set_capability_flags(
        &self,
        kind: CapSetKind,
        ids: &BTreeSet<CapabilityId>,
        value: bool,
    ) -> Result<()>;

    /// Returns whether `id` is still in the bounding set.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounding set cannot be read.
    fn bounding_contains(&self, id: CapabilityId) -> Result<bool>;

    /// Removes `id` from the bounding set. Removing a non-member succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the removal.
    fn bounding_drop(&self, id: CapabilityId) -> Result<()>;

    /// Reads a process control value.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`](lockdown_common::error::LockdownError::Control)
    /// if the query fails.
    fn control_get(&self, op: ControlOp) -> Result<u32>;

    /// Writes a process control value.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Control`](lockdown_common::error::LockdownError::Control)
    /// if the kernel rejects the value.
    fn control_set(&self, op: ControlOp, value: u32) -> Result<()>;

    /// Switches the real, effective, and saved UID.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::IdentitySwitch`](lockdown_common::error::LockdownError::IdentitySwitch)
    /// on failure.
    fn switch_uid(&self, uid: u32) -> Result<()>;

    /// Switches the real, effective, and saved GID.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::IdentitySwitch`](lockdown_common::error::LockdownError::IdentitySwitch)
    /// on failure.
    fn switch_gid(&self, gid: u32) -> Result<()>;

    /// Replaces the process image with `argv[0]`, searched in `PATH`.
    ///
    /// Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Exec`](lockdown_common::error::LockdownError::Exec)
    /// if the program cannot be executed.
    fn replace_process(&self, argv: &[String], env: &[(String, String)]) -> Result<Infallible>;
}

impl<P: CapabilityProvider + ?Sized> CapabilityProvider for &P {
    fn kernel_capabilities(&self) -> Result<BTreeSet<CapabilityId>> {
        (**self).kernel_capabilities()
    }

    fn query_capability_flag(&self, kind: CapSetKind, id: CapabilityId) -> Result<bool> {
        (**self).query_capability_flag(kind, id)
    }

    fn set_capability_flags(
        &self,
        kind: CapSetKind,
        ids: &BTreeSet<CapabilityId>,
        value: bool,
    ) -> Result<()> {
        (**self).set_capability_flags(kind, ids, value)
    }

    fn bounding_contains(&self, id: CapabilityId) -> Result<bool> {
        (**self).bounding_contains(id)
    }

    fn bounding_drop(&self, id: CapabilityId) -> Result<()> {
        (**self).bounding_drop(id)
    }

    fn control_get(&self, op: ControlOp) -> Result<u32> {
        (**self).control_get(op)
    }

    fn control_set(&self, op: ControlOp, value: u32) -> Result<()> {
        (**self).control_set(op, value)
    }

    fn switch_uid(&self, uid: u32) -> Result<()> {
        (**self).switch_uid(uid)
    }

    fn switch_gid(&self, gid: u32) -> Result<()> {
        (**self).switch_gid(gid)
    }

    fn replace_process(&self, argv: &[String], env: &[(String, String)]) -> Result<Infallible> {
        (**self).replace_process(argv, env)
    }
}
