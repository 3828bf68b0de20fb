//! Linux implementation of [`CapabilityProvider`].
//!
//! Capability sets go through the `caps` crate, identity and exec through
//! `nix`, and securebits through a raw `prctl(2)` because no safe binding
//! exists for them.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::ffi::CString;

use caps::{CapSet, Capability};
use lockdown_common::error::{IdKind, LockdownError, Result};
use lockdown_common::types::{CapSetKind, CapabilityId, ControlOp};
use nix::unistd::{Gid, Uid};

use crate::provider::CapabilityProvider;

/// Provider acting on the calling thread's real kernel state.
#[derive(Debug)]
pub struct LinuxProvider {
    known: BTreeMap<CapabilityId, Capability>,
}

impl LinuxProvider {
    /// Creates a provider for the calling process.
    #[must_use]
    pub fn new() -> Self {
        let known = caps::all()
            .into_iter()
            .map(|cap| (CapabilityId::new(cap.index()), cap))
            .collect();
        Self { known }
    }

    fn capability(&self, id: CapabilityId) -> Result<Capability> {
        self.known
            .get(&id)
            .copied()
            .ok_or_else(|| LockdownError::provider(format!("capability {id} unknown to this build")))
    }
}

impl Default for LinuxProvider {
    fn default() -> Self {
        Self::new()
    }
}

const fn cap_set(kind: CapSetKind) -> CapSet {
    match kind {
        CapSetKind::Effective => CapSet::Effective,
        CapSetKind::Permitted => CapSet::Permitted,
        CapSetKind::Inheritable => CapSet::Inheritable,
    }
}

fn control_error(op: ControlOp, err: impl std::fmt::Display) -> LockdownError {
    LockdownError::Control {
        operation: op.name(),
        message: err.to_string(),
    }
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| LockdownError::InvalidCommand {
        message: format!("argument contains a NUL byte: {value:?}"),
    })
}

impl CapabilityProvider for LinuxProvider {
    fn kernel_capabilities(&self) -> Result<BTreeSet<CapabilityId>> {
        Ok(caps::runtime::thread_all_supported()
            .into_iter()
            .map(|cap| CapabilityId::new(cap.index()))
            .collect())
    }

    fn query_capability_flag(&self, kind: CapSetKind, id: CapabilityId) -> Result<bool> {
        let cap = self.capability(id)?;
        caps::has_cap(None, cap_set(kind), cap)
            .map_err(|e| LockdownError::provider(format!("reading {kind} set: {e}")))
    }

    fn set_capability_flags(
        &self,
        kind: CapSetKind,
        ids: &BTreeSet<CapabilityId>,
        value: bool,
    ) -> Result<()> {
        let set = cap_set(kind);
        let mut current = caps::read(None, set)
            .map_err(|e| LockdownError::provider(format!("reading {kind} set: {e}")))?;
        for id in ids {
            let cap = self.capability(*id)?;
            if value {
                let _ = current.insert(cap);
            } else {
                let _ = current.remove(&cap);
            }
        }
        caps::set(None, set, &current).map_err(|e| {
            LockdownError::provider(format!(
                "{} {} capabilities in {kind} set: {e}",
                if value { "setting" } else { "clearing" },
                ids.len()
            ))
        })?;
        tracing::debug!(set = %kind, count = ids.len(), value, "capability flags written");
        Ok(())
    }

    fn bounding_contains(&self, id: CapabilityId) -> Result<bool> {
        let cap = self.capability(id)?;
        caps::has_cap(None, CapSet::Bounding, cap)
            .map_err(|e| LockdownError::provider(format!("reading bounding set: {e}")))
    }

    fn bounding_drop(&self, id: CapabilityId) -> Result<()> {
        let cap = self.capability(id)?;
        caps::drop(None, CapSet::Bounding, cap)
            .map_err(|e| LockdownError::provider(format!("dropping {cap} from bounding set: {e}")))
    }

    fn control_get(&self, op: ControlOp) -> Result<u32> {
        match op {
            ControlOp::SecureBits => {
                // SAFETY: PR_GET_SECUREBITS takes no pointer arguments and
                // only reads the calling thread's credentials.
                let res = unsafe { libc::prctl(libc::PR_GET_SECUREBITS, 0, 0, 0, 0) };
                if res < 0 {
                    return Err(control_error(op, std::io::Error::last_os_error()));
                }
                u32::try_from(res).map_err(|e| control_error(op, e))
            }
            ControlOp::NoNewPrivs => nix::sys::prctl::get_no_new_privs()
                .map(u32::from)
                .map_err(|e| control_error(op, e)),
        }
    }

    fn control_set(&self, op: ControlOp, value: u32) -> Result<()> {
        match op {
            ControlOp::SecureBits => {
                // SAFETY: PR_SET_SECUREBITS takes the new mask by value; the
                // kernel validates it against the lock bits.
                let res = unsafe {
                    libc::prctl(libc::PR_SET_SECUREBITS, libc::c_ulong::from(value), 0, 0, 0)
                };
                if res < 0 {
                    return Err(control_error(op, std::io::Error::last_os_error()));
                }
                Ok(())
            }
            ControlOp::NoNewPrivs if value == 0 => {
                Err(control_error(op, "no_new_privs cannot be cleared"))
            }
            ControlOp::NoNewPrivs => {
                nix::sys::prctl::set_no_new_privs().map_err(|e| control_error(op, e))
            }
        }
    }

    fn switch_uid(&self, uid: u32) -> Result<()> {
        nix::unistd::setuid(Uid::from_raw(uid)).map_err(|e| LockdownError::IdentitySwitch {
            kind: IdKind::Uid,
            id: uid,
            message: e.to_string(),
        })?;
        tracing::debug!(uid, "uid switched");
        Ok(())
    }

    fn switch_gid(&self, gid: u32) -> Result<()> {
        let target = Gid::from_raw(gid);
        let switch_error = |e: nix::Error| LockdownError::IdentitySwitch {
            kind: IdKind::Gid,
            id: gid,
            message: e.to_string(),
        };
        // Supplementary groups inherited from root must not survive the switch.
        nix::unistd::setgroups(&[target]).map_err(switch_error)?;
        nix::unistd::setgid(target).map_err(switch_error)?;
        tracing::debug!(gid, "gid switched");
        Ok(())
    }

    fn replace_process(&self, argv: &[String], env: &[(String, String)]) -> Result<Infallible> {
        let Some(program) = argv.first() else {
            return Err(LockdownError::InvalidCommand {
                message: "empty argument vector".into(),
            });
        };
        let c_argv = argv
            .iter()
            .map(|arg| c_string(arg))
            .collect::<Result<Vec<_>>>()?;
        let c_env = env
            .iter()
            .map(|(key, value)| c_string(&format!("{key}={value}")))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(program = %program, args = argv.len(), "replacing process image");
        let errno = match nix::unistd::execvpe(&c_argv[0], &c_argv, &c_env) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };
        Err(LockdownError::Exec {
            program: program.clone(),
            message: errno.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_capabilities_are_mapped() {
        let provider = LinuxProvider::new();
        let supported = provider.kernel_capabilities().unwrap_or_default();
        for id in supported {
            assert!(provider.capability(id).is_ok(), "unmapped capability {id}");
        }
    }

    #[test]
    fn securebits_can_be_read() {
        let provider = LinuxProvider::new();
        assert!(provider.control_get(ControlOp::SecureBits).is_ok());
    }

    #[test]
    fn no_new_privs_cannot_be_cleared() {
        let provider = LinuxProvider::new();
        let err = provider.control_set(ControlOp::NoNewPrivs, 0).unwrap_err();
        assert!(matches!(err, LockdownError::Control { .. }));
    }

    #[test]
    fn replace_process_rejects_empty_argv() {
        let provider = LinuxProvider::new();
        let err = provider.replace_process(&[], &[]).unwrap_err();
        assert!(matches!(err, LockdownError::InvalidCommand { .. }));
    }
}
