//! The privilege lockdown sequence.
//!
//! Drops the process to a target UID/GID while keeping exactly a whitelist
//! of capabilities, then engages `no_new_privs`. The order of the stages is
//! load-bearing:
//!
//! 1. **Self-check**: `setpcap` (and `setuid`/`setgid` when switching) must
//!    be held; they are raised into the effective set before anything else
//!    changes.
//! 2. **Harden**: `NOROOT`, `KEEP_CAPS`, and `NO_SETUID_FIXUP` are set and
//!    locked, so the UID switch neither wipes nor re-grants capabilities.
//! 3. **Identity switch**: GID first, then UID.
//! 4. **Capability pin**: bounding set first, then inheritable, effective,
//!    and permitted last.
//! 5. **Privilege lock**: `no_new_privs`.
//!
//! A failure at any stage leaves the process partially dropped. The caller
//! must terminate; the sequence is neither retryable nor resumable.
//!
//! This must run before other threads exist, or while the caller guarantees
//! nothing else touches capability state.

use std::collections::BTreeSet;
use std::fmt;

use lockdown_common::constants::{CAP_SETGID, CAP_SETPCAP, CAP_SETUID};
use lockdown_common::error::{LockdownError, Result};
use lockdown_common::types::{CapabilityId, CapabilityInput, ControlOp, NormalizeMode, TargetIdentity};

use crate::context::Context;
use crate::provider::CapabilityProvider;

/// Which parts of the sequence apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Full sequence.
    Linux,
    /// Identity switch and `no_new_privs` only; no capability machinery.
    ///
    /// The UID and GID still change here when requested, so a caller on a
    /// non-Linux target still ends up unprivileged.
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }
}

/// Stage of the lockdown sequence, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing changed yet.
    Initial,
    /// Checking and raising the capabilities the drop itself needs.
    SelfCheck,
    /// Setting and locking securebits.
    Harden,
    /// Switching GID and UID.
    IdentitySwitch,
    /// Pinning bounding, inheritable, effective, and permitted sets.
    CapabilityPin,
    /// Engaging `no_new_privs`.
    PrivilegeLock,
    /// Finished.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::SelfCheck => "self-check",
            Self::Harden => "harden",
            Self::IdentitySwitch => "identity-switch",
            Self::CapabilityPin => "capability-pin",
            Self::PrivilegeLock => "privilege-lock",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful lockdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockdownReport {
    /// Capabilities left in every set.
    pub retained: BTreeSet<CapabilityId>,
    /// Requested capabilities that were not permitted and so were not kept.
    pub not_permitted: BTreeSet<CapabilityId>,
    /// UID switched to, if any.
    pub uid: Option<u32>,
    /// GID switched to, if any.
    pub gid: Option<u32>,
}

/// Runs the lockdown sequence against a [`Context`].
#[derive(Debug)]
pub struct Lockdown<'a, P> {
    ctx: &'a Context<P>,
    platform: Platform,
}

impl<'a, P: CapabilityProvider> Lockdown<'a, P> {
    /// Lockdown for the platform this binary was built for.
    pub const fn new(ctx: &'a Context<P>) -> Self {
        Self {
            ctx,
            platform: Platform::current(),
        }
    }

    /// Overrides the platform.
    #[must_use]
    pub const fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Drops to `identity`, keeping `keep` where currently permitted.
    ///
    /// Requested capabilities the kernel does not support are ignored.
    /// Requested capabilities that are supported but not permitted are
    /// silently not kept; they are listed in
    /// [`LockdownReport::not_permitted`].
    ///
    /// # Errors
    ///
    /// - [`LockdownError::InsufficientPrivilege`] before any change if
    ///   `setpcap`, or `setuid`/`setgid` for a requested switch, is missing.
    /// - [`LockdownError::Control`], [`LockdownError::IdentitySwitch`], or
    ///   [`LockdownError::Provider`] if a later stage fails. The process is
    ///   then partially dropped and must exit.
    pub fn run(
        &self,
        identity: TargetIdentity,
        keep: &CapabilityInput,
    ) -> Result<LockdownReport> {
        let keep = self.ctx.registry().normalize(keep, NormalizeMode::Lenient)?;
        tracing::debug!(
            stage = %Stage::Initial,
            uid = ?identity.uid,
            gid = ?identity.gid,
            keep = keep.len(),
            "lockdown requested"
        );
        let mut report = LockdownReport {
            uid: identity.uid,
            gid: identity.gid,
            ..LockdownReport::default()
        };

        if self.platform == Platform::Linux {
            enter(Stage::SelfCheck);
            self.self_check(identity)?;

            enter(Stage::Harden);
            self.ctx.securebits().harden_root_semantics()?;
        }

        enter(Stage::IdentitySwitch);
        self.switch_identity(identity)?;

        if self.platform == Platform::Linux {
            enter(Stage::CapabilityPin);
            let (retained, not_permitted) = self.pin_capabilities(&keep)?;
            report.retained = retained;
            report.not_permitted = not_permitted;
        }

        enter(Stage::PrivilegeLock);
        self.ctx.provider().control_set(ControlOp::NoNewPrivs, 1)?;

        tracing::info!(
            stage = %Stage::Done,
            retained = report.retained.len(),
            uid = ?report.uid,
            gid = ?report.gid,
            "privileges locked down"
        );
        Ok(report)
    }

    fn self_check(&self, identity: TargetIdentity) -> Result<()> {
        let mut needed = vec![CAP_SETPCAP];
        if identity.uid.is_some() {
            needed.push(CAP_SETUID);
        }
        if identity.gid.is_some() {
            needed.push(CAP_SETGID);
        }

        let effective = self.ctx.effective();
        let permitted = self.ctx.permitted();
        let mut raise = BTreeSet::new();
        for name in needed {
            let id = self.required(name)?;
            if effective.contains(id)? {
                continue;
            }
            if !permitted.contains(id)? {
                return Err(LockdownError::insufficient(name));
            }
            let _ = raise.insert(id);
        }
        // All checks pass before the first write.
        effective.add(&raise)
    }

    fn switch_identity(&self, identity: TargetIdentity) -> Result<()> {
        if !identity.changes() {
            tracing::debug!("keeping current uid and gid");
            return Ok(());
        }
        if let Some(gid) = identity.gid {
            self.ctx.provider().switch_gid(gid)?;
            tracing::info!(gid, "switched group");
        }
        if let Some(uid) = identity.uid {
            self.ctx.provider().switch_uid(uid)?;
            tracing::info!(uid, "switched user");
        }
        Ok(())
    }

    fn pin_capabilities(
        &self,
        keep: &BTreeSet<CapabilityId>,
    ) -> Result<(BTreeSet<CapabilityId>, BTreeSet<CapabilityId>)> {
        // The UID switch may have cleared effective even under KEEP_CAPS.
        let setpcap = self.required(CAP_SETPCAP)?;
        if !self.ctx.effective().contains(setpcap)? {
            if !self.ctx.permitted().contains(setpcap)? {
                return Err(LockdownError::insufficient(CAP_SETPCAP));
            }
            self.ctx.effective().add(&BTreeSet::from([setpcap]))?;
        }

        let permitted = self.ctx.permitted().snapshot()?;
        let retained: BTreeSet<_> = permitted.intersection(keep).copied().collect();
        let not_permitted: BTreeSet<_> = keep.difference(&permitted).copied().collect();
        if !not_permitted.is_empty() {
            let names: Vec<_> = not_permitted
                .iter()
                .filter_map(|id| self.ctx.registry().name_of(*id))
                .collect();
            tracing::warn!(?names, "requested capabilities are not permitted and will not be kept");
        }

        self.ctx.bounding().restrict_to(&retained)?;
        self.ctx.inheritable().replace(&retained)?;
        self.ctx.effective().replace(&retained)?;
        self.ctx.permitted().replace(&retained)?;
        Ok((retained, not_permitted))
    }

    fn required(&self, name: &'static str) -> Result<CapabilityId> {
        self.ctx
            .registry()
            .lookup(name)
            .ok_or_else(|| LockdownError::insufficient(name))
    }
}

fn enter(stage: Stage) {
    tracing::info!(%stage, "lockdown stage");
}

#[cfg(test)]
mod tests {
    use lockdown_common::error::IdKind;
    use lockdown_common::types::{CapSetKind, SecureBits};

    use super::*;
    use crate::sim::{SimCall, SimFault, SimulatedProvider};

    fn ids(raw: &[u8]) -> BTreeSet<CapabilityId> {
        raw.iter().copied().map(CapabilityId::new).collect()
    }

    const NET_BIND_SERVICE: u8 = 10;
    const SYS_ADMIN: u8 = 21;

    #[test]
    fn missing_setpcap_fails_before_any_mutation() {
        let sim = SimulatedProvider::root()
            .with_set(CapSetKind::Permitted, ids(&[6, 7, SYS_ADMIN]))
            .with_set(CapSetKind::Effective, ids(&[6, 7, SYS_ADMIN]));
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::new(1000, 1000), &"sys_admin".into())
            .unwrap_err();
        assert!(matches!(
            err,
            LockdownError::InsufficientPrivilege { ref capability } if capability == "setpcap"
        ));
        assert!(sim.journal().is_empty());
        assert_eq!(sim.uid(), 0);
        assert_eq!(sim.securebits(), SecureBits::empty());
    }

    #[test]
    fn missing_setuid_fails_before_any_mutation() {
        let sim = SimulatedProvider::root()
            .with_set(CapSetKind::Permitted, ids(&[8]))
            .with_set(CapSetKind::Effective, ids(&[]));
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity { uid: Some(1000), gid: None }, &CapabilityInput::none())
            .unwrap_err();
        assert!(matches!(
            err,
            LockdownError::InsufficientPrivilege { ref capability } if capability == "setuid"
        ));
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn setpcap_is_raised_from_permitted() {
        let all: Vec<u8> = (0..=40).collect();
        let sim = SimulatedProvider::root().with_set(
            CapSetKind::Effective,
            all.iter().copied().filter(|id| *id != 8).map(CapabilityId::new),
        );
        let ctx = Context::new(&sim).unwrap();
        let report = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::unchanged(), &"kill".into())
            .unwrap();
        assert_eq!(report.retained, ids(&[5]));
        assert_eq!(
            sim.journal()[0],
            SimCall::SetFlags {
                kind: CapSetKind::Effective,
                ids: ids(&[8]),
                value: true,
            }
        );
    }

    #[test]
    fn gid_only_switch_raises_setgid_from_permitted() {
        let sim = SimulatedProvider::root()
            .with_set(CapSetKind::Permitted, ids(&[6, 7, 8]))
            .with_set(CapSetKind::Effective, ids(&[8]));
        let ctx = Context::new(&sim).unwrap();
        let report = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity { uid: None, gid: Some(50) }, &CapabilityInput::none())
            .unwrap();
        assert_eq!(report.gid, Some(50));
        assert_eq!(report.uid, None);
        assert_eq!(sim.gid(), 50);
        assert_eq!(sim.uid(), 0);
        assert_eq!(
            sim.journal()[0],
            SimCall::SetFlags {
                kind: CapSetKind::Effective,
                ids: ids(&[6]),
                value: true,
            }
        );
        assert!(!sim.journal().iter().any(|c| matches!(c, SimCall::SwitchUid(_))));
    }

    #[test]
    fn missing_setgid_fails_before_any_mutation() {
        let sim = SimulatedProvider::root()
            .with_set(CapSetKind::Permitted, ids(&[8]))
            .with_set(CapSetKind::Effective, ids(&[8]));
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity { uid: None, gid: Some(50) }, &CapabilityInput::none())
            .unwrap_err();
        assert!(matches!(
            err,
            LockdownError::InsufficientPrivilege { ref capability } if capability == "setgid"
        ));
        assert!(sim.journal().is_empty());
        assert_eq!(sim.gid(), 0);
    }

    #[test]
    fn failed_gid_switch_aborts_with_securebits_locked() {
        let sim = SimulatedProvider::root().with_fault(SimFault::SwitchGid);
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::new(1000, 1000), &"net_bind_service".into())
            .unwrap_err();
        assert!(matches!(
            err,
            LockdownError::IdentitySwitch { kind: IdKind::Gid, id: 1000, .. }
        ));
        assert_eq!(sim.securebits(), SecureBits::all());
        assert_eq!((sim.uid(), sim.gid()), (0, 0));
        assert!(!sim.no_new_privs());
        assert!(
            !sim.journal()
                .iter()
                .any(|c| matches!(c, SimCall::SwitchUid(_) | SimCall::BoundingDrop(_)))
        );
    }

    #[test]
    fn rejected_bounding_drop_aborts_before_pinning() {
        let sim = SimulatedProvider::root().with_fault(SimFault::BoundingDrop);
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::unchanged(), &"kill".into())
            .unwrap_err();
        assert!(matches!(err, LockdownError::Provider { .. }));
        assert!(!sim.no_new_privs());
        assert!(!sim.journal().iter().any(|c| matches!(
            c,
            SimCall::SetFlags {
                kind: CapSetKind::Inheritable | CapSetKind::Permitted,
                ..
            }
        )));
        assert_eq!(sim.set(CapSetKind::Permitted).len(), 41);
    }

    #[test]
    fn gid_is_switched_before_uid() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        let _ = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::new(1000, 1000), &CapabilityInput::none())
            .unwrap();
        let journal = sim.journal();
        let gid = journal.iter().position(|c| *c == SimCall::SwitchGid(1000));
        let uid = journal.iter().position(|c| *c == SimCall::SwitchUid(1000));
        assert!(gid.is_some() && uid.is_some());
        assert!(gid < uid);
    }

    #[test]
    fn securebits_are_locked_before_identity_switch() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        let _ = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::new(1000, 1000), &CapabilityInput::none())
            .unwrap();
        let journal = sim.journal();
        let last_securebits = journal
            .iter()
            .rposition(|c| matches!(c, SimCall::Control { op: ControlOp::SecureBits, .. }));
        let first_switch = journal.iter().position(|c| matches!(c, SimCall::SwitchGid(_)));
        assert!(last_securebits < first_switch);
    }

    #[test]
    fn setpcap_is_reraised_after_uid_switch() {
        let sim = SimulatedProvider::root().clearing_effective_on_setuid();
        let ctx = Context::new(&sim).unwrap();
        let report = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::new(1000, 1000), &"net_bind_service".into())
            .unwrap();
        assert_eq!(report.retained, ids(&[NET_BIND_SERVICE]));
        assert_eq!(sim.bounding(), ids(&[NET_BIND_SERVICE]));
    }

    #[test]
    fn unpermitted_request_is_reported_not_granted() {
        let sim = SimulatedProvider::root()
            .with_set(CapSetKind::Permitted, ids(&[6, 7, 8]))
            .with_set(CapSetKind::Effective, ids(&[6, 7, 8]));
        let ctx = Context::new(&sim).unwrap();
        let report = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::unchanged(), &"net_raw,setuid".into())
            .unwrap();
        assert_eq!(report.retained, ids(&[7]));
        assert_eq!(report.not_permitted, ids(&[13]));
        assert_eq!(sim.set(CapSetKind::Permitted), ids(&[7]));
    }

    #[test]
    fn no_new_privs_failure_is_surfaced() {
        let sim = SimulatedProvider::root().with_fault(SimFault::NoNewPrivs);
        let ctx = Context::new(&sim).unwrap();
        let err = Lockdown::new(&ctx)
            .platform(Platform::Linux)
            .run(TargetIdentity::unchanged(), &CapabilityInput::none())
            .unwrap_err();
        assert!(matches!(err, LockdownError::Control { operation: "no_new_privs", .. }));
    }

    #[test]
    fn other_platform_only_switches_identity_and_locks_exec() {
        let sim = SimulatedProvider::root();
        let ctx = Context::new(&sim).unwrap();
        let report = Lockdown::new(&ctx)
            .platform(Platform::Other)
            .run(TargetIdentity::new(1000, 100), &"kill".into())
            .unwrap();
        assert!(report.retained.is_empty());
        assert_eq!(
            sim.journal(),
            vec![
                SimCall::SwitchGid(100),
                SimCall::SwitchUid(1000),
                SimCall::Control {
                    op: ControlOp::NoNewPrivs,
                    value: 1,
                },
            ]
        );
    }
}
