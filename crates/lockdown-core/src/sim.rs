//! In-memory [`CapabilityProvider`] that models the kernel's rules.
//!
//! Used by the test suites and by embedding applications that want to check
//! a lockdown configuration without touching the real process. The model
//! covers the rules the lockdown sequence depends on:
//! - the permitted set can only shrink, and effective must stay within it;
//! - inheritable additions must be in the bounding set;
//! - the bounding set only shrinks, and dropping needs `setpcap` effective;
//! - securebits writes need `setpcap` effective and respect the lock bits;
//! - `no_new_privs` is one-way;
//! - leaving UID 0 clears capabilities unless `KEEP_CAPS` or
//!   `NO_SETUID_FIXUP` say otherwise.
//!
//! Every applied mutation is appended to a journal so tests can assert on
//! ordering and syscall counts.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::convert::Infallible;

use lockdown_common::error::{IdKind, LockdownError, Result};
use lockdown_common::types::{CapSetKind, CapabilityId, ControlOp, SecureBit, SecureBits};

use crate::provider::CapabilityProvider;

const SETGID: CapabilityId = CapabilityId::new(6);
const SETUID: CapabilityId = CapabilityId::new(7);
const SETPCAP: CapabilityId = CapabilityId::new(8);

/// Highest capability number the default simulated kernel knows.
pub const SIM_LAST_CAP: u8 = 40;

/// A mutation applied by the simulated kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    /// One batched capability-set write.
    SetFlags {
        /// Flag set written.
        kind: CapSetKind,
        /// Capabilities written.
        ids: BTreeSet<CapabilityId>,
        /// `true` to set, `false` to clear.
        value: bool,
    },
    /// One bounding-set removal.
    BoundingDrop(CapabilityId),
    /// A control write.
    Control {
        /// Operation written.
        op: ControlOp,
        /// Value written.
        value: u32,
    },
    /// GID switch.
    SwitchGid(u32),
    /// UID switch.
    SwitchUid(u32),
    /// Attempted process replacement.
    Exec {
        /// Argument vector.
        argv: Vec<String>,
        /// Environment.
        env: Vec<(String, String)>,
    },
}

/// Primitive the simulated kernel should reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Reject every capability-set write.
    SetFlags,
    /// Reject every bounding-set removal.
    BoundingDrop,
    /// Reject securebits reads.
    SecureBitsRead,
    /// Reject `no_new_privs` writes.
    NoNewPrivs,
    /// Reject the UID switch.
    SwitchUid,
    /// Reject the GID switch.
    SwitchGid,
}

#[derive(Debug, Clone)]
struct SimState {
    kernel: BTreeSet<CapabilityId>,
    effective: BTreeSet<CapabilityId>,
    permitted: BTreeSet<CapabilityId>,
    inheritable: BTreeSet<CapabilityId>,
    bounding: BTreeSet<CapabilityId>,
    securebits: SecureBits,
    no_new_privs: bool,
    uid: u32,
    gid: u32,
    faults: Vec<SimFault>,
    clear_effective_on_setuid: bool,
    journal: Vec<SimCall>,
}

impl SimState {
    const fn set(&self, kind: CapSetKind) -> &BTreeSet<CapabilityId> {
        match kind {
            CapSetKind::Effective => &self.effective,
            CapSetKind::Permitted => &self.permitted,
            CapSetKind::Inheritable => &self.inheritable,
        }
    }

    fn set_mut(&mut self, kind: CapSetKind) -> &mut BTreeSet<CapabilityId> {
        match kind {
            CapSetKind::Effective => &mut self.effective,
            CapSetKind::Permitted => &mut self.permitted,
            CapSetKind::Inheritable => &mut self.inheritable,
        }
    }

    fn faulted(&self, fault: SimFault) -> bool {
        self.faults.contains(&fault)
    }

    fn check_capset(
        &self,
        kind: CapSetKind,
        ids: &BTreeSet<CapabilityId>,
        value: bool,
    ) -> std::result::Result<(), String> {
        if let Some(id) = ids.iter().find(|id| !self.kernel.contains(*id)) {
            return Err(format!("capability {id} unknown to the kernel"));
        }
        let mut next = self.set(kind).clone();
        for id in ids {
            if value {
                let _ = next.insert(*id);
            } else {
                let _ = next.remove(id);
            }
        }
        match kind {
            CapSetKind::Permitted => {
                if let Some(id) = next.difference(&self.permitted).next() {
                    return Err(format!("capability {id} cannot be added to permitted"));
                }
                if let Some(id) = self.effective.difference(&next).next() {
                    return Err(format!("effective capability {id} not in permitted"));
                }
            }
            CapSetKind::Effective => {
                if let Some(id) = next.difference(&self.permitted).next() {
                    return Err(format!("capability {id} not in permitted"));
                }
            }
            CapSetKind::Inheritable => {
                let added: Vec<CapabilityId> = next.difference(&self.inheritable).copied().collect();
                if let Some(id) = added.iter().find(|id| !self.bounding.contains(*id)) {
                    return Err(format!("capability {id} not in bounding set"));
                }
                let setpcap = self.effective.contains(&SETPCAP);
                if let Some(id) = added.iter().find(|id| !setpcap && !self.permitted.contains(*id)) {
                    return Err(format!("capability {id} not in permitted"));
                }
            }
        }
        Ok(())
    }

    fn check_securebits(&self, next: SecureBits) -> std::result::Result<(), String> {
        if !self.effective.contains(&SETPCAP) {
            return Err("setpcap not effective".into());
        }
        for bit in SecureBit::ALL {
            if self.securebits.contains(bit.locked()) {
                let frozen = bit.value() | bit.locked();
                if (self.securebits & frozen) != (next & frozen) {
                    return Err(format!("{bit} is locked"));
                }
            }
        }
        Ok(())
    }
}

/// Simulated process credentials.
#[derive(Debug)]
pub struct SimulatedProvider {
    state: RefCell<SimState>,
}

impl SimulatedProvider {
    /// A process on a kernel knowing `kernel`, with UID/GID 0, empty
    /// capability sets, and a bounding set equal to `kernel`.
    pub fn new(kernel: impl IntoIterator<Item = CapabilityId>) -> Self {
        let kernel: BTreeSet<_> = kernel.into_iter().collect();
        Self {
            state: RefCell::new(SimState {
                bounding: kernel.clone(),
                kernel,
                effective: BTreeSet::new(),
                permitted: BTreeSet::new(),
                inheritable: BTreeSet::new(),
                securebits: SecureBits::empty(),
                no_new_privs: false,
                uid: 0,
                gid: 0,
                faults: Vec::new(),
                clear_effective_on_setuid: false,
                journal: Vec::new(),
            }),
        }
    }

    /// A full root process: every capability permitted and effective.
    #[must_use]
    pub fn root() -> Self {
        let all: BTreeSet<_> = (0..=SIM_LAST_CAP).map(CapabilityId::new).collect();
        Self::new(all.clone())
            .with_set(CapSetKind::Permitted, all.clone())
            .with_set(CapSetKind::Effective, all)
    }

    /// Replaces the contents of one flag set, bypassing the kernel rules.
    #[must_use]
    pub fn with_set(self, kind: CapSetKind, ids: impl IntoIterator<Item = CapabilityId>) -> Self {
        *self.state.borrow_mut().set_mut(kind) = ids.into_iter().collect();
        self
    }

    /// Replaces the bounding set, bypassing the kernel rules.
    #[must_use]
    pub fn with_bounding(self, ids: impl IntoIterator<Item = CapabilityId>) -> Self {
        self.state.borrow_mut().bounding = ids.into_iter().collect();
        self
    }

    /// Replaces the securebits, bypassing the kernel rules.
    #[must_use]
    pub fn with_securebits(self, bits: SecureBits) -> Self {
        self.state.borrow_mut().securebits = bits;
        self
    }

    /// Sets the starting UID and GID.
    #[must_use]
    pub fn with_identity(self, uid: u32, gid: u32) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.uid = uid;
            state.gid = gid;
        }
        self
    }

    /// Makes the simulated kernel reject one kind of primitive.
    #[must_use]
    pub fn with_fault(self, fault: SimFault) -> Self {
        self.state.borrow_mut().faults.push(fault);
        self
    }

    /// Clears the effective set on every UID switch, even when the
    /// securebits suppress the usual fixup.
    #[must_use]
    pub fn clearing_effective_on_setuid(self) -> Self {
        self.state.borrow_mut().clear_effective_on_setuid = true;
        self
    }

    /// Current members of one flag set.
    pub fn set(&self, kind: CapSetKind) -> BTreeSet<CapabilityId> {
        self.state.borrow().set(kind).clone()
    }

    /// Current members of the bounding set.
    pub fn bounding(&self) -> BTreeSet<CapabilityId> {
        self.state.borrow().bounding.clone()
    }

    /// Current securebits.
    pub fn securebits(&self) -> SecureBits {
        self.state.borrow().securebits
    }

    /// Whether `no_new_privs` is engaged.
    pub fn no_new_privs(&self) -> bool {
        self.state.borrow().no_new_privs
    }

    /// Current UID.
    pub fn uid(&self) -> u32 {
        self.state.borrow().uid
    }

    /// Current GID.
    pub fn gid(&self) -> u32 {
        self.state.borrow().gid
    }

    /// Every mutation applied so far, oldest first.
    pub fn journal(&self) -> Vec<SimCall> {
        self.state.borrow().journal.clone()
    }

    /// Forgets the journal.
    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }
}

impl CapabilityProvider for SimulatedProvider {
    fn kernel_capabilities(&self) -> Result<BTreeSet<CapabilityId>> {
        Ok(self.state.borrow().kernel.clone())
    }

    fn query_capability_flag(&self, kind: CapSetKind, id: CapabilityId) -> Result<bool> {
        Ok(self.state.borrow().set(kind).contains(&id))
    }

    fn set_capability_flags(
        &self,
        kind: CapSetKind,
        ids: &BTreeSet<CapabilityId>,
        value: bool,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.faulted(SimFault::SetFlags) {
            return Err(LockdownError::provider(format!("{kind} write rejected")));
        }
        state
            .check_capset(kind, ids, value)
            .map_err(LockdownError::provider)?;
        let set = state.set_mut(kind);
        for id in ids {
            if value {
                let _ = set.insert(*id);
            } else {
                let _ = set.remove(id);
            }
        }
        state.journal.push(SimCall::SetFlags {
            kind,
            ids: ids.clone(),
            value,
        });
        Ok(())
    }

    fn bounding_contains(&self, id: CapabilityId) -> Result<bool> {
        Ok(self.state.borrow().bounding.contains(&id))
    }

    fn bounding_drop(&self, id: CapabilityId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.faulted(SimFault::BoundingDrop) || !state.effective.contains(&SETPCAP) {
            return Err(LockdownError::provider(format!(
                "dropping {id} from bounding set: operation not permitted"
            )));
        }
        let _ = state.bounding.remove(&id);
        state.journal.push(SimCall::BoundingDrop(id));
        Ok(())
    }

    fn control_get(&self, op: ControlOp) -> Result<u32> {
        let state = self.state.borrow();
        match op {
            ControlOp::SecureBits if state.faulted(SimFault::SecureBitsRead) => {
                Err(LockdownError::Control {
                    operation: op.name(),
                    message: "query rejected".into(),
                })
            }
            ControlOp::SecureBits => Ok(state.securebits.bits()),
            ControlOp::NoNewPrivs => Ok(u32::from(state.no_new_privs)),
        }
    }

    fn control_set(&self, op: ControlOp, value: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let rejected = |message: String| LockdownError::Control {
            operation: op.name(),
            message,
        };
        match op {
            ControlOp::SecureBits => {
                let next = SecureBits::from_bits(value)
                    .ok_or_else(|| rejected(format!("invalid securebits {value:#x}")))?;
                state.check_securebits(next).map_err(rejected)?;
                state.securebits = next;
            }
            ControlOp::NoNewPrivs => {
                if state.faulted(SimFault::NoNewPrivs) {
                    return Err(rejected("write rejected".into()));
                }
                if value == 0 && state.no_new_privs {
                    return Err(rejected("no_new_privs cannot be cleared".into()));
                }
                state.no_new_privs = value != 0;
            }
        }
        state.journal.push(SimCall::Control { op, value });
        Ok(())
    }

    fn switch_uid(&self, uid: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.faulted(SimFault::SwitchUid) || !state.effective.contains(&SETUID) {
            return Err(LockdownError::IdentitySwitch {
                kind: IdKind::Uid,
                id: uid,
                message: "operation not permitted".into(),
            });
        }
        let leaving_root = state.uid == 0 && uid != 0;
        if leaving_root && !state.securebits.contains(SecureBits::NO_SETUID_FIXUP) {
            if !state.securebits.contains(SecureBits::KEEP_CAPS) {
                state.permitted.clear();
            }
            state.effective.clear();
        }
        if state.clear_effective_on_setuid {
            state.effective.clear();
        }
        state.uid = uid;
        state.journal.push(SimCall::SwitchUid(uid));
        Ok(())
    }

    fn switch_gid(&self, gid: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.faulted(SimFault::SwitchGid) || !state.effective.contains(&SETGID) {
            return Err(LockdownError::IdentitySwitch {
                kind: IdKind::Gid,
                id: gid,
                message: "operation not permitted".into(),
            });
        }
        state.gid = gid;
        state.journal.push(SimCall::SwitchGid(gid));
        Ok(())
    }

    fn replace_process(&self, argv: &[String], env: &[(String, String)]) -> Result<Infallible> {
        self.state.borrow_mut().journal.push(SimCall::Exec {
            argv: argv.to_vec(),
            env: env.to_vec(),
        });
        Err(LockdownError::Exec {
            program: argv.first().cloned().unwrap_or_default(),
            message: "process replacement is simulated".into(),
        })
    }
}
