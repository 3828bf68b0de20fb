//! Domain primitive types used across the lockdown workspace.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::LockdownError;

/// Kernel capability number.
///
/// Only meaningful once validated against the registry for the running
/// kernel; the registry is the sole authority mapping names to IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityId(u8);

impl CapabilityId {
    /// Wraps a raw capability number.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Returns the raw capability number.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three per-process capability flag sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapSetKind {
    /// Capabilities currently enforced by the kernel.
    Effective,
    /// Capabilities the process may activate.
    Permitted,
    /// Capabilities preserved across `execve` into capability-aware programs.
    Inheritable,
}

impl fmt::Display for CapSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effective => write!(f, "effective"),
            Self::Permitted => write!(f, "permitted"),
            Self::Inheritable => write!(f, "inheritable"),
        }
    }
}

impl FromStr for CapSetKind {
    type Err = LockdownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "effective" => Ok(Self::Effective),
            "permitted" => Ok(Self::Permitted),
            "inheritable" => Ok(Self::Inheritable),
            other => Err(LockdownError::Config {
                message: format!("unknown capability set: {other}"),
            }),
        }
    }
}

bitflags! {
    /// The process securebits mask.
    ///
    /// Each toggle has a `_LOCKED` companion; once the lock is set the
    /// toggle is frozen for the life of the process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SecureBits: u32 {
        /// UID 0 does not grant capabilities.
        const NOROOT = constants::SECBIT_NOROOT;
        /// Freezes [`SecureBits::NOROOT`].
        const NOROOT_LOCKED = constants::SECBIT_NOROOT_LOCKED;
        /// UID transitions leave capability sets alone.
        const NO_SETUID_FIXUP = constants::SECBIT_NO_SETUID_FIXUP;
        /// Freezes [`SecureBits::NO_SETUID_FIXUP`].
        const NO_SETUID_FIXUP_LOCKED = constants::SECBIT_NO_SETUID_FIXUP_LOCKED;
        /// Permitted capabilities survive leaving UID 0.
        const KEEP_CAPS = constants::SECBIT_KEEP_CAPS;
        /// Freezes [`SecureBits::KEEP_CAPS`].
        const KEEP_CAPS_LOCKED = constants::SECBIT_KEEP_CAPS_LOCKED;
    }
}

/// A root-semantics toggle, without its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecureBit {
    /// `SECBIT_NOROOT`.
    NoRoot,
    /// `SECBIT_KEEP_CAPS`.
    KeepCaps,
    /// `SECBIT_NO_SETUID_FIXUP`.
    NoSetuidFixup,
}

impl SecureBit {
    /// All toggles, in the order the orchestrator enables them.
    pub const ALL: [Self; 3] = [Self::NoRoot, Self::KeepCaps, Self::NoSetuidFixup];

    /// The value bit for this toggle.
    #[must_use]
    pub const fn value(self) -> SecureBits {
        match self {
            Self::NoRoot => SecureBits::NOROOT,
            Self::KeepCaps => SecureBits::KEEP_CAPS,
            Self::NoSetuidFixup => SecureBits::NO_SETUID_FIXUP,
        }
    }

    /// The lock bit for this toggle.
    #[must_use]
    pub const fn locked(self) -> SecureBits {
        match self {
            Self::NoRoot => SecureBits::NOROOT_LOCKED,
            Self::KeepCaps => SecureBits::KEEP_CAPS_LOCKED,
            Self::NoSetuidFixup => SecureBits::NO_SETUID_FIXUP_LOCKED,
        }
    }
}

impl fmt::Display for SecureBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRoot => write!(f, "noroot"),
            Self::KeepCaps => write!(f, "keep_caps"),
            Self::NoSetuidFixup => write!(f, "no_setuid_fixup"),
        }
    }
}

/// Process control operations used by the lockdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    /// `PR_GET_SECUREBITS` / `PR_SET_SECUREBITS`.
    SecureBits,
    /// `PR_GET_NO_NEW_PRIVS` / `PR_SET_NO_NEW_PRIVS`.
    NoNewPrivs,
}

impl ControlOp {
    /// Short name used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SecureBits => "securebits",
            Self::NoNewPrivs => "no_new_privs",
        }
    }
}

/// Numeric identity the process should switch to.
///
/// Name resolution happens before this point; `None` leaves that half of
/// the identity unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    /// Target user ID.
    pub uid: Option<u32>,
    /// Target group ID.
    pub gid: Option<u32>,
}

impl TargetIdentity {
    /// Identity switching to both `uid` and `gid`.
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Some(uid),
            gid: Some(gid),
        }
    }

    /// Identity that keeps the current UID and GID.
    #[must_use]
    pub const fn unchanged() -> Self {
        Self { uid: None, gid: None }
    }

    /// Returns `true` when either half of the identity changes.
    #[must_use]
    pub const fn changes(&self) -> bool {
        self.uid.is_some() || self.gid.is_some()
    }
}

/// Capability input as accepted at API boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityInput {
    /// A capability name such as `net_bind_service`, case-insensitive.
    Name(String),
    /// An already-numeric capability.
    Id(CapabilityId),
    /// Several inputs, normalized element-wise.
    List(Vec<CapabilityInput>),
}

impl CapabilityInput {
    /// The empty input.
    #[must_use]
    pub const fn none() -> Self {
        Self::List(Vec::new())
    }
}

impl From<&str> for CapabilityInput {
    /// Splits a comma-separated list of names.
    fn from(value: &str) -> Self {
        let mut parts: Vec<Self> = value
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| Self::Name(part.to_string()))
            .collect();
        if parts.len() == 1 {
            parts.swap_remove(0)
        } else {
            Self::List(parts)
        }
    }
}

impl From<String> for CapabilityInput {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<CapabilityId> for CapabilityInput {
    fn from(value: CapabilityId) -> Self {
        Self::Id(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for CapabilityInput {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CapabilityInput {
    fn from(values: [&str; N]) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// How normalization treats input it cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Fail the whole normalization, listing every unresolved element.
    Strict,
    /// Silently drop unresolved elements.
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_string_becomes_list() {
        let input = CapabilityInput::from("net_raw, net_admin");
        assert_eq!(
            input,
            CapabilityInput::List(vec![
                CapabilityInput::Name("net_raw".into()),
                CapabilityInput::Name(" net_admin".into()),
            ])
        );
    }

    #[test]
    fn single_name_is_not_wrapped() {
        assert_eq!(
            CapabilityInput::from("kill"),
            CapabilityInput::Name("kill".into())
        );
    }

    #[test]
    fn empty_string_is_empty_list() {
        assert_eq!(CapabilityInput::from(" , "), CapabilityInput::none());
    }

    #[test]
    fn secure_bit_pairs_match_kernel_layout() {
        assert_eq!(SecureBit::NoRoot.value().bits(), 1);
        assert_eq!(SecureBit::NoRoot.locked().bits(), 2);
        assert_eq!(SecureBit::NoSetuidFixup.value().bits(), 4);
        assert_eq!(SecureBit::KeepCaps.locked().bits(), 32);
    }

    #[test]
    fn cap_set_kind_parses_case_insensitively() {
        assert_eq!(" Permitted ".parse::<CapSetKind>().ok(), Some(CapSetKind::Permitted));
        assert!("ambient".parse::<CapSetKind>().is_err());
    }
}
