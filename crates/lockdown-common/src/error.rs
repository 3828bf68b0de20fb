//! Unified error types for the lockdown workspace.
//!
//! Every failure raised while privileges are being dropped is fatal: the
//! process is left in a partially-dropped state and must not go on to run
//! the target command.

use std::fmt;

use thiserror::Error;

/// Which half of the identity a failed switch was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// User ID.
    Uid,
    /// Group ID.
    Gid,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uid => write!(f, "uid"),
            Self::Gid => write!(f, "gid"),
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum LockdownError {
    /// One or more capability names are not supported by the running kernel.
    #[error("capabilities not supported: {}", names.join(","))]
    UnknownCapability {
        /// The offending names, as given by the caller.
        names: Vec<String>,
    },

    /// The process lacks a capability it needs to proceed.
    #[error("insufficient privilege: the current process does not hold {capability}")]
    InsufficientPrivilege {
        /// Name of the missing capability.
        capability: String,
    },

    /// A securebits or `no_new_privs` control call failed.
    #[error("control call {operation} failed: {message}")]
    Control {
        /// The control operation that failed.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The kernel rejected a UID or GID change.
    #[error("failed to switch {kind} to {id}: {message}")]
    IdentitySwitch {
        /// Whether the UID or the GID switch failed.
        kind: IdKind,
        /// The requested ID.
        id: u32,
        /// Description of the failure.
        message: String,
    },

    /// Generic failure from the OS capability provider.
    #[error("capability provider error: {message}")]
    Provider {
        /// Description of the failure.
        message: String,
    },

    /// A user or group could not be resolved.
    #[error("{kind} not known: {id}")]
    NotFound {
        /// Type of the missing entity.
        kind: &'static str,
        /// The name or numeric ID that was looked up.
        id: String,
    },

    /// The command to run could not be turned into an argument vector.
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// Description of the problem.
        message: String,
    },

    /// Replacing the process image failed.
    #[error("failed to execute {program}: {message}")]
    Exec {
        /// Program that could not be executed.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl LockdownError {
    /// Returns `true` when the error leaves the process in a state where
    /// running application logic is no longer safe.
    ///
    /// Validation and resolution errors happen before any kernel state is
    /// touched and are therefore not fatal in this sense.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InsufficientPrivilege { .. }
                | Self::Control { .. }
                | Self::IdentitySwitch { .. }
                | Self::Provider { .. }
                | Self::Exec { .. }
        )
    }

    /// Shorthand for an [`LockdownError::InsufficientPrivilege`] error.
    pub fn insufficient(capability: impl Into<String>) -> Self {
        Self::InsufficientPrivilege {
            capability: capability.into(),
        }
    }

    /// Shorthand for a [`LockdownError::Provider`] error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LockdownError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_capability_lists_every_name() {
        let err = LockdownError::UnknownCapability {
            names: vec!["foo".into(), "Net_Bogus".into()],
        };
        assert_eq!(err.to_string(), "capabilities not supported: foo,Net_Bogus");
    }

    #[test]
    fn identity_switch_names_the_id_kind() {
        let err = LockdownError::IdentitySwitch {
            kind: IdKind::Gid,
            id: 1000,
            message: "EPERM".into(),
        };
        assert_eq!(err.to_string(), "failed to switch gid to 1000: EPERM");
    }

    #[test]
    fn validation_errors_are_not_fatal() {
        let err = LockdownError::UnknownCapability { names: Vec::new() };
        assert!(!err.is_fatal());
        assert!(LockdownError::insufficient("setpcap").is_fatal());
    }
}
