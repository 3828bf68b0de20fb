//! Launch configuration model.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything needed to drop privileges and start the target command.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// User to run as, by name or numeric ID.
    pub user: Option<String>,
    /// Primary group to run with, by name or numeric ID.
    ///
    /// Defaults to the user's primary group when only a user is given.
    pub group: Option<String>,
    /// Comma-separated capability names to keep.
    pub capabilities: Option<String>,
    /// Run the command through `/bin/sh -c`.
    pub shell: bool,
    /// Start the command with an empty environment.
    pub drop_env: bool,
    /// Point `HOME` at the target user's home directory.
    pub set_home: bool,
    /// The command and its arguments.
    pub command: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            user: None,
            group: None,
            capabilities: None,
            shell: false,
            drop_env: false,
            set_home: true,
            command: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Raw capability list, or the empty string when none was given.
    #[must_use]
    pub fn capability_list(&self) -> &str {
        self.capabilities.as_deref().unwrap_or_default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Serialization`](crate::error::LockdownError::Serialization)
    /// if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::Serialization`](crate::error::LockdownError::Serialization)
    /// if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_list_defaults_to_empty() {
        assert_eq!(LaunchConfig::default().capability_list(), "");
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let config = LaunchConfig::from_json(r#"{"user":"nobody","command":["true"]}"#).unwrap();
        assert_eq!(config.user.as_deref(), Some("nobody"));
        assert!(config.set_home);
        assert!(!config.shell);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = LaunchConfig::from_json("{").unwrap_err();
        assert!(matches!(err, crate::error::LockdownError::Serialization { .. }));
    }
}
