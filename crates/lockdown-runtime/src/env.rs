//! Environment for the replacement program.

use std::collections::BTreeMap;

use lockdown_common::constants::{HOME_ENV_VAR, SCRUBBED_ENV_VARS, USER_ENV_VARS};

use crate::identity::ResolvedUser;

/// How the child environment is derived from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvOptions {
    /// Start from an empty environment instead of the inherited one.
    pub drop_env: bool,
    /// Point `HOME` at the target user's home directory.
    pub set_home: bool,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            drop_env: false,
            set_home: true,
        }
    }
}

/// The current process environment, skipping entries that are not UTF-8.
pub fn inherited_environment() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Builds the environment for the target program, sorted by name.
///
/// When switching user, `USER`, `USERNAME`, and `LOGNAME` name the target
/// user, and `HOME` follows unless disabled. `MAIL` is always removed.
pub fn build_environment(
    base: impl IntoIterator<Item = (String, String)>,
    options: EnvOptions,
    user: Option<&ResolvedUser>,
) -> Vec<(String, String)> {
    let mut env: BTreeMap<String, String> = if options.drop_env {
        BTreeMap::new()
    } else {
        base.into_iter().collect()
    };

    if let Some(user) = user {
        if options.set_home {
            let _ = env.insert(HOME_ENV_VAR.into(), user.home.to_string_lossy().into_owned());
        }
        for key in USER_ENV_VARS {
            let _ = env.insert(key.into(), user.name.clone());
        }
    }
    for key in SCRUBBED_ENV_VARS {
        let _ = env.remove(key);
    }
    env.into_iter().collect()
}
