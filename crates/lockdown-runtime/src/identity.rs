//! User and group resolution.
//!
//! Names are tried first, then numeric IDs, so a user literally named
//! `1000` still resolves by name.

use std::path::PathBuf;

use lockdown_common::error::{LockdownError, Result};
use nix::unistd::{Gid, Group, Uid, User};

/// A user looked up in the account database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// Numeric user ID.
    pub uid: u32,
    /// Primary group ID.
    pub gid: u32,
    /// Login name.
    pub name: String,
    /// Home directory.
    pub home: PathBuf,
}

/// Source of user and group information.
pub trait IdentityResolver {
    /// Resolves a user by name or numeric ID.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::NotFound`] if no such user exists.
    fn resolve_user(&self, name_or_id: &str) -> Result<ResolvedUser>;

    /// Resolves a group by name or numeric ID.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::NotFound`] if no such group exists.
    fn resolve_group(&self, name_or_id: &str) -> Result<u32>;
}

/// Resolver backed by the system account database (`getpwnam(3)` and
/// friends, through NSS).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

fn lookup_failed(kind: &str, id: &str, err: nix::Error) -> LockdownError {
    LockdownError::Config {
        message: format!("looking up {kind} {id}: {err}"),
    }
}

impl IdentityResolver for SystemResolver {
    fn resolve_user(&self, name_or_id: &str) -> Result<ResolvedUser> {
        let id = name_or_id.trim();
        let mut user = User::from_name(id).map_err(|e| lookup_failed("user", id, e))?;
        if user.is_none() {
            if let Ok(raw) = id.parse::<u32>() {
                user = User::from_uid(Uid::from_raw(raw)).map_err(|e| lookup_failed("user", id, e))?;
            }
        }
        let user = user.ok_or_else(|| LockdownError::NotFound {
            kind: "user",
            id: id.to_string(),
        })?;
        tracing::debug!(name = %user.name, uid = user.uid.as_raw(), "user resolved");
        Ok(ResolvedUser {
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            name: user.name,
            home: user.dir,
        })
    }

    fn resolve_group(&self, name_or_id: &str) -> Result<u32> {
        let id = name_or_id.trim();
        let mut group = Group::from_name(id).map_err(|e| lookup_failed("group", id, e))?;
        if group.is_none() {
            if let Ok(raw) = id.parse::<u32>() {
                group = Group::from_gid(Gid::from_raw(raw)).map_err(|e| lookup_failed("group", id, e))?;
            }
        }
        group.map(|g| g.gid.as_raw()).ok_or_else(|| LockdownError::NotFound {
            kind: "group",
            id: id.to_string(),
        })
    }
}
