//! # lockdown-runtime
//!
//! Everything around the lockdown sequence that is plain configuration and
//! I/O: resolving user and group names, building the environment and the
//! argument vector for the target program, and the [`launch::Launcher`]
//! that ties validation, lockdown, and process replacement together.

pub mod env;
pub mod exec;
pub mod identity;
pub mod launch;
