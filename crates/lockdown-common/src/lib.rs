//! # lockdown-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire lockdown workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and touches no kernel state.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
