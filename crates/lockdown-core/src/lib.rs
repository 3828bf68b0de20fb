//! # lockdown-core
//!
//! Controlled, irreversible privilege de-escalation for Linux processes.
//!
//! This crate provides handles over the per-process kernel state that
//! governs privilege:
//! - **Registry**: capabilities supported by the running kernel, with name
//!   normalization.
//! - **Capability sets**: permitted, effective, and inheritable, read live
//!   and mutated in batches.
//! - **Bounding set**: the shrink-only ceiling on capabilities regained by
//!   `execve`.
//! - **Securebits**: root-semantics toggles and their locks.
//! - **Lockdown**: the ordered sequence that combines all of the above with
//!   the UID/GID switch and `no_new_privs`.
//!
//! Every kernel primitive goes through a [`provider::CapabilityProvider`],
//! carried by a [`context::Context`]. On Linux the real provider is
//! [`linux::LinuxProvider`]; tests and dry runs use [`sim::SimulatedProvider`].
//! All unsafe system calls are encapsulated in the Linux provider with
//! `// SAFETY:` documentation.

pub mod bounding;
pub mod capability;
pub mod context;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod lockdown;
pub mod provider;
pub mod registry;
pub mod securebits;
pub mod sim;
