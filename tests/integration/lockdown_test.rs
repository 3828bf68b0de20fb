//! Integration tests for the lockdown sequence.
//!
//! These tests are implemented in:
//! `crates/lockdown-core/tests/lockdown_scenarios.rs`
//!
//! Covered scenarios:
//! - `drop_to_user_keeping_net_bind_service`: Every set and the bounding set end as the whitelist
//! - `bounding_set_is_pinned_before_flag_sets`: Bounding, inheritable, permitted, then `no_new_privs`
//! - `lockdown_without_identity_still_hardens_and_pins`: Empty whitelist with no UID/GID change
//! - `missing_setpcap_leaves_process_untouched`: Self-check fails before any mutation
//! - `strict_validation_lists_unsupported_names_verbatim`: Unknown names reported as given
//! - `lenient_lockdown_ignores_capabilities_the_kernel_lacks`: Unsupported names dropped silently
//! - `locked_securebits_reject_clearing_after_lockdown`: Locks hold after the sequence
//! - `failed_uid_switch_aborts_without_pinning`: Fatal error, no retry, no later stages
//! - `rejected_capability_write_aborts_before_no_new_privs`: Provider errors stop the sequence
