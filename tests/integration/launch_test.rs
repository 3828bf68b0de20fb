//! Integration tests for launching a command after lockdown.
//!
//! These tests are implemented in:
//! `crates/lockdown-runtime/tests/launch_flow.rs`
//!
//! Covered scenarios:
//! - `web_server_launch_drops_to_www_data`: argv, environment, and final capability state
//! - `exec_happens_only_after_no_new_privs`: Exec is the last call, right after `no_new_privs`
//! - `invalid_command_never_touches_the_process`: Command errors surface before lockdown
