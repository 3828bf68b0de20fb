//! Full launch flow against the simulated kernel.
//!
//! The simulated provider records the final exec instead of performing it,
//! so these tests check what the target program would have been started
//! with and what state the process was left in.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use lockdown_common::config::LaunchConfig;
use lockdown_common::error::{LockdownError, Result};
use lockdown_common::types::{CapSetKind, CapabilityId, ControlOp};
use lockdown_core::context::Context;
use lockdown_core::lockdown::Platform;
use lockdown_core::sim::{SimCall, SimulatedProvider};
use lockdown_runtime::identity::{IdentityResolver, ResolvedUser};
use lockdown_runtime::launch::Launcher;

struct Accounts;

impl IdentityResolver for Accounts {
    fn resolve_user(&self, name_or_id: &str) -> Result<ResolvedUser> {
        match name_or_id {
            "www-data" | "33" => Ok(ResolvedUser {
                uid: 33,
                gid: 33,
                name: "www-data".into(),
                home: PathBuf::from("/var/www"),
            }),
            other => Err(LockdownError::NotFound {
                kind: "user",
                id: other.into(),
            }),
        }
    }

    fn resolve_group(&self, name_or_id: &str) -> Result<u32> {
        Err(LockdownError::NotFound {
            kind: "group",
            id: name_or_id.into(),
        })
    }
}

fn base_env() -> Vec<(String, String)> {
    vec![
        ("PATH".into(), "/usr/sbin:/usr/bin".into()),
        ("HOME".into(), "/root".into()),
        ("MAIL".into(), "/var/mail/root".into()),
    ]
}

fn exec_call(sim: &SimulatedProvider) -> (Vec<String>, Vec<(String, String)>) {
    match sim.journal().last() {
        Some(SimCall::Exec { argv, env }) => (argv.clone(), env.clone()),
        other => panic!("expected exec as last call, got {other:?}"),
    }
}

#[test]
fn web_server_launch_drops_to_www_data() {
    let sim = SimulatedProvider::root();
    let ctx = Context::new(&sim).unwrap();
    let config = LaunchConfig {
        user: Some("www-data".into()),
        capabilities: Some("CAP_NET_BIND_SERVICE".into()),
        command: vec!["nginx -g 'daemon off;'".into()],
        ..LaunchConfig::default()
    };

    let err = Launcher::new(&ctx, Accounts)
        .platform(Platform::Linux)
        .base_env(base_env())
        .launch(&config)
        .unwrap_err();
    assert!(matches!(err, LockdownError::Exec { ref program, .. } if program == "nginx"));

    let (argv, env) = exec_call(&sim);
    assert_eq!(argv, ["nginx", "-g", "daemon off;"]);
    assert!(env.contains(&("HOME".into(), "/var/www".into())));
    assert!(env.contains(&("LOGNAME".into(), "www-data".into())));
    assert!(!env.iter().any(|(k, _)| k == "MAIL"));

    let kept = BTreeSet::from([CapabilityId::new(10)]);
    assert_eq!(sim.set(CapSetKind::Permitted), kept);
    assert_eq!(sim.bounding(), kept);
    assert_eq!((sim.uid(), sim.gid()), (33, 33));
    assert!(sim.no_new_privs());
}

#[test]
fn exec_happens_only_after_no_new_privs() {
    let sim = SimulatedProvider::root();
    let ctx = Context::new(&sim).unwrap();
    let config = LaunchConfig {
        shell: true,
        drop_env: true,
        command: vec!["echo".into(), "hello world".into()],
        ..LaunchConfig::default()
    };

    let _ = Launcher::new(&ctx, Accounts)
        .platform(Platform::Linux)
        .base_env(base_env())
        .launch(&config)
        .unwrap_err();

    let journal = sim.journal();
    let n = journal.len();
    assert!(n >= 2);
    assert_eq!(
        journal[n - 2],
        SimCall::Control {
            op: ControlOp::NoNewPrivs,
            value: 1
        }
    );
    let (argv, env) = exec_call(&sim);
    assert_eq!(argv, ["/bin/sh", "-c", "echo 'hello world'"]);
    assert!(env.is_empty());
}

#[test]
fn invalid_command_never_touches_the_process() {
    let sim = SimulatedProvider::root();
    let ctx = Context::new(&sim).unwrap();
    let config = LaunchConfig {
        command: vec!["echo 'unterminated".into()],
        ..LaunchConfig::default()
    };

    let err = Launcher::new(&ctx, Accounts).launch(&config).unwrap_err();
    assert!(matches!(err, LockdownError::InvalidCommand { .. }));
    assert!(sim.journal().is_empty());
}

#[test]
fn json_config_launches_like_flags() {
    let sim = SimulatedProvider::root();
    let ctx = Context::new(&sim).unwrap();
    let config = LaunchConfig::from_json(
        r#"{"user":"33","capabilities":"net_bind_service","command":["httpd","-X"]}"#,
    )
    .unwrap();

    let _ = Launcher::new(&ctx, Accounts)
        .platform(Platform::Linux)
        .base_env(base_env())
        .launch(&config)
        .unwrap_err();

    let (argv, env) = exec_call(&sim);
    assert_eq!(argv, ["httpd", "-X"]);
    assert!(env.contains(&("USER".into(), "www-data".into())));
    assert_eq!((sim.uid(), sim.gid()), (33, 33));
}
