//! `lockdown run` — Drop privileges and exec the target command.

use clap::Args;
use lockdown_common::config::LaunchConfig;

/// Arguments for the `run` command.
#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug)]
pub struct RunArgs {
    /// User to run as, by name or UID.
    #[arg(short, long, env = "LOCKDOWN_USER")]
    pub user: Option<String>,

    /// Group to run as, by name or GID. Defaults to the user's primary group.
    #[arg(short, long, env = "LOCKDOWN_GROUP")]
    pub group: Option<String>,

    /// Comma-separated capabilities to keep, e.g. `net_bind_service,net_raw`.
    #[arg(short, long = "caps", env = "LOCKDOWN_CAPS")]
    pub caps: Option<String>,

    /// Run the command through `/bin/sh -c`.
    #[arg(short, long, env = "LOCKDOWN_SHELL")]
    pub shell: bool,

    /// Start the command with an empty environment.
    #[arg(short, long, env = "LOCKDOWN_DROP_ENV")]
    pub drop_env: bool,

    /// Keep the inherited `HOME` instead of the target user's.
    #[arg(long, env = "LOCKDOWN_NO_SET_HOME")]
    pub no_set_home: bool,

    /// Command to run, with its arguments.
    #[arg(required = true, last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl From<RunArgs> for LaunchConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            user: args.user,
            group: args.group,
            capabilities: args.caps,
            shell: args.shell,
            drop_env: args.drop_env,
            set_home: !args.no_set_home,
            command: args.command,
        }
    }
}

/// Executes the `run` command.
///
/// Only returns on failure: on success the process has been replaced.
///
/// # Errors
///
/// Returns an error if a capability name is unsupported, the identity
/// cannot be resolved, or any lockdown stage fails. The command is never
/// executed in that case.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = LaunchConfig::from(args);
    launch(&config)
}

#[cfg(target_os = "linux")]
fn launch(config: &LaunchConfig) -> anyhow::Result<()> {
    use lockdown_core::context::Context;
    use lockdown_runtime::identity::SystemResolver;
    use lockdown_runtime::launch::Launcher;

    let ctx = Context::current()?;
    tracing::debug!(config = %config.to_json()?, "preparing launch");
    match Launcher::new(&ctx, SystemResolver).launch(config)? {}
}

#[cfg(not(target_os = "linux"))]
fn launch(_config: &LaunchConfig) -> anyhow::Result<()> {
    anyhow::bail!("lockdown requires Linux capability support")
}
