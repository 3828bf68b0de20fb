//! Validate, lock down, and replace the process.
//!
//! Everything that can fail without touching kernel state (capability
//! names, user and group lookup, command parsing) is done first, so a bad
//! invocation exits with the process still untouched.

use std::collections::BTreeSet;
use std::convert::Infallible;

use lockdown_common::config::LaunchConfig;
use lockdown_common::error::Result;
use lockdown_common::types::{CapabilityId, CapabilityInput, NormalizeMode, TargetIdentity};
use lockdown_core::context::Context;
use lockdown_core::lockdown::{Lockdown, LockdownReport, Platform};
use lockdown_core::provider::CapabilityProvider;

use crate::env::{EnvOptions, build_environment, inherited_environment};
use crate::exec::CommandLine;
use crate::identity::{IdentityResolver, ResolvedUser};

/// Everything resolved ahead of the lockdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Numeric identity to switch to.
    pub identity: TargetIdentity,
    /// Capabilities to keep, validated against the registry.
    pub keep: BTreeSet<CapabilityId>,
    /// The resolved target user, if any.
    pub user: Option<ResolvedUser>,
    /// Argument vector of the replacement program.
    pub argv: Vec<String>,
    /// Environment of the replacement program.
    pub env: Vec<(String, String)>,
}

/// Runs a [`LaunchConfig`] end to end.
#[derive(Debug)]
pub struct Launcher<'a, P, R> {
    ctx: &'a Context<P>,
    resolver: R,
    platform: Platform,
    base_env: Vec<(String, String)>,
}

impl<'a, P: CapabilityProvider, R: IdentityResolver> Launcher<'a, P, R> {
    /// Launcher inheriting the current environment.
    pub fn new(ctx: &'a Context<P>, resolver: R) -> Self {
        Self {
            ctx,
            resolver,
            platform: Platform::current(),
            base_env: inherited_environment(),
        }
    }

    /// Overrides the platform passed to the lockdown sequence.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Overrides the environment the child environment is derived from.
    #[must_use]
    pub fn base_env(mut self, env: Vec<(String, String)>) -> Self {
        self.base_env = env;
        self
    }

    /// Validates capability names strictly.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::UnknownCapability`](lockdown_common::error::LockdownError::UnknownCapability)
    /// listing every name the running kernel does not support.
    pub fn validate(&self, config: &LaunchConfig) -> Result<BTreeSet<CapabilityId>> {
        self.ctx.registry().normalize(
            &CapabilityInput::from(config.capability_list()),
            NormalizeMode::Strict,
        )
    }

    /// Resolves everything needed for the launch without changing any
    /// process state.
    ///
    /// # Errors
    ///
    /// Returns an error if a capability name is unsupported, the user or
    /// group is unknown, or the command is invalid.
    pub fn prepare(&self, config: &LaunchConfig) -> Result<LaunchPlan> {
        let keep = self.validate(config)?;

        let user = config
            .user
            .as_deref()
            .map(|name| self.resolver.resolve_user(name))
            .transpose()?;
        let gid = match config.group.as_deref() {
            Some(group) => Some(self.resolver.resolve_group(group)?),
            None => user.as_ref().map(|u| u.gid),
        };
        let identity = TargetIdentity {
            uid: user.as_ref().map(|u| u.uid),
            gid,
        };

        let argv = CommandLine::build(&config.command, config.shell)?.into_argv();
        let options = EnvOptions {
            drop_env: config.drop_env,
            set_home: config.set_home,
        };
        let env = build_environment(self.base_env.iter().cloned(), options, user.as_ref());

        Ok(LaunchPlan {
            identity,
            keep,
            user,
            argv,
            env,
        })
    }

    /// Locks the process down according to `plan`.
    ///
    /// # Errors
    ///
    /// Any error from the lockdown sequence. The process is then partially
    /// dropped and must exit without running the command.
    pub fn lock(&self, plan: &LaunchPlan) -> Result<LockdownReport> {
        let keep = CapabilityInput::from(plan.keep.iter().copied().collect::<Vec<_>>());
        Lockdown::new(self.ctx)
            .platform(self.platform)
            .run(plan.identity, &keep)
    }

    /// Prepares, locks down, and replaces the process. Only returns on
    /// failure.
    ///
    /// # Errors
    ///
    /// Any error from [`Launcher::prepare`], [`Launcher::lock`], or the
    /// final exec.
    pub fn launch(&self, config: &LaunchConfig) -> Result<Infallible> {
        let plan = self.prepare(config)?;
        let report = self.lock(&plan)?;
        tracing::info!(
            program = %plan.argv[0],
            retained = report.retained.len(),
            "launching target"
        );
        self.ctx.provider().replace_process(&plan.argv, &plan.env)
    }
}
