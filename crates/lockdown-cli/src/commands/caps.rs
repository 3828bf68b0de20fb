//! `lockdown caps` — List the capabilities the running kernel supports.

use clap::Args;

use crate::output::CapabilityRow;

/// Arguments for the `caps` command.
#[derive(Args, Debug)]
pub struct CapsArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `caps` command.
///
/// # Errors
///
/// Returns an error if the current capability state cannot be read.
pub fn execute(args: &CapsArgs) -> anyhow::Result<()> {
    let rows = current_rows()?;
    if args.json {
        crate::output::print_json(&rows)
    } else {
        crate::output::print_table(&rows);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn current_rows() -> anyhow::Result<Vec<CapabilityRow>> {
    let ctx = lockdown_core::context::Context::current()?;
    Ok(crate::output::capability_rows(&ctx)?)
}

#[cfg(not(target_os = "linux"))]
fn current_rows() -> anyhow::Result<Vec<CapabilityRow>> {
    anyhow::bail!("capabilities are only available on Linux")
}
