//! Formatted output for the `caps` listing.

use lockdown_common::error::Result;
use lockdown_core::context::Context;
use lockdown_core::provider::CapabilityProvider;
use serde::Serialize;

/// One supported capability and where the current process holds it.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityRow {
    /// Kernel capability number.
    pub number: u8,
    /// Name without the `cap_` prefix.
    pub name: &'static str,
    /// In the permitted set.
    pub permitted: bool,
    /// In the effective set.
    pub effective: bool,
    /// In the inheritable set.
    pub inheritable: bool,
    /// In the bounding set.
    pub bounding: bool,
}

/// Collects one row per capability the kernel supports, by number.
///
/// # Errors
///
/// Returns an error if any set cannot be read.
pub fn capability_rows<P: CapabilityProvider>(ctx: &Context<P>) -> Result<Vec<CapabilityRow>> {
    let permitted = ctx.permitted().snapshot()?;
    let effective = ctx.effective().snapshot()?;
    let inheritable = ctx.inheritable().snapshot()?;
    let bounding = ctx.bounding().snapshot()?;
    Ok(ctx
        .registry()
        .entries()
        .map(|(id, name)| CapabilityRow {
            number: id.index(),
            name,
            permitted: permitted.contains(&id),
            effective: effective.contains(&id),
            inheritable: inheritable.contains(&id),
            bounding: bounding.contains(&id),
        })
        .collect())
}

const fn mark(held: bool) -> char {
    if held { 'x' } else { '-' }
}

/// Renders rows as a fixed-width table with a header line.
#[must_use]
pub fn format_table(rows: &[CapabilityRow]) -> String {
    let mut out = format!("{:>3}  {:<20} {:<4}\n", "NR", "NAME", "PEIB");
    for row in rows {
        out.push_str(&format!(
            "{:>3}  {:<20} {}{}{}{}\n",
            row.number,
            row.name,
            mark(row.permitted),
            mark(row.effective),
            mark(row.inheritable),
            mark(row.bounding),
        ));
    }
    out
}

/// Prints rows as a table on stdout.
#[allow(clippy::print_stdout)]
pub fn print_table(rows: &[CapabilityRow]) {
    print!("{}", format_table(rows));
}

/// Prints rows as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
#[allow(clippy::print_stdout)]
pub fn print_json(rows: &[CapabilityRow]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use lockdown_common::types::{CapSetKind, CapabilityId};
    use lockdown_core::sim::SimulatedProvider;

    use super::*;

    fn rows() -> Vec<CapabilityRow> {
        let sim = SimulatedProvider::new((0..=10).map(CapabilityId::new))
            .with_set(CapSetKind::Permitted, [CapabilityId::new(10)])
            .with_bounding([CapabilityId::new(10)]);
        let ctx = Context::new(sim).unwrap();
        capability_rows(&ctx).unwrap()
    }

    #[test]
    fn rows_follow_kernel_numbering() {
        let rows = rows();
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].name, "chown");
        assert_eq!(rows[10].name, "net_bind_service");
        assert!(rows[10].permitted && rows[10].bounding);
        assert!(!rows[10].effective);
        assert!(!rows[0].bounding);
    }

    #[test]
    fn table_marks_held_sets() {
        let table = format_table(&rows());
        let line = table.lines().find(|l| l.contains("net_bind_service")).unwrap();
        assert!(line.ends_with("x--x"));
        assert!(table.starts_with(" NR  NAME"));
    }

    #[test]
    fn json_uses_field_names() {
        let json = serde_json::to_value(&rows()[10]).unwrap();
        assert_eq!(json["name"], "net_bind_service");
        assert_eq!(json["number"], 10);
        assert_eq!(json["permitted"], true);
    }
}
