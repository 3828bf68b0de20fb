//! Capabilities supported by the running kernel.
//!
//! The registry is the only authority mapping capability names to numbers.
//! It is probed once per [`Context`](crate::context::Context) and never
//! refreshed: the set of capabilities a kernel supports does not change
//! while the process runs.

use std::collections::{BTreeMap, BTreeSet};

use lockdown_common::constants::{CAPABILITY_NAMES, CAPABILITY_PREFIX};
use lockdown_common::error::{LockdownError, Result};
use lockdown_common::types::{CapabilityId, CapabilityInput, NormalizeMode};

use crate::provider::CapabilityProvider;

/// Supported capability table for the running kernel.
#[derive(Debug, Clone)]
pub struct Registry {
    supported: BTreeSet<CapabilityId>,
    by_name: BTreeMap<&'static str, CapabilityId>,
}

impl Registry {
    /// Builds the registry from what `provider` reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot list kernel capabilities.
    pub fn probe<P: CapabilityProvider + ?Sized>(provider: &P) -> Result<Self> {
        let registry = Self::from_kernel(&provider.kernel_capabilities()?);
        tracing::debug!(supported = registry.supported.len(), "capability registry probed");
        Ok(registry)
    }

    /// Builds the registry from a known kernel capability set.
    ///
    /// Capabilities the kernel reports but this build has no name for are
    /// excluded, as are names the kernel does not know.
    #[must_use]
    pub fn from_kernel(kernel: &BTreeSet<CapabilityId>) -> Self {
        let by_name: BTreeMap<_, _> = CAPABILITY_NAMES
            .iter()
            .zip(0u8..)
            .map(|(name, index)| (*name, CapabilityId::new(index)))
            .filter(|(_, id)| kernel.contains(id))
            .collect();
        let supported = by_name.values().copied().collect();
        Self { supported, by_name }
    }

    /// Every supported capability.
    #[must_use]
    pub const fn supported(&self) -> &BTreeSet<CapabilityId> {
        &self.supported
    }

    /// Returns `true` if `id` is supported.
    #[must_use]
    pub fn is_supported(&self, id: CapabilityId) -> bool {
        self.supported.contains(&id)
    }

    /// Canonical lowercase name of a supported capability.
    #[must_use]
    pub fn name_of(&self, id: CapabilityId) -> Option<&'static str> {
        if !self.is_supported(id) {
            return None;
        }
        CAPABILITY_NAMES.get(usize::from(id.index())).copied()
    }

    /// Looks up a name: case-insensitive, surrounding whitespace and an
    /// optional `cap_` prefix ignored.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CapabilityId> {
        let name = name.trim().to_ascii_lowercase();
        let bare = name.strip_prefix(CAPABILITY_PREFIX).unwrap_or(&name);
        self.by_name.get(bare).copied()
    }

    /// Supported capabilities with their names, in numeric order.
    pub fn entries(&self) -> impl Iterator<Item = (CapabilityId, &'static str)> + '_ {
        self.supported
            .iter()
            .filter_map(|id| self.name_of(*id).map(|name| (*id, name)))
    }

    /// Resolves a single name or ID.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::UnknownCapability`] if `input` does not
    /// resolve to exactly one supported capability.
    pub fn normalize_one(&self, input: &CapabilityInput) -> Result<CapabilityId> {
        let ids = self.normalize(input, NormalizeMode::Strict)?;
        let mut iter = ids.into_iter();
        match (iter.next(), iter.next()) {
            (Some(id), None) => Ok(id),
            _ => Err(LockdownError::UnknownCapability {
                names: vec![format!("{input:?}")],
            }),
        }
    }

    /// Resolves names and IDs to a set of supported capabilities.
    ///
    /// Duplicates collapse. In [`NormalizeMode::Strict`] every unresolved
    /// element is reported in one error; in [`NormalizeMode::Lenient`] they
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::UnknownCapability`] in strict mode if any
    /// element fails to resolve.
    pub fn normalize(
        &self,
        input: &CapabilityInput,
        mode: NormalizeMode,
    ) -> Result<BTreeSet<CapabilityId>> {
        let mut resolved = BTreeSet::new();
        let mut unknown = Vec::new();
        self.collect(input, &mut resolved, &mut unknown);

        if !unknown.is_empty() {
            match mode {
                NormalizeMode::Strict => {
                    return Err(LockdownError::UnknownCapability { names: unknown });
                }
                NormalizeMode::Lenient => {
                    tracing::debug!(ignored = ?unknown, "ignoring unsupported capabilities");
                }
            }
        }
        Ok(resolved)
    }

    fn collect(
        &self,
        input: &CapabilityInput,
        resolved: &mut BTreeSet<CapabilityId>,
        unknown: &mut Vec<String>,
    ) {
        let miss = match input {
            CapabilityInput::List(items) => {
                for item in items {
                    self.collect(item, resolved, unknown);
                }
                return;
            }
            CapabilityInput::Name(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return;
                }
                match self.lookup(trimmed) {
                    Some(id) => {
                        let _ = resolved.insert(id);
                        return;
                    }
                    None => trimmed.to_string(),
                }
            }
            CapabilityInput::Id(id) => {
                if self.is_supported(*id) {
                    let _ = resolved.insert(*id);
                    return;
                }
                id.to_string()
            }
        };
        if !unknown.contains(&miss) {
            unknown.push(miss);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(last: u8) -> Registry {
        Registry::from_kernel(&(0..=last).map(CapabilityId::new).collect())
    }

    #[test]
    fn kernel_limits_supported_set() {
        let reg = registry(36);
        assert_eq!(reg.supported().len(), 37);
        assert_eq!(reg.lookup("block_suspend"), Some(CapabilityId::new(36)));
        assert_eq!(reg.lookup("bpf"), None);
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        let reg = registry(40);
        assert_eq!(reg.lookup("  NET_Bind_Service "), Some(CapabilityId::new(10)));
        assert_eq!(reg.lookup("CAP_SYS_ADMIN"), Some(CapabilityId::new(21)));
    }

    #[test]
    fn normalize_collapses_duplicates() {
        let reg = registry(40);
        let ids = reg
            .normalize(
                &CapabilityInput::from("net_raw,NET_RAW, net_raw"),
                NormalizeMode::Strict,
            )
            .unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn normalize_accepts_mixed_names_and_ids() {
        let reg = registry(40);
        let input = CapabilityInput::List(vec![
            CapabilityInput::Name("kill".into()),
            CapabilityInput::Id(CapabilityId::new(8)),
        ]);
        let ids = reg.normalize(&input, NormalizeMode::Strict).unwrap();
        assert_eq!(ids, [CapabilityId::new(5), CapabilityId::new(8)].into());
    }

    #[test]
    fn strict_mode_lists_every_unknown_name() {
        let reg = registry(40);
        let err = reg
            .normalize(
                &CapabilityInput::from("net_raw,Bogus,other_bogus,Bogus"),
                NormalizeMode::Strict,
            )
            .unwrap_err();
        match err {
            LockdownError::UnknownCapability { names } => {
                assert_eq!(names, vec!["Bogus".to_string(), "other_bogus".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lenient_mode_drops_unknown_names() {
        let reg = registry(36);
        let ids = reg
            .normalize(&CapabilityInput::from("bpf,kill"), NormalizeMode::Lenient)
            .unwrap();
        assert_eq!(ids, [CapabilityId::new(5)].into());
    }

    #[test]
    fn unsupported_id_is_rejected() {
        let reg = registry(36);
        let err = reg.normalize_one(&CapabilityInput::Id(CapabilityId::new(39)));
        assert!(err.is_err());
        assert_eq!(reg.normalize_one(&"kill".into()).unwrap(), CapabilityId::new(5));
    }

    #[test]
    fn empty_input_normalizes_to_empty_set() {
        let reg = registry(40);
        let ids = reg
            .normalize(&CapabilityInput::from(""), NormalizeMode::Strict)
            .unwrap();
        assert!(ids.is_empty());
    }
}
