//! Rules selecting which shader implementation properties are copied into the export.

use std::collections::BTreeSet;

use crate::config::ExportConfig;

/// Namespace and name rules for implementation metadata.
#[derive(Debug, Clone, Default)]
pub struct PropertySelection {
    prefixes: BTreeSet<String>,
    names: BTreeSet<String>,
}

impl PropertySelection {
    /// Build a selection from namespace prefixes and exact property names.
    pub fn new(
        prefixes: impl IntoIterator<Item = String>,
        names: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            prefixes: normalise_list(prefixes),
            names: normalise_list(names),
        }
    }

    /// Selection described by the export configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            config.metadata_prefixes.iter().cloned(),
            config.implementation_hints.iter().cloned(),
        )
    }

    /// Returns `true` when the property should be copied.
    pub fn is_included(&self, property_name: &str) -> bool {
        self.names.contains(property_name)
            || self
                .prefixes
                .iter()
                .any(|prefix| namespace_matches(prefix, property_name))
    }
}

/// Trim values and discard empty entries.
fn normalise_list(values: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// A prefix such as `info:mdl:` matches properties strictly inside that namespace.
fn namespace_matches(prefix: &str, candidate: &str) -> bool {
    if prefix.ends_with(':') {
        return candidate.len() > prefix.len() && candidate.starts_with(prefix);
    }

    candidate
        .strip_prefix(prefix)
        .is_some_and(|suffix| suffix.len() > 1 && suffix.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection_matches_mdl_metadata() {
        let selection = PropertySelection::from_config(&ExportConfig::default());

        assert!(selection.is_included("info:mdl:sourceAsset"));
        assert!(selection.is_included("info:mdl:sourceAsset:subIdentifier"));
        assert!(selection.is_included("info:implementationSource"));
        assert!(selection.is_included("info:sourceAsset"));
        assert!(!selection.is_included("info:id"));
        assert!(!selection.is_included("info:mdl:"));
        assert!(!selection.is_included("inputs:diffuse_color"));
    }

    #[test]
    fn prefixes_without_trailing_colon_match_namespace_members() {
        let selection = PropertySelection::new(vec![" info:osl ".to_string()], Vec::new());

        assert!(selection.is_included("info:osl:sourceAsset"));
        assert!(!selection.is_included("info:oslx:sourceAsset"));
        assert!(!selection.is_included("info:osl"));
    }

    #[test]
    fn empty_rules_select_nothing() {
        let selection = PropertySelection::new(vec![String::new()], vec!["  ".to_string()]);
        assert!(!selection.is_included("info:mdl:sourceAsset"));
        assert!(!selection.is_included(""));
    }
}
