//! `#NAME#` placeholders with lazy, layered resolution.
//!
//! A placeholder is registered with a value or unset. Unset placeholders are
//! resolved the first time a text that mentions them is expanded, through
//! [`ValueSources`] (command line, then config file, then environment), and
//! the result is kept for the lifetime of the resolver.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ValueSources;
use crate::result::{RemendarError, RemendarResult};

/// Upper bound on expansion passes before substitution is declared cyclic
pub const MAX_SUBSTITUTION_PASSES: usize = 32;

/// Token form of a placeholder name
#[must_use]
pub fn placeholder_token(name: &str) -> String {
    format!("#{}#", name.to_uppercase())
}

/// Registry of placeholders for one page object
#[derive(Debug, Clone, Default)]
pub struct PlaceholderResolver {
    /// Keyed by upper-cased name; `None` means not yet resolved
    entries: BTreeMap<String, Option<String>>,
    sources: ValueSources,
}

impl PlaceholderResolver {
    /// Empty registry resolving unset names through `sources`
    #[must_use]
    pub fn new(sources: ValueSources) -> Self {
        Self {
            entries: BTreeMap::new(),
            sources,
        }
    }

    /// Register `name`; `None` defers resolution to first use
    pub fn add(&mut self, name: &str, value: Option<String>) {
        debug!(name, resolved = value.is_some(), "placeholder registered");
        self.entries.insert(name.to_uppercase(), value);
    }

    /// Remove `name`, returning whether it was registered
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(&name.to_uppercase()).is_some()
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_uppercase())
    }

    /// Resolved value of `name`, if any
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_uppercase())
            .and_then(|v| v.as_deref())
    }

    /// Registered names, upper-cased
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The lookup chain used for unset names
    #[must_use]
    pub fn sources(&self) -> &ValueSources {
        &self.sources
    }

    /// Value of `name`, resolving and caching it if unset
    pub fn resolve(&mut self, name: &str) -> RemendarResult<String> {
        let key = name.to_uppercase();
        if let Some(Some(value)) = self.entries.get(&key) {
            return Ok(value.clone());
        }
        let value = self
            .sources
            .lookup(name)
            .ok_or_else(|| RemendarError::PlaceholderUnresolved {
                name: name.to_string(),
            })?;
        debug!(name, "placeholder resolved lazily");
        self.entries.insert(key, Some(value.clone()));
        Ok(value)
    }

    /// Expand every registered token until the text stops changing.
    ///
    /// Only names whose token occurs in the text are resolved, so an unset
    /// placeholder that is never used never needs a source. Unregistered
    /// `#...#` sequences are left alone.
    pub fn replace_with_values(&mut self, text: &str) -> RemendarResult<String> {
        let mut current = text.to_string();
        for _ in 0..MAX_SUBSTITUTION_PASSES {
            let present: Vec<String> = self
                .entries
                .keys()
                .filter(|name| current.contains(&format!("#{name}#")))
                .cloned()
                .collect();
            if present.is_empty() {
                return Ok(current);
            }
            let mut next = current.clone();
            for name in present {
                let value = self.resolve(&name)?;
                next = next.replace(&format!("#{name}#"), &value);
            }
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(RemendarError::PlaceholderCycle { text: current })
    }

    /// Replace values with their tokens, longest value first.
    ///
    /// Unset placeholders are resolved through the sources first; names that
    /// no source knows stay unset and are skipped.
    pub fn replace_with_placeholders(&mut self, text: &str) -> String {
        let unset: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        for name in unset {
            if let Some(value) = self.sources.lookup(&name) {
                debug!(name = %name, "placeholder resolved for reverse substitution");
                self.entries.insert(name, Some(value));
            }
        }
        let mut pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.as_str(), v))
            })
            .collect();
        pairs.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));
        let mut out = text.to_string();
        for (name, value) in pairs {
            out = out.replace(value, &format!("#{name}#"));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{CliOverrides, RecordConfig};
    use proptest::prelude::*;

    fn resolver_with(cli: &[&str], config: RecordConfig, env: &[(&str, &str)]) -> PlaceholderResolver {
        PlaceholderResolver::new(ValueSources::with_env(
            CliOverrides::from_args(cli.iter().copied()),
            config,
            env.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        ))
    }

    mod expansion_tests {
        use super::*;

        #[test]
        fn test_token_is_upper_case() {
            assert_eq!(placeholder_token("base_url"), "#BASE_URL#");
        }

        #[test]
        fn test_nested_expansion() {
            let mut r = PlaceholderResolver::default();
            r.add("A", Some("#B#".to_string()));
            r.add("B", Some("ok".to_string()));
            assert_eq!(r.replace_with_values("Test: #A#").unwrap(), "Test: ok");
        }

        #[test]
        fn test_unknown_tokens_untouched() {
            let mut r = PlaceholderResolver::default();
            r.add("user", Some("bob".to_string()));
            assert_eq!(
                r.replace_with_values("#USER# clicked #submit#").unwrap(),
                "bob clicked #submit#"
            );
        }

        #[test]
        fn test_cycle_detected() {
            let mut r = PlaceholderResolver::default();
            r.add("A", Some("#B#".to_string()));
            r.add("B", Some("#A#".to_string()));
            let err = r.replace_with_values("#A#").unwrap_err();
            assert!(matches!(err, RemendarError::PlaceholderCycle { .. }));
        }

        #[test]
        fn test_self_reference_growth_detected() {
            let mut r = PlaceholderResolver::default();
            r.add("A", Some("x#A#".to_string()));
            assert!(matches!(
                r.replace_with_values("#A#"),
                Err(RemendarError::PlaceholderCycle { .. })
            ));
        }

        #[test]
        fn test_reverse_prefers_longest_value() {
            let mut r = PlaceholderResolver::default();
            r.add("HOST", Some("example.test".to_string()));
            r.add("URL", Some("https://example.test/shop".to_string()));
            r.add("EMPTY", Some(String::new()));
            assert_eq!(
                r.replace_with_placeholders("go https://example.test/shop and example.test"),
                "go #URL# and #HOST#"
            );
        }
    }

    mod lazy_resolution_tests {
        use super::*;

        #[test]
        fn test_priority_cli_then_config_then_env() {
            let config = RecordConfig::default().with_entry("base_url", "https://config.test");
            let env = [("BASE_URL", "https://env.test"), ("user", "env-user")];

            let mut r = resolver_with(&["--BASE_URL=https://cli.test"], config.clone(), &env);
            r.add("base_url", None);
            assert_eq!(r.replace_with_values("#BASE_URL#").unwrap(), "https://cli.test");

            let mut r = resolver_with(&[], config.clone(), &env);
            r.add("base_url", None);
            r.add("USER", None);
            assert_eq!(
                r.replace_with_values("#BASE_URL# as #USER#").unwrap(),
                "https://config.test as env-user"
            );
            assert_eq!(r.get("user"), Some("env-user"));
        }

        #[test]
        fn test_unresolved_is_fatal() {
            let mut r = resolver_with(&[], RecordConfig::default(), &[]);
            r.add("missing", None);
            let err = r.replace_with_values("x #MISSING#").unwrap_err();
            assert!(matches!(err, RemendarError::PlaceholderUnresolved { ref name } if name == "MISSING"));
        }

        #[test]
        fn test_unused_unset_entry_never_resolved() {
            let mut r = resolver_with(&[], RecordConfig::default(), &[]);
            r.add("missing", None);
            assert_eq!(r.replace_with_values("plain").unwrap(), "plain");
            assert_eq!(r.get("missing"), None);
        }

        #[test]
        fn test_reverse_resolves_unset_entries() {
            let mut r = resolver_with(&[], RecordConfig::default(), &[("PASSWORD", "secret_sauce")]);
            r.add("password", None);
            r.add("missing", None);
            assert_eq!(r.replace_with_placeholders("secret_sauce"), "#PASSWORD#");
            assert_eq!(r.get("password"), Some("secret_sauce"));
            assert_eq!(r.get("missing"), None);
        }

        #[test]
        fn test_remove() {
            let mut r = PlaceholderResolver::default();
            r.add("a", Some("1".to_string()));
            assert!(r.contains("A"));
            assert!(r.remove("a"));
            assert!(!r.remove("a"));
            assert_eq!(r.names().count(), 0);
        }
    }

    proptest! {
        #[test]
        fn prop_placeholder_round_trip(
            name in "[A-Z][A-Z_]{0,8}",
            value in "[a-z]{3,8}[0-9]",
        ) {
            let mut r = PlaceholderResolver::default();
            r.add(&name, Some(value.clone()));
            let template = format!("Visit: {} /", placeholder_token(&name));
            let expanded = r.replace_with_values(&template).unwrap();
            prop_assert_eq!(&expanded, &format!("Visit: {value} /"));
            prop_assert_eq!(r.replace_with_placeholders(&expanded), template);
        }
    }
}
