//! Session caches of applied repairs.
//!
//! Five maps, one per repair kind. The selector map lives for the whole
//! session. The four value maps are cleared when execution moves to a
//! different test function and kept across rows of the same parametrized
//! test; entries that patched a data-table row carry the row in their key so
//! every row gets its own repair.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a repair was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixOrigin {
    /// Literal at the call site, or a locator declaration
    Inline,
    /// Variable assignment above the call site
    Assignment,
    /// Cell of a data-driven table row
    DataProvider,
}

/// One applied repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    /// Where the fix was persisted
    pub origin: FixOrigin,
    /// Value to use instead of the broken one
    pub value: String,
    /// When the repair was made
    pub recorded_at: DateTime<Utc>,
}

impl FixRecord {
    /// Record made now
    #[must_use]
    pub fn new(origin: FixOrigin, value: impl Into<String>) -> Self {
        Self {
            origin,
            value: value.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Which map an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKind {
    /// Repaired selectors, keyed by locator cache key
    Selector,
    /// Repaired call arguments
    Parameter,
    /// Repaired keywords
    Keyword,
    /// Repaired expected values
    Expected,
    /// Repaired placeholder names and values
    Placeholder,
}

impl CacheKind {
    /// Every value-oriented kind
    pub const VALUE_KINDS: [Self; 4] = [Self::Parameter, Self::Keyword, Self::Expected, Self::Placeholder];
}

/// Key for a value repair; data-table fixes are per row
#[must_use]
pub fn row_key(base: &str, row: Option<usize>) -> String {
    match row {
        Some(row) => format!("{base}#row{row}"),
        None => base.to_string(),
    }
}

/// The five repair maps of one session
#[derive(Debug, Clone, Default)]
pub struct SessionCaches {
    selectors: BTreeMap<String, FixRecord>,
    parameters: BTreeMap<String, FixRecord>,
    keywords: BTreeMap<String, FixRecord>,
    expected: BTreeMap<String, FixRecord>,
    placeholders: BTreeMap<String, FixRecord>,
}

impl SessionCaches {
    /// Empty caches
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: CacheKind) -> &BTreeMap<String, FixRecord> {
        match kind {
            CacheKind::Selector => &self.selectors,
            CacheKind::Parameter => &self.parameters,
            CacheKind::Keyword => &self.keywords,
            CacheKind::Expected => &self.expected,
            CacheKind::Placeholder => &self.placeholders,
        }
    }

    fn map_mut(&mut self, kind: CacheKind) -> &mut BTreeMap<String, FixRecord> {
        match kind {
            CacheKind::Selector => &mut self.selectors,
            CacheKind::Parameter => &mut self.parameters,
            CacheKind::Keyword => &mut self.keywords,
            CacheKind::Expected => &mut self.expected,
            CacheKind::Placeholder => &mut self.placeholders,
        }
    }

    /// Exact-key lookup
    #[must_use]
    pub fn get(&self, kind: CacheKind, key: &str) -> Option<&FixRecord> {
        let hit = self.map(kind).get(key);
        debug!(?kind, key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Lookup for a value repair: the row-specific entry first, then the shared one
    #[must_use]
    pub fn get_for_row(&self, kind: CacheKind, base: &str, row: Option<usize>) -> Option<&FixRecord> {
        if row.is_some() {
            if let Some(record) = self.get(kind, &row_key(base, row)) {
                return Some(record);
            }
        }
        self.get(kind, base)
    }

    /// Store a record under `key`
    pub fn insert(&mut self, kind: CacheKind, key: impl Into<String>, record: FixRecord) {
        let key = key.into();
        debug!(?kind, key = %key, origin = ?record.origin, "cache insert");
        self.map_mut(kind).insert(key, record);
    }

    /// Store a value repair, keyed per row when it patched a data table
    pub fn insert_for_row(&mut self, kind: CacheKind, base: &str, row: Option<usize>, record: FixRecord) {
        let key = if record.origin == FixOrigin::DataProvider {
            row_key(base, row)
        } else {
            base.to_string()
        };
        self.insert(kind, key, record);
    }

    /// Entries in one map
    #[must_use]
    pub fn len(&self, kind: CacheKind) -> usize {
        self.map(kind).len()
    }

    /// Whether every map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && CacheKind::VALUE_KINDS.iter().all(|k| self.map(*k).is_empty())
    }

    /// Drop every value-oriented entry; selectors are kept
    pub fn clear_value_caches(&mut self) {
        for kind in CacheKind::VALUE_KINDS {
            self.map_mut(kind).clear();
        }
        debug!("value caches cleared");
    }

    /// Drop everything, selectors included
    pub fn clear_all(&mut self) {
        self.selectors.clear();
        self.clear_value_caches();
    }
}
