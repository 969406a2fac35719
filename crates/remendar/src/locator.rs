//! Locator handles declared on page objects.
//!
//! A handle keeps the selector the way it is written in the page-object
//! source (its template). The template may contain the keyword token, which
//! is replaced by the handle's current keyword when the selector is used and
//! put back before a repaired selector is written to source.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheKind, SessionCaches};
use crate::selector::Selector;

/// Token standing for the keyword inside a selector template
pub const KEYWORD_TOKEN: &str = "#KEYWORD#";

/// A page-object field holding a selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorHandle {
    owner_type: String,
    field_name: String,
    template: String,
    source_file: PathBuf,
    keyword: Option<String>,
}

impl LocatorHandle {
    /// Handle for `owner_type.field_name`, declared in `source_file`
    #[must_use]
    pub fn new(
        owner_type: impl Into<String>,
        field_name: impl Into<String>,
        selector: impl Into<String>,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            field_name: field_name.into(),
            template: selector.into(),
            source_file: source_file.into(),
            keyword: None,
        }
    }

    /// Declare a handle, adopting a selector already repaired this session
    #[must_use]
    pub fn declare(
        owner_type: impl Into<String>,
        field_name: impl Into<String>,
        selector: impl Into<String>,
        source_file: impl Into<PathBuf>,
        caches: &SessionCaches,
    ) -> Self {
        let mut handle = Self::new(owner_type, field_name, selector, source_file);
        if let Some(fix) = caches.get(CacheKind::Selector, &handle.cache_key()) {
            debug!(key = %handle.cache_key(), selector = %fix.value, "adopting repaired selector");
            handle.template = fix.value.clone();
        }
        handle
    }

    /// `Owner.field`, unique within a session
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}.{}", self.owner_type, self.field_name)
    }

    /// Page-object type name
    #[must_use]
    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Field name
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// File declaring the field
    #[must_use]
    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Selector as written in source, keyword token included
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replace the template after a repair
    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
    }

    /// Whether the template refers to the keyword
    #[must_use]
    pub fn uses_keyword(&self) -> bool {
        self.template.contains(KEYWORD_TOKEN)
    }

    /// Current keyword
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Set or clear the keyword
    pub fn set_keyword(&mut self, keyword: Option<String>) {
        self.keyword = keyword;
    }

    /// Clear the keyword
    pub fn reset_keyword(&mut self) {
        self.keyword = None;
    }

    /// Template with the keyword substituted
    #[must_use]
    pub fn effective_selector(&self) -> String {
        match &self.keyword {
            Some(k) => self.template.replace(KEYWORD_TOKEN, k),
            None => self.template.clone(),
        }
    }

    /// Selector to query with
    #[must_use]
    pub fn selector(&self) -> Selector {
        Selector::detect(&self.effective_selector())
    }

    /// `selector` with the current keyword turned back into the token
    #[must_use]
    pub fn persisted_form(&self, selector: &str) -> String {
        match self.keyword.as_deref() {
            Some(k) if !k.is_empty() => selector.replace(k, KEYWORD_TOKEN),
            _ => selector.to_string(),
        }
    }
}
