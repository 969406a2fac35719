//! Page-object capabilities.
//!
//! The coordinator needs four things from a page object: the page to drive,
//! the record configuration, the placeholder resolver and the keyword.
//! [`PageCapabilities`] names them; [`PageContext`] is a ready-made
//! implementation that a page-object struct can embed and delegate to.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use remendar::mock::login_form;
//! use remendar::{PageCapabilities, PageContext, RecordConfig, SessionCaches};
//!
//! let page = PageContext::new("LoginPage", "pages/login_page.py", Rc::new(login_form()), RecordConfig::default());
//! let username = page.locator("username_input", "#user-name", &SessionCaches::new());
//! assert_eq!(username.cache_key(), "LoginPage.username_input");
//! assert_eq!(page.cache_key(), "LoginPage@pages/login_page.py");
//! ```

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::SessionCaches;
use crate::config::{RecordConfig, ValueSources};
use crate::dom::Page;
use crate::locator::LocatorHandle;
use crate::placeholder::PlaceholderResolver;

/// What a page object exposes to the healing coordinator
pub trait PageCapabilities {
    /// Page driven by this object
    fn page(&self) -> Rc<dyn Page>;

    /// Record configuration
    fn config(&self) -> &RecordConfig;

    /// Placeholders visible to this object
    fn placeholders(&self) -> &PlaceholderResolver;

    /// Placeholders, mutable
    fn placeholders_mut(&mut self) -> &mut PlaceholderResolver;

    /// Current keyword
    fn keyword(&self) -> Option<&str>;

    /// Set or clear the keyword
    fn set_keyword(&mut self, keyword: Option<String>);

    /// Page-object type name
    fn type_name(&self) -> &str;

    /// File declaring the page object
    fn source_file(&self) -> &Path;

    /// `Type@file`, unique within a session
    fn cache_key(&self) -> String {
        format!("{}@{}", self.type_name(), self.source_file().display())
    }

    /// Declare a locator field of this object
    fn locator(&self, field_name: &str, selector: &str, caches: &SessionCaches) -> LocatorHandle {
        let mut handle =
            LocatorHandle::declare(self.type_name(), field_name, selector, self.source_file(), caches);
        handle.set_keyword(self.keyword().map(str::to_string));
        handle
    }
}

/// Stock [`PageCapabilities`] implementation
#[derive(Clone)]
pub struct PageContext {
    type_name: String,
    source_file: PathBuf,
    page: Rc<dyn Page>,
    config: RecordConfig,
    placeholders: PlaceholderResolver,
    keyword: Option<String>,
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("type_name", &self.type_name)
            .field("source_file", &self.source_file)
            .field("keyword", &self.keyword)
            .finish_non_exhaustive()
    }
}

impl PageContext {
    /// Context for `type_name` declared in `source_file`.
    ///
    /// Placeholders resolve lazily against the process arguments, `config`
    /// and the environment.
    pub fn new(
        type_name: impl Into<String>,
        source_file: impl Into<PathBuf>,
        page: Rc<dyn Page>,
        config: RecordConfig,
    ) -> Self {
        let placeholders = PlaceholderResolver::new(ValueSources::from_process(config.clone()));
        Self::with_placeholders(type_name, source_file, page, config, placeholders)
    }

    /// Context with an explicit placeholder resolver
    pub fn with_placeholders(
        type_name: impl Into<String>,
        source_file: impl Into<PathBuf>,
        page: Rc<dyn Page>,
        config: RecordConfig,
        placeholders: PlaceholderResolver,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            source_file: source_file.into(),
            page,
            config,
            placeholders,
            keyword: None,
        }
    }
}

impl PageCapabilities for PageContext {
    fn page(&self) -> Rc<dyn Page> {
        Rc::clone(&self.page)
    }

    fn config(&self) -> &RecordConfig {
        &self.config
    }

    fn placeholders(&self) -> &PlaceholderResolver {
        &self.placeholders
    }

    fn placeholders_mut(&mut self) -> &mut PlaceholderResolver {
        &mut self.placeholders
    }

    fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    fn set_keyword(&mut self, keyword: Option<String>) {
        self.keyword = keyword;
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn source_file(&self) -> &Path {
        &self.source_file
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::{CacheKind, FixOrigin, FixRecord};
    use crate::config::CliOverrides;
    use crate::mock::product_grid;

    fn context() -> PageContext {
        let sources = ValueSources::with_env(CliOverrides::default(), RecordConfig::default(), Vec::new());
        PageContext::with_placeholders(
            "InventoryPage",
            "pages/inventory_page.py",
            Rc::new(product_grid(&["Sauce Labs Backpack"])),
            RecordConfig::default(),
            PlaceholderResolver::new(sources),
        )
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(context().cache_key(), "InventoryPage@pages/inventory_page.py");
    }

    #[test]
    fn test_locator_inherits_keyword_and_fixes() {
        let mut page = context();
        page.set_keyword(Some("Sauce Labs Backpack".to_string()));
        let mut caches = SessionCaches::new();
        caches.insert(
            CacheKind::Selector,
            "InventoryPage.add_button",
            FixRecord::new(FixOrigin::Inline, "//a[normalize-space(.)='#KEYWORD#']/../..//button"),
        );
        let handle = page.locator("add_button", "#gone", &caches);
        assert_eq!(handle.keyword(), Some("Sauce Labs Backpack"));
        assert_eq!(
            handle.effective_selector(),
            "//a[normalize-space(.)='Sauce Labs Backpack']/../..//button"
        );
        assert_eq!(handle.source_file(), Path::new("pages/inventory_page.py"));
    }

    #[test]
    fn test_placeholders_are_owned() {
        let mut page = context();
        page.placeholders_mut().add("user", Some("standard_user".to_string()));
        assert_eq!(page.placeholders().get("USER"), Some("standard_user"));
    }
}
