//! Remendar: self-healing locators and source patching for UI tests.
//!
//! Remendar (Spanish: "to mend") sits between a page-object test suite and
//! the browser. Every interaction goes through a [`Coordinator`]; when one
//! fails because a selector no longer matches or a test value is missing,
//! record mode asks the operator for a fix, verifies it against the live
//! page and writes it back into the Python test or page-object source.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Page object  │──►│ Coordinator  │──►│ Page         │
//! │ (locators,   │   │ (heal state  │   │ (chromium or │
//! │ placeholders)│   │  machine)    │   │  mock)       │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           │
//!        ┌──────────────────┼──────────────────┐
//!        ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Recovery     │   │ Selector     │   │ Source patch │
//! │ oracle       │   │ synthesizer  │   │ engine       │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use remendar::mock::login_form;
//! use remendar::{resolve_single, Document, Selector, SelectorSynthesizer};
//!
//! let doc = login_form();
//! let input = resolve_single(&doc, &Selector::css("#user-name")).unwrap();
//! let found = SelectorSynthesizer::new(&doc).synthesize(input, None).unwrap().unwrap();
//! assert_eq!(doc.query_all(&found.selector).unwrap(), vec![input]);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod cache;
mod config;
mod context;
mod dom;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod healing;
mod locator;
pub mod logging;
mod oracle;
mod page_object;
mod placeholder;
mod result;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod selector;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod synth;

/// In-memory page for tests and examples
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub mod mock;

/// Source patching: call-site resolution, line edits and file stores
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod patch;

/// Python expression parsing and repr-style rendering
#[allow(clippy::missing_errors_doc)]
pub mod pyexpr;

/// Chromium control over CDP
#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening)]
pub mod browser;

#[cfg(feature = "browser")]
pub use browser::{CdpOptions, CdpPage};
pub use cache::{row_key, CacheKind, FixOrigin, FixRecord, SessionCaches};
pub use config::{
    CliOverrides, RecordConfig, SourceLayout, ValueSources, DEFAULT_LOCATOR_CONSTRUCTOR,
    DEFAULT_TIMEOUT_MS,
};
pub use context::{logical_function, TestContext, TestTransition};
pub use dom::{
    adjacent_siblings, ancestors, bounding_boxes_match, element_value_or_text, is_ancestor,
    nth_of_type, resolve_single, BoundingBox, Document, ElementDescriptor, ElementRef, Page,
    GEOMETRY_TOLERANCE,
};
pub use healing::{Coordinator, HealState, SessionContext, DEFAULT_INITIAL_VALUE};
pub use locator::{LocatorHandle, KEYWORD_TOKEN};
pub use logging::init_tracing;
pub use oracle::{
    PromptKind, RecoveryOracle, RepairPrompt, ScriptedOracle, ScriptedReply, TerminalOracle,
};
pub use page_object::{PageCapabilities, PageContext};
pub use patch::{
    CallSiteDescriptor, CallSiteProvider, FrameClassifier, FrameRole, FsSourceStore,
    MemorySourceStore, PatchOutcome, PatchTarget, RecordedCallStack, SourcePatchEngine,
    SourceStore, StackFrame,
};
pub use placeholder::{placeholder_token, PlaceholderResolver, MAX_SUBSTITUTION_PASSES};
pub use result::{FailureClass, RemendarError, RemendarResult};
pub use selector::{
    css_to_xpath, normalize_space, xpath_to_css, CandidateKind, CssPath, Selector,
    SelectorCandidate, XPathQuery,
};
pub use synth::{SelectorSynthesizer, EXCLUDED_ATTRIBUTES, PRIORITY_ATTRIBUTES};
