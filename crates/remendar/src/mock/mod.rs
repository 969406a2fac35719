//! In-memory browser for exercising the engine without Chromium.
//!
//! [`MockDocument`] implements both [`crate::dom::Document`] and
//! [`crate::dom::Page`]; combined with [`crate::oracle::ScriptedOracle`] and
//! [`crate::patch::MemorySourceStore`] every healing workflow runs in a unit
//! test.
//!
//! ## Example
//!
//! ```rust
//! use remendar::mock::{MockDocument, MockElement};
//! use remendar::{Document, Selector};
//!
//! let mut doc = MockDocument::new();
//! let body = doc.root();
//! doc.append(body, MockElement::new("input").attr("id", "user-name"));
//! assert_eq!(doc.count(&Selector::css("#user-name")).unwrap(), 1);
//! ```

pub mod document;
pub mod strategies;

pub use document::{MockAction, MockDocument, MockElement};
#[cfg(feature = "proptest")]
pub use strategies::{arb_document, arb_element};
pub use strategies::{login_form, product_grid};
