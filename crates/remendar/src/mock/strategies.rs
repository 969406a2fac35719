//! Ready-made documents and proptest strategies.
//!
//! The fixtures mirror the shapes self-healing meets most often: a login form
//! with identity attributes, and a product grid whose items differ only by
//! text. The strategies generate small random trees with deliberately
//! colliding attribute values so uniqueness checks are exercised.

use super::document::{MockDocument, MockElement};

#[cfg(any(test, feature = "proptest"))]
use proptest::prelude::*;

/// Login form: two inputs with ids, a submit input and an error banner
#[must_use]
pub fn login_form() -> MockDocument {
    let mut doc = MockDocument::new();
    let body = doc.root();
    let form = doc.append(body, MockElement::new("form").attr("class", "login-box"));
    doc.append(
        form,
        MockElement::new("input")
            .attr("class", "input_error form_input")
            .attr("placeholder", "Username")
            .attr("type", "text")
            .attr("data-test", "username")
            .attr("id", "user-name")
            .attr("name", "user-name"),
    );
    doc.append(
        form,
        MockElement::new("input")
            .attr("class", "input_error form_input")
            .attr("placeholder", "Password")
            .attr("type", "password")
            .attr("data-test", "password")
            .attr("id", "password")
            .attr("name", "password"),
    );
    doc.append(
        form,
        MockElement::new("input")
            .attr("type", "submit")
            .attr("class", "submit-button btn_action")
            .attr("data-test", "login-button")
            .attr("id", "login-button")
            .attr("value", "Login"),
    );
    let error = doc.append(form, MockElement::new("div").attr("class", "error-message-container"));
    doc.append(error, MockElement::new("h3").text("Epic sadface: Username is required"));
    doc
}

/// Product grid: `names.len()` items, each a name label and an identical button
#[must_use]
pub fn product_grid(names: &[&str]) -> MockDocument {
    let mut doc = MockDocument::new();
    let body = doc.root();
    let list = doc.append(body, MockElement::new("div").attr("class", "inventory_list"));
    for name in names {
        let item = doc.append(list, MockElement::new("div").attr("class", "inventory_item"));
        let label = doc.append(item, MockElement::new("div").attr("class", "inventory_item_label"));
        doc.append(label, MockElement::new("a").attr("href", "#").text(*name));
        doc.append(
            item,
            MockElement::new("button")
                .attr("class", "btn btn_primary btn_small btn_inventory")
                .text("Add to cart"),
        );
    }
    doc
}

/// Shape of one generated element
#[cfg(any(test, feature = "proptest"))]
#[derive(Debug, Clone)]
pub struct ElementSpec {
    /// Picks the parent among earlier elements (modulo their count)
    pub parent_pick: usize,
    /// The element itself
    pub element: MockElement,
}

/// Random element with attributes drawn from small, colliding pools
#[cfg(any(test, feature = "proptest"))]
pub fn arb_element() -> impl Strategy<Value = MockElement> {
    (
        prop::sample::select(vec!["div", "span", "input", "button", "a", "li"]),
        prop::option::of(prop::sample::select(vec!["main", "nav", "cart", "user-name"])),
        prop::option::of(prop::sample::select(vec!["btn", "btn primary", "item", "a b c"])),
        prop::option::of(prop::sample::select(vec!["q", "email", "sort"])),
        prop::option::of(prop::sample::select(vec!["text", "submit", "checkbox"])),
        prop::option::of(prop::sample::select(vec!["Add to cart", "Remove", "Bike Light", "it's"])),
    )
        .prop_map(|(tag, id, class, name, kind, text)| {
            let mut element = MockElement::new(tag);
            if let Some(id) = id {
                element = element.attr("id", id);
            }
            if let Some(class) = class {
                element = element.attr("class", class);
            }
            if let Some(name) = name {
                element = element.attr("name", name);
            }
            if let Some(kind) = kind {
                element = element.attr("type", kind);
            }
            if let Some(text) = text {
                element = element.text(text);
            }
            element
        })
}

/// Random document of 1 to `max_elements` elements under `body`
#[cfg(any(test, feature = "proptest"))]
pub fn arb_document(max_elements: usize) -> impl Strategy<Value = MockDocument> {
    prop::collection::vec(
        (any::<usize>(), arb_element()).prop_map(|(parent_pick, element)| ElementSpec {
            parent_pick,
            element,
        }),
        1..=max_elements.max(1),
    )
    .prop_map(|specs| {
        let mut doc = MockDocument::new();
        let mut created = vec![doc.root()];
        for spec in specs {
            let parent = created[spec.parent_pick % created.len()];
            created.push(doc.append(parent, spec.element));
        }
        doc
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::selector::Selector;

    #[test]
    fn test_login_form_ids_unique() {
        let doc = login_form();
        for id in ["#user-name", "#password", "#login-button"] {
            assert_eq!(doc.count(&Selector::css(id)).unwrap(), 1, "{id}");
        }
    }

    #[test]
    fn test_product_grid_buttons_identical() {
        let doc = product_grid(&["Backpack", "Bike Light", "Onesie"]);
        assert_eq!(doc.count(&Selector::css("button.btn_inventory")).unwrap(), 3);
    }

    proptest! {
        #[test]
        fn prop_generated_documents_are_queryable(doc in arb_document(12)) {
            let all = doc.query_all(&Selector::css("*")).unwrap();
            prop_assert!(!all.is_empty());
            for element in all {
                prop_assert!(doc.describe(element).is_ok());
            }
        }
    }
}
