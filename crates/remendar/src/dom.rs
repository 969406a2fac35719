//! Browser automation capability as seen by the engine.
//!
//! [`Document`] is the query side (matching, structure, text, geometry) and
//! [`Page`] adds the interaction verbs. Both take `&self`: a page is shared
//! between the coordinator and every page object of a test, and
//! implementations keep their mutable state behind interior mutability.
//! Element handles are opaque [`ElementRef`] values that stay valid for the
//! lifetime of the document they came from.

use serde::{Deserialize, Serialize};

use crate::result::{RemendarError, RemendarResult};
use crate::selector::Selector;

/// Default tolerance for geometry comparison, in CSS pixels
pub const GEOMETRY_TOLERANCE: f32 = 0.5;

/// Opaque handle to a live element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef(pub u64);

/// Snapshot of an element used for selector synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
}

impl ElementDescriptor {
    /// Create a descriptor
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Value of an attribute, if present
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Class list, split on whitespace
    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        self.attribute("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether this is a form control whose value is its content
    #[must_use]
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }
}

/// Bounding box for an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether every edge is within `tolerance` of `other`
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// Compare two element boxes by position and size.
///
/// Fails with `ElementNotVisible` when either box is unavailable.
pub fn bounding_boxes_match(
    a: Option<BoundingBox>,
    b: Option<BoundingBox>,
    tolerance: f32,
) -> RemendarResult<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(a.approx_eq(&b, tolerance)),
        _ => Err(RemendarError::ElementNotVisible {
            message: "one or both elements have no bounding box".to_string(),
        }),
    }
}

/// Query side of the automation capability
pub trait Document {
    /// Every element matching `selector`, in document order
    fn query_all(&self, selector: &Selector) -> RemendarResult<Vec<ElementRef>>;

    /// Number of elements matching `selector`
    fn count(&self, selector: &Selector) -> RemendarResult<usize> {
        Ok(self.query_all(selector)?.len())
    }

    /// Tag and attributes of an element
    fn describe(&self, element: ElementRef) -> RemendarResult<ElementDescriptor>;

    /// Parent element, `None` at the root
    fn parent(&self, element: ElementRef) -> RemendarResult<Option<ElementRef>>;

    /// Element children in document order
    fn children(&self, element: ElementRef) -> RemendarResult<Vec<ElementRef>>;

    /// Normalized text of the element's own text nodes
    fn direct_text(&self, element: ElementRef) -> RemendarResult<String>;

    /// Normalized text of the whole subtree
    fn text_content(&self, element: ElementRef) -> RemendarResult<String>;

    /// Current value of a form control, `None` for other elements
    fn input_value(&self, element: ElementRef) -> RemendarResult<Option<String>>;

    /// On-screen geometry, `None` when not rendered
    fn bounding_box(&self, element: ElementRef) -> RemendarResult<Option<BoundingBox>>;

    /// Innermost element under the pointer
    fn hovered_element(&self) -> RemendarResult<Option<ElementRef>>;
}

/// Interaction verbs of the automation capability.
///
/// Verbs are strict: a selector must resolve to exactly one element, and
/// failures carry the driver's message so they classify the same way real
/// driver failures do.
pub trait Page: Document {
    /// The query side of this page
    fn as_document(&self) -> &dyn Document;

    /// Navigate to `url`
    fn goto(&self, url: &str) -> RemendarResult<()>;

    /// URL of the loaded document
    fn current_url(&self) -> String;

    /// Click the element
    fn click(&self, selector: &Selector) -> RemendarResult<()>;

    /// Replace the value of a form control
    fn fill(&self, selector: &Selector, value: &str) -> RemendarResult<()>;

    /// Check a checkbox or radio button
    fn check(&self, selector: &Selector) -> RemendarResult<()>;

    /// Select an option of a `select` element by value or label
    fn select_option(&self, selector: &Selector, value: &str) -> RemendarResult<()>;

    /// Attach a file to a file input
    fn set_input_files(&self, selector: &Selector, path: &str) -> RemendarResult<()>;
}

/// Resolve `selector` to its single element, failing like a strict driver
pub fn resolve_single(doc: &dyn Document, selector: &Selector) -> RemendarResult<ElementRef> {
    let matches = doc.query_all(selector)?;
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => Err(RemendarError::Automation {
            message: format!("No node found for selector: {selector}"),
        }),
        many => Err(RemendarError::Automation {
            message: format!(
                "strict mode violation: {selector} resolved to {} elements",
                many.len()
            ),
        }),
    }
}

/// Form value for controls, normalized text otherwise
pub fn element_value_or_text(doc: &dyn Document, element: ElementRef) -> RemendarResult<String> {
    match doc.input_value(element)? {
        Some(value) => Ok(value),
        None => doc.text_content(element),
    }
}

/// Whether `ancestor` strictly contains `element`
pub fn is_ancestor(
    doc: &dyn Document,
    ancestor: ElementRef,
    element: ElementRef,
) -> RemendarResult<bool> {
    let mut current = doc.parent(element)?;
    while let Some(node) = current {
        if node == ancestor {
            return Ok(true);
        }
        current = doc.parent(node)?;
    }
    Ok(false)
}

/// 1-based position among same-tag siblings
pub fn nth_of_type(doc: &dyn Document, element: ElementRef) -> RemendarResult<Option<usize>> {
    let Some(parent) = doc.parent(element)? else {
        return Ok(None);
    };
    let tag = doc.describe(element)?.tag;
    let mut n = 0;
    for child in doc.children(parent)? {
        if doc.describe(child)?.tag == tag {
            n += 1;
        }
        if child == element {
            return Ok(Some(n));
        }
    }
    Ok(None)
}

/// Immediate element siblings `(previous, next)`
pub fn adjacent_siblings(
    doc: &dyn Document,
    element: ElementRef,
) -> RemendarResult<(Option<ElementRef>, Option<ElementRef>)> {
    let Some(parent) = doc.parent(element)? else {
        return Ok((None, None));
    };
    let siblings = doc.children(parent)?;
    let Some(pos) = siblings.iter().position(|s| *s == element) else {
        return Ok((None, None));
    };
    let previous = pos.checked_sub(1).map(|p| siblings[p]);
    let next = siblings.get(pos + 1).copied();
    Ok((previous, next))
}

/// Ancestors from the parent outwards
pub fn ancestors(doc: &dyn Document, element: ElementRef) -> RemendarResult<Vec<ElementRef>> {
    let mut out = Vec::new();
    let mut current = doc.parent(element)?;
    while let Some(node) = current {
        out.push(node);
        current = doc.parent(node)?;
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDocument, MockElement};

    fn sample() -> (MockDocument, ElementRef, ElementRef, ElementRef) {
        let mut doc = MockDocument::new();
        let root = doc.root();
        let list = doc.append(root, MockElement::new("ul").attr("id", "items"));
        let a = doc.append(list, MockElement::new("li").text("A"));
        let b = doc.append(list, MockElement::new("li").text("B"));
        let input = doc.append(root, MockElement::new("input").attr("value", "typed"));
        let _ = input;
        (doc, list, a, b)
    }

    mod geometry_tests {
        use super::*;

        #[test]
        fn test_within_tolerance() {
            let a = BoundingBox::new(10.0, 20.0, 100.0, 30.0);
            let b = BoundingBox::new(10.4, 19.6, 100.5, 30.0);
            assert!(bounding_boxes_match(Some(a), Some(b), GEOMETRY_TOLERANCE).unwrap());
        }

        #[test]
        fn test_outside_tolerance() {
            let a = BoundingBox::new(10.0, 20.0, 100.0, 30.0);
            let b = BoundingBox::new(10.0, 21.0, 100.0, 30.0);
            assert!(!bounding_boxes_match(Some(a), Some(b), GEOMETRY_TOLERANCE).unwrap());
        }

        #[test]
        fn test_missing_box_is_not_visible() {
            let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
            let err = bounding_boxes_match(Some(a), None, GEOMETRY_TOLERANCE).unwrap_err();
            assert!(matches!(err, RemendarError::ElementNotVisible { .. }));
        }
    }

    mod structure_tests {
        use super::*;

        #[test]
        fn test_nth_of_type_and_siblings() {
            let (doc, list, a, b) = sample();
            assert_eq!(nth_of_type(&doc, b).unwrap(), Some(2));
            assert_eq!(adjacent_siblings(&doc, a).unwrap(), (None, Some(b)));
            assert_eq!(adjacent_siblings(&doc, b).unwrap(), (Some(a), None));
            assert!(is_ancestor(&doc, list, b).unwrap());
            assert!(!is_ancestor(&doc, a, b).unwrap());
            assert_eq!(ancestors(&doc, a).unwrap()[0], list);
        }

        #[test]
        fn test_resolve_single_strictness() {
            let (doc, _, _, _) = sample();
            let err = resolve_single(&doc, &Selector::css("li")).unwrap_err();
            assert!(err.to_string().contains("strict mode violation"));
            let err = resolve_single(&doc, &Selector::css("#nope")).unwrap_err();
            assert!(err.is_repairable());
            assert!(resolve_single(&doc, &Selector::css("#items")).is_ok());
        }

        #[test]
        fn test_value_or_text() {
            let (doc, _, a, _) = sample();
            let input = resolve_single(&doc, &Selector::css("input")).unwrap();
            assert_eq!(element_value_or_text(&doc, input).unwrap(), "typed");
            assert_eq!(element_value_or_text(&doc, a).unwrap(), "A");
        }

        #[test]
        fn test_descriptor_helpers() {
            let d = ElementDescriptor::new("BUTTON")
                .with_attribute("class", " btn  primary ")
                .with_attribute("type", "submit");
            assert_eq!(d.tag, "button");
            assert_eq!(d.classes(), vec!["btn", "primary"]);
            assert_eq!(d.attribute("type"), Some("submit"));
            assert!(!d.is_form_control());
        }
    }
}
