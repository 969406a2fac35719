//! In-memory DOM implementing [`Document`] and [`Page`].
//!
//! Elements are appended under a `body` root. Unless a box is given, each
//! element gets a distinct row in a synthetic layout so geometry comparison
//! behaves like a rendered page. Selectors are evaluated with the restricted
//! grammar of [`crate::selector`]; anything outside it fails the way a
//! browser reports an invalid selector.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::dom::{resolve_single, BoundingBox, Document, ElementDescriptor, ElementRef, Page};
use crate::result::{RemendarError, RemendarResult};
use crate::selector::{
    normalize_space, Combinator, CssCompound, CssPath, Selector, XPathPredicate, XPathQuery,
    XPathStep,
};

const ROW_HEIGHT: f32 = 20.0;

/// Builder for one element
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    bbox: Option<Option<BoundingBox>>,
}

impl MockElement {
    /// Element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            bbox: None,
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Set the element's own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Fix the bounding box
    #[must_use]
    pub fn bbox(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.bbox = Some(Some(BoundingBox::new(x, y, width, height)));
        self
    }

    /// Not rendered: no bounding box
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.bbox = Some(None);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    element: MockElement,
    parent: Option<usize>,
    children: Vec<usize>,
    bbox: Option<BoundingBox>,
}

/// Interaction recorded by the mock page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    /// `goto`
    Goto(String),
    /// `click`
    Click(ElementRef),
    /// `fill`
    Fill(ElementRef, String),
    /// `check`
    Check(ElementRef),
    /// `select_option`
    SelectOption(ElementRef, String),
    /// `set_input_files`
    SetInputFiles(ElementRef, String),
}

#[derive(Debug, Clone, Default)]
struct PageState {
    url: String,
    values: HashMap<usize, String>,
    checked: HashSet<usize>,
    hovered: Option<usize>,
    detached: HashSet<usize>,
    unreachable: Vec<String>,
    actions: Vec<MockAction>,
}

/// In-memory document and page
#[derive(Debug, Clone)]
pub struct MockDocument {
    nodes: Vec<Node>,
    state: RefCell<PageState>,
}

impl Default for MockDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocument {
    /// Empty document with a `body` root
    #[must_use]
    pub fn new() -> Self {
        let body = Node {
            element: MockElement::new("body"),
            parent: None,
            children: Vec::new(),
            bbox: Some(BoundingBox::new(0.0, 0.0, 1280.0, 720.0)),
        };
        Self {
            nodes: vec![body],
            state: RefCell::new(PageState {
                url: "about:blank".to_string(),
                ..PageState::default()
            }),
        }
    }

    /// The `body` element
    #[must_use]
    pub const fn root(&self) -> ElementRef {
        ElementRef(0)
    }

    /// Append `element` as the last child of `parent`
    pub fn append(&mut self, parent: ElementRef, element: MockElement) -> ElementRef {
        let index = self.nodes.len();
        let depth = {
            let mut d = 0;
            let mut p = Some(parent.0 as usize);
            while let Some(i) = p {
                d += 1;
                p = self.nodes.get(i).and_then(|n| n.parent);
            }
            d
        };
        let bbox = element.bbox.unwrap_or_else(|| {
            Some(BoundingBox::new(
                8.0 * depth as f32,
                ROW_HEIGHT * index as f32,
                200.0,
                ROW_HEIGHT - 2.0,
            ))
        });
        self.nodes.push(Node {
            element,
            parent: Some(parent.0 as usize),
            children: Vec::new(),
            bbox,
        });
        if let Some(p) = self.nodes.get_mut(parent.0 as usize) {
            p.children.push(index);
        }
        ElementRef(index as u64)
    }

    /// Replace an attribute value, adding it when absent
    pub fn set_attribute(&mut self, element: ElementRef, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            match node.element.attributes.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => node
                    .element
                    .attributes
                    .push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Remove an element subtree from matching
    pub fn detach(&self, element: ElementRef) {
        let mut state = self.state.borrow_mut();
        let mut stack = vec![element.0 as usize];
        while let Some(i) = stack.pop() {
            state.detached.insert(i);
            if let Some(node) = self.nodes.get(i) {
                stack.extend(&node.children);
            }
        }
    }

    /// Put the pointer over `element`
    pub fn hover(&self, element: ElementRef) {
        self.state.borrow_mut().hovered = Some(element.0 as usize);
    }

    /// Make navigation to `url` fail
    pub fn fail_navigation_to(&self, url: impl Into<String>) {
        self.state.borrow_mut().unreachable.push(url.into());
    }

    /// Interactions performed so far
    #[must_use]
    pub fn actions(&self) -> Vec<MockAction> {
        self.state.borrow().actions.clone()
    }

    /// Whether a checkbox has been checked
    #[must_use]
    pub fn is_checked(&self, element: ElementRef) -> bool {
        self.state.borrow().checked.contains(&(element.0 as usize))
    }

    fn node(&self, element: ElementRef) -> RemendarResult<&Node> {
        let index = element.0 as usize;
        if self.state.borrow().detached.contains(&index) {
            return Err(RemendarError::Automation {
                message: format!("Element {} is not attached to the DOM", element.0),
            });
        }
        self.nodes.get(index).ok_or_else(|| {
            RemendarError::locator_invalid(
                format!("element handle {}", element.0),
                "No node found for element handle in this document",
            )
        })
    }

    fn parent_of(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|n| n.parent)
    }

    fn live(&self) -> Vec<usize> {
        let state = self.state.borrow();
        (0..self.nodes.len())
            .filter(|i| !state.detached.contains(i))
            .collect()
    }

    fn attribute(&self, index: usize, name: &str) -> Option<&str> {
        self.nodes
            .get(index)?
            .element
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn live_children(&self, index: usize) -> Vec<usize> {
        let state = self.state.borrow();
        self.nodes.get(index).map_or_else(Vec::new, |node| {
            node.children
                .iter()
                .copied()
                .filter(|c| !state.detached.contains(c))
                .collect()
        })
    }

    fn subtree_text(&self, index: usize) -> String {
        let Some(node) = self.nodes.get(index) else {
            return String::new();
        };
        let mut parts = vec![node.element.text.clone()];
        for child in self.live_children(index) {
            parts.push(self.subtree_text(child));
        }
        parts.join(" ")
    }

    fn previous_sibling(&self, index: usize) -> Option<usize> {
        let parent = self.parent_of(index)?;
        let siblings = self.live_children(parent);
        let pos = siblings.iter().position(|s| *s == index)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    fn next_sibling(&self, index: usize) -> Option<usize> {
        let parent = self.parent_of(index)?;
        let siblings = self.live_children(parent);
        let pos = siblings.iter().position(|s| *s == index)?;
        siblings.get(pos + 1).copied()
    }

    fn position_of_type(&self, index: usize) -> Option<usize> {
        let node = self.nodes.get(index)?;
        let parent = node.parent?;
        let tag = &node.element.tag;
        self.live_children(parent)
            .into_iter()
            .filter(|c| self.nodes.get(*c).is_some_and(|n| &n.element.tag == tag))
            .position(|c| c == index)
            .map(|p| p + 1)
    }

    // ------------------------------------------------------------------
    // CSS
    // ------------------------------------------------------------------

    fn compound_matches(&self, index: usize, compound: &CssCompound) -> bool {
        let Some(element) = self.nodes.get(index).map(|n| &n.element) else {
            return false;
        };
        if let Some(tag) = &compound.tag {
            if &element.tag != tag {
                return false;
            }
        }
        if let Some(id) = &compound.id {
            if self.attribute(index, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !compound.classes.is_empty() {
            let classes: Vec<&str> = self
                .attribute(index, "class")
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default();
            if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        for attr in &compound.attributes {
            match (self.attribute(index, &attr.name), &attr.value) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        if let Some(n) = compound.nth_of_type {
            if self.position_of_type(index) != Some(n) {
                return false;
            }
        }
        if let Some(next) = &compound.followed_by {
            match self.next_sibling(index) {
                Some(sibling) if self.compound_matches(sibling, next) => {}
                _ => return false,
            }
        }
        true
    }

    fn path_matches(&self, index: usize, compounds: &[&CssCompound], combinators: &[Combinator]) -> bool {
        let Some((last, rest)) = compounds.split_last() else {
            return true;
        };
        if !self.compound_matches(index, last) {
            return false;
        }
        let Some((combinator, outer)) = combinators.split_last() else {
            return true;
        };
        match combinator {
            Combinator::Child => self
                .parent_of(index)
                .is_some_and(|p| self.path_matches(p, rest, outer)),
            Combinator::Adjacent => self
                .previous_sibling(index)
                .is_some_and(|p| self.path_matches(p, rest, outer)),
            Combinator::Descendant => {
                let mut current = self.parent_of(index);
                while let Some(p) = current {
                    if self.path_matches(p, rest, outer) {
                        return true;
                    }
                    current = self.parent_of(p);
                }
                false
            }
        }
    }

    fn query_css(&self, raw: &str) -> RemendarResult<Vec<usize>> {
        let path = CssPath::parse(raw).map_err(|e| invalid_selector(raw, &e))?;
        let mut compounds = vec![&path.head];
        let mut combinators = Vec::new();
        for (combinator, compound) in &path.tail {
            combinators.push(*combinator);
            compounds.push(compound);
        }
        Ok(self
            .live()
            .into_iter()
            .filter(|i| self.path_matches(*i, &compounds, &combinators))
            .collect())
    }

    // ------------------------------------------------------------------
    // XPath
    // ------------------------------------------------------------------

    fn predicate_holds(&self, index: usize, predicate: &XPathPredicate) -> bool {
        match predicate {
            XPathPredicate::AttrEquals { name, value } => {
                self.attribute(index, name) == Some(value.as_str())
            }
            XPathPredicate::TextEquals(text) => normalize_space(&self.subtree_text(index)) == *text,
            XPathPredicate::TextContains(text) => {
                normalize_space(&self.subtree_text(index)).contains(text.as_str())
            }
            XPathPredicate::Position(_) => true,
        }
    }

    fn apply_step(&self, candidates: Vec<usize>, step: &XPathStep) -> Vec<usize> {
        let mut current: Vec<usize> = candidates
            .into_iter()
            .filter(|i| {
                step.tag
                    .as_ref()
                    .map_or(true, |t| self.nodes.get(*i).is_some_and(|n| &n.element.tag == t))
            })
            .collect();
        for group in &step.predicates {
            if let [XPathPredicate::Position(n)] = group.as_slice() {
                // Positions count per parent, as `//x[n]` does
                let mut seen: HashMap<Option<usize>, usize> = HashMap::new();
                current.retain(|i| {
                    let count = seen.entry(self.parent_of(*i)).or_insert(0);
                    *count += 1;
                    *count == *n
                });
            } else {
                current.retain(|i| group.iter().all(|p| self.predicate_holds(*i, p)));
            }
        }
        current
    }

    fn descendants_of(&self, roots: &[usize]) -> Vec<usize> {
        let live = self.live();
        live.into_iter()
            .filter(|i| {
                let mut p = self.parent_of(*i);
                while let Some(a) = p {
                    if roots.contains(&a) {
                        return true;
                    }
                    p = self.parent_of(a);
                }
                false
            })
            .collect()
    }

    fn query_xpath(&self, raw: &str) -> RemendarResult<Vec<usize>> {
        let query = XPathQuery::parse(raw).map_err(|e| invalid_selector(raw, &e))?;
        let mut result = Vec::new();
        for (i, step) in query.steps.iter().enumerate() {
            let candidates = if i == 0 {
                self.live()
            } else {
                self.descendants_of(&result)
            };
            result = self.apply_step(candidates, step);
        }
        if let Some(n) = query.index {
            return Ok(result.get(n - 1).map(|i| vec![*i]).unwrap_or_default());
        }
        Ok(result)
    }

    fn record(&self, action: MockAction) {
        self.state.borrow_mut().actions.push(action);
    }

    fn form_control(&self, selector: &Selector, allowed: &[&str]) -> RemendarResult<ElementRef> {
        let element = resolve_single(self, selector)?;
        let tag = &self.node(element)?.element.tag;
        if allowed.contains(&tag.as_str()) {
            Ok(element)
        } else {
            Err(RemendarError::Automation {
                message: format!("Element is not an <{}> element: {selector}", allowed.join("> or <")),
            })
        }
    }
}

fn invalid_selector(raw: &str, cause: &RemendarError) -> RemendarError {
    RemendarError::Automation {
        message: format!("Evaluation failed: '{raw}' is not a valid selector ({cause})"),
    }
}

impl Document for MockDocument {
    fn query_all(&self, selector: &Selector) -> RemendarResult<Vec<ElementRef>> {
        let matches = match selector {
            Selector::Css(raw) => self.query_css(raw)?,
            Selector::XPath(raw) => self.query_xpath(raw)?,
        };
        Ok(matches.into_iter().map(|i| ElementRef(i as u64)).collect())
    }

    fn describe(&self, element: ElementRef) -> RemendarResult<ElementDescriptor> {
        let node = self.node(element)?;
        Ok(ElementDescriptor {
            tag: node.element.tag.clone(),
            attributes: node.element.attributes.clone(),
        })
    }

    fn parent(&self, element: ElementRef) -> RemendarResult<Option<ElementRef>> {
        Ok(self.node(element)?.parent.map(|p| ElementRef(p as u64)))
    }

    fn children(&self, element: ElementRef) -> RemendarResult<Vec<ElementRef>> {
        self.node(element)?;
        Ok(self
            .live_children(element.0 as usize)
            .into_iter()
            .map(|c| ElementRef(c as u64))
            .collect())
    }

    fn direct_text(&self, element: ElementRef) -> RemendarResult<String> {
        Ok(normalize_space(&self.node(element)?.element.text))
    }

    fn text_content(&self, element: ElementRef) -> RemendarResult<String> {
        self.node(element)?;
        Ok(normalize_space(&self.subtree_text(element.0 as usize)))
    }

    fn input_value(&self, element: ElementRef) -> RemendarResult<Option<String>> {
        let node = self.node(element)?;
        let index = element.0 as usize;
        match node.element.tag.as_str() {
            "input" | "textarea" | "select" => {
                let state = self.state.borrow();
                Ok(Some(state.values.get(&index).cloned().unwrap_or_else(|| {
                    self.attribute(index, "value").unwrap_or_default().to_string()
                })))
            }
            _ => Ok(None),
        }
    }

    fn bounding_box(&self, element: ElementRef) -> RemendarResult<Option<BoundingBox>> {
        Ok(self.node(element)?.bbox)
    }

    fn hovered_element(&self) -> RemendarResult<Option<ElementRef>> {
        Ok(self.state.borrow().hovered.map(|i| ElementRef(i as u64)))
    }
}

impl Page for MockDocument {
    fn as_document(&self) -> &dyn Document {
        self
    }

    fn goto(&self, url: &str) -> RemendarResult<()> {
        let unreachable = self.state.borrow().unreachable.iter().any(|u| u == url);
        if url.trim().is_empty() || unreachable {
            return Err(RemendarError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        let mut state = self.state.borrow_mut();
        state.url = url.to_string();
        state.actions.push(MockAction::Goto(url.to_string()));
        Ok(())
    }

    fn current_url(&self) -> String {
        self.state.borrow().url.clone()
    }

    fn click(&self, selector: &Selector) -> RemendarResult<()> {
        let element = resolve_single(self, selector)?;
        self.record(MockAction::Click(element));
        Ok(())
    }

    fn fill(&self, selector: &Selector, value: &str) -> RemendarResult<()> {
        let element = self.form_control(selector, &["input", "textarea"])?;
        self.state
            .borrow_mut()
            .values
            .insert(element.0 as usize, value.to_string());
        self.record(MockAction::Fill(element, value.to_string()));
        Ok(())
    }

    fn check(&self, selector: &Selector) -> RemendarResult<()> {
        let element = self.form_control(selector, &["input"])?;
        self.state.borrow_mut().checked.insert(element.0 as usize);
        self.record(MockAction::Check(element));
        Ok(())
    }

    fn select_option(&self, selector: &Selector, value: &str) -> RemendarResult<()> {
        let element = self.form_control(selector, &["select"])?;
        let index = element.0 as usize;
        let found = self.live_children(index).into_iter().find(|o| {
            self.attribute(*o, "value") == Some(value)
                || normalize_space(&self.subtree_text(*o)) == value
        });
        let Some(option) = found else {
            return Err(RemendarError::value_invalid(format!(
                "Option '{value}' not present in {selector}"
            )));
        };
        let chosen = self
            .attribute(option, "value")
            .map_or_else(|| normalize_space(&self.subtree_text(option)), str::to_string);
        self.state.borrow_mut().values.insert(index, chosen);
        self.record(MockAction::SelectOption(element, value.to_string()));
        Ok(())
    }

    fn set_input_files(&self, selector: &Selector, path: &str) -> RemendarResult<()> {
        let element = self.form_control(selector, &["input"])?;
        if self.attribute(element.0 as usize, "type") != Some("file") {
            return Err(RemendarError::Automation {
                message: format!("Node is not an HTMLInputElement of type file: {selector}"),
            });
        }
        self.record(MockAction::SetInputFiles(element, path.to_string()));
        Ok(())
    }
}
