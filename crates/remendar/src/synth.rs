//! Selector synthesis.
//!
//! Given a live element, produce the most specific selector that currently
//! resolves to exactly that element. Strategies run in increasing cost order
//! and the first unique result wins:
//!
//! 1. identity attribute (`#id`, `tag[data-test='…']`, …)
//! 2. short class list (`tag.a.b`, at most two classes)
//! 3. position among same-tag siblings (`tag:nth-of-type(n)`)
//! 4. tag alone, then attribute subsets of increasing size
//! 5. nearest ancestor with a unique selector (`anc > tag`, `anc tag`)
//! 6. adjacent sibling (`prev + tag`, `tag:has(+ next)`)
//! 7. normalized text XPath, indexed only when the text repeats
//! 8. nearest ancestor with unique text, then `//tag`
//! 9. indexed XPath over the not-unique selector, matched by geometry
//!
//! When a keyword is supplied the text strategies are tried first, so the
//! selector carries the keyword and can be parametrized in source.

use tracing::debug;

use crate::dom::{
    adjacent_siblings, ancestors, bounding_boxes_match, nth_of_type, Document, ElementDescriptor,
    ElementRef, GEOMETRY_TOLERANCE,
};
use crate::result::{FailureClass, RemendarError, RemendarResult};
use crate::selector::{
    css_string, css_to_xpath, is_css_identifier, xpath_literal, CandidateKind, Selector,
    SelectorCandidate,
};

/// Identity-like attributes, most stable first
pub const PRIORITY_ATTRIBUTES: &[&str] = &[
    "id",
    "data-test-id",
    "data-testid",
    "data-test",
    "name",
    "role",
    "aria-label",
    "alt",
    "title",
    "placeholder",
];

/// Attributes never used in synthesized selectors
pub const EXCLUDED_ATTRIBUTES: &[&str] = &["style"];

/// Upper bound on attributes considered by the subset search
pub const MAX_COMBINATION_ATTRIBUTES: usize = 8;

/// Synthesizes unique selectors against a live document
#[derive(Clone, Copy)]
pub struct SelectorSynthesizer<'a> {
    doc: &'a dyn Document,
    tolerance: f32,
}

impl std::fmt::Debug for SelectorSynthesizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorSynthesizer")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl<'a> SelectorSynthesizer<'a> {
    /// Synthesizer over `doc` with the default geometry tolerance
    #[must_use]
    pub fn new(doc: &'a dyn Document) -> Self {
        Self {
            doc,
            tolerance: GEOMETRY_TOLERANCE,
        }
    }

    /// Override the geometry tolerance used by the indexed fallback
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Best unique selector for `element`, or `None` when every strategy fails
    pub fn synthesize(
        &self,
        element: ElementRef,
        keyword: Option<&str>,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        if keyword.is_some_and(|k| !k.is_empty()) {
            if let Some(found) = self.text_xpath(element, false)? {
                return Ok(Some(found));
            }
            if let Some(found) = self.parent_text_xpath(element)? {
                return Ok(Some(found));
            }
        }

        let found = match self.simple_unique(element)? {
            Some(c) => Some(c),
            None => match self.parent_anchored(element)? {
                Some(c) => Some(c),
                None => match self.sibling_anchored(element)? {
                    Some(c) => Some(c),
                    None => match self.text_xpath(element, true)? {
                        Some(c) => Some(c),
                        None => match self.parent_text_xpath(element)? {
                            Some(c) => Some(c),
                            None => self.indexed_xpath(element)?,
                        },
                    },
                },
            },
        };
        match &found {
            Some(c) => debug!(selector = %c.selector, kind = ?c.kind, "synthesized selector"),
            None => debug!(element = element.0, "no unique selector"),
        }
        Ok(found)
    }

    /// Strategies 1 to 4, the selectors usable as anchors
    pub fn simple_unique(&self, element: ElementRef) -> RemendarResult<Option<SelectorCandidate>> {
        let desc = self.doc.describe(element)?;
        if let Some(c) = self.attribute_priority(element, &desc)? {
            return Ok(Some(c));
        }
        if let Some(c) = self.short_class(element, &desc)? {
            return Ok(Some(c));
        }
        if let Some(c) = self.positional(element, &desc)? {
            return Ok(Some(c));
        }
        self.combinatorial(element, &desc)
    }

    /// First priority attribute whose selector is unique
    pub fn attribute_priority(
        &self,
        element: ElementRef,
        desc: &ElementDescriptor,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        for attr in PRIORITY_ATTRIBUTES {
            let Some(value) = desc.attribute(attr).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let (css, kind) = if *attr == "id" && is_css_identifier(value) {
                (format!("#{value}"), CandidateKind::Id)
            } else {
                (
                    format!("{}[{attr}={}]", desc.tag, css_string(value)),
                    if *attr == "id" {
                        CandidateKind::Id
                    } else {
                        CandidateKind::AttrSet
                    },
                )
            };
            if let Some(c) = self.accept(Selector::Css(css), kind, element)? {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    /// `tag.c1.c2` for elements with one or two classes
    pub fn short_class(
        &self,
        element: ElementRef,
        desc: &ElementDescriptor,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        let classes = desc.classes();
        if classes.is_empty() || classes.len() > 2 || !classes.iter().all(|c| is_css_identifier(c))
        {
            return Ok(None);
        }
        let css = format!("{}.{}", desc.tag, classes.join("."));
        self.accept(Selector::Css(css), CandidateKind::Class, element)
    }

    /// `tag:nth-of-type(n)` among same-tag siblings
    pub fn positional(
        &self,
        element: ElementRef,
        desc: &ElementDescriptor,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        let Some(n) = nth_of_type(self.doc, element)? else {
            return Ok(None);
        };
        let css = format!("{}:nth-of-type({n})", desc.tag);
        self.accept(Selector::Css(css), CandidateKind::Positional, element)
    }

    /// Tag alone, then attribute subsets of size 1, 2, … in document order
    pub fn combinatorial(
        &self,
        element: ElementRef,
        desc: &ElementDescriptor,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        if let Some(c) = self.accept(Selector::css(desc.tag.clone()), CandidateKind::AttrSet, element)? {
            return Ok(Some(c));
        }
        let attributes: Vec<&(String, String)> = usable_attributes(desc)
            .take(MAX_COMBINATION_ATTRIBUTES)
            .collect();
        for size in 1..=attributes.len() {
            for subset in combinations(attributes.len(), size) {
                let mut css = desc.tag.clone();
                for i in subset {
                    let (name, value) = attributes[i];
                    css.push_str(&format!("[{name}={}]", css_string(value)));
                }
                if let Some(c) = self.accept(Selector::Css(css), CandidateKind::AttrSet, element)? {
                    return Ok(Some(c));
                }
            }
        }
        Ok(None)
    }

    /// Anchor on the nearest ancestor that has a unique simple selector
    pub fn parent_anchored(&self, element: ElementRef) -> RemendarResult<Option<SelectorCandidate>> {
        let desc = self.doc.describe(element)?;
        for (depth, ancestor) in ancestors(self.doc, element)?.into_iter().enumerate() {
            let Some(anchor) = self.simple_unique(ancestor)? else {
                continue;
            };
            let mut attempts = Vec::new();
            if depth == 0 {
                attempts.push(format!("{} > {}", anchor.selector, desc.tag));
                if let Some(n) = nth_of_type(self.doc, element)? {
                    attempts.push(format!("{} > {}:nth-of-type({n})", anchor.selector, desc.tag));
                }
            } else {
                attempts.push(format!("{} {}", anchor.selector, desc.tag));
            }
            for css in attempts {
                if let Some(c) = self.accept(Selector::Css(css), CandidateKind::ParentChain, element)? {
                    return Ok(Some(c));
                }
            }
        }
        Ok(None)
    }

    /// Anchor on the previous (`+`) or next (`:has(+ …)`) sibling
    pub fn sibling_anchored(&self, element: ElementRef) -> RemendarResult<Option<SelectorCandidate>> {
        let desc = self.doc.describe(element)?;
        let (previous, next) = adjacent_siblings(self.doc, element)?;
        if let Some(previous) = previous {
            for anchor in self.anchor_selectors(previous)? {
                let css = format!("{anchor} + {}", desc.tag);
                if let Some(c) = self.accept(Selector::Css(css), CandidateKind::SiblingChain, element)? {
                    return Ok(Some(c));
                }
            }
        }
        if let Some(next) = next {
            for anchor in self.anchor_selectors(next)? {
                let css = format!("{}:has(+ {anchor})", desc.tag);
                if let Some(c) = self.accept(Selector::Css(css), CandidateKind::SiblingChain, element)? {
                    return Ok(Some(c));
                }
            }
        }
        Ok(None)
    }

    /// XPath on the element's normalized text.
    ///
    /// Exact match first, then substring match on the element's own text,
    /// then (when `allow_index` is set) the exact match with a position.
    pub fn text_xpath(
        &self,
        element: ElementRef,
        allow_index: bool,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        let own = self.doc.direct_text(element)?;
        if own.is_empty() {
            return Ok(None);
        }
        let tag = self.doc.describe(element)?.tag;
        let full = self.doc.text_content(element)?;
        let exact = format!("//{tag}[normalize-space(.)={}]", xpath_literal(&full));
        if let Some(c) = self.accept(Selector::xpath(exact.clone()), CandidateKind::TextXpath, element)? {
            return Ok(Some(c));
        }
        let contains = format!("//{tag}[contains(normalize-space(.), {})]", xpath_literal(&own));
        if let Some(c) = self.accept(Selector::XPath(contains), CandidateKind::TextXpath, element)? {
            return Ok(Some(c));
        }
        if allow_index {
            return self.index_by_identity(&exact, element, CandidateKind::TextXpath);
        }
        Ok(None)
    }

    /// Nearest ancestor with unique text, then `//tag`
    pub fn parent_text_xpath(&self, element: ElementRef) -> RemendarResult<Option<SelectorCandidate>> {
        let tag = self.doc.describe(element)?.tag;
        for ancestor in ancestors(self.doc, element)? {
            let text = self.doc.text_content(ancestor)?;
            if text.is_empty() {
                continue;
            }
            let ancestor_tag = self.doc.describe(ancestor)?.tag;
            let anchor = format!("//{ancestor_tag}[normalize-space(.)={}]", xpath_literal(&text));
            if !self.is_unique_match(&Selector::xpath(anchor.clone()), ancestor)? {
                continue;
            }
            let xpath = format!("{anchor}//{tag}");
            if let Some(c) = self.accept(Selector::xpath(xpath.clone()), CandidateKind::ParentTextXpath, element)? {
                return Ok(Some(c));
            }
            return self.index_by_identity(&xpath, element, CandidateKind::ParentTextXpath);
        }
        Ok(None)
    }

    /// Not-unique selector converted to XPath, indexed by on-screen geometry.
    ///
    /// Fails with `ElementNotVisible` when the target has no bounding box.
    pub fn indexed_xpath(&self, element: ElementRef) -> RemendarResult<Option<SelectorCandidate>> {
        let css = self.not_unique(element)?;
        let Some(xpath) = css_to_xpath(&css) else {
            return Ok(None);
        };
        let target = self.doc.bounding_box(element)?;
        if target.is_none() {
            return Err(RemendarError::ElementNotVisible {
                message: format!("target of '{css}' has no bounding box"),
            });
        }
        for (i, candidate) in self.doc.query_all(&Selector::xpath(xpath.clone()))?.into_iter().enumerate() {
            let Some(other) = self.doc.bounding_box(candidate)? else {
                continue;
            };
            if bounding_boxes_match(target, Some(other), self.tolerance)? {
                let indexed = format!("({xpath})[{}]", i + 1);
                return self.accept(Selector::XPath(indexed), CandidateKind::IndexedXpath, element);
            }
        }
        Ok(None)
    }

    /// Tag plus every usable attribute, without a uniqueness check
    pub fn not_unique(&self, element: ElementRef) -> RemendarResult<String> {
        let desc = self.doc.describe(element)?;
        let mut css = desc.tag.clone();
        for (name, value) in usable_attributes(&desc) {
            css.push_str(&format!("[{name}={}]", css_string(value)));
        }
        Ok(css)
    }

    /// Whether `element` contains `other`
    pub fn contains(&self, element: ElementRef, other: ElementRef) -> RemendarResult<bool> {
        crate::dom::is_ancestor(self.doc, element, other)
    }

    fn anchor_selectors(&self, sibling: ElementRef) -> RemendarResult<Vec<String>> {
        let mut out = Vec::new();
        if let Some(c) = self.simple_unique(sibling)? {
            out.push(c.selector.as_str().to_string());
        }
        let loose = self.not_unique(sibling)?;
        if !out.contains(&loose) {
            out.push(loose);
        }
        Ok(out)
    }

    fn index_by_identity(
        &self,
        xpath: &str,
        element: ElementRef,
        kind: CandidateKind,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        let Some(matches) = self.query_lenient(&Selector::xpath(xpath))? else {
            return Ok(None);
        };
        let Some(pos) = matches.iter().position(|m| *m == element) else {
            return Ok(None);
        };
        let indexed = format!("({xpath})[{}]", pos + 1);
        self.accept(Selector::XPath(indexed), kind, element)
    }

    fn accept(
        &self,
        selector: Selector,
        kind: CandidateKind,
        element: ElementRef,
    ) -> RemendarResult<Option<SelectorCandidate>> {
        if self.is_unique_match(&selector, element)? {
            Ok(Some(SelectorCandidate::new(selector, kind)))
        } else {
            Ok(None)
        }
    }

    fn is_unique_match(&self, selector: &Selector, element: ElementRef) -> RemendarResult<bool> {
        Ok(self
            .query_lenient(selector)?
            .is_some_and(|matches| matches.as_slice() == [element]))
    }

    /// Query, mapping selector-level failures to `None`
    fn query_lenient(&self, selector: &Selector) -> RemendarResult<Option<Vec<ElementRef>>> {
        match self.doc.query_all(selector) {
            Ok(matches) => Ok(Some(matches)),
            Err(e) if e.failure_class() == FailureClass::LocatorInvalid => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn usable_attributes(desc: &ElementDescriptor) -> impl Iterator<Item = &(String, String)> {
    desc.attributes
        .iter()
        .filter(|(name, _)| !EXCLUDED_ATTRIBUTES.contains(&name.as_str()) && is_css_identifier(name))
}

/// Index subsets of `0..n` with `k` elements, in lexicographic order
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let mut i = k;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if idx[i] != i + n - k {
                break;
            }
            if i == 0 {
                return out;
            }
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::strategies::arb_document;
    use crate::mock::{login_form, product_grid, MockDocument, MockElement};
    use proptest::prelude::*;

    fn find(doc: &MockDocument, css: &str) -> ElementRef {
        doc.query_all(&Selector::detect(css)).unwrap()[0]
    }

    fn find_nth(doc: &MockDocument, css: &str, n: usize) -> ElementRef {
        doc.query_all(&Selector::detect(css)).unwrap()[n]
    }

    mod combination_tests {
        use super::*;

        #[test]
        fn test_combinations_order() {
            assert_eq!(
                combinations(3, 2),
                vec![vec![0, 1], vec![0, 2], vec![1, 2]]
            );
            assert_eq!(combinations(3, 3), vec![vec![0, 1, 2]]);
            assert_eq!(combinations(4, 1).len(), 4);
            assert!(combinations(2, 3).is_empty());
            assert_eq!(combinations(8, 4).len(), 70);
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn test_unique_id_first() {
            let doc = login_form();
            let el = find(&doc, "input[type='password']");
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector, Selector::css("#password"));
            assert_eq!(c.kind, CandidateKind::Id);
        }

        #[test]
        fn test_non_identifier_id_uses_attribute_form() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            let el = doc.append(root, MockElement::new("input").attr("id", "1st name"));
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "input[id='1st name']");
            assert_eq!(c.kind, CandidateKind::Id);
        }

        #[test]
        fn test_duplicate_id_falls_through_to_data_test() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            doc.append(root, MockElement::new("button").attr("id", "go"));
            let el = doc.append(
                root,
                MockElement::new("button").attr("id", "go").attr("data-test", "checkout"),
            );
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "button[data-test='checkout']");
            assert_eq!(c.kind, CandidateKind::AttrSet);
        }

        #[test]
        fn test_short_class() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            let a = doc.append(root, MockElement::new("div"));
            let b = doc.append(root, MockElement::new("div"));
            doc.append(a, MockElement::new("span").attr("class", "price"));
            let el = doc.append(b, MockElement::new("span").attr("class", "price big"));
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "span.price.big");
            assert_eq!(c.kind, CandidateKind::Class);
        }

        #[test]
        fn test_positional() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            let list = doc.append(root, MockElement::new("ul"));
            doc.append(list, MockElement::new("li"));
            let el = doc.append(list, MockElement::new("li"));
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "li:nth-of-type(2)");
            assert_eq!(c.kind, CandidateKind::Positional);
        }
    }

    mod combinatorial_tests {
        use super::*;

        fn three_inputs() -> (MockDocument, ElementRef) {
            let mut doc = MockDocument::new();
            let root = doc.root();
            let mut target = None;
            for (class, kind) in [("foo", "text"), ("foo", "password"), ("bar", "text")] {
                let wrapper = doc.append(root, MockElement::new("div"));
                let el = doc.append(
                    wrapper,
                    MockElement::new("input")
                        .attr("class", class)
                        .attr("type", kind)
                        .attr("role", "input")
                        .attr("style", "color: red"),
                );
                target.get_or_insert(el);
            }
            (doc, target.unwrap())
        }

        #[test]
        fn test_two_attributes_beat_three() {
            let (doc, el) = three_inputs();
            let c = SelectorSynthesizer::new(&doc).synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "input[class='foo'][type='text']");
            assert_eq!(c.kind, CandidateKind::AttrSet);
        }

        #[test]
        fn test_tag_alone_when_unique() {
            let doc = login_form();
            let el = find(&doc, "h3");
            let synth = SelectorSynthesizer::new(&doc);
            let desc = doc.describe(el).unwrap();
            let c = synth.combinatorial(el, &desc).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "h3");
        }

        #[test]
        fn test_not_unique_excludes_style() {
            let (doc, el) = three_inputs();
            let css = SelectorSynthesizer::new(&doc).not_unique(el).unwrap();
            assert_eq!(css, "input[class='foo'][type='text'][role='input']");
        }
    }

    mod anchored_tests {
        use super::*;

        #[test]
        fn test_parent_anchored() {
            let doc = product_grid(&["Backpack", "Bike Light", "Onesie"]);
            let el = find_nth(&doc, "button", 1);
            let synth = SelectorSynthesizer::new(&doc);
            let c = synth.synthesize(el, None).unwrap().unwrap();
            assert_eq!(c.kind, CandidateKind::ParentChain);
            assert_eq!(c.selector.as_str(), "div:nth-of-type(2) > button");
            assert_eq!(doc.query_all(&c.selector).unwrap(), vec![el]);
        }

        #[test]
        fn test_sibling_anchored() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            for label in ["a", "b"] {
                let row = doc.append(root, MockElement::new("p"));
                doc.append(row, MockElement::new("label").attr("for", label));
                doc.append(row, MockElement::new("input"));
            }
            let el = find_nth(&doc, "input", 1);
            let synth = SelectorSynthesizer::new(&doc);
            let c = synth.sibling_anchored(el).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "label[for='b'] + input");
            assert_eq!(c.kind, CandidateKind::SiblingChain);
        }

        #[test]
        fn test_next_sibling_has() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            for name in ["x", "y"] {
                let row = doc.append(root, MockElement::new("p"));
                doc.append(row, MockElement::new("span"));
                doc.append(row, MockElement::new("input").attr("name", name));
            }
            let el = find_nth(&doc, "span", 1);
            let c = SelectorSynthesizer::new(&doc).sibling_anchored(el).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "span:has(+ input[name='y'])");
        }

        #[test]
        fn test_contains() {
            let doc = product_grid(&["Backpack"]);
            let item = find(&doc, "div.inventory_item");
            let button = find(&doc, "button");
            let synth = SelectorSynthesizer::new(&doc);
            assert!(synth.contains(item, button).unwrap());
            assert!(!synth.contains(button, item).unwrap());
        }
    }

    mod text_tests {
        use super::*;

        #[test]
        fn test_exact_text() {
            let doc = product_grid(&["Backpack", "Bike Light"]);
            let el = find(&doc, "//a[normalize-space(.)='Bike Light']");
            let c = SelectorSynthesizer::new(&doc).text_xpath(el, false).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "//a[normalize-space(.)='Bike Light']");
        }

        #[test]
        fn test_repeated_text_is_indexed() {
            let doc = product_grid(&["Backpack", "Bike Light", "Onesie"]);
            let el = find_nth(&doc, "button", 2);
            let synth = SelectorSynthesizer::new(&doc);
            assert!(synth.text_xpath(el, false).unwrap().is_none());
            let c = synth.text_xpath(el, true).unwrap().unwrap();
            assert_eq!(
                c.selector.as_str(),
                "(//button[normalize-space(.)='Add to cart'])[3]"
            );
        }

        #[test]
        fn test_keyword_prefers_parent_text() {
            let doc = product_grid(&["Backpack", "Bike Light", "Onesie"]);
            let el = find_nth(&doc, "button", 1);
            let c = SelectorSynthesizer::new(&doc)
                .synthesize(el, Some("Bike Light"))
                .unwrap()
                .unwrap();
            assert_eq!(c.kind, CandidateKind::ParentTextXpath);
            assert_eq!(
                c.selector.as_str(),
                "//div[normalize-space(.)='Bike Light Add to cart']//button"
            );
        }

        #[test]
        fn test_quote_in_text() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            doc.append(root, MockElement::new("p").text("it's"));
            let el = doc.append(root, MockElement::new("p").text("it's here"));
            let c = SelectorSynthesizer::new(&doc).text_xpath(el, false).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "//p[normalize-space(.)=\"it's here\"]");
            assert_eq!(doc.query_all(&c.selector).unwrap(), vec![el]);
        }
    }

    mod indexed_tests {
        use super::*;

        #[test]
        fn test_geometry_index() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            for _ in 0..3 {
                doc.append(root, MockElement::new("li"));
            }
            let el = find_nth(&doc, "li", 1);
            let c = SelectorSynthesizer::new(&doc).indexed_xpath(el).unwrap().unwrap();
            assert_eq!(c.selector.as_str(), "(//li)[2]");
            assert_eq!(c.kind, CandidateKind::IndexedXpath);
        }

        #[test]
        fn test_hidden_target_is_not_visible() {
            let mut doc = MockDocument::new();
            let root = doc.root();
            let el = doc.append(root, MockElement::new("li").hidden());
            let err = SelectorSynthesizer::new(&doc).indexed_xpath(el).unwrap_err();
            assert!(matches!(err, RemendarError::ElementNotVisible { .. }));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_synthesized_selectors_are_unique(doc in arb_document(10)) {
            let synth = SelectorSynthesizer::new(&doc);
            for element in doc.query_all(&Selector::css("*")).unwrap() {
                if let Some(c) = synth.synthesize(element, None).unwrap() {
                    prop_assert_eq!(doc.query_all(&c.selector).unwrap(), vec![element]);
                }
            }
        }

        #[test]
        fn prop_unique_id_wins(doc in arb_document(10)) {
            let synth = SelectorSynthesizer::new(&doc);
            for element in doc.query_all(&Selector::css("*")).unwrap() {
                let desc = doc.describe(element).unwrap();
                let Some(id) = desc.attribute("id") else { continue };
                let by_id = Selector::css(format!("#{id}"));
                if doc.query_all(&by_id).unwrap() == vec![element] {
                    let c = synth.synthesize(element, None).unwrap().unwrap();
                    prop_assert_eq!(c.selector, by_id);
                }
            }
        }
    }
}
