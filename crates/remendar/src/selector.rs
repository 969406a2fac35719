//! Selector model and the restricted CSS/XPath grammar.
//!
//! The synthesizer only ever emits a small grammar: compound CSS selectors
//! (tag, `#id`, `.class`, `[attr='value']`, `:nth-of-type(n)`, `:has(+ x)`)
//! joined by descendant, child (`>`) or adjacency (`+`) combinators, and
//! descendant-axis XPath steps with attribute, text and position predicates.
//! Both halves are parsed into small ASTs here so that documents (real or
//! mocked) and the CSS/XPath converters agree on one definition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::result::{RemendarError, RemendarResult};

/// A selector string, either CSS or XPath
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "input[name='user']")
    Css(String),
    /// XPath selector (e.g., "//button[normalize-space(.)='Login']")
    XPath(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Detect the selector flavour the way automation engines do:
    /// `xpath=` prefix or a leading `//` / `(//` means XPath.
    #[must_use]
    pub fn detect(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("xpath=") {
            return Self::XPath(rest.to_string());
        }
        if trimmed.starts_with("//") || trimmed.starts_with("(//") || trimmed.starts_with("..")
        {
            Self::XPath(trimmed.to_string())
        } else {
            Self::Css(trimmed.to_string())
        }
    }

    /// Raw selector text
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }

    /// Whether this is an XPath selector
    #[must_use]
    pub const fn is_xpath(&self) -> bool {
        matches!(self, Self::XPath(_))
    }

    /// JavaScript expression returning every matching element as an array
    #[must_use]
    pub fn to_query_all(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({s:?}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 return Array.from({{ length: r.snapshotLength }}, (_, i) => r.snapshotItem(i)); }})()"
            ),
        }
    }

    /// JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelectorAll({s:?}).length"),
            Self::XPath(s) => format!(
                "document.evaluate({s:?}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength"
            ),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which synthesis strategy produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    /// `#id`
    Id,
    /// `tag[attr='value']...` (priority attribute or combinatorial subset)
    AttrSet,
    /// `tag.class1.class2`
    Class,
    /// `tag:nth-of-type(n)`
    Positional,
    /// `<ancestor> > tag`
    ParentChain,
    /// `<sibling> + tag`
    SiblingChain,
    /// `//tag[normalize-space(.)='text']`
    TextXpath,
    /// `<ancestor-text-xpath>//tag`
    ParentTextXpath,
    /// `(<xpath>)[n]` chosen by geometry
    IndexedXpath,
    /// Tag plus every attribute, uniqueness not checked
    NotUnique,
}

/// A synthesized selector together with the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    /// The selector
    pub selector: Selector,
    /// Producing strategy
    pub kind: CandidateKind,
}

impl SelectorCandidate {
    /// Create a new candidate
    #[must_use]
    pub const fn new(selector: Selector, kind: CandidateKind) -> Self {
        Self { selector, kind }
    }
}

// ============================================================================
// Quoting
// ============================================================================

/// Whether `s` can be written as a bare CSS identifier
#[must_use]
pub fn is_css_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some('-') => match chars.next() {
            Some(c) => c,
            None => return false,
        },
        Some(c) => c,
        None => return false,
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Quote a CSS attribute value with single quotes
#[must_use]
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Quote a string as an XPath literal, falling back to `concat()` when it
/// contains both quote characters
#[must_use]
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|p| format!("'{p}'"))
        .collect::<Vec<_>>();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Collapse runs of whitespace and trim, like XPath `normalize-space()`
#[must_use]
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// CSS grammar
// ============================================================================

/// Attribute condition inside a compound selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    /// Attribute name
    pub name: String,
    /// Required value, or `None` for presence only
    pub value: Option<String>,
}

/// One compound selector, e.g. `input.primary[type='text']:nth-of-type(2)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssCompound {
    /// Tag name, `None` for `*` or an implicit universal selector
    pub tag: Option<String>,
    /// `#id`
    pub id: Option<String>,
    /// `.class` list
    pub classes: Vec<String>,
    /// `[attr='value']` list
    pub attributes: Vec<AttrMatch>,
    /// `:nth-of-type(n)`, 1-based
    pub nth_of_type: Option<usize>,
    /// `:has(+ x)`: the immediately following sibling must match `x`
    pub followed_by: Option<Box<CssCompound>>,
}

impl CssCompound {
    /// Compound matching only a tag
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    fn is_bare_universal(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.nth_of_type.is_none()
            && self.followed_by.is_none()
    }
}

impl fmt::Display for CssCompound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => f.write_str(tag)?,
            None if self.is_bare_universal() => f.write_str("*")?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        for attr in &self.attributes {
            match &attr.value {
                Some(v) => write!(f, "[{}={}]", attr.name, css_string(v))?,
                None => write!(f, "[{}]", attr.name)?,
            }
        }
        if let Some(n) = self.nth_of_type {
            write!(f, ":nth-of-type({n})")?;
        }
        if let Some(next) = &self.followed_by {
            write!(f, ":has(+ {next})")?;
        }
        Ok(())
    }
}

/// Relationship between consecutive compounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    Adjacent,
}

/// A complex CSS selector: compounds joined by combinators, left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssPath {
    /// Leftmost compound
    pub head: CssCompound,
    /// Following compounds with the combinator that precedes each
    pub tail: Vec<(Combinator, CssCompound)>,
}

impl CssPath {
    /// Parse a selector in the supported grammar
    pub fn parse(input: &str) -> RemendarResult<Self> {
        let mut parser = CssParser::new(input);
        parser.skip_ws();
        let head = parser.compound()?;
        let mut tail = Vec::new();
        loop {
            let had_ws = parser.skip_ws();
            match parser.peek() {
                None => break,
                Some('>') => {
                    parser.bump();
                    parser.skip_ws();
                    tail.push((Combinator::Child, parser.compound()?));
                }
                Some('+') => {
                    parser.bump();
                    parser.skip_ws();
                    tail.push((Combinator::Adjacent, parser.compound()?));
                }
                Some(_) if had_ws => tail.push((Combinator::Descendant, parser.compound()?)),
                Some(c) => {
                    return Err(RemendarError::parse(format!(
                        "unexpected '{c}' in selector '{input}'"
                    )))
                }
            }
        }
        Ok(Self { head, tail })
    }

    /// Rightmost compound, i.e. the subject of the selector
    #[must_use]
    pub fn subject(&self) -> &CssCompound {
        self.tail.last().map_or(&self.head, |(_, c)| c)
    }
}

impl fmt::Display for CssPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (combinator, compound) in &self.tail {
            match combinator {
                Combinator::Descendant => write!(f, " {compound}")?,
                Combinator::Child => write!(f, " > {compound}")?,
                Combinator::Adjacent => write!(f, " + {compound}")?,
            }
        }
        Ok(())
    }
}

struct CssParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> CssParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, what: &str) -> RemendarError {
        RemendarError::parse(format!(
            "{what} at offset {} in selector '{}'",
            self.pos, self.input
        ))
    }

    fn expect(&mut self, c: char) -> RemendarResult<()> {
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn ident(&mut self) -> RemendarResult<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.error("expected identifier"))
        } else {
            Ok(out)
        }
    }

    fn quoted(&mut self) -> RemendarResult<String> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn compound(&mut self) -> RemendarResult<CssCompound> {
        let mut compound = CssCompound::default();
        let start = self.pos;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if c.is_alphabetic() => {
                compound.tag = Some(self.ident()?.to_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    self.skip_ws();
                    let name = self.ident()?;
                    self.skip_ws();
                    let value = if self.peek() == Some('=') {
                        self.pos += 1;
                        self.skip_ws();
                        let v = match self.peek() {
                            Some('\'' | '"') => self.quoted()?,
                            _ => self.ident()?,
                        };
                        self.skip_ws();
                        Some(v)
                    } else {
                        None
                    };
                    self.expect(']')?;
                    compound.attributes.push(AttrMatch { name, value });
                }
                Some(':') => {
                    self.pos += 1;
                    let pseudo = self.ident()?;
                    self.expect('(')?;
                    self.skip_ws();
                    match pseudo.as_str() {
                        "nth-of-type" => {
                            let digits = self.ident()?;
                            let n = digits
                                .parse::<usize>()
                                .ok()
                                .filter(|n| *n > 0)
                                .ok_or_else(|| self.error("expected positive index"))?;
                            compound.nth_of_type = Some(n);
                        }
                        "has" => {
                            self.expect('+')?;
                            self.skip_ws();
                            compound.followed_by = Some(Box::new(self.compound()?));
                        }
                        other => {
                            return Err(self.error(&format!("unsupported pseudo-class ':{other}'")))
                        }
                    }
                    self.skip_ws();
                    self.expect(')')?;
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }
}

// ============================================================================
// XPath grammar
// ============================================================================

/// Predicate inside an XPath step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPathPredicate {
    /// `@name='value'`
    AttrEquals {
        /// Attribute name
        name: String,
        /// Required value
        value: String,
    },
    /// `normalize-space(.)='text'`
    TextEquals(String),
    /// `contains(normalize-space(.), 'text')`
    TextContains(String),
    /// `[n]`, 1-based position among the step's matches under one context node
    Position(usize),
}

/// One `//tag[...]` step (descendant-or-self axis)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathStep {
    /// Tag name, `None` for `*`
    pub tag: Option<String>,
    /// Predicate groups; predicates joined by `and` share a group
    pub predicates: Vec<Vec<XPathPredicate>>,
}

/// A restricted XPath query: descendant steps with an optional global index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathQuery {
    /// Steps, each on the descendant axis of the previous one
    pub steps: Vec<XPathStep>,
    /// `(…)[n]`, 1-based index into the whole result set
    pub index: Option<usize>,
}

impl XPathQuery {
    /// Parse an XPath expression in the supported grammar
    pub fn parse(input: &str) -> RemendarResult<Self> {
        let mut parser = XPathParser::new(input);
        parser.skip_ws();
        let query = if parser.peek() == Some('(') {
            parser.bump();
            let steps = parser.steps()?;
            parser.expect(')')?;
            parser.expect('[')?;
            let n = parser.number()?;
            parser.expect(']')?;
            Self {
                steps,
                index: Some(n),
            }
        } else {
            Self {
                steps: parser.steps()?,
                index: None,
            }
        };
        parser.skip_ws();
        if parser.peek().is_some() {
            return Err(parser.error("trailing input"));
        }
        Ok(query)
    }
}

impl fmt::Display for XPathPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttrEquals { name, value } => write!(f, "@{name}={}", xpath_literal(value)),
            Self::TextEquals(t) => write!(f, "normalize-space(.)={}", xpath_literal(t)),
            Self::TextContains(t) => {
                write!(f, "contains(normalize-space(.), {})", xpath_literal(t))
            }
            Self::Position(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for XPathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}", self.tag.as_deref().unwrap_or("*"))?;
        for group in &self.predicates {
            let parts: Vec<String> = group.iter().map(ToString::to_string).collect();
            write!(f, "[{}]", parts.join(" and "))?;
        }
        Ok(())
    }
}

impl fmt::Display for XPathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: String = self.steps.iter().map(ToString::to_string).collect();
        match self.index {
            Some(n) => write!(f, "({body})[{n}]"),
            None => f.write_str(&body),
        }
    }
}

struct XPathParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> XPathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn rest_starts_with(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest_starts_with(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> RemendarError {
        RemendarError::parse(format!(
            "{what} at offset {} in xpath '{}'",
            self.pos, self.input
        ))
    }

    fn expect(&mut self, c: char) -> RemendarResult<()> {
        self.skip_ws();
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn name(&mut self) -> RemendarResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> RemendarResult<usize> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| self.error("expected positive index"))
    }

    fn literal(&mut self) -> RemendarResult<String> {
        self.skip_ws();
        if self.eat("concat(") {
            let mut out = String::new();
            loop {
                out.push_str(&self.literal()?);
                self.skip_ws();
                match self.bump() {
                    Some(',') => continue,
                    Some(')') => return Ok(out),
                    _ => return Err(self.error("malformed concat()")),
                }
            }
        }
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string literal")),
        };
        let start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        let value: String = self.chars[start..self.pos].iter().collect();
        if self.bump() != Some(quote) {
            return Err(self.error("unterminated string literal"));
        }
        Ok(value)
    }

    fn steps(&mut self) -> RemendarResult<Vec<XPathStep>> {
        let mut steps = Vec::new();
        loop {
            self.skip_ws();
            if !self.eat("//") {
                break;
            }
            let tag = if self.eat("*") {
                None
            } else {
                Some(self.name()?.to_lowercase())
            };
            let mut predicates = Vec::new();
            while self.peek() == Some('[') {
                self.bump();
                predicates.push(self.predicate_group()?);
                self.expect(']')?;
            }
            steps.push(XPathStep { tag, predicates });
        }
        if steps.is_empty() {
            return Err(self.error("expected '//'"));
        }
        Ok(steps)
    }

    fn predicate_group(&mut self) -> RemendarResult<Vec<XPathPredicate>> {
        let mut group = vec![self.predicate()?];
        loop {
            self.skip_ws();
            if self.eat("and ") {
                group.push(self.predicate()?);
            } else {
                return Ok(group);
            }
        }
    }

    fn predicate(&mut self) -> RemendarResult<XPathPredicate> {
        self.skip_ws();
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Ok(XPathPredicate::Position(self.number()?));
        }
        if self.eat("@") {
            let name = self.name()?;
            self.expect('=')?;
            let value = self.literal()?;
            return Ok(XPathPredicate::AttrEquals { name, value });
        }
        if self.eat("normalize-space(.)") {
            self.expect('=')?;
            return Ok(XPathPredicate::TextEquals(self.literal()?));
        }
        if self.eat("contains(normalize-space(.)") {
            self.expect(',')?;
            let text = self.literal()?;
            self.expect(')')?;
            return Ok(XPathPredicate::TextContains(text));
        }
        Err(self.error("unsupported predicate"))
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert a single compound CSS selector to XPath.
///
/// Returns `None` for selectors outside the convertible grammar
/// (combinators, `:has`, presence-only attributes).
///
/// The result is a rewrite, not a match-set equivalent:
/// `li:nth-of-type(2)` counts per parent while `(//li)[2]` counts across
/// the document, and `.c` matches any element whose class list contains
/// `c` while `@class='c'` needs the whole attribute to equal `c`.
#[must_use]
pub fn css_to_xpath(css: &str) -> Option<String> {
    let path = CssPath::parse(css.trim()).ok()?;
    if !path.tail.is_empty() {
        return None;
    }
    let compound = path.head;
    if compound.followed_by.is_some() {
        return None;
    }
    let tag = compound.tag.clone().unwrap_or_else(|| "*".to_string());

    if let Some(n) = compound.nth_of_type {
        if compound.id.is_some() || !compound.classes.is_empty() || !compound.attributes.is_empty()
        {
            return None;
        }
        return Some(format!("(//{tag})[{n}]"));
    }

    let mut conditions = Vec::new();
    if let Some(id) = &compound.id {
        conditions.push(format!("@id={}", xpath_literal(id)));
    }
    if !compound.classes.is_empty() {
        conditions.push(format!("@class={}", xpath_literal(&compound.classes.join(" "))));
    }
    for attr in &compound.attributes {
        conditions.push(format!("@{}={}", attr.name, xpath_literal(attr.value.as_ref()?)));
    }
    if conditions.is_empty() {
        Some(format!("//{tag}"))
    } else {
        Some(format!("//{tag}[{}]", conditions.join(" and ")))
    }
}

fn indexed_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(//([A-Za-z][A-Za-z0-9-]*|\*)\)\[(\d+)\]$").unwrap_or_else(|_| unreachable!())
    })
}

fn single_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^//([A-Za-z][A-Za-z0-9-]*|\*)\[@([A-Za-z_][A-Za-z0-9_:-]*)='([^']*)'\]$")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Convert a simple XPath back to CSS.
///
/// Supported: `(//tag)[n]`, `//*`, `//tag[@attr='value']` (single-quoted,
/// single attribute). Anything else yields `None`, including a bare `//tag`
/// whose CSS form would silently widen the match set of an indexed query.
#[must_use]
pub fn xpath_to_css(xpath: &str) -> Option<String> {
    let xpath = xpath.trim();
    if xpath == "//*" {
        return Some("*".to_string());
    }
    if let Some(caps) = indexed_tag_re().captures(xpath) {
        let n: usize = caps[2].parse().ok().filter(|n| *n > 0)?;
        return Some(format!("{}:nth-of-type({n})", &caps[1]));
    }
    let caps = single_attr_re().captures(xpath)?;
    let (tag, attr, value) = (&caps[1], &caps[2], &caps[3]);
    if tag == "*" {
        if attr == "id" && is_css_identifier(value) {
            return Some(format!("#{value}"));
        }
        if attr == "class" && value.split(' ').all(is_css_identifier) {
            return Some(format!(".{}", value.split(' ').collect::<Vec<_>>().join(".")));
        }
    }
    Some(format!("{tag}[{attr}={}]", css_string(value)))
}
