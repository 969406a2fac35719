//! One-line expressions of the hosted test language.
//!
//! Patching needs exactly three things from test sources: parse one line as
//! an expression, swap one argument or tuple element, and render the line
//! back. This module covers the expression subset that appears on such
//! lines (calls, attribute chains, literals, containers, operators) and
//! renders it canonically: `, ` separators, spaced binary operators, and
//! strings in repr form (single quotes unless the value contains a single
//! quote and no double quote). Comparisons are structural, so `"a"` and
//! `'a'` are the same literal.

use std::fmt;

use crate::result::{RemendarError, RemendarResult};

/// Binding strength used when rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Tuple,
    Test,
    Or,
    And,
    Not,
    Cmp,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Atom,
}

impl Prec {
    const fn next(self) -> Self {
        match self {
            Self::Tuple => Self::Test,
            Self::Test => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Not,
            Self::Not => Self::Cmp,
            Self::Cmp => Self::BitOr,
            Self::BitOr => Self::BitXor,
            Self::BitXor => Self::BitAnd,
            Self::BitAnd => Self::Shift,
            Self::Shift => Self::Arith,
            Self::Arith => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Power,
            Self::Power | Self::Atom => Self::Atom,
        }
    }
}

/// Singleton constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// `None`
    None,
    /// `True`
    True,
    /// `False`
    False,
}

/// Call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// `value`
    Positional(Expr),
    /// `*value`
    Star(Expr),
    /// `name=value`
    Keyword(String, Expr),
    /// `**value`
    DoubleStar(Expr),
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Identifier
    Name(String),
    /// Numeric literal, kept as written
    Num(String),
    /// String literal (decoded value)
    Str(String),
    /// f-string or bytes literal, kept as written
    Opaque(String),
    /// `None`, `True`, `False`
    Constant(Constant),
    /// `value.attr`
    Attribute {
        /// Object
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },
    /// `func(args)`
    Call {
        /// Callee
        func: Box<Expr>,
        /// Arguments in source order
        args: Vec<Argument>,
    },
    /// `value[index]`
    Subscript {
        /// Object
        value: Box<Expr>,
        /// Index expression
        index: Box<Expr>,
    },
    /// `lower:upper:step` inside a subscript
    Slice(Option<Box<Expr>>, Option<Box<Expr>>, Option<Box<Expr>>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `{a, b}`
    Set(Vec<Expr>),
    /// `{k: v}`
    Dict(Vec<(Expr, Expr)>),
    /// `-x`, `+x`, `~x`
    Unary {
        /// Operator
        op: &'static str,
        /// Operand
        operand: Box<Expr>,
    },
    /// `not x`
    Not(Box<Expr>),
    /// `a op b`
    BinOp {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: &'static str,
        /// Right operand
        right: Box<Expr>,
    },
    /// `a and b and c`, `a or b`
    BoolOp {
        /// `and` or `or`
        op: &'static str,
        /// Operands
        values: Vec<Expr>,
    },
    /// `a < b <= c`
    Compare {
        /// First operand
        left: Box<Expr>,
        /// Operator and operand pairs
        rest: Vec<(&'static str, Expr)>,
    },
}

impl Expr {
    /// String literal
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Positional arguments of a call, `None` for other expressions
    #[must_use]
    pub fn positional_args(&self) -> Option<Vec<&Expr>> {
        match self {
            Self::Call { args, .. } => Some(
                args.iter()
                    .filter_map(|a| match a {
                        Argument::Positional(e) | Argument::Star(e) => Some(e),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Replace the `index`-th positional argument of a call
    pub fn replace_positional(&mut self, index: usize, value: Self) -> RemendarResult<()> {
        let Self::Call { args, .. } = self else {
            return Err(RemendarError::parse("expression is not a call"));
        };
        let slot = args
            .iter_mut()
            .filter(|a| matches!(a, Argument::Positional(_) | Argument::Star(_)))
            .nth(index)
            .ok_or_else(|| RemendarError::parse(format!("argument index {index} out of range")))?;
        *slot = Argument::Positional(value);
        Ok(())
    }

    /// Identifier name, if this is a bare name
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Decoded value, if this is a string literal
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn prec(&self) -> Prec {
        match self {
            Self::BoolOp { op: "or", .. } => Prec::Or,
            Self::BoolOp { .. } => Prec::And,
            Self::Not(_) => Prec::Not,
            Self::Compare { .. } => Prec::Cmp,
            Self::BinOp { op, .. } => binop_prec(op),
            Self::Unary { .. } => Prec::Factor,
            _ => Prec::Atom,
        }
    }

    fn render(&self, out: &mut String, min: Prec) {
        let prec = self.prec();
        let wrap = prec < min;
        if wrap {
            out.push('(');
        }
        match self {
            Self::Name(n) | Self::Num(n) | Self::Opaque(n) => out.push_str(n),
            Self::Str(s) => out.push_str(&quote_str(s)),
            Self::Constant(c) => out.push_str(match c {
                Constant::None => "None",
                Constant::True => "True",
                Constant::False => "False",
            }),
            Self::Attribute { value, attr } => {
                value.render(out, Prec::Atom);
                out.push('.');
                out.push_str(attr);
            }
            Self::Call { func, args } => {
                func.render(out, Prec::Atom);
                out.push('(');
                // Keyword arguments follow positional ones when rendered
                let ordered = args
                    .iter()
                    .filter(|a| matches!(a, Argument::Positional(_) | Argument::Star(_)))
                    .chain(
                        args.iter()
                            .filter(|a| matches!(a, Argument::Keyword(..) | Argument::DoubleStar(_))),
                    );
                for (i, arg) in ordered.enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match arg {
                        Argument::Positional(e) => e.render(out, Prec::Test),
                        Argument::Star(e) => {
                            out.push('*');
                            e.render(out, Prec::BitOr);
                        }
                        Argument::Keyword(name, e) => {
                            out.push_str(name);
                            out.push('=');
                            e.render(out, Prec::Test);
                        }
                        Argument::DoubleStar(e) => {
                            out.push_str("**");
                            e.render(out, Prec::BitOr);
                        }
                    }
                }
                out.push(')');
            }
            Self::Subscript { value, index } => {
                value.render(out, Prec::Atom);
                out.push('[');
                match index.as_ref() {
                    Self::Tuple(items) if !items.is_empty() => render_items(out, items, Prec::Test),
                    other => other.render(out, Prec::Tuple),
                }
                out.push(']');
            }
            Self::Slice(lower, upper, step) => {
                if let Some(e) = lower {
                    e.render(out, Prec::Test);
                }
                out.push(':');
                if let Some(e) = upper {
                    e.render(out, Prec::Test);
                }
                if let Some(e) = step {
                    out.push(':');
                    e.render(out, Prec::Test);
                }
            }
            Self::Tuple(items) => {
                out.push('(');
                render_items(out, items, Prec::Test);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Self::List(items) => {
                out.push('[');
                render_items(out, items, Prec::Test);
                out.push(']');
            }
            Self::Set(items) => {
                out.push('{');
                render_items(out, items, Prec::Test);
                out.push('}');
            }
            Self::Dict(entries) => {
                out.push('{');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.render(out, Prec::Test);
                    out.push_str(": ");
                    v.render(out, Prec::Test);
                }
                out.push('}');
            }
            Self::Unary { op, operand } => {
                out.push_str(op);
                operand.render(out, Prec::Factor);
            }
            Self::Not(operand) => {
                out.push_str("not ");
                operand.render(out, Prec::Not);
            }
            Self::BinOp { left, op, right } => {
                let (lmin, rmin) = if *op == "**" {
                    (prec.next(), prec)
                } else {
                    (prec, prec.next())
                };
                left.render(out, lmin);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                right.render(out, rmin);
            }
            Self::BoolOp { op, values } => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(op);
                        out.push(' ');
                    }
                    v.render(out, prec.next());
                }
            }
            Self::Compare { left, rest } => {
                left.render(out, Prec::BitOr);
                for (op, e) in rest {
                    out.push(' ');
                    out.push_str(op);
                    out.push(' ');
                    e.render(out, Prec::BitOr);
                }
            }
        }
        if wrap {
            out.push(')');
        }
    }
}

fn render_items(out: &mut String, items: &[Expr], min: Prec) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.render(out, min);
    }
}

fn binop_prec(op: &str) -> Prec {
    match op {
        "|" => Prec::BitOr,
        "^" => Prec::BitXor,
        "&" => Prec::BitAnd,
        "<<" | ">>" => Prec::Shift,
        "+" | "-" => Prec::Arith,
        "**" => Prec::Power,
        _ => Prec::Term,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, Prec::Tuple);
        f.write_str(&out)
    }
}

/// Render a string value as a repr literal
#[must_use]
pub fn quote_str(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Parse a string holding exactly one expression (a bare comma list is a tuple)
pub fn parse_expression(source: &str) -> RemendarResult<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr_list()?;
    match parser.peek() {
        Tok::End => Ok(expr),
        other => Err(RemendarError::parse(format!(
            "unexpected {other:?} after expression in '{}'",
            source.trim()
        ))),
    }
}

/// Split a trailing `# comment` off a line, ignoring `#` inside strings
#[must_use]
pub fn split_comment(line: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '#' => return (&line[..i], &line[i..]),
                _ => {}
            },
        }
    }
    (line, "")
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Num(String),
    Str(String),
    Opaque(String),
    Op(&'static str),
    End,
}

const OPERATORS: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "->", "(", ")", "[", "]", "{", "}", ",", ":",
    ".", ";", "@", "=", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "~",
];

fn tokenize(source: &str) -> RemendarResult<Vec<Tok>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == '\\' {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if i < chars.len() && (chars[i] == '\'' || chars[i] == '"') && is_string_prefix(&word) {
                let (tok, end) = string_literal(&chars, i, &word, source)?;
                tokens.push(tok);
                i = end;
            } else {
                tokens.push(Tok::Name(word));
            }
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() {
                let d = chars[i];
                let exp_sign = (d == '+' || d == '-')
                    && matches!(chars[i - 1], 'e' | 'E')
                    && !chars[start..i].iter().any(|x| matches!(x, 'x' | 'X'));
                if d.is_ascii_alphanumeric() || d == '.' || d == '_' || exp_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Tok::Num(chars[start..i].iter().collect()));
            continue;
        }
        if c == '\'' || c == '"' {
            let (tok, end) = string_literal(&chars, i, "", source)?;
            tokens.push(tok);
            i = end;
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = OPERATORS
            .iter()
            .find(|op| rest.starts_with(**op))
            .ok_or_else(|| RemendarError::parse(format!("unexpected '{c}' in '{}'", source.trim())))?;
        tokens.push(Tok::Op(*op));
        i += op.chars().count();
    }
    // Adjacent string literals concatenate
    let mut merged: Vec<Tok> = Vec::with_capacity(tokens.len() + 1);
    for tok in tokens {
        if let (Some(Tok::Str(prev)), Tok::Str(next)) = (merged.last_mut(), &tok) {
            prev.push_str(next);
            continue;
        }
        merged.push(tok);
    }
    merged.push(Tok::End);
    Ok(merged)
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

fn string_literal(
    chars: &[char],
    start: usize,
    prefix: &str,
    source: &str,
) -> RemendarResult<(Tok, usize)> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let open = if triple { 3 } else { 1 };
    let raw = prefix.to_ascii_lowercase().contains('r');
    let opaque = prefix.to_ascii_lowercase().contains(['f', 'b']);
    let mut i = start + open;
    let mut value = String::new();
    loop {
        let Some(&c) = chars.get(i) else {
            return Err(RemendarError::parse(format!(
                "unterminated string in '{}'",
                source.trim()
            )));
        };
        if c == quote {
            if !triple {
                i += 1;
                break;
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                i += 3;
                break;
            }
        }
        if c == '\\' {
            let next = chars.get(i + 1).copied();
            if raw {
                value.push('\\');
                if let Some(n) = next {
                    value.push(n);
                }
                i += 2;
                continue;
            }
            let (decoded, used) = decode_escape(&chars[i + 1..]);
            value.push_str(&decoded);
            i += 1 + used;
            continue;
        }
        value.push(c);
        i += 1;
    }
    let tok = if opaque {
        let start_of_prefix = start - prefix.chars().count();
        Tok::Opaque(chars[start_of_prefix..i].iter().collect())
    } else {
        Tok::Str(value)
    };
    Ok((tok, i))
}

fn decode_escape(rest: &[char]) -> (String, usize) {
    let Some(&c) = rest.first() else {
        return ("\\".to_string(), 0);
    };
    let simple = match c {
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '0' => Some('\0'),
        'a' => Some('\u{7}'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        '\n' => return (String::new(), 1),
        _ => None,
    };
    if let Some(s) = simple {
        return (s.to_string(), 1);
    }
    let width = match c {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        _ => return (format!("\\{c}"), 1),
    };
    let hex: String = rest.iter().skip(1).take(width).collect();
    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
        Some(decoded) if hex.len() == width => (decoded.to_string(), 1 + width),
        _ => (format!("\\{c}"), 1),
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

const COMPARE_OPS: &[&str] = &["==", "!=", "<", ">", "<=", ">="];

static END: Tok = Tok::End;

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).unwrap_or(&END)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens.get(self.pos + offset).unwrap_or(&END)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == word)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> RemendarResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(RemendarError::parse(format!(
                "expected '{op}', found {:?}",
                self.peek()
            )))
        }
    }

    fn at_closer(&self) -> bool {
        matches!(self.peek(), Tok::End | Tok::Op(")" | "]" | "}"))
    }

    fn expr_list(&mut self) -> RemendarResult<Expr> {
        let first = self.test()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_closer() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn test(&mut self) -> RemendarResult<Expr> {
        if self.is_word("lambda") {
            return Err(RemendarError::parse("lambda expressions are not supported"));
        }
        let expr = self.or_test()?;
        if self.is_word("if") || self.is_word("for") {
            return Err(RemendarError::parse(
                "conditional expressions and comprehensions are not supported",
            ));
        }
        Ok(expr)
    }

    fn bool_chain(
        &mut self,
        word: &'static str,
        next: fn(&mut Self) -> RemendarResult<Expr>,
    ) -> RemendarResult<Expr> {
        let first = next(self)?;
        if !self.is_word(word) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.is_word(word) {
            self.pos += 1;
            values.push(next(self)?);
        }
        Ok(Expr::BoolOp { op: word, values })
    }

    fn or_test(&mut self) -> RemendarResult<Expr> {
        self.bool_chain("or", Self::and_test)
    }

    fn and_test(&mut self) -> RemendarResult<Expr> {
        self.bool_chain("and", Self::not_test)
    }

    fn not_test(&mut self) -> RemendarResult<Expr> {
        if self.is_word("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not_test()?)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<&'static str> {
        if let Tok::Op(op) = self.peek() {
            if let Some(found) = COMPARE_OPS.iter().find(|c| *c == op) {
                self.pos += 1;
                return Some(*found);
            }
        }
        if self.is_word("in") {
            self.pos += 1;
            return Some("in");
        }
        if self.is_word("not") && matches!(self.peek_at(1), Tok::Name(n) if n == "in") {
            self.pos += 2;
            return Some("not in");
        }
        if self.is_word("is") {
            self.pos += 1;
            if self.is_word("not") {
                self.pos += 1;
                return Some("is not");
            }
            return Some("is");
        }
        None
    }

    fn comparison(&mut self) -> RemendarResult<Expr> {
        let left = self.binary(Prec::BitOr)?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.binary(Prec::BitOr)?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn binary(&mut self, level: Prec) -> RemendarResult<Expr> {
        if level >= Prec::Factor {
            return self.factor();
        }
        let ops: &[&'static str] = match level {
            Prec::BitOr => &["|"],
            Prec::BitXor => &["^"],
            Prec::BitAnd => &["&"],
            Prec::Shift => &["<<", ">>"],
            Prec::Arith => &["+", "-"],
            _ => &["*", "/", "//", "%", "@"],
        };
        let mut left = self.binary(level.next())?;
        loop {
            let Tok::Op(op) = self.peek() else { break };
            let Some(found) = ops.iter().find(|o| *o == op) else {
                break;
            };
            self.pos += 1;
            let right = self.binary(level.next())?;
            left = Expr::BinOp {
                left: Box::new(left),
                op: *found,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> RemendarResult<Expr> {
        for op in ["-", "+", "~"] {
            if self.eat_op(op) {
                let operand = self.factor()?;
                let op: &'static str = match op {
                    "-" => "-",
                    "+" => "+",
                    _ => "~",
                };
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
        }
        let base = self.primary()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(Expr::BinOp {
                left: Box::new(base),
                op: "**",
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> RemendarResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op(".") {
                match self.advance() {
                    Tok::Name(attr) => {
                        expr = Expr::Attribute {
                            value: Box::new(expr),
                            attr,
                        }
                    }
                    other => {
                        return Err(RemendarError::parse(format!(
                            "expected attribute name, found {other:?}"
                        )))
                    }
                }
            } else if self.eat_op("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_op("[") {
                let index = self.subscript()?;
                self.expect_op("]")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> RemendarResult<Vec<Argument>> {
        let mut args = Vec::new();
        while !self.eat_op(")") {
            let arg = if self.eat_op("**") {
                Argument::DoubleStar(self.test()?)
            } else if self.eat_op("*") {
                Argument::Star(self.test()?)
            } else if matches!(self.peek(), Tok::Name(_)) && matches!(self.peek_at(1), Tok::Op("=")) {
                let Tok::Name(name) = self.advance() else {
                    unreachable!()
                };
                self.pos += 1;
                Argument::Keyword(name, self.test()?)
            } else {
                Argument::Positional(self.test()?)
            };
            args.push(arg);
            if !self.eat_op(",") {
                self.expect_op(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn slice_part(&mut self) -> RemendarResult<Option<Box<Expr>>> {
        if self.is_op(":") || self.is_op("]") || self.is_op(",") {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.test()?)))
        }
    }

    fn subscript(&mut self) -> RemendarResult<Expr> {
        let lower = self.slice_part()?;
        if !self.eat_op(":") {
            let first = lower.map(|b| *b).ok_or_else(|| RemendarError::parse("empty subscript"))?;
            if !self.is_op(",") {
                return Ok(first);
            }
            let mut items = vec![first];
            while self.eat_op(",") {
                if self.is_op("]") {
                    break;
                }
                items.push(self.test()?);
            }
            return Ok(Expr::Tuple(items));
        }
        let upper = self.slice_part()?;
        let step = if self.eat_op(":") { self.slice_part()? } else { None };
        Ok(Expr::Slice(lower, upper, step))
    }

    fn sequence(&mut self, closer: &str) -> RemendarResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat_op(closer) {
            items.push(self.test()?);
            if !self.eat_op(",") {
                self.expect_op(closer)?;
                break;
            }
        }
        Ok(items)
    }

    fn atom(&mut self) -> RemendarResult<Expr> {
        match self.advance() {
            Tok::Name(name) => Ok(match name.as_str() {
                "None" => Expr::Constant(Constant::None),
                "True" => Expr::Constant(Constant::True),
                "False" => Expr::Constant(Constant::False),
                "and" | "or" | "not" | "in" | "is" | "if" | "else" | "for" | "lambda" => {
                    return Err(RemendarError::parse(format!("unexpected keyword '{name}'")))
                }
                _ => Expr::Name(name),
            }),
            Tok::Num(n) => Ok(Expr::Num(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Opaque(s) => Ok(Expr::Opaque(s)),
            Tok::Op("(") => {
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.expr_list()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => Ok(Expr::List(self.sequence("]")?)),
            Tok::Op("{") => {
                if self.eat_op("}") {
                    return Ok(Expr::Dict(Vec::new()));
                }
                let first = self.test()?;
                if self.eat_op(":") {
                    let mut entries = vec![(first, self.test()?)];
                    while self.eat_op(",") {
                        if self.is_op("}") {
                            break;
                        }
                        let key = self.test()?;
                        self.expect_op(":")?;
                        entries.push((key, self.test()?));
                    }
                    self.expect_op("}")?;
                    return Ok(Expr::Dict(entries));
                }
                let mut items = vec![first];
                if self.eat_op(",") {
                    items.extend(self.sequence("}")?);
                } else {
                    self.expect_op("}")?;
                }
                Ok(Expr::Set(items))
            }
            other => Err(RemendarError::parse(format!("unexpected {other:?}"))),
        }
    }
}
