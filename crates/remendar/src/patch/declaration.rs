//! Locator field declarations in page-object sources:
//! `self.<field> = <Ctor>(self, "<selector>")`.

use regex::Regex;

use super::edit::indentation;
use crate::pyexpr::{parse_expression, split_comment, Argument, Expr};
use crate::result::{RemendarError, RemendarResult};

fn declaration_re(field: &str, constructor: &str) -> RemendarResult<Regex> {
    Regex::new(&format!(
        r"^\s*self\.{}\s*(?::[^=]*)?=\s*{}\s*\(",
        regex::escape(field),
        regex::escape(constructor)
    ))
    .map_err(|e| RemendarError::parse(e.to_string()))
}

/// 0-based line declaring `self.<field>` with `constructor`
pub fn find_locator_declaration(
    lines: &[&str],
    field: &str,
    constructor: &str,
) -> RemendarResult<Option<usize>> {
    let re = declaration_re(field, constructor)?;
    Ok(lines.iter().position(|l| re.is_match(l)))
}

fn split_declaration(line: &str) -> Option<(&str, Expr, &str)> {
    let (code, _) = split_comment(line);
    let body = code.trim_end();
    let trailing = &line[body.len()..];
    let eq = body.find('=')?;
    let lhs = body[..eq].trim();
    let call = parse_expression(body[eq + 1..].trim()).ok()?;
    matches!(call, Expr::Call { .. }).then_some((lhs, call, trailing))
}

fn selector_slot(args: &mut [Argument]) -> Option<&mut Expr> {
    args.iter_mut().find_map(|a| match a {
        Argument::Positional(e @ Expr::Str(_)) => Some(e),
        _ => None,
    })
}

/// Selector literal of a declaration line
#[must_use]
pub fn declared_selector(line: &str) -> Option<String> {
    let (_, mut call, _) = split_declaration(line)?;
    let Expr::Call { args, .. } = &mut call else {
        return None;
    };
    selector_slot(args).and_then(|e| e.as_str().map(str::to_string))
}

/// Rewrite the selector literal of a declaration line; other arguments are kept
pub fn replace_locator_selector(line: &str, selector: &str) -> RemendarResult<String> {
    let (lhs, mut call, trailing) = split_declaration(line)
        .ok_or_else(|| RemendarError::parse(format!("not a locator declaration: {}", line.trim())))?;
    let Expr::Call { args, .. } = &mut call else {
        return Err(RemendarError::parse("not a call"));
    };
    let slot = selector_slot(args).ok_or_else(|| {
        RemendarError::parse(format!("declaration has no selector literal: {}", line.trim()))
    })?;
    *slot = Expr::string(selector);
    Ok(format!("{}{lhs} = {call}{trailing}", indentation(line)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PAGE: [&str; 5] = [
        "class LoginPage:",
        "    def __init__(self, page):",
        "        self.page = page",
        "        self.username_input = SmartLocator(self, \"#user-name\")",
        "        self.login_button = SmartLocator(self, '#login', timeout=500)  # submit",
    ];

    #[test]
    fn test_find_declaration() {
        assert_eq!(
            find_locator_declaration(&PAGE, "username_input", "SmartLocator").unwrap(),
            Some(3)
        );
        assert_eq!(find_locator_declaration(&PAGE, "username", "SmartLocator").unwrap(), None);
        assert_eq!(find_locator_declaration(&PAGE, "page", "SmartLocator").unwrap(), None);
        assert_eq!(declared_selector(PAGE[3]).unwrap(), "#user-name");
    }

    #[test]
    fn test_replace_selector_keeps_shape() {
        assert_eq!(
            replace_locator_selector(PAGE[3], "input[data-test='username']").unwrap(),
            "        self.username_input = SmartLocator(self, \"input[data-test='username']\")"
        );
        assert_eq!(
            replace_locator_selector(PAGE[4], "#login-button").unwrap(),
            "        self.login_button = SmartLocator(self, '#login-button', timeout=500)  # submit"
        );
    }

    #[test]
    fn test_ownerless_constructor() {
        let line = "    self.cart = Loc(\"//a[@class='cart']\")";
        assert_eq!(find_locator_declaration(&[line], "cart", "Loc").unwrap(), Some(0));
        assert_eq!(
            replace_locator_selector(line, "#cart").unwrap(),
            "    self.cart = Loc('#cart')"
        );
        assert!(replace_locator_selector("    self.n = Loc(self)", "#x").is_err());
    }
}
