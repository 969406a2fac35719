//! Line-level edits of test and page-object sources.
//!
//! Every function here works on one line (or one logical statement) and
//! returns the replacement text; nothing touches the file system. Values are
//! passed as expression source (`"'admin'"`, `"None"`, `"3"`) and compared
//! structurally, so quoting style in the original line does not matter.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::pyexpr::{parse_expression, split_comment, Argument, Expr};
use crate::result::{RemendarError, RemendarResult};

/// How many physical lines a multi-line call may span
pub const MAX_CALL_LINES: usize = 50;

/// Leading whitespace of `line`
#[must_use]
pub fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Replace the 1-based line `lineno`, keeping every line ending as it was
pub fn replace_line_in_text(text: &str, lineno: usize, new_line: &str) -> RemendarResult<String> {
    let total = text.split_inclusive('\n').count();
    if lineno == 0 || lineno > total {
        return Err(RemendarError::parse(format!(
            "line {lineno} out of range (1..{total})"
        )));
    }
    let mut out = String::with_capacity(text.len() + new_line.len());
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i + 1 == lineno {
            let content = line.trim_end_matches(['\n', '\r']);
            out.push_str(new_line);
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }
    Ok(out)
}

fn statement_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:return|await|assert|yield)\s+|[A-Za-z_][\w.]*(?:\s*\[[^\]]*\])?\s*(?::\s*[^=]+)?=\s*(?:await\s+)?)")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Split a statement into a non-expression prefix (`x = `, `await `, ...) and its expression
#[must_use]
pub fn split_statement(code: &str) -> (&str, &str) {
    match statement_prefix_re().find(code) {
        Some(m) if !code[m.end()..].starts_with('=') => code.split_at(m.end()),
        _ => ("", code),
    }
}

/// Parsed one-line statement that ends in a call
struct CallLine<'a> {
    indent: &'a str,
    prefix: &'a str,
    call: Expr,
    trailing: &'a str,
}

impl<'a> CallLine<'a> {
    fn parse(line: &'a str) -> RemendarResult<Self> {
        let indent = indentation(line);
        let rest = &line[indent.len()..];
        let (code, _) = split_comment(rest);
        let body = code.trim_end();
        // trailing whitespace and comment
        let trailing = &rest[body.len()..];
        let (prefix, expr) = split_statement(body);
        let call = parse_expression(expr)?;
        if !matches!(call, Expr::Call { .. }) {
            return Err(RemendarError::parse(format!(
                "line must be a function call expression: {}",
                line.trim()
            )));
        }
        Ok(Self {
            indent,
            prefix,
            call,
            trailing,
        })
    }

    fn argument(&self, index: usize) -> RemendarResult<&Expr> {
        let args = self.call.positional_args().unwrap_or_default();
        args.get(index).copied().ok_or_else(|| {
            RemendarError::parse(format!(
                "parameter index {index} out of range ({} arguments)",
                args.len()
            ))
        })
    }

    fn render(&self) -> String {
        format!("{}{}{}{}", self.indent, self.prefix, self.call, self.trailing)
    }
}

/// Positional argument `index` of the call on `line`
pub fn call_argument(line: &str, index: usize) -> RemendarResult<Expr> {
    CallLine::parse(line)?.argument(index).cloned()
}

/// Index → argument text for the call on `code`; names as identifiers, literals re-rendered
#[must_use]
pub fn function_parameters_index_map(code: &str) -> Option<BTreeMap<usize, String>> {
    let line = CallLine::parse(code).ok()?;
    let args = line.call.positional_args()?;
    Some(
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| (i, arg.to_string()))
            .collect(),
    )
}

/// Replace argument `index` of the call on `line` when it currently equals `old_value`.
///
/// `Ok(None)` means the argument holds something else. Indentation, any
/// statement prefix, trailing whitespace and a trailing comment are kept.
pub fn update_value_in_function_call(
    line: &str,
    index: usize,
    old_value: &str,
    new_value: &str,
) -> RemendarResult<Option<String>> {
    let mut parsed = CallLine::parse(line)?;
    let expected = parse_expression(old_value)?;
    if *parsed.argument(index)? != expected {
        return Ok(None);
    }
    parsed.call.replace_positional(index, parse_expression(new_value)?)?;
    Ok(Some(parsed.render()))
}

/// Replace the right-hand side of `var_name = ...` on `line` (name compared case-insensitively)
#[must_use]
pub fn replace_variable_assignment(line: &str, var_name: &str, new_value: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?i)^\s*({})\s*(?::[^=]*)?=[^=]", regex::escape(var_name))).ok()?;
    if !pattern.is_match(line) {
        return None;
    }
    let indent = indentation(line);
    let (code, comment) = split_comment(line);
    let (lhs, _) = code.split_once('=')?;
    let comment = if comment.is_empty() {
        String::new()
    } else {
        format!("  {comment}")
    };
    Some(format!("{indent}{} = {new_value}{comment}", lhs.trim()))
}

/// Right-hand side of an assignment line, parsed
#[must_use]
pub fn assignment_value(line: &str) -> Option<Expr> {
    let (code, _) = split_comment(line);
    let (_, rhs) = code.split_once('=')?;
    parse_expression(rhs.trim()).ok()
}

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)(?:async\s+)?def\s+\w+\s*\(").unwrap_or_else(|_| unreachable!())
    })
}

/// 0-based index of the enclosing `def` of line `call_idx`
#[must_use]
pub fn enclosing_def(lines: &[&str], call_idx: usize) -> Option<usize> {
    let call_indent = indentation(lines.get(call_idx)?).len();
    (0..call_idx).rev().find(|&i| {
        def_re()
            .captures(lines[i])
            .is_some_and(|c| c.get(1).map_or(0, |m| m.len()) < call_indent)
    })
}

/// Nearest line above `call_idx` assigning `var_name`, within the enclosing function or at module level
#[must_use]
pub fn find_assignment_above(lines: &[&str], call_idx: usize, var_name: &str) -> Option<usize> {
    let def = enclosing_def(lines, call_idx);
    (0..call_idx).rev().find(|&i| {
        let in_body = def.map_or(true, |d| i > d);
        let module_level = indentation(lines[i]).is_empty();
        (in_body || module_level) && replace_variable_assignment(lines[i], var_name, "None").is_some()
    })
}

fn header_names_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"parametrize\(\s*["']([^"']+)["']"#).unwrap_or_else(|_| unreachable!())
    })
}

fn header_sequence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"parametrize\(\s*[\[(]((?:\s*["'][^"']+["']\s*,?)+)\s*[\])]"#)
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Column index of each name in a data-table header line
#[must_use]
pub fn data_provider_names_map(line: &str) -> BTreeMap<String, usize> {
    let names: Vec<String> = if let Some(c) = header_names_re().captures(line) {
        c[1].split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    } else if let Some(c) = header_sequence_re().captures(line) {
        c[1].split(',')
            .map(|n| n.trim().trim_matches(['"', '\'']).trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    names.into_iter().enumerate().map(|(i, n)| (n, i)).collect()
}

/// Replace column `column` of a data-table row (`(a, b),` or `pytest.param(a, b),`).
///
/// `Ok(None)` when the row is not a tuple or the column is out of range.
/// Indentation, the trailing comma and a trailing comment are kept.
pub fn replace_variable_in_data_provider(
    row_line: &str,
    column: usize,
    new_value: &str,
) -> RemendarResult<Option<String>> {
    let indent = indentation(row_line);
    let (code, comment) = split_comment(row_line.trim_start());
    let code = code.trim_end();
    let (body, comma) = match code.strip_suffix(',') {
        Some(body) => (body.trim_end(), ","),
        None => (code, ""),
    };
    let Ok(mut row) = parse_expression(body) else {
        return Ok(None);
    };
    let value = parse_expression(new_value)?;
    let param_call = matches!(&row, Expr::Call { func, .. } if func.to_string().ends_with("param"));
    let replaced = match &mut row {
        Expr::Tuple(items) => match items.get_mut(column) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        call if param_call => call.replace_positional(column, value).is_ok(),
        _ => false,
    };
    if !replaced {
        return Ok(None);
    }
    let comment = if comment.is_empty() {
        String::new()
    } else {
        format!("  {comment}")
    };
    Ok(Some(format!("{indent}{row}{comma}{comment}")))
}

/// Value at `column` of a data-table row
#[must_use]
pub fn data_provider_cell(row_line: &str, column: usize) -> Option<Expr> {
    let (code, _) = split_comment(row_line.trim());
    let body = code.trim_end().trim_end_matches(',');
    match parse_expression(body).ok()? {
        Expr::Tuple(mut items) if column < items.len() => Some(items.swap_remove(column)),
        call @ Expr::Call { .. } => call.positional_args()?.get(column).map(|e| (*e).clone()),
        _ => None,
    }
}

/// Nearest data-table header above `call_idx`
#[must_use]
pub fn find_table_header_above(lines: &[&str], call_idx: usize, marker: &str) -> Option<usize> {
    (0..call_idx).rev().find(|&i| lines[i].trim_start().starts_with(marker))
}

/// Column names of the table whose header starts at `header_idx` (the names may sit on the next line)
#[must_use]
pub fn table_columns(lines: &[&str], header_idx: usize) -> BTreeMap<String, usize> {
    let mut joined = String::new();
    for line in lines.iter().skip(header_idx).take(3) {
        joined.push_str(line.trim());
        let map = data_provider_names_map(&joined);
        if !map.is_empty() {
            return map;
        }
    }
    BTreeMap::new()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableScan {
    Call,
    Names,
    Data,
    Rows,
}

/// Advance the header scan over one line; returns the offset just past the `[` opening the rows
fn rows_open_at(code: &str, scan: &mut TableScan, depth: &mut usize, quote: &mut Option<char>) -> Option<usize> {
    let mut offset = 0;
    if *scan == TableScan::Call {
        offset = code.find('(')? + 1;
        *scan = TableScan::Names;
    }
    for (i, ch) in code[offset..].char_indices() {
        if let Some(q) = *quote {
            if ch == q {
                *quote = None;
            }
            continue;
        }
        match (*scan, ch) {
            (_, '"' | '\'') => *quote = Some(ch),
            (TableScan::Names, '(' | '[' | '{') => *depth += 1,
            (TableScan::Names, ')' | ']' | '}') => *depth = depth.saturating_sub(1),
            (TableScan::Names, ',') if *depth == 0 => *scan = TableScan::Data,
            (TableScan::Data, '[') => return Some(offset + i + 1),
            _ => {}
        }
    }
    None
}

/// 0-based line holding data row `row` of the table starting at `header_idx`.
///
/// The names argument (a string, list or tuple) is skipped; rows start at the
/// `[` after the first top-level comma of the decorator call.
#[must_use]
pub fn table_row_line(lines: &[&str], header_idx: usize, row: usize) -> Option<usize> {
    let mut scan = TableScan::Call;
    let mut depth = 0;
    let mut quote = None;
    let mut seen = 0;
    for (i, line) in lines.iter().enumerate().skip(header_idx) {
        let (code, _) = split_comment(line);
        let code = if scan == TableScan::Rows {
            code.trim()
        } else {
            match rows_open_at(code, &mut scan, &mut depth, &mut quote) {
                Some(pos) => {
                    scan = TableScan::Rows;
                    code[pos..].trim()
                }
                None => continue,
            }
        };
        if code.is_empty() {
            continue;
        }
        if code.starts_with(']') {
            return None;
        }
        if seen == row {
            return Some(i);
        }
        seen += 1;
    }
    None
}

/// Parameter names of the `def` starting at `def_idx`, without `self`/`cls`
#[must_use]
pub fn function_parameters(lines: &[&str], def_idx: usize) -> Vec<String> {
    let header: String = lines
        .iter()
        .skip(def_idx)
        .take(MAX_CALL_LINES)
        .map(|l| split_comment(l).0.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let Some(open) = header.find('(') else {
        return Vec::new();
    };
    let inner = &header[open + 1..];
    let mut depth = 0i32;
    let close = inner
        .char_indices()
        .find(|&(_, c)| {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
            depth < 0
        })
        .map_or(inner.len(), |(i, _)| i);

    let mut params = Vec::new();
    for raw in split_top_level(&inner[..close]) {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" {
            continue;
        }
        if raw == "*" || raw.starts_with("**") {
            break;
        }
        let variadic = raw.starts_with('*');
        let name = raw
            .trim_start_matches('*')
            .split([':', '='])
            .next()
            .unwrap_or_default()
            .trim();
        if name != "self" && name != "cls" {
            params.push(name.to_string());
        }
        if variadic {
            break;
        }
    }
    params
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse the (possibly multi-line) call starting at 0-based `start`
fn multi_line_call(lines: &[&str], start: usize) -> Option<Expr> {
    let mut code = String::new();
    for line in lines.iter().skip(start).take(MAX_CALL_LINES) {
        let (part, _) = split_comment(line);
        code.push_str(part.trim());
        code.push('\n');
        let (_, expr) = split_statement(code.trim_start());
        if let Ok(call @ Expr::Call { .. }) = parse_expression(expr) {
            return Some(call);
        }
    }
    None
}

/// Translate argument `index` of the call at 1-based `lineno` into the enclosing function's parameter index.
///
/// The argument must be a bare name that is one of the enclosing function's
/// parameters; implicit `self`/`cls` are not counted.
#[must_use]
pub fn parameter_index_from_function_def(source: &str, lineno: usize, index: usize) -> Option<usize> {
    let lines: Vec<&str> = source.lines().collect();
    let start = lineno.checked_sub(1)?;
    let call = multi_line_call(&lines, start)?;
    let Expr::Call { args, .. } = &call else {
        return None;
    };
    let name = args
        .iter()
        .filter_map(|a| match a {
            Argument::Positional(e) => Some(e),
            _ => None,
        })
        .nth(index)?
        .as_name()?
        .to_string();
    let def = enclosing_def(&lines, start)?;
    function_parameters(&lines, def).iter().position(|p| *p == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod line_tests {
        use super::*;

        #[test]
        fn test_replace_line_keeps_endings() {
            let text = "a\nb\r\nc";
            assert_eq!(replace_line_in_text(text, 2, "B").unwrap(), "a\nB\r\nc");
            assert_eq!(replace_line_in_text(text, 3, "C").unwrap(), "a\nb\r\nC");
            assert_eq!(replace_line_in_text("x\n", 1, "y").unwrap(), "y\n");
            assert!(replace_line_in_text(text, 4, "D").is_err());
            assert!(replace_line_in_text(text, 0, "D").is_err());
        }

        #[test]
        fn test_split_statement() {
            assert_eq!(split_statement("login(a)"), ("", "login(a)"));
            assert_eq!(split_statement("result = login(a)"), ("result = ", "login(a)"));
            assert_eq!(split_statement("x: str = f()"), ("x: str = ", "f()"));
            assert_eq!(split_statement("await page.goto(u)"), ("await ", "page.goto(u)"));
            assert_eq!(split_statement("a == f()"), ("", "a == f()"));
        }
    }

    mod call_tests {
        use super::*;

        #[test]
        fn test_inline_none_replaced() {
            let updated = update_value_in_function_call(
                "        login_page.login(None, password)  ",
                0,
                "None",
                "'admin'",
            )
            .unwrap();
            assert_eq!(updated.unwrap(), "        login_page.login('admin', password)  ");
        }

        #[test]
        fn test_inline_requires_matching_old_value() {
            assert_eq!(
                update_value_in_function_call("login('bob', pw)", 0, "None", "'admin'").unwrap(),
                None
            );
            assert_eq!(
                update_value_in_function_call("expect(x).to_have_text(\"Old\")", 0, "'Old'", "'New'")
                    .unwrap()
                    .unwrap(),
                "expect(x).to_have_text('New')"
            );
        }

        #[test]
        fn test_inline_keeps_prefix_and_comment() {
            let updated = update_value_in_function_call(
                "    user = make_user(None)  # seed",
                0,
                "None",
                "'x'",
            )
            .unwrap()
            .unwrap();
            assert_eq!(updated, "    user = make_user('x')  # seed");
        }

        #[test]
        fn test_inline_errors() {
            assert!(update_value_in_function_call("x = 1", 0, "None", "'a'").is_err());
            assert!(update_value_in_function_call("f(None)", 3, "None", "'a'").is_err());
        }

        #[test]
        fn test_parameters_index_map() {
            let map = function_parameters_index_map("page.fill(\"#user\", username, 3)").unwrap();
            assert_eq!(map[&0], "'#user'");
            assert_eq!(map[&1], "username");
            assert_eq!(map[&2], "3");
            assert!(function_parameters_index_map("not a call").is_none());
        }
    }

    mod assignment_tests {
        use super::*;

        #[test]
        fn test_replace_assignment() {
            assert_eq!(
                replace_variable_assignment("    username = \"admin\"", "username", "'guest'").unwrap(),
                "    username = 'guest'"
            );
            assert_eq!(
                replace_variable_assignment("USERNAME: str = None  # todo", "username", "'guest'").unwrap(),
                "USERNAME: str = 'guest'  # todo"
            );
            assert!(replace_variable_assignment("username == x", "username", "'g'").is_none());
            assert!(replace_variable_assignment("user_name = 1", "username", "'g'").is_none());
        }

        #[test]
        fn test_find_assignment_scoped() {
            let src = [
                "BASE = None",
                "def test_other():",
                "    user = 'x'",
                "def test_login(page):",
                "    other = 1",
                "    login(user, BASE)",
            ];
            assert_eq!(find_assignment_above(&src, 5, "BASE"), Some(0));
            assert_eq!(find_assignment_above(&src, 5, "user"), None);
            assert_eq!(find_assignment_above(&src, 5, "other"), Some(4));
        }
    }

    mod table_tests {
        use super::*;

        #[test]
        fn test_names_map() {
            let m = data_provider_names_map("@pytest.mark.parametrize(\" username ,  password , product \", [");
            assert_eq!(m["username"], 0);
            assert_eq!(m["password"], 1);
            assert_eq!(m["product"], 2);
            let m = data_provider_names_map("@pytest.mark.parametrize(('user', 'pw'), [");
            assert_eq!(m["pw"], 1);
            assert!(data_provider_names_map("def some_function():").is_empty());
        }

        #[test]
        fn test_replace_row_cell() {
            let row = "(\"standard_user\", \"secret_sauce\", \"Sauce Labs Backpack\"),";
            assert_eq!(
                replace_variable_in_data_provider(row, 0, "'admin'").unwrap().unwrap(),
                "('admin', 'secret_sauce', 'Sauce Labs Backpack'),"
            );
            assert_eq!(
                replace_variable_in_data_provider("     (\"user\", \"pass\")", 0, "\"changed\"")
                    .unwrap()
                    .unwrap(),
                "     ('changed', 'pass')"
            );
            assert_eq!(replace_variable_in_data_provider(row, 5, "'x'").unwrap(), None);
            assert_eq!(replace_variable_in_data_provider("\"justastring\",", 0, "'x'").unwrap(), None);
            assert_eq!(
                replace_variable_in_data_provider("    pytest.param(None, 'b', id='r1'),", 0, "'a'")
                    .unwrap()
                    .unwrap(),
                "    pytest.param('a', 'b', id='r1'),"
            );
        }

        #[test]
        fn test_row_location() {
            let src = [
                "@pytest.mark.parametrize(",
                "    \"username,password\",",
                "    [",
                "        (\"a\", None),",
                "",
                "        # disabled",
                "        (\"b\", \"x\"),",
                "    ],",
                ")",
                "def test_login(page, username, password):",
                "    login(username, password)",
            ];
            let header = find_table_header_above(&src, 10, "@pytest.mark.parametrize").unwrap();
            assert_eq!(header, 0);
            assert_eq!(table_columns(&src, header)["password"], 1);
            assert_eq!(table_row_line(&src, header, 0), Some(3));
            assert_eq!(table_row_line(&src, header, 1), Some(6));
            assert_eq!(table_row_line(&src, header, 2), None);
            assert_eq!(data_provider_cell(src[3], 1).unwrap().to_string(), "None");
        }

        #[test]
        fn test_row_location_skips_name_sequence() {
            let src = [
                "@pytest.mark.parametrize([\"username\", \"password\"], [",
                "    (\"alice\", \"x\"),",
                "    (None, \"y\"),",
                "])",
            ];
            assert_eq!(table_row_line(&src, 0, 0), Some(1));
            assert_eq!(table_row_line(&src, 0, 1), Some(2));
            assert_eq!(table_row_line(&src, 0, 2), None);

            let tuple_form = [
                "@pytest.mark.parametrize(",
                "    (\"user\", \"pw\"),",
                "    [(\"a\", \"b\"),",
                "     (\"c\", \"d\")],",
                ")",
            ];
            assert_eq!(table_row_line(&tuple_form, 0, 0), Some(2));
            assert_eq!(table_row_line(&tuple_form, 0, 1), Some(3));
        }
    }

    mod function_def_tests {
        use super::*;

        #[test]
        fn test_index_from_method() {
            let src = "class LoginPage:\n    def login(self, username, password):\n        self.user.fill(username)\n        self.pw.fill(password)\n";
            assert_eq!(parameter_index_from_function_def(src, 3, 0), Some(0));
            assert_eq!(parameter_index_from_function_def(src, 4, 0), Some(1));
        }

        #[test]
        fn test_index_multi_line_and_annotations() {
            let src = "def checkout(\n    first: str,\n    last: str = \"\",\n    *rest,\n    flag=False,\n):\n    form.fill_all(\n        last,\n        first,\n    )\n";
            assert_eq!(parameter_index_from_function_def(src, 7, 0), Some(1));
            assert_eq!(parameter_index_from_function_def(src, 7, 1), Some(0));
        }

        #[test]
        fn test_index_not_a_parameter() {
            let src = "def f(self, a):\n    print('x')\n    g(b)\n";
            assert_eq!(parameter_index_from_function_def(src, 2, 0), None);
            assert_eq!(parameter_index_from_function_def(src, 3, 0), None);
            assert_eq!(parameter_index_from_function_def(src, 3, 4), None);
        }

        #[test]
        fn test_function_parameters() {
            let lines = ["    def go(cls, url: dict[str, int] = {}, *, timeout=5):"];
            assert_eq!(function_parameters(&lines, 0), vec!["url".to_string()]);
        }
    }
}
