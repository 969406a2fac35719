//! Source patching.
//!
//! [`SourcePatchEngine`] persists a repair by rewriting exactly one line of
//! one source file. Value repairs start from the test-file call site and try,
//! in order, the literal argument itself, the nearest assignment of the
//! variable passed there, and the cell of the active data-table row. Selector
//! repairs rewrite the locator field declaration in the page-object file.
//!
//! Files are read whole, edited in memory and written once. A patch that
//! would not change the file is reported with `changed: false` and nothing
//! is written, so repeating a repair is harmless.

pub mod call_site;
pub mod declaration;
pub mod edit;
pub mod store;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use call_site::{
    resolve_call_site, CallSiteDescriptor, CallSiteProvider, FrameClassifier, FrameRole,
    RecordedCallStack, StackFrame,
};
pub use store::{FsSourceStore, MemorySourceStore, SourceStore};

use crate::cache::FixOrigin;
use crate::config::{RecordConfig, SourceLayout};
use crate::pyexpr::Expr;
use crate::result::{RemendarError, RemendarResult};

/// Location that was (or would have been) edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchTarget {
    /// Literal argument at the call site
    Inline {
        /// 1-based line
        line: usize,
        /// Positional argument index
        arg_index: usize,
    },
    /// Assignment of the variable passed at the call site
    Assignment {
        /// 1-based line of the assignment
        line: usize,
        /// Variable name
        var_name: String,
    },
    /// Cell of a data-table row
    DataTableCell {
        /// 1-based line of the table header
        header_line: usize,
        /// 0-based data row
        row_index: usize,
        /// 0-based column
        column_index: usize,
    },
    /// Selector literal of a locator field declaration
    LocatorDeclaration {
        /// 1-based line of the declaration
        line: usize,
        /// Field name
        field: String,
    },
}

impl PatchTarget {
    /// Cache origin of a fix written here
    #[must_use]
    pub const fn origin(&self) -> FixOrigin {
        match self {
            Self::Inline { .. } | Self::LocatorDeclaration { .. } => FixOrigin::Inline,
            Self::Assignment { .. } => FixOrigin::Assignment,
            Self::DataTableCell { .. } => FixOrigin::DataProvider,
        }
    }
}

/// Result of one patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutcome {
    /// What was edited
    pub target: PatchTarget,
    /// File edited
    pub file: PathBuf,
    /// 1-based line rewritten
    pub line: usize,
    /// Whether the file content changed
    pub changed: bool,
}

/// Rewrites test and page-object sources
#[derive(Clone)]
pub struct SourcePatchEngine {
    store: Rc<dyn SourceStore>,
    classifier: FrameClassifier,
    layout: SourceLayout,
    locator_constructor: String,
}

impl std::fmt::Debug for SourcePatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePatchEngine")
            .field("layout", &self.layout)
            .field("locator_constructor", &self.locator_constructor)
            .finish_non_exhaustive()
    }
}

fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Str(_) | Expr::Num(_) | Expr::Constant(_) | Expr::Opaque(_) => true,
        Expr::Unary { operand, .. } => matches!(operand.as_ref(), Expr::Num(_)),
        _ => false,
    }
}

fn is_block_start(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("def ") || t.starts_with("async def ") || t.starts_with("class ")
}

impl SourcePatchEngine {
    /// Engine over `store`, using the layout and constructor name from `config`
    pub fn new(store: Rc<dyn SourceStore>, config: &RecordConfig) -> Self {
        Self {
            store,
            classifier: FrameClassifier::new(config.layout.clone()),
            layout: config.layout.clone(),
            locator_constructor: config.locator_constructor.clone(),
        }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &dyn SourceStore {
        self.store.as_ref()
    }

    /// Frame classifier built from the layout
    #[must_use]
    pub const fn classifier(&self) -> &FrameClassifier {
        &self.classifier
    }

    /// Map the provider's current stack to a test-file call site
    pub fn resolve_call_site(
        &self,
        provider: &dyn CallSiteProvider,
        parameter_index: usize,
    ) -> RemendarResult<CallSiteDescriptor> {
        resolve_call_site(&provider.frames(), parameter_index, &self.classifier, self.store())
    }

    fn commit(&self, file: &Path, text: &str, lineno: usize, new_line: &str, target: PatchTarget) -> RemendarResult<PatchOutcome> {
        let updated = edit::replace_line_in_text(text, lineno, new_line)?;
        let changed = updated != text;
        if changed {
            self.store.write(file, &updated)?;
            info!(file = %file.display(), line = lineno, ?target, "source patched");
        } else {
            debug!(file = %file.display(), line = lineno, ?target, "patch already applied");
        }
        Ok(PatchOutcome {
            target,
            file: file.to_path_buf(),
            line: lineno,
            changed,
        })
    }

    fn unchanged(file: &Path, lineno: usize, target: PatchTarget) -> PatchOutcome {
        debug!(file = %file.display(), line = lineno, ?target, "patch already applied");
        PatchOutcome {
            target,
            file: file.to_path_buf(),
            line: lineno,
            changed: false,
        }
    }

    /// Header of the data table decorating the function that contains `call_idx`
    fn table_header_for(&self, lines: &[&str], call_idx: usize) -> Option<usize> {
        let def = edit::enclosing_def(lines, call_idx)?;
        (0..def)
            .rev()
            .take_while(|&i| !is_block_start(lines[i]))
            .find(|&i| lines[i].trim_start().starts_with(&self.layout.table_header_marker))
    }

    /// Persist `new_value` at the call site that supplied `old_value`.
    ///
    /// `row` is the active data-table row, needed only when the value comes
    /// from a table.
    pub fn patch_value(
        &self,
        site: &CallSiteDescriptor,
        old_value: &Expr,
        new_value: &Expr,
        row: Option<usize>,
    ) -> RemendarResult<PatchOutcome> {
        let file = site.file.as_path();
        let not_found = |line: usize, reason: String| {
            RemendarError::patch_target_not_found(file.display().to_string(), line, reason)
        };
        let text = self.store.read(file)?;
        let lines: Vec<&str> = text.lines().collect();
        let idx = site.line.saturating_sub(1);
        let line = *lines
            .get(idx)
            .ok_or_else(|| not_found(site.line, "line is past the end of the file".to_string()))?;
        let arg = edit::call_argument(line, site.parameter_index)
            .map_err(|e| not_found(site.line, e.to_string()))?;
        let new_src = new_value.to_string();

        // 1. literal argument
        if is_literal(&arg) {
            let target = PatchTarget::Inline {
                line: site.line,
                arg_index: site.parameter_index,
            };
            if arg == *new_value {
                return Ok(Self::unchanged(file, site.line, target));
            }
            return match edit::update_value_in_function_call(
                line,
                site.parameter_index,
                &old_value.to_string(),
                &new_src,
            )? {
                Some(new_line) => self.commit(file, &text, site.line, &new_line, target),
                None => Err(not_found(
                    site.line,
                    format!("argument {} is {arg}, expected {old_value}", site.parameter_index),
                )),
            };
        }
        let Some(var) = arg.as_name() else {
            return Err(not_found(
                site.line,
                format!("argument {} ({arg}) is neither a literal nor a variable", site.parameter_index),
            ));
        };

        // 2. assignment above the call
        if let Some(a) = edit::find_assignment_above(&lines, idx, var) {
            let target = PatchTarget::Assignment {
                line: a + 1,
                var_name: var.to_string(),
            };
            if edit::assignment_value(lines[a]).as_ref() == Some(new_value) {
                return Ok(Self::unchanged(file, a + 1, target));
            }
            let new_line = edit::replace_variable_assignment(lines[a], var, &new_src)
                .ok_or_else(|| not_found(a + 1, format!("cannot rewrite assignment of {var}")))?;
            return self.commit(file, &text, a + 1, &new_line, target);
        }

        // 3. data-table cell
        let header = self
            .table_header_for(&lines, idx)
            .ok_or_else(|| not_found(site.line, format!("no assignment of {var} and no data table")))?;
        let column = *edit::table_columns(&lines, header)
            .get(var)
            .ok_or_else(|| not_found(header + 1, format!("{var} is not a column of the data table")))?;
        let row = row.ok_or_else(|| not_found(header + 1, "no active data row".to_string()))?;
        let row_idx = edit::table_row_line(&lines, header, row)
            .ok_or_else(|| not_found(header + 1, format!("data table has no row {row}")))?;
        let target = PatchTarget::DataTableCell {
            header_line: header + 1,
            row_index: row,
            column_index: column,
        };
        if edit::data_provider_cell(lines[row_idx], column).as_ref() == Some(new_value) {
            return Ok(Self::unchanged(file, row_idx + 1, target));
        }
        let new_line = edit::replace_variable_in_data_provider(lines[row_idx], column, &new_src)?
            .ok_or_else(|| not_found(row_idx + 1, format!("row {row} has no column {column}")))?;
        self.commit(file, &text, row_idx + 1, &new_line, target)
    }

    /// Rewrite the selector of `self.<field>` in `file`
    pub fn patch_locator(&self, file: &Path, field: &str, selector: &str) -> RemendarResult<PatchOutcome> {
        let text = self.store.read(file)?;
        let lines: Vec<&str> = text.lines().collect();
        let idx = declaration::find_locator_declaration(&lines, field, &self.locator_constructor)?
            .ok_or_else(|| {
                RemendarError::patch_target_not_found(
                    file.display().to_string(),
                    0,
                    format!("no declaration of self.{field} = {}(...)", self.locator_constructor),
                )
            })?;
        let target = PatchTarget::LocatorDeclaration {
            line: idx + 1,
            field: field.to_string(),
        };
        let new_line = declaration::replace_locator_selector(lines[idx], selector)?;
        self.commit(file, &text, idx + 1, &new_line, target)
    }
}
