//! Mapping a failing operation back to the test line that supplied its value.
//!
//! Frames are supplied by a [`CallSiteProvider`], innermost first. Frames in
//! page-object files translate the argument index into the enclosing method's
//! parameter index; the first frame in a test file is the call site.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::edit::parameter_index_from_function_def;
use super::store::SourceStore;
use crate::config::SourceLayout;
use crate::result::{RemendarError, RemendarResult};

/// One frame of the host call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Source file
    pub file: PathBuf,
    /// 1-based line of the call
    pub line: usize,
    /// Function the frame executes, if known
    pub function: Option<String>,
}

impl StackFrame {
    /// Frame at `file:line`
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            function: None,
        }
    }

    /// Name the executing function
    #[must_use]
    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

/// Supplies the active call stack, innermost frame first
pub trait CallSiteProvider {
    /// Current frames
    fn frames(&self) -> Vec<StackFrame>;
}

/// Call stack maintained explicitly by the host.
///
/// Hosts push a frame when entering a call that may need repair and pop it
/// on return; clones share the same stack.
#[derive(Debug, Clone, Default)]
pub struct RecordedCallStack {
    frames: Rc<RefCell<Vec<StackFrame>>>,
}

impl RecordedCallStack {
    /// Empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a frame
    pub fn push(&self, frame: StackFrame) {
        self.frames.borrow_mut().push(frame);
    }

    /// Leave the innermost frame
    pub fn pop(&self) -> Option<StackFrame> {
        self.frames.borrow_mut().pop()
    }

    /// Replace the whole stack, outermost frame first
    pub fn set(&self, outermost_first: impl IntoIterator<Item = StackFrame>) {
        *self.frames.borrow_mut() = outermost_first.into_iter().collect();
    }

    /// Number of frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

impl CallSiteProvider for RecordedCallStack {
    fn frames(&self) -> Vec<StackFrame> {
        self.frames.borrow().iter().rev().cloned().collect()
    }
}

/// Role of a source file in the hosted suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    /// Test module
    Test,
    /// Page-object module
    PageObject,
    /// Anything else (libraries, this engine's host glue)
    Other,
}

/// Classifies frames by path using the suite layout
#[derive(Debug, Clone, Default)]
pub struct FrameClassifier {
    layout: SourceLayout,
}

impl FrameClassifier {
    /// Classifier for `layout`
    #[must_use]
    pub const fn new(layout: SourceLayout) -> Self {
        Self { layout }
    }

    fn has_component(path: &Path, dir: &str) -> bool {
        path.parent()
            .is_some_and(|p| p.components().any(|c| c.as_os_str() == dir))
    }

    /// Role of `path`; a test module sits under the tests directory and carries the test prefix
    #[must_use]
    pub fn classify(&self, path: &Path) -> FrameRole {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with(&self.layout.test_file_prefix)
            && Self::has_component(path, &self.layout.tests_dir)
        {
            FrameRole::Test
        } else if name.ends_with(&self.layout.page_file_suffix)
            || Self::has_component(path, &self.layout.pages_dir)
        {
            FrameRole::PageObject
        } else {
            FrameRole::Other
        }
    }
}

/// Test-file location that supplied a missing or wrong value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteDescriptor {
    /// Test file
    pub file: PathBuf,
    /// 1-based line
    pub line: usize,
    /// Positional index of the value in the call on that line
    pub parameter_index: usize,
    /// Source text of the line, trimmed
    pub code_text: String,
}

impl CallSiteDescriptor {
    /// Cache key of this site
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}[{}]", self.file.display(), self.line, self.parameter_index)
    }
}

/// Walk `frames` outwards from the failure until a test-file frame.
///
/// `parameter_index` is the index of the value in the innermost frame's call.
pub fn resolve_call_site(
    frames: &[StackFrame],
    parameter_index: usize,
    classifier: &FrameClassifier,
    store: &dyn SourceStore,
) -> RemendarResult<CallSiteDescriptor> {
    let mut index = parameter_index;
    for frame in frames {
        match classifier.classify(&frame.file) {
            FrameRole::Test => {
                let text = store.read(&frame.file)?;
                let code_text = text
                    .lines()
                    .nth(frame.line.saturating_sub(1))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                debug!(file = %frame.file.display(), line = frame.line, index, "call site resolved");
                return Ok(CallSiteDescriptor {
                    file: frame.file.clone(),
                    line: frame.line,
                    parameter_index: index,
                    code_text,
                });
            }
            FrameRole::PageObject => {
                let text = store.read(&frame.file)?;
                index = parameter_index_from_function_def(&text, frame.line, index).ok_or_else(|| {
                    RemendarError::patch_target_not_found(
                        frame.file.display().to_string(),
                        frame.line,
                        format!("argument {index} is not a parameter of the enclosing function"),
                    )
                })?;
                debug!(file = %frame.file.display(), line = frame.line, index, "page-object frame translated");
            }
            FrameRole::Other => {}
        }
    }
    let (file, line) = frames
        .first()
        .map_or((String::new(), 0), |f| (f.file.display().to_string(), f.line));
    Err(RemendarError::patch_target_not_found(
        file,
        line,
        "no test-file frame on the call stack",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::patch::store::MemorySourceStore;

    const PAGE: &str = "class LoginPage:\n    def login(self, username, password):\n        self.username_input.fill(username)\n        self.password_input.fill(password)\n";
    const TEST: &str = "def test_login(page):\n    login_page = LoginPage(page)\n    login_page.login(None, 'secret_sauce')\n";

    fn store() -> MemorySourceStore {
        MemorySourceStore::new()
            .with_file("pages/login_page.py", PAGE)
            .with_file("tests/test_login.py", TEST)
    }

    #[test]
    fn test_classifier() {
        let c = FrameClassifier::default();
        assert_eq!(c.classify(Path::new("suite/pages/login_page.py")), FrameRole::PageObject);
        assert_eq!(c.classify(Path::new("suite/tests/test_login.py")), FrameRole::Test);
        assert_eq!(c.classify(Path::new("suite/tests/test_cart_page.py")), FrameRole::Test);
        assert_eq!(c.classify(Path::new("/usr/lib/site.py")), FrameRole::Other);
    }

    #[test]
    fn test_classifier_needs_tests_dir_and_prefix() {
        let c = FrameClassifier::default();
        assert_eq!(c.classify(Path::new("tests/helpers/flows.py")), FrameRole::Other);
        assert_eq!(c.classify(Path::new("tests/conftest.py")), FrameRole::Other);
        assert_eq!(c.classify(Path::new("utils/test_data.py")), FrameRole::Other);
        assert_eq!(c.classify(Path::new("test_smoke.py")), FrameRole::Other);
        assert_eq!(c.classify(Path::new("tests/e2e/test_login.py")), FrameRole::Test);
    }

    #[test]
    fn test_helper_frames_under_tests_are_skipped() {
        let store = store().with_file("tests/conftest.py", "def login(page):\n    pass\n");
        let frames = [
            StackFrame::new("tests/conftest.py", 2),
            StackFrame::new("tests/test_login.py", 3),
        ];
        let site = resolve_call_site(&frames, 1, &FrameClassifier::default(), &store).unwrap();
        assert_eq!(site.file, PathBuf::from("tests/test_login.py"));
        assert_eq!(site.parameter_index, 1);
    }

    #[test]
    fn test_recorded_stack_is_innermost_first() {
        let stack = RecordedCallStack::new();
        stack.push(StackFrame::new("tests/test_login.py", 3));
        stack.push(StackFrame::new("pages/login_page.py", 3).in_function("login"));
        let frames = stack.frames();
        assert_eq!(frames[0].file, PathBuf::from("pages/login_page.py"));
        assert_eq!(stack.pop().unwrap().function.as_deref(), Some("login"));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_resolves_through_page_object() {
        let frames = [
            StackFrame::new("lib/remendar_glue.py", 10),
            StackFrame::new("pages/login_page.py", 4),
            StackFrame::new("tests/test_login.py", 3),
        ];
        let site = resolve_call_site(&frames, 0, &FrameClassifier::default(), &store()).unwrap();
        assert_eq!(site.file, PathBuf::from("tests/test_login.py"));
        assert_eq!(site.line, 3);
        assert_eq!(site.parameter_index, 1);
        assert_eq!(site.code_text, "login_page.login(None, 'secret_sauce')");
        assert_eq!(site.key(), "tests/test_login.py:3[1]");
    }

    #[test]
    fn test_no_test_frame() {
        let frames = [StackFrame::new("lib/x.py", 1)];
        let err = resolve_call_site(&frames, 0, &FrameClassifier::default(), &store()).unwrap_err();
        assert!(matches!(err, RemendarError::PatchTargetNotFound { .. }));
    }

    #[test]
    fn test_page_argument_not_a_parameter() {
        let page = "class P:\n    def go(self):\n        self.link.fill('fixed')\n";
        let store = MemorySourceStore::new().with_file("pages/p_page.py", page);
        let frames = [StackFrame::new("pages/p_page.py", 3), StackFrame::new("tests/test_p.py", 1)];
        let err = resolve_call_site(&frames, 0, &FrameClassifier::default(), &store).unwrap_err();
        assert!(matches!(err, RemendarError::PatchTargetNotFound { line: 3, .. }));
    }
}
