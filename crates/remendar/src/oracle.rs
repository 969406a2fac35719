//! Human-recovery oracle.
//!
//! The coordinator never talks to a person directly. It asks a
//! [`RecoveryOracle`] for replacement text, for confirmation, or for the
//! element currently under the pointer. [`TerminalOracle`] does this over
//! any line-oriented reader/writer pair; [`ScriptedOracle`] replays canned
//! answers and records every question, which is how the workflows are
//! tested.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::dom::{Document, ElementRef};
use crate::result::RemendarResult;

/// What is being repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// A selector
    Locator,
    /// An argument, keyword, expected value or placeholder
    Value,
}

/// Question shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPrompt {
    /// Locator or value
    pub kind: PromptKind,
    /// Short heading, e.g. `LoginPage.username_input`
    pub title: String,
    /// What went wrong and what is expected
    pub detail: String,
}

impl RepairPrompt {
    /// Prompt for a replacement selector
    #[must_use]
    pub fn locator(cache_key: &str, selector: &str) -> Self {
        Self {
            kind: PromptKind::Locator,
            title: cache_key.to_string(),
            detail: format!(
                "Locator '{selector}' is not valid. Type a new selector, or keep the value and point at the element."
            ),
        }
    }

    /// Prompt for a replacement value of the given kind, e.g. "page url"
    #[must_use]
    pub fn value(kind: &str, detail: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Value,
            title: format!("Missing {kind}"),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RepairPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.detail)
    }
}

/// Source of human decisions during repair
pub trait RecoveryOracle {
    /// Ask for text; `Ok(None)` means the operator cancelled
    fn ask_text(&mut self, prompt: &RepairPrompt, initial: &str) -> RemendarResult<Option<String>>;

    /// Ask a yes/no question
    fn ask_confirm(&mut self, question: &str) -> RemendarResult<bool>;

    /// Element the operator points at; `Ok(None)` means cancelled
    fn pick_live_element(&mut self, doc: &dyn Document) -> RemendarResult<Option<ElementRef>>;
}

/// One canned answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Answer a text prompt
    Text(String),
    /// Answer a text prompt with its initial value unchanged
    KeepInitial,
    /// Answer a confirmation
    Confirm(bool),
    /// Point at this element
    Pick(ElementRef),
    /// Point at whatever the document reports as hovered
    PickHovered,
    /// Cancel the current prompt
    Cancel,
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<ScriptedReply>,
    asked: Vec<String>,
}

/// Oracle replaying canned replies in order.
///
/// Clones share the same script, so a test can hand one clone to the
/// coordinator and inspect the questions through another. An exhausted
/// script cancels text prompts and picks, and declines confirmations.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedOracle {
    /// Oracle with the given replies
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ScriptState {
                replies: replies.into_iter().collect(),
                asked: Vec::new(),
            })),
        }
    }

    /// Append a reply
    pub fn push(&self, reply: ScriptedReply) {
        self.state.borrow_mut().replies.push_back(reply);
    }

    /// Every question asked so far, text prompts as `title: detail`
    #[must_use]
    pub fn asked(&self) -> Vec<String> {
        self.state.borrow().asked.clone()
    }

    /// Number of replies not consumed yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state.borrow().replies.len()
    }

    fn next(&self, question: String) -> Option<ScriptedReply> {
        let mut state = self.state.borrow_mut();
        state.asked.push(question);
        state.replies.pop_front()
    }
}

impl RecoveryOracle for ScriptedOracle {
    fn ask_text(&mut self, prompt: &RepairPrompt, initial: &str) -> RemendarResult<Option<String>> {
        Ok(match self.next(prompt.to_string()) {
            Some(ScriptedReply::Text(text)) => Some(text),
            Some(ScriptedReply::KeepInitial) => Some(initial.to_string()),
            _ => None,
        })
    }

    fn ask_confirm(&mut self, question: &str) -> RemendarResult<bool> {
        Ok(matches!(
            self.next(question.to_string()),
            Some(ScriptedReply::Confirm(true))
        ))
    }

    fn pick_live_element(&mut self, doc: &dyn Document) -> RemendarResult<Option<ElementRef>> {
        match self.next("pick element".to_string()) {
            Some(ScriptedReply::Pick(element)) => Ok(Some(element)),
            Some(ScriptedReply::PickHovered) => doc.hovered_element(),
            _ => Ok(None),
        }
    }
}

/// Line-oriented oracle over a reader and a writer.
///
/// An empty line accepts the shown initial value; end of input cancels.
#[derive(Debug)]
pub struct TerminalOracle<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalOracle<R, W> {
    /// Oracle reading answers from `input` and writing questions to `output`
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the reader and writer
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn read_line(&mut self) -> RemendarResult<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl TerminalOracle<std::io::StdinLock<'static>, std::io::Stderr> {
    /// Oracle on the process terminal
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> RecoveryOracle for TerminalOracle<R, W> {
    fn ask_text(&mut self, prompt: &RepairPrompt, initial: &str) -> RemendarResult<Option<String>> {
        writeln!(self.output, "{}", prompt.title)?;
        writeln!(self.output, "  {}", prompt.detail)?;
        write!(self.output, "  [{initial}]: ")?;
        self.output.flush()?;
        Ok(self.read_line()?.map(|line| {
            if line.trim().is_empty() {
                initial.to_string()
            } else {
                line.trim().to_string()
            }
        }))
    }

    fn ask_confirm(&mut self, question: &str) -> RemendarResult<bool> {
        write!(self.output, "{question} [y/N]: ")?;
        self.output.flush()?;
        Ok(self
            .read_line()?
            .is_some_and(|a| matches!(a.trim().to_lowercase().as_str(), "y" | "yes")))
    }

    fn pick_live_element(&mut self, doc: &dyn Document) -> RemendarResult<Option<ElementRef>> {
        write!(self.output, "Hover the element in the browser and press Enter: ")?;
        self.output.flush()?;
        if self.read_line()?.is_none() {
            return Ok(None);
        }
        doc.hovered_element()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::login_form;
    use crate::selector::Selector;
    use std::io::Cursor;

    mod scripted_tests {
        use super::*;

        #[test]
        fn test_replays_in_order_and_records_questions() {
            let mut oracle = ScriptedOracle::new([
                ScriptedReply::Text("#user".to_string()),
                ScriptedReply::KeepInitial,
                ScriptedReply::Confirm(true),
            ]);
            let observer = oracle.clone();
            let prompt = RepairPrompt::locator("LoginPage.user", "#gone");
            assert_eq!(oracle.ask_text(&prompt, "#gone").unwrap().unwrap(), "#user");
            assert_eq!(oracle.ask_text(&prompt, "#gone").unwrap().unwrap(), "#gone");
            assert!(oracle.ask_confirm("ok?").unwrap());
            assert_eq!(observer.asked().len(), 3);
            assert!(observer.asked()[0].starts_with("LoginPage.user: "));
            assert_eq!(observer.remaining(), 0);
        }

        #[test]
        fn test_exhausted_script_cancels() {
            let mut oracle = ScriptedOracle::default();
            let prompt = RepairPrompt::value("page url", "no url given");
            assert_eq!(oracle.ask_text(&prompt, "x").unwrap(), None);
            assert!(!oracle.ask_confirm("abandon?").unwrap());
            assert_eq!(oracle.pick_live_element(&login_form()).unwrap(), None);
        }

        #[test]
        fn test_pick_hovered() {
            let doc = login_form();
            let target = doc.query_all(&Selector::css("#password")).unwrap()[0];
            doc.hover(target);
            let mut oracle = ScriptedOracle::new([ScriptedReply::PickHovered]);
            assert_eq!(oracle.pick_live_element(&doc).unwrap(), Some(target));
        }
    }

    mod terminal_tests {
        use super::*;

        #[test]
        fn test_text_answers() {
            let input = Cursor::new("input#user\n\n");
            let mut oracle = TerminalOracle::new(input, Vec::new());
            let prompt = RepairPrompt::locator("LoginPage.user", "#gone");
            assert_eq!(oracle.ask_text(&prompt, "#gone").unwrap().unwrap(), "input#user");
            assert_eq!(oracle.ask_text(&prompt, "#gone").unwrap().unwrap(), "#gone");
            assert_eq!(oracle.ask_text(&prompt, "#gone").unwrap(), None);
            let (_, output) = oracle.into_inner();
            let shown = String::from_utf8(output).unwrap();
            assert!(shown.contains("LoginPage.user"));
            assert!(shown.contains("[#gone]: "));
        }

        #[test]
        fn test_confirm_and_pick() {
            let doc = login_form();
            let target = doc.query_all(&Selector::css("h3")).unwrap()[0];
            doc.hover(target);
            let mut oracle = TerminalOracle::new(Cursor::new("Yes\nn\n\n"), Vec::new());
            assert!(oracle.ask_confirm("use it?").unwrap());
            assert!(!oracle.ask_confirm("use it?").unwrap());
            assert_eq!(oracle.pick_live_element(&doc).unwrap(), Some(target));
            assert_eq!(oracle.pick_live_element(&doc).unwrap(), None);
        }
    }
}
