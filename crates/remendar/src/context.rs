//! Which test is running, and which parametrized row.

use tracing::info;

/// What changed when a test started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTransition {
    /// First test of the session
    Started,
    /// Another row of the test function that was already running
    NextRow,
    /// A different test function
    NewFunction {
        /// Function that ran before
        previous: String,
    },
}

impl TestTransition {
    /// Whether value caches must be dropped
    #[must_use]
    pub const fn clears_value_caches(&self) -> bool {
        matches!(self, Self::NewFunction { .. })
    }
}

/// Current test function and data row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestContext {
    function: Option<String>,
    row: Option<usize>,
}

/// Logical function of a test node id: `tests/test_a.py::test_login[admin]` → `tests/test_a.py::test_login`
#[must_use]
pub fn logical_function(node_id: &str) -> &str {
    match node_id.find('[') {
        Some(i) if node_id.ends_with(']') => &node_id[..i],
        _ => node_id,
    }
}

impl TestContext {
    /// No test running yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a test node; `row` is its index in the data table, if parametrized
    pub fn enter_test(&mut self, node_id: &str, row: Option<usize>) -> TestTransition {
        let function = logical_function(node_id).to_string();
        let transition = match self.function.take() {
            None => TestTransition::Started,
            Some(previous) if previous == function => TestTransition::NextRow,
            Some(previous) => TestTransition::NewFunction { previous },
        };
        info!(test = %function, ?row, ?transition, "test entered");
        self.function = Some(function);
        self.row = row;
        transition
    }

    /// Logical function currently running
    #[must_use]
    pub fn current_function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Current data-table row
    #[must_use]
    pub const fn current_row(&self) -> Option<usize> {
        self.row
    }
}
