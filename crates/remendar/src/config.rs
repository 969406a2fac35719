//! Record-mode configuration and the lazy value lookup chain.
//!
//! Configuration comes from a JSON or YAML file, is adjusted by
//! `--name=value` command-line overrides, and doubles as the second tier of
//! placeholder resolution: any key the engine does not know is kept in
//! [`RecordConfig::extra`] and can be referenced as `#KEY#`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::result::{RemendarError, RemendarResult};

/// Default operation timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default name of the locator constructor in page-object sources
pub const DEFAULT_LOCATOR_CONSTRUCTOR: &str = "SmartLocator";

/// Where tests, page objects and data tables live in the hosted suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    /// Directory component identifying test files
    pub tests_dir: String,
    /// File-name prefix identifying test files
    pub test_file_prefix: String,
    /// Directory component identifying page-object files
    pub pages_dir: String,
    /// File-name suffix identifying page-object files
    pub page_file_suffix: String,
    /// Decorator line that opens a data-driven table
    pub table_header_marker: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            tests_dir: "tests".to_string(),
            test_file_prefix: "test_".to_string(),
            pages_dir: "pages".to_string(),
            page_file_suffix: "_page.py".to_string(),
            table_header_marker: "@pytest.mark.parametrize".to_string(),
        }
    }
}

/// Configuration for a record-mode session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Repair failures interactively and patch sources
    pub record_mode: bool,
    /// Per-operation timeout in milliseconds
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    /// Highlight elements before interacting with them
    pub highlight: bool,
    /// Delay between steps in milliseconds
    #[serde(alias = "step_delay")]
    pub step_delay_ms: u64,
    /// Locator constructor used in page-object field declarations
    pub locator_constructor: String,
    /// Source layout of the hosted suite
    pub layout: SourceLayout,
    /// Every other key, available to placeholder resolution
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            record_mode: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            highlight: false,
            step_delay_ms: 0,
            locator_constructor: DEFAULT_LOCATOR_CONSTRUCTOR.to_string(),
            layout: SourceLayout::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl RecordConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable record mode
    #[must_use]
    pub fn with_record_mode(mut self, record_mode: bool) -> Self {
        self.record_mode = record_mode;
        self
    }

    /// Add a free-form entry
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> RemendarResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            Some("yaml" | "yml") => Ok(serde_yaml_ng::from_str(&text)?),
            _ => Err(RemendarError::Config {
                message: format!("unsupported config format: {}", path.display()),
            }),
        }
    }

    /// Case-insensitive lookup of a free-form entry, rendered as text
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<String> {
        self.extra
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    /// Apply the well-known overrides: `record_mode`, `highlight`, `timeout`, `step_delay`
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) -> RemendarResult<()> {
        if let Some(v) = overrides.get("record_mode") {
            self.record_mode = parse_flag("record_mode", v)?;
        }
        if let Some(v) = overrides.get("highlight") {
            self.highlight = parse_flag("highlight", v)?;
        }
        if let Some(v) = overrides.get("timeout") {
            self.timeout_ms = parse_millis("timeout", v)?;
        }
        if let Some(v) = overrides.get("step_delay") {
            self.step_delay_ms = parse_millis("step_delay", v)?;
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> RemendarResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(RemendarError::Config {
            message: format!("--{name} expects true or false, got '{other}'"),
        }),
    }
}

fn parse_millis(name: &str, value: &str) -> RemendarResult<u64> {
    value.trim().parse::<u64>().map_err(|_| RemendarError::Config {
        message: format!("--{name} expects milliseconds, got '{value}'"),
    })
}

/// `--name=value` pairs taken from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pairs: Vec<(String, String)>,
}

impl CliOverrides {
    /// Collect every `--name=value` argument; other arguments are ignored
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = args
            .into_iter()
            .filter_map(|arg| {
                let rest = arg.as_ref().strip_prefix("--")?;
                let (name, value) = rest.split_once('=')?;
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `name`, compared case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Number of collected pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pairs were collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Lookup chain for unset placeholders: CLI override, config entry, environment
#[derive(Debug, Clone, Default)]
pub struct ValueSources {
    cli: CliOverrides,
    config: RecordConfig,
    env: Vec<(String, String)>,
}

impl ValueSources {
    /// Snapshot the current process arguments and environment
    #[must_use]
    pub fn from_process(config: RecordConfig) -> Self {
        Self {
            cli: CliOverrides::from_args(std::env::args()),
            config,
            env: std::env::vars().collect(),
        }
    }

    /// Explicit sources, for embedding hosts and tests
    #[must_use]
    pub fn with_env(
        cli: CliOverrides,
        config: RecordConfig,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            cli,
            config,
            env: env.into_iter().collect(),
        }
    }

    /// Resolve `name`, all tiers compared case-insensitively
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(v) = self.cli.get(name) {
            return Some(v.to_string());
        }
        if let Some(v) = self.config.entry(name) {
            return Some(v);
        }
        self.env
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// The configuration tier
    #[must_use]
    pub fn config(&self) -> &RecordConfig {
        &self.config
    }
}
