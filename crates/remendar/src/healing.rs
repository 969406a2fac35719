//! Self-healing coordinator.
//!
//! Every intercepted operation runs through the same state machine:
//!
//! ```text
//! Idle → Executing → Success
//!                  ↘ Failed → Repairing → Retrying → Executing → …
//!                           ↘ Aborted
//! ```
//!
//! A failure is repaired only in record mode, and only when it classifies as
//! an invalid locator or an invalid value. Each of the two repair kinds is
//! attempted at most once per operation; failing again after a repair of the
//! same kind aborts the operation and surfaces the error.
//!
//! Repairs are looked up in the session caches before anyone is asked, so a
//! fix is requested from the operator once per cache window and reused
//! silently afterwards.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKind, FixOrigin, FixRecord, SessionCaches};
use crate::config::RecordConfig;
use crate::context::{TestContext, TestTransition};
use crate::dom::{element_value_or_text, resolve_single};
use crate::locator::LocatorHandle;
use crate::oracle::{RecoveryOracle, RepairPrompt};
use crate::page_object::PageCapabilities;
use crate::patch::{CallSiteDescriptor, CallSiteProvider, SourcePatchEngine};
use crate::pyexpr::{Constant, Expr};
use crate::result::{FailureClass, RemendarError, RemendarResult};
use crate::selector::normalize_space;
use crate::synth::SelectorSynthesizer;

/// Initial text offered when a value is missing
pub const DEFAULT_INITIAL_VALUE: &str = "Some value";

/// State shared by every operation of one test session
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    started: DateTime<Utc>,
    config: RecordConfig,
    caches: SessionCaches,
    test: TestContext,
}

impl SessionContext {
    /// New session with empty caches
    #[must_use]
    pub fn new(config: RecordConfig) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, record_mode = config.record_mode, "session started");
        Self {
            id,
            started: Utc::now(),
            config,
            caches: SessionCaches::new(),
            test: TestContext::new(),
        }
    }

    /// Session id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// When the session started
    #[must_use]
    pub const fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Record configuration
    #[must_use]
    pub const fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// Whether failures are repaired
    #[must_use]
    pub const fn record_mode(&self) -> bool {
        self.config.record_mode
    }

    /// Repairs made so far
    #[must_use]
    pub const fn caches(&self) -> &SessionCaches {
        &self.caches
    }

    /// Repairs made so far, mutable
    pub fn caches_mut(&mut self) -> &mut SessionCaches {
        &mut self.caches
    }

    /// Running test
    #[must_use]
    pub const fn test(&self) -> &TestContext {
        &self.test
    }

    /// Data-table row of the running test
    #[must_use]
    pub const fn current_row(&self) -> Option<usize> {
        self.test.current_row()
    }

    /// Enter a test node; value caches are dropped when the test function changes
    pub fn enter_test(&mut self, node_id: &str, row: Option<usize>) -> TestTransition {
        let transition = self.test.enter_test(node_id, row);
        if transition.clears_value_caches() {
            self.caches.clear_value_caches();
        }
        transition
    }
}

/// State of the operation being coordinated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealState {
    /// Nothing running
    Idle,
    /// The underlying operation runs
    Executing,
    /// The operation failed
    Failed,
    /// A replacement selector or value is being obtained and persisted
    Repairing,
    /// About to execute again with the repair applied
    Retrying,
    /// Terminal: the operation succeeded
    Success,
    /// Terminal: the failure was surfaced
    Aborted,
}

impl fmt::Display for HealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Executing => "executing",
            Self::Failed => "failed",
            Self::Repairing => "repairing",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Kind of repair applied to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    Locator,
    Value,
}

/// How the cache key of a value repair is formed
#[derive(Debug, Clone)]
enum CacheBase {
    /// Key of the resolved call site
    CallSite,
    /// Fixed key
    Fixed(String),
    /// Test file of the call site plus the old expected value
    Expected(String),
}

#[derive(Debug, Clone)]
struct ValueRepair {
    cache: CacheKind,
    label: &'static str,
    detail: String,
    parameter_index: usize,
    old: Expr,
    initial: String,
    key: CacheBase,
    allow_pick: bool,
    placeholderize: bool,
    numeric: bool,
}

impl ValueRepair {
    fn argument(cache: CacheKind, label: &'static str, parameter_index: usize, old: Option<&str>, detail: String) -> Self {
        Self {
            cache,
            label,
            detail,
            parameter_index,
            old: old.map_or(Expr::Constant(Constant::None), Expr::string),
            initial: old.unwrap_or(DEFAULT_INITIAL_VALUE).to_string(),
            key: CacheBase::CallSite,
            allow_pick: true,
            placeholderize: true,
            numeric: false,
        }
    }

    fn keyed(mut self, key: CacheBase) -> Self {
        self.key = key;
        self
    }

    fn without_pick(mut self) -> Self {
        self.allow_pick = false;
        self
    }

    fn verbatim(mut self) -> Self {
        self.placeholderize = false;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Click,
    Fill,
    Check,
    SelectOption,
    SetInputFiles,
}

impl Action {
    const fn name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Check => "check",
            Self::SelectOption => "select_option",
            Self::SetInputFiles => "set_input_files",
        }
    }

    const fn takes_value(self) -> bool {
        matches!(self, Self::Fill | Self::SelectOption | Self::SetInputFiles)
    }
}

#[derive(Debug, Clone, Copy)]
enum Expectation {
    Text,
    Value,
}

impl Expectation {
    const fn label(self) -> &'static str {
        match self {
            Self::Text => "expected text",
            Self::Value => "expected value",
        }
    }
}

/// Operation on a locator, with its single value argument
struct LocatorCall<'a> {
    owner: &'a mut dyn PageCapabilities,
    locator: &'a mut LocatorHandle,
    value: Option<String>,
}

/// Operation on the page object itself
struct PageCall<'a> {
    owner: &'a mut dyn PageCapabilities,
    first: Option<String>,
    second: Option<String>,
}

/// Runs operations and repairs their failures
pub struct Coordinator {
    session: SessionContext,
    oracle: Box<dyn RecoveryOracle>,
    patcher: SourcePatchEngine,
    call_sites: Rc<dyn CallSiteProvider>,
    state: HealState,
    operation: String,
    history: Vec<HealState>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("session", &self.session)
            .field("patcher", &self.patcher)
            .field("state", &self.state)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Coordinator for `session`
    pub fn new(
        session: SessionContext,
        oracle: Box<dyn RecoveryOracle>,
        patcher: SourcePatchEngine,
        call_sites: Rc<dyn CallSiteProvider>,
    ) -> Self {
        Self {
            session,
            oracle,
            patcher,
            call_sites,
            state: HealState::Idle,
            operation: String::new(),
            history: vec![HealState::Idle],
        }
    }

    /// Session state
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Session state, mutable
    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Enter a test node, see [`SessionContext::enter_test`]
    pub fn enter_test(&mut self, node_id: &str, row: Option<usize>) -> TestTransition {
        self.session.enter_test(node_id, row)
    }

    /// State of the last operation
    #[must_use]
    pub const fn state(&self) -> HealState {
        self.state
    }

    /// States visited by the last operation, starting at `Idle`
    #[must_use]
    pub fn history(&self) -> &[HealState] {
        &self.history
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    fn begin(&mut self, operation: String) {
        let delay = self.session.config.step_delay_ms;
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        debug!(session = %self.session.id, %operation, "operation started");
        self.operation = operation;
        self.state = HealState::Idle;
        self.history.clear();
        self.history.push(HealState::Idle);
    }

    fn transition(&mut self, next: HealState) {
        debug!(
            session = %self.session.id,
            operation = %self.operation,
            from = %self.state,
            to = %next,
            "heal transition"
        );
        self.state = next;
        self.history.push(next);
    }

    /// Pick the repair for `err`, or surface it
    fn on_failure(&mut self, err: RemendarError, repaired: &[Repair], value_repairable: bool) -> RemendarResult<Repair> {
        self.transition(HealState::Failed);
        let repair = match err.failure_class() {
            FailureClass::LocatorInvalid => Some(Repair::Locator),
            FailureClass::ValueInvalid if value_repairable => Some(Repair::Value),
            _ => None,
        };
        match repair {
            Some(repair) if self.session.record_mode() && !repaired.contains(&repair) => {
                warn!(operation = %self.operation, error = %err, ?repair, "operation failed, repairing");
                self.transition(HealState::Repairing);
                Ok(repair)
            }
            _ => {
                warn!(operation = %self.operation, error = %err, "operation failed");
                self.transition(HealState::Aborted);
                Err(err)
            }
        }
    }

    fn finish_repair<T>(&mut self, result: RemendarResult<T>) -> RemendarResult<T> {
        match result {
            Ok(value) => {
                self.transition(HealState::Retrying);
                Ok(value)
            }
            Err(err) => {
                warn!(operation = %self.operation, error = %err, "repair failed");
                self.transition(HealState::Aborted);
                Err(err)
            }
        }
    }

    fn heal<S>(
        &mut self,
        operation: String,
        subject: &mut S,
        value_repairable: bool,
        mut execute: impl FnMut(&mut S) -> RemendarResult<()>,
        mut repair: impl FnMut(&mut Self, &mut S, Repair) -> RemendarResult<()>,
    ) -> RemendarResult<()> {
        self.begin(operation);
        let mut repaired = Vec::new();
        loop {
            self.transition(HealState::Executing);
            let err = match execute(subject) {
                Ok(()) => {
                    self.transition(HealState::Success);
                    return Ok(());
                }
                Err(err) => err,
            };
            let kind = self.on_failure(err, &repaired, value_repairable)?;
            let result = repair(self, subject, kind);
            self.finish_repair(result)?;
            repaired.push(kind);
        }
    }

    // ------------------------------------------------------------------
    // Repairs
    // ------------------------------------------------------------------

    /// Error to surface for a repair that cannot be persisted
    fn abandon_or_abort(&mut self, err: RemendarError) -> RemendarError {
        let question = format!("{err}. Abandon this repair?");
        match self.oracle.ask_confirm(&question) {
            Ok(true) => {
                info!(error = %err, "repair abandoned");
                err
            }
            Ok(false) => RemendarError::RecordingAborted {
                message: err.to_string(),
            },
            Err(e) => e,
        }
    }

    fn ask_selector(&mut self, owner: &dyn PageCapabilities, locator: &LocatorHandle) -> RemendarResult<String> {
        let current = locator.effective_selector();
        let prompt = RepairPrompt::locator(&locator.cache_key(), &current);
        loop {
            let reply = self
                .oracle
                .ask_text(&prompt, &current)?
                .ok_or(RemendarError::UserCancelled)?;
            let reply = reply.trim();
            if reply.is_empty() {
                return Err(RemendarError::UserCancelled);
            }
            if reply != current {
                return Ok(reply.to_string());
            }
            let page = owner.page();
            let doc = page.as_document();
            let element = self
                .oracle
                .pick_live_element(doc)?
                .ok_or(RemendarError::UserCancelled)?;
            let Some(candidate) = SelectorSynthesizer::new(doc).synthesize(element, locator.keyword())? else {
                warn!(element = element.0, "no unique selector for the picked element");
                continue;
            };
            let selector = candidate.selector.as_str().to_string();
            if self.oracle.ask_confirm(&format!("Use selector {selector}?"))? {
                return Ok(selector);
            }
        }
    }

    fn repair_locator(&mut self, owner: &dyn PageCapabilities, locator: &mut LocatorHandle) -> RemendarResult<()> {
        let key = locator.cache_key();
        if let Some(fix) = self.session.caches.get(CacheKind::Selector, &key) {
            if fix.value != locator.template() {
                info!(%key, selector = %fix.value, "reusing repaired selector");
                locator.set_template(fix.value.clone());
                return Ok(());
            }
        }
        let selector = self.ask_selector(owner, locator)?;
        let persisted = locator.persisted_form(&selector);
        match self
            .patcher
            .patch_locator(locator.source_file(), locator.field_name(), &persisted)
        {
            Ok(outcome) => {
                info!(%key, selector = %persisted, file = %outcome.file.display(), line = outcome.line, "selector repaired");
            }
            Err(err @ RemendarError::PatchTargetNotFound { .. }) => return Err(self.abandon_or_abort(err)),
            Err(err) => return Err(err),
        }
        self.session.caches.insert(
            CacheKind::Selector,
            key,
            FixRecord::new(FixOrigin::Inline, persisted.clone()),
        );
        locator.set_template(persisted);
        Ok(())
    }

    fn ask_value(&mut self, owner: &dyn PageCapabilities, repair: &ValueRepair) -> RemendarResult<String> {
        let prompt = RepairPrompt::value(repair.label, repair.detail.clone());
        loop {
            let reply = self
                .oracle
                .ask_text(&prompt, &repair.initial)?
                .ok_or(RemendarError::UserCancelled)?;
            if reply.is_empty() {
                return Err(RemendarError::UserCancelled);
            }
            if repair.numeric {
                let trimmed = reply.trim();
                if trimmed.parse::<usize>().is_ok() {
                    return Ok(trimmed.to_string());
                }
                warn!(reply = %reply, "not a count");
                continue;
            }
            if reply != repair.initial || !repair.allow_pick {
                return Ok(reply);
            }
            let page = owner.page();
            let doc = page.as_document();
            let element = self
                .oracle
                .pick_live_element(doc)?
                .ok_or(RemendarError::UserCancelled)?;
            let value = element_value_or_text(doc, element)?;
            if self.oracle.ask_confirm(&format!("Use value '{value}'?"))? {
                return Ok(value);
            }
        }
    }

    /// Obtain, persist and cache a replacement value; returns it in persisted form
    fn repair_value(&mut self, owner: &mut dyn PageCapabilities, repair: ValueRepair) -> RemendarResult<String> {
        let row = self.session.current_row();
        let site = self
            .patcher
            .resolve_call_site(self.call_sites.as_ref(), repair.parameter_index);
        let base = match &repair.key {
            CacheBase::Fixed(key) => Some(key.clone()),
            CacheBase::CallSite => site.as_ref().ok().map(CallSiteDescriptor::key),
            CacheBase::Expected(old) => site
                .as_ref()
                .ok()
                .map(|s| format!("{}::{old}", s.file.display())),
        };
        if let Some(fix) = base
            .as_deref()
            .and_then(|b| self.session.caches.get_for_row(repair.cache, b, row))
        {
            info!(kind = ?repair.cache, key = ?base, value = %fix.value, "reusing repaired value");
            return Ok(fix.value.clone());
        }
        let site = match site {
            Ok(site) => site,
            Err(err) => return Err(self.abandon_or_abort(err)),
        };
        let base = base.unwrap_or_else(|| site.key());

        let value = self.ask_value(&*owner, &repair)?;
        let persisted = if repair.placeholderize {
            owner.placeholders_mut().replace_with_placeholders(&value)
        } else {
            value
        };
        let new_value = if repair.numeric {
            Expr::Num(persisted.clone())
        } else {
            Expr::string(persisted.as_str())
        };
        let outcome = match self.patcher.patch_value(&site, &repair.old, &new_value, row) {
            Ok(outcome) => outcome,
            Err(err @ RemendarError::PatchTargetNotFound { .. }) => return Err(self.abandon_or_abort(err)),
            Err(err) => return Err(err),
        };
        info!(
            kind = ?repair.cache,
            key = %base,
            value = %persisted,
            target = ?outcome.target,
            "value repaired"
        );
        self.session.caches.insert_for_row(
            repair.cache,
            &base,
            row,
            FixRecord::new(outcome.target.origin(), persisted.clone()),
        );
        Ok(persisted)
    }

    // ------------------------------------------------------------------
    // Locator operations
    // ------------------------------------------------------------------

    fn perform(
        owner: &mut dyn PageCapabilities,
        locator: &LocatorHandle,
        action: Action,
        value: Option<&str>,
    ) -> RemendarResult<()> {
        let page = owner.page();
        let selector = locator.selector();
        let value = if action.takes_value() {
            let raw = value.ok_or_else(|| {
                RemendarError::value_invalid(format!(
                    "{} on {} received no value",
                    action.name(),
                    locator.cache_key()
                ))
            })?;
            owner.placeholders_mut().replace_with_values(raw)?
        } else {
            String::new()
        };
        match action {
            Action::Click => page.click(&selector),
            Action::Check => page.check(&selector),
            Action::Fill => page.fill(&selector, &value),
            Action::SelectOption => page.select_option(&selector, &value),
            Action::SetInputFiles => page.set_input_files(&selector, &value),
        }
    }

    fn locator_action(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        action: Action,
        value: Option<&str>,
    ) -> RemendarResult<()> {
        locator.set_keyword(owner.keyword().map(str::to_string));
        let operation = format!("{} {}", action.name(), locator.cache_key());
        let mut call = LocatorCall {
            owner,
            locator,
            value: value.map(str::to_string),
        };
        self.heal(
            operation,
            &mut call,
            action.takes_value(),
            |c| Self::perform(&mut *c.owner, &*c.locator, action, c.value.as_deref()),
            |this, c, repair| match repair {
                Repair::Locator => this.repair_locator(&*c.owner, c.locator),
                Repair::Value => {
                    let fix = ValueRepair::argument(
                        CacheKind::Parameter,
                        "argument",
                        0,
                        c.value.as_deref(),
                        format!("{} on {} needs a value", action.name(), c.locator.cache_key()),
                    );
                    c.value = Some(this.repair_value(&mut *c.owner, fix)?);
                    Ok(())
                }
            },
        )
    }

    /// Click the element
    pub fn click(&mut self, owner: &mut dyn PageCapabilities, locator: &mut LocatorHandle) -> RemendarResult<()> {
        self.locator_action(owner, locator, Action::Click, None)
    }

    /// Check a checkbox or radio button
    pub fn check(&mut self, owner: &mut dyn PageCapabilities, locator: &mut LocatorHandle) -> RemendarResult<()> {
        self.locator_action(owner, locator, Action::Check, None)
    }

    /// Fill a form control; `None` is a missing argument
    pub fn fill(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        value: Option<&str>,
    ) -> RemendarResult<()> {
        self.locator_action(owner, locator, Action::Fill, value)
    }

    /// Select an option by value or label
    pub fn select_option(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        value: Option<&str>,
    ) -> RemendarResult<()> {
        self.locator_action(owner, locator, Action::SelectOption, value)
    }

    /// Attach a file to a file input
    pub fn set_input_files(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        path: Option<&str>,
    ) -> RemendarResult<()> {
        self.locator_action(owner, locator, Action::SetInputFiles, path)
    }

    // ------------------------------------------------------------------
    // Expectations
    // ------------------------------------------------------------------

    fn check_string(
        owner: &mut dyn PageCapabilities,
        locator: &LocatorHandle,
        kind: Expectation,
        expected: Option<&str>,
    ) -> RemendarResult<()> {
        let page = owner.page();
        let doc = page.as_document();
        let element = resolve_single(doc, &locator.selector())?;
        let raw = expected
            .ok_or_else(|| RemendarError::value_invalid(format!("{} is missing", kind.label())))?;
        let expected = owner.placeholders_mut().replace_with_values(raw)?;
        let (expected, actual) = match kind {
            Expectation::Text => (normalize_space(&expected), doc.text_content(element)?),
            Expectation::Value => (expected, doc.input_value(element)?.unwrap_or_default()),
        };
        if actual == expected {
            Ok(())
        } else {
            Err(RemendarError::value_invalid(format!(
                "{} of {} is '{actual}', {} '{expected}'",
                match kind {
                    Expectation::Text => "text",
                    Expectation::Value => "value",
                },
                locator.cache_key(),
                kind.label()
            )))
        }
    }

    fn expect_string(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        kind: Expectation,
        expected: Option<&str>,
    ) -> RemendarResult<()> {
        locator.set_keyword(owner.keyword().map(str::to_string));
        let operation = format!("expect {} {}", kind.label(), locator.cache_key());
        let mut call = LocatorCall {
            owner,
            locator,
            value: expected.map(str::to_string),
        };
        self.heal(
            operation,
            &mut call,
            true,
            |c| Self::check_string(&mut *c.owner, &*c.locator, kind, c.value.as_deref()),
            |this, c, repair| match repair {
                Repair::Locator => this.repair_locator(&*c.owner, c.locator),
                Repair::Value => {
                    let old = c.value.clone().unwrap_or_else(|| "None".to_string());
                    let fix = ValueRepair::argument(
                        CacheKind::Expected,
                        kind.label(),
                        0,
                        c.value.as_deref(),
                        format!("{} of {}", kind.label(), c.locator.cache_key()),
                    )
                    .keyed(CacheBase::Expected(old));
                    c.value = Some(this.repair_value(&mut *c.owner, fix)?);
                    Ok(())
                }
            },
        )
    }

    /// Expect the element's normalized text to equal `expected`
    pub fn expect_text(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        expected: Option<&str>,
    ) -> RemendarResult<()> {
        self.expect_string(owner, locator, Expectation::Text, expected)
    }

    /// Expect the form control's value to equal `expected`
    pub fn expect_value(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        expected: Option<&str>,
    ) -> RemendarResult<()> {
        self.expect_string(owner, locator, Expectation::Value, expected)
    }

    fn check_count(owner: &dyn PageCapabilities, locator: &LocatorHandle, expected: usize) -> RemendarResult<()> {
        let selector = locator.selector();
        let actual = owner.page().count(&selector)?;
        if actual == 0 && expected > 0 {
            return Err(RemendarError::locator_invalid(
                selector.as_str(),
                "no element matches",
            ));
        }
        if actual == expected {
            Ok(())
        } else {
            Err(RemendarError::value_invalid(format!(
                "{} matches {actual} elements, expected count {expected}",
                locator.cache_key()
            )))
        }
    }

    /// Expect the locator to match `expected` elements
    pub fn expect_count(
        &mut self,
        owner: &mut dyn PageCapabilities,
        locator: &mut LocatorHandle,
        expected: usize,
    ) -> RemendarResult<()> {
        locator.set_keyword(owner.keyword().map(str::to_string));
        let operation = format!("expect count {}", locator.cache_key());
        let mut call = LocatorCall {
            owner,
            locator,
            value: Some(expected.to_string()),
        };
        self.heal(
            operation,
            &mut call,
            true,
            |c| {
                let expected = c.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(expected);
                Self::check_count(&*c.owner, &*c.locator, expected)
            },
            |this, c, repair| match repair {
                Repair::Locator => this.repair_locator(&*c.owner, c.locator),
                Repair::Value => {
                    let old = c.value.clone().unwrap_or_else(|| expected.to_string());
                    let actual = c.owner.page().count(&c.locator.selector())?;
                    let mut fix = ValueRepair::argument(
                        CacheKind::Expected,
                        "expected count",
                        0,
                        None,
                        format!("number of elements matching {}", c.locator.cache_key()),
                    )
                    .keyed(CacheBase::Expected(old.clone()))
                    .without_pick()
                    .verbatim();
                    fix.old = Expr::Num(old);
                    fix.initial = actual.to_string();
                    fix.numeric = true;
                    c.value = Some(this.repair_value(&mut *c.owner, fix)?);
                    Ok(())
                }
            },
        )
    }

    // ------------------------------------------------------------------
    // Page-object operations
    // ------------------------------------------------------------------

    fn navigate(owner: &mut dyn PageCapabilities, url: Option<&str>, record_mode: bool) -> RemendarResult<()> {
        let raw = url.ok_or_else(|| {
            RemendarError::value_invalid(format!("{} was given no page url", owner.type_name()))
        })?;
        let resolved = owner.placeholders_mut().replace_with_values(raw)?;
        match owner.page().goto(&resolved) {
            Err(RemendarError::Navigation { url, message }) if record_mode => Err(
                RemendarError::value_invalid(format!("cannot open {url}: {message}")),
            ),
            other => other,
        }
    }

    /// Navigate to `url` after placeholder substitution
    pub fn goto(&mut self, owner: &mut dyn PageCapabilities, url: Option<&str>) -> RemendarResult<()> {
        let operation = format!("goto {}", owner.cache_key());
        let record_mode = self.session.record_mode();
        let mut call = PageCall {
            owner,
            first: url.map(str::to_string),
            second: None,
        };
        self.heal(
            operation,
            &mut call,
            true,
            |c| Self::navigate(&mut *c.owner, c.first.as_deref(), record_mode),
            |this, c, _| {
                let fix = ValueRepair::argument(
                    CacheKind::Parameter,
                    "page url",
                    0,
                    c.first.as_deref(),
                    format!("url to open for {}", c.owner.type_name()),
                )
                .keyed(CacheBase::Fixed(c.owner.cache_key()))
                .without_pick();
                c.first = Some(this.repair_value(&mut *c.owner, fix)?);
                Ok(())
            },
        )
    }

    /// Set the keyword used by the page object's locators; `None` is a missing argument
    pub fn set_keyword(&mut self, owner: &mut dyn PageCapabilities, keyword: Option<&str>) -> RemendarResult<()> {
        let operation = format!("set_keyword {}", owner.cache_key());
        let mut call = PageCall {
            owner,
            first: keyword.map(str::to_string),
            second: None,
        };
        self.heal(
            operation,
            &mut call,
            true,
            |c| {
                let raw = c
                    .first
                    .as_deref()
                    .ok_or_else(|| RemendarError::value_invalid("keyword is missing"))?;
                let keyword = c.owner.placeholders_mut().replace_with_values(raw)?;
                debug!(%keyword, "keyword set");
                c.owner.set_keyword(Some(keyword));
                Ok(())
            },
            |this, c, _| {
                let fix = ValueRepair::argument(
                    CacheKind::Keyword,
                    "keyword",
                    0,
                    c.first.as_deref(),
                    format!("keyword for {}", c.owner.type_name()),
                );
                c.first = Some(this.repair_value(&mut *c.owner, fix)?);
                Ok(())
            },
        )
    }

    /// Clear the keyword of the page object
    pub fn reset_keyword(&mut self, owner: &mut dyn PageCapabilities) {
        debug!(owner = %owner.cache_key(), "keyword reset");
        owner.set_keyword(None);
    }

    /// Register a placeholder.
    ///
    /// A missing or empty name, or an explicitly empty value, is repaired;
    /// a `None` value leaves the placeholder to lazy resolution.
    pub fn add_placeholder(
        &mut self,
        owner: &mut dyn PageCapabilities,
        name: Option<&str>,
        value: Option<&str>,
    ) -> RemendarResult<()> {
        let operation = format!("add_placeholder {}", owner.cache_key());
        let mut call = PageCall {
            owner,
            first: name.map(str::to_string),
            second: value.map(str::to_string),
        };
        self.heal(
            operation,
            &mut call,
            true,
            |c| {
                let name = c
                    .first
                    .as_deref()
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| RemendarError::value_invalid("placeholder name is missing"))?;
                if c.second.as_deref() == Some("") {
                    return Err(RemendarError::value_invalid(format!(
                        "placeholder {name} has an empty value"
                    )));
                }
                c.owner.placeholders_mut().add(name, c.second.clone());
                Ok(())
            },
            |this, c, _| {
                if c.first.as_deref().map_or(true, |n| n.trim().is_empty()) {
                    let fix = ValueRepair::argument(
                        CacheKind::Placeholder,
                        "placeholder name",
                        0,
                        c.first.as_deref(),
                        "name of the placeholder to register".to_string(),
                    )
                    .without_pick()
                    .verbatim();
                    c.first = Some(this.repair_value(&mut *c.owner, fix)?);
                }
                if c.second.as_deref() == Some("") {
                    let name = c.first.clone().unwrap_or_default();
                    let fix = ValueRepair::argument(
                        CacheKind::Placeholder,
                        "placeholder value",
                        1,
                        c.second.as_deref(),
                        format!("value of placeholder {name}"),
                    )
                    .verbatim();
                    c.second = Some(this.repair_value(&mut *c.owner, fix)?);
                }
                Ok(())
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{CliOverrides, ValueSources};
    use crate::dom::{Document, ElementRef, Page};
    use crate::selector::Selector;
    use crate::mock::{login_form, product_grid, MockAction, MockDocument};
    use crate::oracle::{ScriptedOracle, ScriptedReply};
    use crate::page_object::PageContext;
    use crate::patch::{MemorySourceStore, RecordedCallStack, StackFrame};
    use crate::placeholder::PlaceholderResolver;

    const LOGIN_PAGE: &str = "\
class LoginPage:
    def __init__(self, page):
        self.page = page
        self.username_input = SmartLocator(self, \"#user\")
        self.error_message = SmartLocator(self, \"h3\")

    def login(self, username, password):
        self.username_input.fill(username)
";

    const TEST_LOGIN: &str = "\
from pages.login_page import LoginPage


def test_login(page):
    login_page = LoginPage(page)
    login_page.login(None, 'secret_sauce')
    expect(login_page.error_message).to_have_text('Wrong')
";

    const TEST_ROWS: &str = "\
import pytest
from pages.login_page import LoginPage


@pytest.mark.parametrize(\"username, password\", [
    (None, 'secret_sauce'),
    (None, 'secret_sauce'),
])
def test_rows(page, username, password):
    LoginPage(page).login(username, password)
";

    const INVENTORY_PAGE: &str = "\
class InventoryPage:
    def __init__(self, page):
        self.product_link = SmartLocator(self, \"//a[@title='#KEYWORD#']\")
        self.add_buttons = SmartLocator(self, \"button.btn_inventory\")
";

    const TEST_INVENTORY: &str = "\
def test_inventory(page):
    inventory = InventoryPage(page)
    inventory.goto(None)
    inventory.set_keyword(None)
    expect(inventory.add_buttons).to_have_count(2)
    inventory.add_placeholder('user', '')
";

    struct Fixture {
        doc: Rc<MockDocument>,
        store: MemorySourceStore,
        stack: RecordedCallStack,
        oracle: ScriptedOracle,
        coordinator: Coordinator,
        owner: PageContext,
    }

    fn fixture(doc: MockDocument, owner_type: &str, page_file: &str, record_mode: bool) -> Fixture {
        let config = RecordConfig::default().with_record_mode(record_mode);
        let store = MemorySourceStore::new()
            .with_file("pages/login_page.py", LOGIN_PAGE)
            .with_file("pages/inventory_page.py", INVENTORY_PAGE)
            .with_file("tests/test_login.py", TEST_LOGIN)
            .with_file("tests/test_rows.py", TEST_ROWS)
            .with_file("tests/test_inventory.py", TEST_INVENTORY);
        let stack = RecordedCallStack::new();
        let oracle = ScriptedOracle::default();
        let doc = Rc::new(doc);
        let sources = ValueSources::with_env(CliOverrides::default(), config.clone(), Vec::new());
        let owner = PageContext::with_placeholders(
            owner_type,
            page_file,
            Rc::clone(&doc) as Rc<dyn Page>,
            config.clone(),
            PlaceholderResolver::new(sources),
        );
        let coordinator = Coordinator::new(
            SessionContext::new(config.clone()),
            Box::new(oracle.clone()),
            SourcePatchEngine::new(Rc::new(store.clone()), &config),
            Rc::new(stack.clone()),
        );
        Fixture {
            doc,
            store,
            stack,
            oracle,
            coordinator,
            owner,
        }
    }

    fn login_fixture(record_mode: bool) -> Fixture {
        fixture(login_form(), "LoginPage", "pages/login_page.py", record_mode)
    }

    fn element(doc: &MockDocument, css: &str) -> ElementRef {
        doc.query_all(&Selector::css(css)).unwrap()[0]
    }

    fn line(store: &MemorySourceStore, file: &str, n: usize) -> String {
        store.contents(file).unwrap().lines().nth(n - 1).unwrap().to_string()
    }

    fn handle(f: &Fixture, field: &str, selector: &str) -> LocatorHandle {
        f.owner.locator(field, selector, f.coordinator.session().caches())
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_typed_selector_is_persisted() {
            let mut f = login_fixture(true);
            f.oracle.push(ScriptedReply::Text("#user-name".to_string()));
            let mut username = handle(&f, "username_input", "#user");
            f.coordinator
                .fill(&mut f.owner, &mut username, Some("standard_user"))
                .unwrap();

            let input = element(&f.doc, "#user-name");
            assert!(f.doc.actions().contains(&MockAction::Fill(input, "standard_user".to_string())));
            assert_eq!(
                line(&f.store, "pages/login_page.py", 4),
                "        self.username_input = SmartLocator(self, '#user-name')"
            );
            assert_eq!(username.template(), "#user-name");
            assert_eq!(
                f.coordinator.history(),
                &[
                    HealState::Idle,
                    HealState::Executing,
                    HealState::Failed,
                    HealState::Repairing,
                    HealState::Retrying,
                    HealState::Executing,
                    HealState::Success
                ]
            );
            let fix = f
                .coordinator
                .session()
                .caches()
                .get(CacheKind::Selector, "LoginPage.username_input")
                .unwrap();
            assert_eq!(fix.value, "#user-name");
        }

        #[test]
        fn test_picked_element_is_synthesized() {
            let mut f = login_fixture(true);
            let input = element(&f.doc, "#user-name");
            for reply in [
                ScriptedReply::KeepInitial,
                ScriptedReply::Pick(input),
                ScriptedReply::Confirm(true),
            ] {
                f.oracle.push(reply);
            }
            let mut username = handle(&f, "username_input", "#user");
            f.coordinator.click(&mut f.owner, &mut username).unwrap();
            assert_eq!(f.oracle.asked().len(), 3);
            assert!(f.oracle.asked()[2].contains("#user-name"));
            assert_eq!(f.doc.actions(), vec![MockAction::Click(input)]);
        }

        #[test]
        fn test_declined_candidate_asks_again() {
            let mut f = login_fixture(true);
            let input = element(&f.doc, "#user-name");
            for reply in [
                ScriptedReply::KeepInitial,
                ScriptedReply::Pick(input),
                ScriptedReply::Confirm(false),
                ScriptedReply::Text("input[name='user-name']".to_string()),
            ] {
                f.oracle.push(reply);
            }
            let mut username = handle(&f, "username_input", "#user");
            f.coordinator.check(&mut f.owner, &mut username).unwrap();
            assert_eq!(username.template(), "input[name='user-name']");
            assert!(f.doc.is_checked(input));
        }

        #[test]
        fn test_no_repair_outside_record_mode() {
            let mut f = login_fixture(false);
            let mut username = handle(&f, "username_input", "#user");
            let err = f.coordinator.click(&mut f.owner, &mut username).unwrap_err();
            assert_eq!(err.failure_class(), FailureClass::LocatorInvalid);
            assert!(f.oracle.asked().is_empty());
            assert_eq!(f.coordinator.state(), HealState::Aborted);
            assert_eq!(f.store.write_count(), 0);
        }

        #[test]
        fn test_second_failure_is_not_retried() {
            let mut f = login_fixture(true);
            f.oracle.push(ScriptedReply::Text("#still-wrong".to_string()));
            let mut username = handle(&f, "username_input", "#user");
            let err = f.coordinator.click(&mut f.owner, &mut username).unwrap_err();
            assert_eq!(err.failure_class(), FailureClass::LocatorInvalid);
            assert_eq!(f.oracle.asked().len(), 1);
            assert_eq!(f.coordinator.state(), HealState::Aborted);
            assert_eq!(
                f.coordinator.history().iter().filter(|s| **s == HealState::Executing).count(),
                2
            );
        }

        #[test]
        fn test_cancel_aborts() {
            let mut f = login_fixture(true);
            let mut username = handle(&f, "username_input", "#user");
            let err = f.coordinator.click(&mut f.owner, &mut username).unwrap_err();
            assert!(matches!(err, RemendarError::UserCancelled));
            assert_eq!(f.coordinator.state(), HealState::Aborted);
        }

        #[test]
        fn test_keyword_is_persisted_as_token() {
            let mut f = fixture(
                product_grid(&["Sauce Labs Backpack", "Bike Light"]),
                "InventoryPage",
                "pages/inventory_page.py",
                true,
            );
            f.owner.set_keyword(Some("Bike Light".to_string()));
            f.oracle
                .push(ScriptedReply::Text("//a[normalize-space(.)='Bike Light']".to_string()));
            let mut link = handle(&f, "product_link", "//a[@title='#KEYWORD#']");
            f.coordinator.click(&mut f.owner, &mut link).unwrap();
            assert_eq!(
                line(&f.store, "pages/inventory_page.py", 3),
                "        self.product_link = SmartLocator(self, \"//a[normalize-space(.)='#KEYWORD#']\")"
            );
            assert_eq!(link.template(), "//a[normalize-space(.)='#KEYWORD#']");
            let link_el = f.doc.query_all(&link.selector()).unwrap();
            assert_eq!(f.doc.actions(), vec![MockAction::Click(link_el[0])]);
        }
    }

    mod value_tests {
        use super::*;

        fn login_stack(f: &Fixture) {
            f.stack.push(StackFrame::new("tests/test_login.py", 6).in_function("test_login"));
            f.stack.push(StackFrame::new("pages/login_page.py", 8).in_function("login"));
        }

        #[test]
        fn test_missing_argument_patched_inline() {
            let mut f = login_fixture(true);
            login_stack(&f);
            f.oracle.push(ScriptedReply::Text("standard_user".to_string()));
            let mut username = handle(&f, "username_input", "#user-name");
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();
            assert_eq!(
                line(&f.store, "tests/test_login.py", 6),
                "    login_page.login('standard_user', 'secret_sauce')"
            );
            let input = element(&f.doc, "#user-name");
            assert_eq!(f.doc.actions(), vec![MockAction::Fill(input, "standard_user".to_string())]);
            let fix = f
                .coordinator
                .session()
                .caches()
                .get(CacheKind::Parameter, "tests/test_login.py:6[0]")
                .unwrap();
            assert_eq!(fix.origin, FixOrigin::Inline);

            // same call again: the cached repair is used without asking
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();
            assert_eq!(f.oracle.asked().len(), 1);
        }

        #[test]
        fn test_human_value_is_parametrized() {
            let mut f = login_fixture(true);
            login_stack(&f);
            f.owner
                .placeholders_mut()
                .add("user", Some("standard_user".to_string()));
            f.oracle.push(ScriptedReply::Text("standard_user".to_string()));
            let mut username = handle(&f, "username_input", "#user-name");
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();
            assert_eq!(
                line(&f.store, "tests/test_login.py", 6),
                "    login_page.login('#USER#', 'secret_sauce')"
            );
            let input = element(&f.doc, "#user-name");
            assert_eq!(f.doc.actions(), vec![MockAction::Fill(input, "standard_user".to_string())]);
        }

        #[test]
        fn test_unresolved_placeholder_is_fatal() {
            let mut f = login_fixture(true);
            f.owner.placeholders_mut().add("secret", None);
            let mut username = handle(&f, "username_input", "#user-name");
            let err = f
                .coordinator
                .fill(&mut f.owner, &mut username, Some("#SECRET#"))
                .unwrap_err();
            assert!(matches!(err, RemendarError::PlaceholderUnresolved { .. }));
            assert!(f.oracle.asked().is_empty());
        }

        #[test]
        fn test_unpatchable_site_abandoned() {
            let mut f = login_fixture(true);
            f.stack.push(StackFrame::new("lib/glue.py", 3));
            f.oracle.push(ScriptedReply::Confirm(true));
            let mut username = handle(&f, "username_input", "#user-name");
            let err = f.coordinator.fill(&mut f.owner, &mut username, None).unwrap_err();
            assert!(matches!(err, RemendarError::PatchTargetNotFound { .. }));
            assert_eq!(f.coordinator.state(), HealState::Aborted);
        }

        #[test]
        fn test_unpatchable_site_declined_aborts_recording() {
            let mut f = login_fixture(true);
            f.stack.push(StackFrame::new("lib/glue.py", 3));
            f.oracle.push(ScriptedReply::Confirm(false));
            let mut username = handle(&f, "username_input", "#user-name");
            let err = f.coordinator.fill(&mut f.owner, &mut username, None).unwrap_err();
            assert!(matches!(err, RemendarError::RecordingAborted { .. }));
        }

        #[test]
        fn test_expected_text_from_live_element() {
            let mut f = login_fixture(true);
            f.stack.push(StackFrame::new("tests/test_login.py", 7));
            let h3 = element(&f.doc, "h3");
            for reply in [
                ScriptedReply::KeepInitial,
                ScriptedReply::Pick(h3),
                ScriptedReply::Confirm(true),
            ] {
                f.oracle.push(reply);
            }
            let mut error = handle(&f, "error_message", "h3");
            f.coordinator
                .expect_text(&mut f.owner, &mut error, Some("Wrong"))
                .unwrap();
            assert_eq!(
                line(&f.store, "tests/test_login.py", 7),
                "    expect(login_page.error_message).to_have_text('Epic sadface: Username is required')"
            );
            assert!(f
                .coordinator
                .session()
                .caches()
                .get(CacheKind::Expected, "tests/test_login.py::Wrong")
                .is_some());
        }

        #[test]
        fn test_expect_value_matches() {
            let mut f = login_fixture(true);
            let mut submit = handle(&f, "login_button", "#login-button");
            f.coordinator
                .expect_value(&mut f.owner, &mut submit, Some("Login"))
                .unwrap();
            assert!(f.oracle.asked().is_empty());
        }
    }

    mod cache_tests {
        use super::*;

        #[test]
        fn test_rows_share_selector_fix_but_not_values() {
            let mut f = login_fixture(true);
            f.stack.push(StackFrame::new("tests/test_rows.py", 10).in_function("test_rows"));
            f.stack.push(StackFrame::new("pages/login_page.py", 8).in_function("login"));
            for reply in ["alice", "#user-name", "bob"] {
                f.oracle.push(ScriptedReply::Text(reply.to_string()));
            }

            f.coordinator.enter_test("tests/test_rows.py::test_rows[row0]", Some(0));
            let mut username = handle(&f, "username_input", "#user");
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();

            assert_eq!(
                f.coordinator.enter_test("tests/test_rows.py::test_rows[row1]", Some(1)),
                TestTransition::NextRow
            );
            let mut username = handle(&f, "username_input", "#user");
            assert_eq!(username.template(), "#user-name");
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();

            assert_eq!(f.oracle.asked().len(), 3);
            assert_eq!(line(&f.store, "tests/test_rows.py", 6), "    ('alice', 'secret_sauce'),");
            assert_eq!(line(&f.store, "tests/test_rows.py", 7), "    ('bob', 'secret_sauce'),");
            assert_eq!(
                line(&f.store, "pages/login_page.py", 4),
                "        self.username_input = SmartLocator(self, '#user-name')"
            );

            // row 0 again: its own repair is reused
            f.coordinator.enter_test("tests/test_rows.py::test_rows[row0]", Some(0));
            f.coordinator.fill(&mut f.owner, &mut username, None).unwrap();
            assert_eq!(f.oracle.asked().len(), 3);
            let input = element(&f.doc, "#user-name");
            assert_eq!(
                f.doc.actions().last(),
                Some(&MockAction::Fill(input, "alice".to_string()))
            );

            f.coordinator.enter_test("tests/test_login.py::test_login", None);
            let caches = f.coordinator.session().caches();
            assert_eq!(caches.len(CacheKind::Parameter), 0);
            assert_eq!(caches.len(CacheKind::Selector), 1);
        }
    }

    mod page_tests {
        use super::*;

        fn inventory() -> Fixture {
            fixture(
                product_grid(&["Sauce Labs Backpack", "Bike Light", "Onesie"]),
                "InventoryPage",
                "pages/inventory_page.py",
                true,
            )
        }

        #[test]
        fn test_goto_missing_url() {
            let mut f = inventory();
            f.stack.push(StackFrame::new("tests/test_inventory.py", 3));
            f.owner
                .placeholders_mut()
                .add("base_url", Some("https://shop.test".to_string()));
            f.oracle
                .push(ScriptedReply::Text("https://shop.test/inventory.html".to_string()));
            f.coordinator.goto(&mut f.owner, None).unwrap();
            assert_eq!(
                line(&f.store, "tests/test_inventory.py", 3),
                "    inventory.goto('#BASE_URL#/inventory.html')"
            );
            assert_eq!(f.doc.current_url(), "https://shop.test/inventory.html");
            let fix = f
                .coordinator
                .session()
                .caches()
                .get(CacheKind::Parameter, "InventoryPage@pages/inventory_page.py")
                .unwrap();
            assert_eq!(fix.value, "#BASE_URL#/inventory.html");

            f.coordinator.goto(&mut f.owner, None).unwrap();
            assert_eq!(f.oracle.asked().len(), 1);
        }

        #[test]
        fn test_navigation_failure() {
            let mut f = inventory();
            f.doc.fail_navigation_to("https://old.test");
            let mut plain = fixture(product_grid(&["A"]), "InventoryPage", "pages/inventory_page.py", false);
            plain.doc.fail_navigation_to("https://old.test");
            let err = plain.coordinator.goto(&mut plain.owner, Some("https://old.test")).unwrap_err();
            assert!(matches!(err, RemendarError::Navigation { .. }));

            f.stack.push(StackFrame::new("tests/test_inventory.py", 3));
            f.oracle.push(ScriptedReply::Text("https://new.test".to_string()));
            // the call site holds None, not the failing url
            let err = f.coordinator.goto(&mut f.owner, Some("https://old.test")).unwrap_err();
            assert!(matches!(err, RemendarError::RecordingAborted { .. }));
        }

        #[test]
        fn test_missing_keyword() {
            let mut f = inventory();
            f.stack.push(StackFrame::new("tests/test_inventory.py", 4));
            f.oracle.push(ScriptedReply::Text("Bike Light".to_string()));
            f.coordinator.set_keyword(&mut f.owner, None).unwrap();
            assert_eq!(f.owner.keyword(), Some("Bike Light"));
            assert_eq!(
                line(&f.store, "tests/test_inventory.py", 4),
                "    inventory.set_keyword('Bike Light')"
            );
            assert_eq!(f.coordinator.session().caches().len(CacheKind::Keyword), 1);
            f.coordinator.reset_keyword(&mut f.owner);
            assert_eq!(f.owner.keyword(), None);
        }

        #[test]
        fn test_expected_count_repaired() {
            let mut f = inventory();
            f.stack.push(StackFrame::new("tests/test_inventory.py", 5));
            f.oracle.push(ScriptedReply::KeepInitial);
            let mut buttons = handle(&f, "add_buttons", "button.btn_inventory");
            f.coordinator.expect_count(&mut f.owner, &mut buttons, 2).unwrap();
            assert_eq!(
                line(&f.store, "tests/test_inventory.py", 5),
                "    expect(inventory.add_buttons).to_have_count(3)"
            );
        }

        #[test]
        fn test_empty_placeholder_value() {
            let mut f = inventory();
            f.stack.push(StackFrame::new("tests/test_inventory.py", 6));
            f.oracle.push(ScriptedReply::Text("standard_user".to_string()));
            f.coordinator
                .add_placeholder(&mut f.owner, Some("user"), Some(""))
                .unwrap();
            assert_eq!(f.owner.placeholders().get("USER"), Some("standard_user"));
            assert_eq!(
                line(&f.store, "tests/test_inventory.py", 6),
                "    inventory.add_placeholder('user', 'standard_user')"
            );
        }
    }
}
