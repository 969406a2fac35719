//! Chromium-backed [`Page`] over the Chrome `DevTools` Protocol.
//!
//! The engine's capability traits are synchronous, so [`CdpPage`] owns a
//! tokio runtime and drives chromiumoxide with `block_on`. Element handles
//! are indices into a registry kept on the page (`window.__remendar`); a
//! navigation drops the registry together with the old document.

use std::cell::RefCell;
use std::future::Future;
use std::time::Duration;

use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page as CdpTab;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::{RecordConfig, DEFAULT_TIMEOUT_MS};
use crate::dom::{resolve_single, BoundingBox, Document, ElementDescriptor, ElementRef, Page};
use crate::result::{RemendarError, RemendarResult};
use crate::selector::Selector;

/// Installs the element registry once per document and evaluates to it
const REGISTRY: &str = r"(() => {
  if (!window.__remendar) {
    const r = { nodes: [], hovered: null };
    r.id = (el) => {
      let i = r.nodes.indexOf(el);
      if (i < 0) { r.nodes.push(el); i = r.nodes.length - 1; }
      return i;
    };
    r.get = (i) => {
      const el = r.nodes[i];
      if (!el || !el.isConnected) throw new Error('No node found for element ' + i);
      return el;
    };
    r.query = (kind, sel) => {
      if (kind === 'xpath') {
        const out = [];
        const snap = document.evaluate(sel, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let k = 0; k < snap.snapshotLength; k++) {
          const n = snap.snapshotItem(k);
          if (n.nodeType === 1) out.push(n);
        }
        return out;
      }
      return Array.from(document.querySelectorAll(sel));
    };
    r.norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    document.addEventListener('mouseover', (e) => { r.hovered = e.target; }, true);
    window.__remendar = r;
  }
  return window.__remendar;
})()";

/// Launch options for [`CdpPage`]
#[derive(Debug, Clone)]
pub struct CdpOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Per-call timeout
    pub timeout_ms: u64,
    /// Outline elements before interacting with them
    pub highlight: bool,
}

impl Default for CdpOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            highlight: false,
        }
    }
}

impl CdpOptions {
    /// Options taking timeout and highlighting from a record configuration
    #[must_use]
    pub fn from_config(config: &RecordConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            highlight: config.highlight,
            ..Self::default()
        }
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

fn automation(e: impl std::fmt::Display) -> RemendarError {
    RemendarError::Automation {
        message: e.to_string(),
    }
}

fn js_string(s: &str) -> RemendarResult<String> {
    Ok(serde_json::to_string(s)?)
}

fn selector_args(selector: &Selector) -> RemendarResult<String> {
    let kind = if selector.is_xpath() { "xpath" } else { "css" };
    Ok(format!("'{kind}', {}", js_string(selector.as_str())?))
}

/// A live chromium tab
pub struct CdpPage {
    runtime: tokio::runtime::Runtime,
    browser: RefCell<Option<CdpBrowser>>,
    handler: tokio::task::JoinHandle<()>,
    tab: CdpTab,
    options: CdpOptions,
    url: RefCell<String>,
}

impl std::fmt::Debug for CdpPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpPage")
            .field("options", &self.options)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl CdpPage {
    /// Launch chromium with options derived from `config`
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched
    pub fn launch(config: &RecordConfig) -> RemendarResult<Self> {
        Self::launch_with(CdpOptions::from_config(config))
    }

    /// Launch chromium and open a blank tab
    ///
    /// # Errors
    ///
    /// Returns error if the runtime or the browser cannot be started
    pub fn launch_with(options: CdpOptions) -> RemendarResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let mut builder = CdpConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(automation)?;

        let (browser, handler, tab) = runtime.block_on(async move {
            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(automation)?;
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            let tab = browser.new_page("about:blank").await.map_err(automation)?;
            Ok::<_, RemendarError>((browser, handle, tab))
        })?;
        info!(headless = options.headless, timeout_ms = options.timeout_ms, "browser launched");

        Ok(Self {
            runtime,
            browser: RefCell::new(Some(browser)),
            handler,
            tab,
            options,
            url: RefCell::new("about:blank".to_string()),
        })
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns error if the browser does not shut down cleanly
    pub fn close(self) -> RemendarResult<()> {
        let browser = self.browser.borrow_mut().take();
        if let Some(mut browser) = browser {
            self.runtime.block_on(async move {
                browser.close().await.map_err(automation)?;
                let _ = browser.wait().await;
                Ok::<_, RemendarError>(())
            })?;
        }
        self.handler.abort();
        Ok(())
    }

    fn block_on<T>(&self, fut: impl Future<Output = RemendarResult<T>>) -> RemendarResult<T> {
        let ms = self.options.timeout_ms;
        self.runtime.block_on(async move {
            tokio::time::timeout(Duration::from_millis(ms), fut)
                .await
                .map_err(|_| RemendarError::Timeout { ms })?
        })
    }

    /// Evaluate `body` as a function body with `r` bound to the registry
    fn eval<T: DeserializeOwned>(&self, body: &str) -> RemendarResult<T> {
        let script = format!("(() => {{ const r = {REGISTRY}; {body} }})()");
        let tab = self.tab.clone();
        self.block_on(async move {
            let result = tab.evaluate(script.as_str()).await.map_err(automation)?;
            result.into_value::<T>().map_err(automation)
        })
    }

    fn on_element<T: DeserializeOwned>(&self, element: ElementRef, body: &str) -> RemendarResult<T> {
        self.eval(&format!("const el = r.get({}); {body}", element.0))
    }

    fn target(&self, selector: &Selector) -> RemendarResult<ElementRef> {
        let element = resolve_single(self, selector)?;
        if self.options.highlight {
            let _: bool = self.on_element(
                element,
                "el.scrollIntoView({ block: 'center' }); el.style.outline = '2px solid #e5383b'; return true;",
            )?;
        }
        Ok(element)
    }
}

impl Document for CdpPage {
    fn query_all(&self, selector: &Selector) -> RemendarResult<Vec<ElementRef>> {
        let ids: Vec<u64> =
            self.eval(&format!("return r.query({}).map(r.id);", selector_args(selector)?))?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    fn describe(&self, element: ElementRef) -> RemendarResult<ElementDescriptor> {
        self.on_element(
            element,
            "return { tag: el.tagName.toLowerCase(), \
             attributes: Array.from(el.attributes).map((a) => [a.name, a.value]) };",
        )
    }

    fn parent(&self, element: ElementRef) -> RemendarResult<Option<ElementRef>> {
        let id: Option<u64> =
            self.on_element(element, "const p = el.parentElement; return p ? r.id(p) : null;")?;
        Ok(id.map(ElementRef))
    }

    fn children(&self, element: ElementRef) -> RemendarResult<Vec<ElementRef>> {
        let ids: Vec<u64> = self.on_element(element, "return Array.from(el.children).map(r.id);")?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    fn direct_text(&self, element: ElementRef) -> RemendarResult<String> {
        self.on_element(
            element,
            "return r.norm(Array.from(el.childNodes)\
             .filter((n) => n.nodeType === 3).map((n) => n.textContent).join(' '));",
        )
    }

    fn text_content(&self, element: ElementRef) -> RemendarResult<String> {
        self.on_element(element, "return r.norm(el.textContent);")
    }

    fn input_value(&self, element: ElementRef) -> RemendarResult<Option<String>> {
        self.on_element(
            element,
            "return ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName) ? el.value : null;",
        )
    }

    fn bounding_box(&self, element: ElementRef) -> RemendarResult<Option<BoundingBox>> {
        self.on_element(
            element,
            "const b = el.getBoundingClientRect(); \
             if (b.width === 0 && b.height === 0) return null; \
             return { x: b.x, y: b.y, width: b.width, height: b.height };",
        )
    }

    fn hovered_element(&self) -> RemendarResult<Option<ElementRef>> {
        let id: Option<u64> =
            self.eval("return r.hovered && r.hovered.isConnected ? r.id(r.hovered) : null;")?;
        Ok(id.map(ElementRef))
    }
}

impl Page for CdpPage {
    fn as_document(&self) -> &dyn Document {
        self
    }

    fn goto(&self, url: &str) -> RemendarResult<()> {
        let tab = self.tab.clone();
        let target = url.to_string();
        self.block_on(async move {
            tab.goto(target.as_str())
                .await
                .map(|_| ())
                .map_err(|e| RemendarError::Navigation {
                    url: target.clone(),
                    message: e.to_string(),
                })
        })?;
        debug!(url, "navigated");
        *self.url.borrow_mut() = url.to_string();
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.borrow().clone()
    }

    fn click(&self, selector: &Selector) -> RemendarResult<()> {
        let element = self.target(selector)?;
        let _: bool = self.on_element(
            element,
            "el.scrollIntoView({ block: 'center' }); el.click(); return true;",
        )?;
        Ok(())
    }

    fn fill(&self, selector: &Selector, value: &str) -> RemendarResult<()> {
        let element = self.target(selector)?;
        let filled: bool = self.on_element(
            element,
            &format!(
                "if (!['INPUT', 'TEXTAREA'].includes(el.tagName) && !el.isContentEditable) return false; \
                 el.focus(); \
                 if (el.isContentEditable) el.textContent = {v}; else el.value = {v}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 return true;",
                v = js_string(value)?
            ),
        )?;
        if filled {
            Ok(())
        } else {
            Err(RemendarError::Automation {
                message: format!("Element is not an <input>, <textarea> or editable: {selector}"),
            })
        }
    }

    fn check(&self, selector: &Selector) -> RemendarResult<()> {
        let element = self.target(selector)?;
        let checked: bool = self.on_element(element, "if (!el.checked) el.click(); return !!el.checked;")?;
        if checked {
            Ok(())
        } else {
            Err(RemendarError::Automation {
                message: format!("Clicking the checkbox did not change its state: {selector}"),
            })
        }
    }

    fn select_option(&self, selector: &Selector, value: &str) -> RemendarResult<()> {
        let element = self.target(selector)?;
        let found: bool = self.on_element(
            element,
            &format!(
                "const want = {v}; \
                 const opt = Array.from(el.options || []).find((o) => o.value === want || r.norm(o.label) === want); \
                 if (!opt) return false; \
                 el.value = opt.value; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 return true;",
                v = js_string(value)?
            ),
        )?;
        if found {
            Ok(())
        } else {
            Err(RemendarError::value_invalid(format!(
                "Option '{value}' not present in {selector}"
            )))
        }
    }

    fn set_input_files(&self, selector: &Selector, path: &str) -> RemendarResult<()> {
        let element = self.target(selector)?;
        let expression = format!("(() => {{ const r = {REGISTRY}; return r.get({}); }})()", element.0);
        let evaluate = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(false)
            .build()
            .map_err(automation)?;
        let tab = self.tab.clone();
        let file = path.to_string();
        self.block_on(async move {
            let response = tab.execute(evaluate).await.map_err(automation)?;
            let object_id = response
                .result
                .result
                .object_id
                .clone()
                .ok_or_else(|| automation("file input has no remote object"))?;
            let params = SetFileInputFilesParams::builder()
                .file(file)
                .object_id(object_id)
                .build()
                .map_err(automation)?;
            tab.execute(params).await.map_err(automation)?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_options_follow_config() {
        let mut config = RecordConfig::default();
        config.timeout_ms = 1500;
        config.highlight = true;
        let options = CdpOptions::from_config(&config).with_no_sandbox();
        assert_eq!(options.timeout_ms, 1500);
        assert!(options.highlight);
        assert!(options.headless);
        assert!(!options.sandbox);
    }

    #[test]
    fn test_selector_args_quote_safely() {
        let css = selector_args(&Selector::css("input[name=\"q\"]")).unwrap();
        assert_eq!(css, r#"'css', "input[name=\"q\"]""#);
        let xpath = selector_args(&Selector::detect("//a[text()='Go']")).unwrap();
        assert!(xpath.starts_with("'xpath', "));
    }

    #[test]
    #[ignore = "requires a chromium binary"]
    fn test_login_page_round_trip() {
        let page = CdpPage::launch_with(CdpOptions::default().with_no_sandbox()).unwrap();
        page.goto("data:text/html,<input id='user-name'><button id='go'>Go</button>")
            .unwrap();
        page.fill(&Selector::css("#user-name"), "standard_user").unwrap();
        let input = resolve_single(&page, &Selector::css("#user-name")).unwrap();
        assert_eq!(page.input_value(input).unwrap().as_deref(), Some("standard_user"));
        let err = page.click(&Selector::css("#missing")).unwrap_err();
        assert!(err.is_repairable());
        page.close().unwrap();
    }
}
