//! Per-page session: serialized access, snapshot cache, settle and diff.
//!
//! A session owns one page. Every operation acquires the session lock
//! before touching the driver, because the underlying automation driver is
//! not reentrant on a single page. Readers of the last snapshot never take
//! that lock: the snapshot is swapped whole behind an `RwLock`, so a
//! reader sees either the old complete snapshot or the new one.

use crate::driver::{LoadState, PageDriver};
use crate::error::{Result, SessionError};
use ahash::AHashMap;
use pagelens_dom::assembler::AssembleOptions;
use pagelens_dom::differ::{self, DomDiff};
use pagelens_dom::{assemble, diff_dom, Config, ConfigStore};
use pagelens_dom::{CompressorRegistry, FilteredNode, Snapshot};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// In-page marking script (phases A-C with computed-style visibility).
/// Runs before every walk; the server-side walker honors its annotations.
const MARKER_SCRIPT: &str = include_str!("marker.js");

/// MutationObserver settle: resolves when no DOM mutation occurs for
/// `settleMs`, or unconditionally at `maxMs`.
const SETTLE_SCRIPT: &str = r#"(cfg) => new Promise(resolve => {
    let timer = null
    const observer = new MutationObserver(() => {
        clearTimeout(timer)
        timer = setTimeout(() => { observer.disconnect(); resolve() }, cfg.settleMs)
    })
    observer.observe(document.body, {
        childList: true, subtree: true,
        attributes: true, characterData: true
    })
    timer = setTimeout(() => { observer.disconnect(); resolve() }, cfg.settleMs)
    setTimeout(() => { observer.disconnect(); resolve() }, cfg.maxMs)
})"#;

/// Result of a settle + refresh after an interaction.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub message: String,
    pub snapshot: Arc<Snapshot>,
    pub changes: DomDiff,
}

struct PageState<D> {
    driver: D,
    node_map: AHashMap<String, String>,
    xpath_map: AHashMap<String, String>,
    last_filtered: Vec<FilteredNode>,
    last_raw_count: usize,
    last_html_chars: usize,
}

pub struct Session<D: PageDriver> {
    id: String,
    config: Arc<ConfigStore>,
    registry: Arc<CompressorRegistry>,
    inner: Mutex<Option<PageState<D>>>,
    latest: RwLock<Option<Arc<Snapshot>>>,
}

impl<D: PageDriver> Session<D> {
    pub fn new(config: Arc<ConfigStore>, registry: Arc<CompressorRegistry>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            config,
            registry,
            inner: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attach a page. Replaces any previous page.
    pub async fn open(&self, driver: D) {
        let mut inner = self.inner.lock().await;
        *inner = Some(PageState {
            driver,
            node_map: AHashMap::new(),
            xpath_map: AHashMap::new(),
            last_filtered: Vec::new(),
            last_raw_count: 0,
            last_html_chars: 0,
        });
        tracing::debug!(session = %self.id, "page attached");
    }

    /// Detach the page and drop all cached state.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        *inner = None;
        *self.latest.write().expect("snapshot lock poisoned") = None;
        tracing::debug!(session = %self.id, "page detached");
    }

    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Last complete snapshot, without touching the page.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().expect("snapshot lock poisoned").clone()
    }

    /// Walk the page and produce a fresh snapshot.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let cfg = self.config.snapshot();
        let mut inner = self.inner.lock().await;
        let page = inner.as_mut().ok_or(SessionError::NotOpen)?;
        self.refresh(page, &cfg, AssembleOptions::full()).await
    }

    /// One walk, re-assembled with truncated text for token-frugal
    /// callers. The walk is shared with the full snapshot, so node ids are
    /// identical; only the final formatting differs.
    pub async fn snapshot_lite(&self) -> Result<Arc<Snapshot>> {
        let cfg = self.config.snapshot();
        let mut inner = self.inner.lock().await;
        let page = inner.as_mut().ok_or(SessionError::NotOpen)?;
        self.refresh(page, &cfg, AssembleOptions::full()).await?;
        let opts = AssembleOptions::lite(cfg.lite_text_max, cfg.lite_text_head);
        Ok(Arc::new(assemble(
            page.last_raw_count,
            &page.last_filtered,
            page.last_html_chars,
            &opts,
        )))
    }

    /// Resolve a hierarchical id to its CSS selector.
    pub async fn resolve(&self, hid: &str) -> Result<String> {
        let inner = self.inner.lock().await;
        let page = inner.as_ref().ok_or(SessionError::NotOpen)?;
        page.node_map
            .get(hid)
            .filter(|sel| !sel.is_empty())
            .cloned()
            .ok_or_else(|| SessionError::NodeNotFound {
                hid: hid.to_string(),
            })
    }

    /// Resolve a hierarchical id to its absolute XPath.
    pub async fn resolve_xpath(&self, hid: &str) -> Result<String> {
        let inner = self.inner.lock().await;
        let page = inner.as_ref().ok_or(SessionError::NotOpen)?;
        page.xpath_map
            .get(hid)
            .filter(|xp| !xp.is_empty())
            .cloned()
            .ok_or_else(|| SessionError::NodeNotFound {
                hid: hid.to_string(),
            })
    }

    /// Post-interaction sequence: settle, re-walk, diff against the state
    /// the page had before the interaction.
    pub async fn after_action(&self, message: impl Into<String>) -> Result<ActionOutcome> {
        let cfg = self.config.snapshot();
        let mut inner = self.inner.lock().await;
        let page = inner.as_mut().ok_or(SessionError::NotOpen)?;

        let before = std::mem::take(&mut page.last_filtered);
        settle(&page.driver, &cfg).await;
        let snapshot = self.refresh(page, &cfg, AssembleOptions::full()).await?;
        let changes = diff_dom(&before, &page.last_filtered, differ::DEFAULT_MAX_ITEMS);
        tracing::debug!(
            session = %self.id,
            before = before.len(),
            after = page.last_filtered.len(),
            added = changes.added.len(),
            removed = changes.removed.len(),
            changed = changes.changed.len(),
            "dom diff after action"
        );
        Ok(ActionOutcome {
            message: message.into(),
            snapshot,
            changes,
        })
    }

    async fn refresh(
        &self,
        page: &mut PageState<D>,
        cfg: &Config,
        opts: AssembleOptions,
    ) -> Result<Arc<Snapshot>> {
        let budget = Duration::from_millis(cfg.nav_timeout);

        // In-page phases first; their annotations drive the walk.
        timeout(budget, page.driver.evaluate(MARKER_SCRIPT, marker_args(cfg)))
            .await
            .map_err(|_| SessionError::Timeout {
                what: "in-page marker".to_string(),
            })??;

        let html = timeout(budget, page.driver.content())
            .await
            .map_err(|_| SessionError::Timeout {
                what: "page content".to_string(),
            })??;
        let url = page.driver.url().await?;

        let raw = pagelens_dom::walk(&html, cfg);
        let (compressor, filtered) = self.registry.run(&url, &raw, cfg);
        let snapshot = Arc::new(assemble(
            raw.len(),
            &filtered,
            html.chars().count(),
            &opts,
        ));
        tracing::debug!(
            session = %self.id,
            %compressor,
            nodes = raw.len(),
            filtered = filtered.len(),
            ratio = snapshot.stats.compression_ratio,
            "refreshed dom"
        );

        page.node_map = filtered
            .iter()
            .map(|n| (n.hid.clone(), n.data.selector.clone()))
            .collect();
        page.xpath_map = filtered
            .iter()
            .map(|n| (n.hid.clone(), n.data.xpath.clone()))
            .collect();
        page.last_filtered = filtered;
        page.last_raw_count = raw.len();
        page.last_html_chars = html.chars().count();

        *self.latest.write().expect("snapshot lock poisoned") = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Wait for the page to quiet down: domcontentloaded, network idle, then a
/// mutation-observer settle. Each stage is bounded and best effort; a page
/// that never settles just costs its budget.
async fn settle<D: PageDriver>(driver: &D, cfg: &Config) {
    if let Err(err) = driver
        .wait_for_load_state(
            LoadState::DomContentLoaded,
            Duration::from_millis(cfg.load_wait),
        )
        .await
    {
        tracing::debug!(error = %err, "domcontentloaded wait skipped");
    }
    if let Err(err) = driver
        .wait_for_load_state(
            LoadState::NetworkIdle,
            Duration::from_millis(cfg.network_idle_wait),
        )
        .await
    {
        tracing::debug!(error = %err, "network idle wait skipped");
    }

    let settle_ms = cfg.dom_settle_wait.max(1);
    let max_ms = cfg.load_wait + settle_ms * 4;
    let args = json!({ "settleMs": settle_ms, "maxMs": max_ms });
    let bounded = timeout(
        Duration::from_millis(max_ms + settle_ms),
        driver.evaluate(SETTLE_SCRIPT, args),
    );
    match bounded.await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "dom settle evaluation failed"),
        Err(_) => tracing::warn!("dom settle timed out"),
    }
}

fn marker_args(cfg: &Config) -> Value {
    let prefix_re = cfg
        .icon_class_prefixes
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("|");
    let material_re = cfg
        .material_icon_classes
        .iter()
        .map(|c| c.replace('-', "[_-]"))
        .collect::<Vec<_>>()
        .join("|");
    let clone_sel = cfg.carousel_clone_selectors.join(", ");
    json!({
        "prefixRe": prefix_re,
        "materialRe": material_re,
        "semantic": cfg.semantic_keywords,
        "cloneSel": clone_sel,
        "stateClasses": cfg.switchable_state_classes,
        // Reserved heuristics, carried for the marker's future use.
        "grayTextMinRgb": cfg.gray_text_min_rgb,
        "grayTextMaxDiff": cfg.gray_text_max_diff,
        "iconMaxSize": cfg.icon_max_size,
    })
}

/// Ensure a user-entered URL has a scheme; bare hosts get https.
pub fn normalize_url(input: &str) -> Result<String> {
    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    url::Url::parse(&candidate)
        .map(|u| u.to_string())
        .map_err(|e| SessionError::InvalidUrl(format!("{input}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Driver over a fixed HTML string; `evaluate` records scripts and
    /// returns null, like a page that ran them for their side effects.
    struct MockDriver {
        html: Arc<StdMutex<String>>,
        url: String,
        evaluated: Arc<StdMutex<Vec<String>>>,
    }

    impl MockDriver {
        fn new(html: &str) -> Self {
            Self {
                html: Arc::new(StdMutex::new(html.to_string())),
                url: "https://example.com/".to_string(),
                evaluated: Arc::new(StdMutex::new(Vec::new())),
            }
        }

        fn html_handle(&self) -> Arc<StdMutex<String>> {
            Arc::clone(&self.html)
        }

        fn evaluated_handle(&self) -> Arc<StdMutex<Vec<String>>> {
            Arc::clone(&self.evaluated)
        }
    }

    #[async_trait::async_trait]
    impl PageDriver for MockDriver {
        async fn evaluate(&self, script: &str, _args: Value) -> Result<Value> {
            self.evaluated.lock().unwrap().push(script.to_string());
            Ok(Value::Null)
        }

        async fn content(&self) -> Result<String> {
            Ok(self.html.lock().unwrap().clone())
        }

        async fn url(&self) -> Result<String> {
            Ok(self.url.clone())
        }

        async fn wait_for_load_state(
            &self,
            _state: LoadState,
            _timeout: Duration,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[allow(clippy::type_complexity)]
    fn session(
        driver_html: &str,
    ) -> (
        Session<MockDriver>,
        Arc<StdMutex<String>>,
        Arc<StdMutex<Vec<String>>>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigStore::in_memory());
        let registry = Arc::new(CompressorRegistry::new(dir.path()));
        let session = Session::new(config, registry);
        let driver = MockDriver::new(driver_html);
        let html = driver.html_handle();
        let evaluated = driver.evaluated_handle();
        tokio_test::block_on(session.open(driver));
        (session, html, evaluated, dir)
    }

    #[test]
    fn snapshot_requires_an_open_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigStore::in_memory());
        let registry = Arc::new(CompressorRegistry::new(dir.path()));
        let s: Session<MockDriver> = Session::new(config, registry);
        let err = tokio_test::block_on(s.snapshot()).unwrap_err();
        assert!(matches!(err, SessionError::NotOpen));
    }

    #[test]
    fn snapshot_walks_and_caches_maps() {
        let (s, _html, evaluated, _dir) =
            session("<body><button id=\"go\">Start</button></body>");
        let snap = tokio_test::block_on(s.snapshot()).unwrap();
        assert!(snap.tree.contains("button"));
        assert!(snap.tree.contains(": Start"));

        let hid = snap.interactive[0].hid.clone();
        let sel = tokio_test::block_on(s.resolve(&hid)).unwrap();
        assert!(sel.starts_with("[data-bid=\""));
        let xp = tokio_test::block_on(s.resolve_xpath(&hid)).unwrap();
        assert!(xp.starts_with("/html/body/"));

        assert!(matches!(
            tokio_test::block_on(s.resolve("9.9.9")),
            Err(SessionError::NodeNotFound { .. })
        ));

        // The marker script ran before the walk.
        assert!(evaluated
            .lock()
            .unwrap()
            .iter()
            .any(|script| script.contains("data-bid")));

        let latest = s.latest().unwrap();
        assert_eq!(latest.tree, snap.tree);
    }

    #[test]
    fn after_action_diffs_against_previous_state() {
        let (s, html, _evaluated, _dir) = session(
            "<body><button id=\"menu\" aria-expanded=\"false\">Menu</button></body>",
        );
        tokio_test::block_on(s.snapshot()).unwrap();

        *html.lock().unwrap() =
            "<body><button id=\"menu\" aria-expanded=\"true\">Menu</button>\
             <div id=\"panel\"><a href=\"/x\">Item</a></div></body>"
                .to_string();
        let outcome = tokio_test::block_on(s.after_action("clicked menu")).unwrap();
        assert_eq!(outcome.message, "clicked menu");
        assert!(outcome.changes.has_changes);
        assert!(outcome
            .changes
            .changed
            .iter()
            .any(|c| c.field == "state.aria-expanded"));
        assert!(!outcome.changes.added.is_empty());
    }

    #[test]
    fn lite_snapshot_truncates_but_keeps_ids() {
        let long = "x".repeat(200);
        let html = format!("<body><p>{long}</p><button>Go</button></body>");
        let (s, _html, _evaluated, _dir) = session(&html);
        let full = tokio_test::block_on(s.snapshot()).unwrap();
        let lite = tokio_test::block_on(s.snapshot_lite()).unwrap();
        assert!(full.tree.contains(&long));
        assert!(lite.tree.contains("chars omitted"));
        assert_eq!(full.node_map, lite.node_map);
    }

    #[test]
    fn close_drops_cached_state() {
        let (s, _html, _evaluated, _dir) = session("<body><p>x</p></body>");
        tokio_test::block_on(s.snapshot()).unwrap();
        assert!(s.latest().is_some());
        tokio_test::block_on(s.close());
        assert!(s.latest().is_none());
        assert!(matches!(
            tokio_test::block_on(s.snapshot()),
            Err(SessionError::NotOpen)
        ));
    }

    /// io::Write sink shared with the test body, so log output can be
    /// asserted on.
    #[derive(Clone)]
    struct CaptureWriter(Arc<StdMutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn refresh_emits_structured_logs() {
        let sink = Arc::new(StdMutex::new(Vec::new()));
        let writer = CaptureWriter(Arc::clone(&sink));
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let (s, _html, _evaluated, _dir) = session("<body><p>logged page</p></body>");
        tracing::subscriber::with_default(subscriber, || {
            tokio_test::block_on(s.snapshot()).unwrap();
        });

        let logs = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("refreshed dom"));
        assert!(logs.contains("compressor=default"));
    }

    #[test]
    fn url_normalization() {
        assert_eq!(
            normalize_url("example.com/a").unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_url("http://example.com").unwrap(),
            "http://example.com/"
        );
        assert!(normalize_url("http://").is_err());
    }
}
