//! Compression quality scoring.
//!
//! The benchmark drives its own page (never a live session's), extracts
//! the visible text the way the walker sees it, runs the full extraction
//! stack and measures how much of that text survives into the tree.

use crate::driver::{LoadState, PageDriver};
use crate::error::{Result, SessionError};
use pagelens_dom::assembler::AssembleOptions;
use pagelens_dom::{assemble, Config, CompressorRegistry, SnapshotStats};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

/// Visible-text extraction, with the walker's hidden rules applied.
const VISIBLE_TEXT_SCRIPT: &str = r#"() => {
    const SKIP = new Set([
        'SCRIPT','STYLE','NOSCRIPT','TEMPLATE','SVG','LINK','META',
        'HEAD','IFRAME','OBJECT','EMBED'
    ]);

    function isHidden(el) {
        if (!el || el.nodeType !== 1) return false;
        if (el.hasAttribute('hidden')) return true;
        if ((el.getAttribute('aria-hidden') || '').toLowerCase() === 'true') return true;
        if (el.tagName === 'INPUT' && (el.getAttribute('type') || '').toLowerCase() === 'hidden') return true;
        if (el.tagName === 'DIALOG' && !el.hasAttribute('open')) return true;
        const cs = window.getComputedStyle(el);
        if (cs.display === 'none' || cs.visibility === 'hidden' || cs.opacity === '0') return true;
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 && rect.height === 0 && el.children.length === 0) return true;
        return false;
    }

    function collectText(el) {
        if (SKIP.has(el.tagName)) return '';
        if (isHidden(el)) return '';
        const parts = [];
        for (const child of el.childNodes) {
            if (child.nodeType === 3) {
                const t = child.textContent.trim();
                if (t) parts.push(t);
            } else if (child.nodeType === 1) {
                parts.push(collectText(child));
            }
        }
        return parts.filter(Boolean).join('\n');
    }

    return collectText(document.body);
}"#;

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub url: String,
    pub stats: SnapshotStats,
    pub completeness: f64,
    pub completeness_pct: String,
    pub visible_lines_total: usize,
    pub visible_lines_matched: usize,
    pub token_saving: f64,
}

/// How much of the page's visible text survives into the rendered tree.
/// Lines are matched by a 50-char probe, with a 25-char retry for longer
/// lines that may have been truncated.
pub fn score_completeness(tree: &str, visible_text: &str) -> (usize, usize, f64) {
    let clean_tree: String = tree
        .chars()
        .filter(|c| *c != '\u{27e8}' && *c != '\u{27e9}')
        .collect();
    let clean_tree = clean_tree.replace("[edit]", "").to_lowercase();

    let visible_lines: Vec<&str> = visible_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.chars().count() >= 3)
        .collect();

    let mut matched = 0usize;
    for line in &visible_lines {
        let clean_line = line.replace("[edit]", "");
        let clean_line = clean_line.trim();
        if clean_line.is_empty() {
            continue;
        }
        let probe: String = clean_line.chars().take(50).collect::<String>().to_lowercase();
        if clean_tree.contains(&probe) {
            matched += 1;
        } else if clean_line.chars().count() >= 10 {
            let short: String = clean_line.chars().take(25).collect::<String>().to_lowercase();
            if clean_tree.contains(&short) {
                matched += 1;
            }
        }
    }

    let total = visible_lines.len().max(1);
    let completeness = (matched as f64 / total as f64 * 10_000.0).round() / 10_000.0;
    (visible_lines.len(), matched, completeness)
}

/// Benchmark the page the driver currently shows. The driver must belong
/// to an isolated page so live sessions stay untouched.
pub async fn run<D: PageDriver>(
    driver: &D,
    cfg: &Config,
    registry: &CompressorRegistry,
) -> Result<BenchmarkReport> {
    if let Err(err) = driver
        .wait_for_load_state(
            LoadState::NetworkIdle,
            Duration::from_millis(cfg.benchmark_idle_wait),
        )
        .await
    {
        tracing::debug!(error = %err, "benchmark idle wait skipped");
    }

    let budget = Duration::from_millis(cfg.benchmark_timeout);
    let visible = timeout(budget, driver.evaluate(VISIBLE_TEXT_SCRIPT, Value::Null))
        .await
        .map_err(|_| SessionError::Timeout {
            what: "visible text extraction".to_string(),
        })??;
    let visible_text = visible.as_str().unwrap_or("").to_string();

    let html = driver.content().await?;
    let url = driver.url().await?;

    let raw = pagelens_dom::walk(&html, cfg);
    let (_, filtered) = registry.run(&url, &raw, cfg);
    let snapshot = assemble(
        raw.len(),
        &filtered,
        html.chars().count(),
        &AssembleOptions::full(),
    );

    let (total, matched, completeness) = score_completeness(&snapshot.tree, &visible_text);
    let token_saving =
        ((1.0 - snapshot.stats.compression_ratio) * 10_000.0).round() / 10_000.0;

    Ok(BenchmarkReport {
        url,
        completeness,
        completeness_pct: format!("{:.1}%", completeness * 100.0),
        visible_lines_total: total.max(1),
        visible_lines_matched: matched,
        token_saving,
        stats: snapshot.stats,
    })
}
