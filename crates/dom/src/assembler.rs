//! Render filtered nodes into the final textual tree and build the
//! snapshot record.
//!
//! Line grammar, segments omitted when empty:
//!
//! ```text
//! <indent>[<hid>] <tag>(<attrs>) [<actions>] {<state>} «<formLabel>»: <text>
//! ```

use crate::types::{FilteredNode, InteractiveEntry, Snapshot, SnapshotStats};
use crate::utils::{char_len, estimate_tokens};
use std::collections::BTreeMap;

/// Text truncation for "lite" assembly. `text_max == 0` disables it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    pub text_max: usize,
    pub text_head: usize,
}

impl AssembleOptions {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn lite(text_max: usize, text_head: usize) -> Self {
        Self { text_max, text_head }
    }
}

/// Render the tree text. Inlined nodes contribute no line of their own;
/// their presence is already folded into the parent's text markers.
pub fn format_tree(nodes: &[FilteredNode], opts: &AssembleOptions) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if node.data.inlined {
            continue;
        }
        let indent = "  ".repeat(node.depth as usize);
        let attrs = if node.data.attrs.is_empty() {
            String::new()
        } else {
            format!("({})", node.data.attrs)
        };
        let actions = if node.data.actions.is_empty() {
            String::new()
        } else {
            let joined: Vec<&str> = node.data.actions.iter().map(|a| a.as_str()).collect();
            format!(" [{}]", joined.join("/"))
        };
        let state = if node.data.state.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = node
                .data
                .state
                .iter()
                .map(|(k, v)| {
                    if v == "true" {
                        k.clone()
                    } else {
                        format!("{k}=\"{v}\"")
                    }
                })
                .collect();
            format!(" {{{}}}", parts.join(", "))
        };
        let form_label = if node.data.form_label.is_empty() {
            String::new()
        } else {
            format!(" \u{ab}{}\u{bb}", node.data.form_label)
        };
        let text = render_text(&node.data.text, opts);
        let text = if text.is_empty() {
            String::new()
        } else {
            format!(": {text}")
        };
        lines.push(format!(
            "{indent}[{}] {}{attrs}{actions}{state}{form_label}{text}",
            node.hid, node.data.tag
        ));
    }
    lines.join("\n")
}

fn render_text(text: &str, opts: &AssembleOptions) -> String {
    if opts.text_max == 0 {
        return text.to_string();
    }
    let total = char_len(text);
    if total <= opts.text_max {
        return text.to_string();
    }
    let head: String = text.chars().take(opts.text_head).collect();
    format!("{head}\u{2026}({} chars omitted)", total - opts.text_head)
}

/// Wrap filtered nodes into the snapshot record. `raw_count` is the
/// pre-filter node count and `html_chars` the raw page length driving the
/// compression statistics.
pub fn assemble(
    raw_count: usize,
    filtered: &[FilteredNode],
    html_chars: usize,
    opts: &AssembleOptions,
) -> Snapshot {
    let tree = format_tree(filtered, opts);

    let mut node_map = BTreeMap::new();
    let mut xpath_map = BTreeMap::new();
    let mut interactive = Vec::new();
    for node in filtered {
        node_map.insert(node.hid.clone(), node.data.selector.clone());
        xpath_map.insert(node.hid.clone(), node.data.xpath.clone());
        if !node.data.actions.is_empty() {
            let label = if node.data.label.is_empty() {
                node.data.text.clone()
            } else {
                node.data.label.clone()
            };
            interactive.push(InteractiveEntry {
                hid: node.hid.clone(),
                depth: node.depth,
                tag: node.data.tag.clone(),
                label,
                selector: node.data.selector.clone(),
                xpath: node.data.xpath.clone(),
                actions: node.data.actions.clone(),
                state: node.data.state.clone(),
            });
        }
    }

    let tree_chars = char_len(&tree);
    let ratio = tree_chars as f64 / html_chars.max(1) as f64;
    let stats = SnapshotStats {
        raw_html_chars: html_chars,
        raw_html_tokens: estimate_tokens(html_chars),
        tree_chars,
        tree_tokens: estimate_tokens(tree_chars),
        compression_ratio: (ratio * 1000.0).round() / 1000.0,
        nodes_before_filter: raw_count,
        nodes_after_filter: filtered.len(),
    };

    Snapshot {
        tree,
        node_map,
        xpath_map,
        interactive,
        stats,
    }
}
