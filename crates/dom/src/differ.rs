//! Compare two filtered-node snapshots by stable element identity.
//!
//! The CSS selector string is the identity key: hierarchical ids shift
//! whenever nodes are inserted or removed, but the `data-bid` anchor is
//! assigned once per element and survives across walks for as long as the
//! element instance exists. Nodes without a selector (synthetic
//! placeholders) are excluded.

use crate::types::FilteredNode;
use crate::utils::truncate_chars;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

const LABEL_MAX: usize = 120;
const VALUE_MAX: usize = 80;

/// Summary row for an added or removed node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBrief {
    pub hid: String,
    pub tag: String,
    pub label: String,
    pub actions: Vec<String>,
}

/// One changed field of a surviving node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeChange {
    pub hid: String,
    pub tag: String,
    pub label: String,
    /// `hid`, `text`, `state.<key>` or `actions`.
    pub field: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomDiff {
    pub has_changes: bool,
    pub summary: String,
    pub added: Vec<NodeBrief>,
    pub removed: Vec<NodeBrief>,
    pub changed: Vec<NodeChange>,
}

/// Default cap per change category.
pub const DEFAULT_MAX_ITEMS: usize = 20;

pub fn diff_dom(
    before: &[FilteredNode],
    after: &[FilteredNode],
    max_items: usize,
) -> DomDiff {
    let bmap = build_map(before);
    let amap = build_map(after);

    let mut added: Vec<NodeBrief> = Vec::new();
    let mut changed: Vec<NodeChange> = Vec::new();
    for node in after {
        let sel = node.data.selector.as_str();
        if sel.is_empty() {
            continue;
        }
        match bmap.get(sel) {
            None => added.push(brief(node)),
            Some(prev) => collect_changes(prev, node, &mut changed),
        }
    }

    let removed: Vec<NodeBrief> = before
        .iter()
        .filter(|n| !n.data.selector.is_empty() && !amap.contains_key(n.data.selector.as_str()))
        .map(|n| brief(n))
        .collect();

    let has_changes = !added.is_empty() || !removed.is_empty() || !changed.is_empty();
    let summary = summarize(added.len(), removed.len(), changed.len());

    added.truncate(max_items);
    let mut removed = removed;
    removed.truncate(max_items);
    changed.truncate(max_items);

    DomDiff {
        has_changes,
        summary,
        added,
        removed,
        changed,
    }
}

fn build_map(nodes: &[FilteredNode]) -> AHashMap<&str, &FilteredNode> {
    let mut map = AHashMap::with_capacity(nodes.len());
    for node in nodes {
        let sel = node.data.selector.as_str();
        if !sel.is_empty() {
            map.insert(sel, node);
        }
    }
    map
}

fn brief(node: &FilteredNode) -> NodeBrief {
    let label = if node.data.label.is_empty() {
        node.data.text.as_str()
    } else {
        node.data.label.as_str()
    };
    NodeBrief {
        hid: node.hid.clone(),
        tag: node.data.tag.clone(),
        label: truncate_chars(label, LABEL_MAX),
        actions: node.data.actions.iter().map(|a| a.as_str().to_string()).collect(),
    }
}

fn collect_changes(before: &FilteredNode, after: &FilteredNode, out: &mut Vec<NodeChange>) {
    let label = truncate_chars(&after.data.label, LABEL_MAX);

    // Positional shift: same element, new hid after inserts or deletes.
    if before.hid != after.hid {
        out.push(NodeChange {
            hid: after.hid.clone(),
            tag: after.data.tag.clone(),
            label: label.clone(),
            field: "hid".to_string(),
            before: before.hid.clone(),
            after: after.hid.clone(),
        });
    }

    if before.data.text != after.data.text {
        let label = if after.data.label.is_empty() {
            truncate_chars(&after.data.text, LABEL_MAX)
        } else {
            label.clone()
        };
        out.push(NodeChange {
            hid: after.hid.clone(),
            tag: after.data.tag.clone(),
            label,
            field: "text".to_string(),
            before: truncate_chars(&before.data.text, VALUE_MAX),
            after: truncate_chars(&after.data.text, VALUE_MAX),
        });
    }

    // Per-key comparison over the union of both state maps.
    let mut keys: Vec<&String> = before.data.state.keys().collect();
    for k in after.data.state.keys() {
        if !before.data.state.contains_key(k) {
            keys.push(k);
        }
    }
    keys.sort();
    for key in keys {
        let bval = before.data.state.get(key);
        let aval = after.data.state.get(key);
        if bval != aval {
            out.push(NodeChange {
                hid: after.hid.clone(),
                tag: after.data.tag.clone(),
                label: label.clone(),
                field: format!("state.{key}"),
                before: truncate_chars(bval.map(String::as_str).unwrap_or(""), VALUE_MAX),
                after: truncate_chars(aval.map(String::as_str).unwrap_or(""), VALUE_MAX),
            });
        }
    }

    if before.data.actions != after.data.actions {
        let join = |n: &FilteredNode| {
            n.data
                .actions
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join("/")
        };
        out.push(NodeChange {
            hid: after.hid.clone(),
            tag: after.data.tag.clone(),
            label,
            field: "actions".to_string(),
            before: join(before),
            after: join(after),
        });
    }
}

fn summarize(added: usize, removed: usize, changed: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    if added > 0 {
        parts.push(format!("{added} added"));
    }
    if removed > 0 {
        parts.push(format!("{removed} removed"));
    }
    if changed > 0 {
        parts.push(format!("{changed} changes"));
    }
    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, NodeData};
    use smallvec::smallvec;

    fn node(hid: &str, bid: u32, text: &str) -> FilteredNode {
        FilteredNode {
            hid: hid.to_string(),
            depth: hid.matches('.').count() as u16,
            data: NodeData {
                tag: "button".to_string(),
                text: text.to_string(),
                selector: format!("[data-bid=\"{bid}\"]"),
                label: text.to_string(),
                actions: smallvec![Action::Click],
                ..NodeData::default()
            },
        }
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let nodes = vec![node("1", 1, "a"), node("2", 2, "b")];
        let diff = diff_dom(&nodes, &nodes, DEFAULT_MAX_ITEMS);
        assert!(!diff.has_changes);
        assert_eq!(diff.summary, "no changes");
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(diff.changed.is_empty());
    }

    #[test]
    fn added_and_removed_by_selector() {
        let before = vec![node("1", 1, "stays"), node("2", 2, "goes")];
        let after = vec![node("1", 1, "stays"), node("2", 3, "new")];
        let diff = diff_dom(&before, &after, DEFAULT_MAX_ITEMS);
        assert!(diff.has_changes);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].label, "new");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].label, "goes");
        assert_eq!(diff.summary, "1 added, 1 removed");
    }

    #[test]
    fn moved_node_with_state_flip_reports_two_changes() {
        let mut before_node = node("2.3", 7, "menu");
        before_node
            .data
            .state
            .insert("aria-expanded".into(), "false".into());
        let mut after_node = node("2.4", 7, "menu");
        after_node
            .data
            .state
            .insert("aria-expanded".into(), "true".into());

        let diff = diff_dom(&[before_node], &[after_node], DEFAULT_MAX_ITEMS);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.changed.len(), 2);
        assert_eq!(diff.changed[0].field, "hid");
        assert_eq!(diff.changed[0].before, "2.3");
        assert_eq!(diff.changed[0].after, "2.4");
        assert_eq!(diff.changed[1].field, "state.aria-expanded");
        assert_eq!(diff.changed[1].before, "false");
        assert_eq!(diff.changed[1].after, "true");
        assert_eq!(diff.summary, "2 changes");
    }

    #[test]
    fn text_and_actions_changes() {
        let before = vec![node("1", 1, "old text")];
        let mut after_node = node("1", 1, "new text");
        after_node.data.actions = smallvec![Action::Click, Action::Type];
        let diff = diff_dom(&before, &[after_node], DEFAULT_MAX_ITEMS);
        let fields: Vec<&str> = diff.changed.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["text", "actions"]);
        assert_eq!(diff.changed[1].before, "click");
        assert_eq!(diff.changed[1].after, "click/type");
    }

    #[test]
    fn state_key_union_catches_additions_and_removals() {
        let mut before_node = node("1", 1, "x");
        before_node.data.state.insert("checked".into(), "true".into());
        let mut after_node = node("1", 1, "x");
        after_node.data.state.insert("disabled".into(), "true".into());
        let diff = diff_dom(&[before_node], &[after_node], DEFAULT_MAX_ITEMS);
        let fields: Vec<&str> = diff.changed.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["state.checked", "state.disabled"]);
        assert_eq!(diff.changed[0].after, "");
        assert_eq!(diff.changed[1].before, "");
    }

    #[test]
    fn placeholder_nodes_are_invisible_to_the_diff() {
        let placeholder = FilteredNode {
            hid: "1.11".to_string(),
            depth: 1,
            data: NodeData {
                tag: "\u{2026}".to_string(),
                text: "+190 more (200 total)".to_string(),
                ..NodeData::default()
            },
        };
        let diff = diff_dom(&[], &[placeholder], DEFAULT_MAX_ITEMS);
        assert!(!diff.has_changes);
    }

    #[test]
    fn categories_are_capped_but_summary_counts_all() {
        let before: Vec<FilteredNode> = (0..30).map(|i| node(&i.to_string(), i, "x")).collect();
        let diff = diff_dom(&before, &[], 5);
        assert_eq!(diff.removed.len(), 5);
        assert_eq!(diff.summary, "30 removed");
        assert!(diff.has_changes);
    }
}
