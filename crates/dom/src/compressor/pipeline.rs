//! The fixed six-stage compression pipeline.
//!
//! Every profile funnels through the same stages; profiles only differ in
//! their prefilter and in the truncation parameters.
//!
//! 1. flat-to-tree      depth-stack reconstruction, O(N)
//! 2. simplify          wrapper collapse + text dedup, iterated to a fixed point
//! 3. collapse-popups   fold dialog contents into a summary line
//! 4. truncate-lists    cap homogeneous long child lists
//! 5. prune-empty       drop leaves with no content
//! 6. tree-to-flat      re-flatten with hierarchical ids

use crate::types::{FilteredNode, NodeData, TRANSPARENT_ROLES, WRAPPER_TAGS};
use regex::Regex;
use std::sync::LazyLock;

static RE_TRANSPARENT_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    let alts = TRANSPARENT_ROLES.join("|");
    Regex::new(&format!(r#",?\s*role="(?:{alts})""#)).expect("static regex")
});
static RE_ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#",?\s*id="[^"]*""#).expect("static regex"));

/// Tuning knobs resolved per profile invocation.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub max_items: usize,
    pub show_head: usize,
    pub simplify_passes: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            max_items: 50,
            show_head: 10,
            simplify_passes: 10,
        }
    }
}

/// Transient tree node. Links are one-directional (parent owns children);
/// the hierarchical id is carried by the re-flattening recursion, not by
/// the node itself.
#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub data: NodeData,
    pub children: Vec<TreeNode>,
}

/// Run the full pipeline over `(depth, payload)` pairs.
pub fn run(nodes: Vec<(u16, NodeData)>, params: &PipelineParams) -> Vec<FilteredNode> {
    let mut tree = flat_to_tree(nodes);
    for _ in 0..params.simplify_passes {
        let before = count_nodes(&tree);
        tree = simplify(tree);
        if count_nodes(&tree) == before {
            break;
        }
    }
    tree = collapse_popups(tree);
    truncate_long_lists(&mut tree, params.max_items, params.show_head);
    tree = prune_empty_leaves(tree);
    tree_to_flat(tree)
}

// ---------------------------------------------------------------------------
// Stage 1/6: tree conversion
// ---------------------------------------------------------------------------

pub(crate) fn flat_to_tree(nodes: Vec<(u16, NodeData)>) -> Vec<TreeNode> {
    let mut roots: Vec<TreeNode> = Vec::new();
    // Open ancestor chain; a node attaches to the nearest prior node with
    // a smaller depth.
    let mut stack: Vec<(u16, TreeNode)> = Vec::new();

    fn close(
        done: TreeNode,
        stack: &mut Vec<(u16, TreeNode)>,
        roots: &mut Vec<TreeNode>,
    ) {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(done),
            None => roots.push(done),
        }
    }

    for (depth, data) in nodes {
        while stack.last().is_some_and(|(d, _)| *d >= depth) {
            let (_, done) = stack.pop().expect("stack checked non-empty");
            close(done, &mut stack, &mut roots);
        }
        stack.push((
            depth,
            TreeNode {
                data,
                children: Vec::new(),
            },
        ));
    }
    while let Some((_, done)) = stack.pop() {
        close(done, &mut stack, &mut roots);
    }
    roots
}

pub(crate) fn tree_to_flat(roots: Vec<TreeNode>) -> Vec<FilteredNode> {
    let mut flat = Vec::new();
    flatten_into(roots, 0, "", &mut flat);
    flat
}

fn flatten_into(nodes: Vec<TreeNode>, depth: u16, prefix: &str, out: &mut Vec<FilteredNode>) {
    for (i, node) in nodes.into_iter().enumerate() {
        let hid = if prefix.is_empty() {
            (i + 1).to_string()
        } else {
            format!("{prefix}{}", i + 1)
        };
        let child_prefix = format!("{hid}.");
        out.push(FilteredNode {
            hid,
            depth,
            data: node.data,
        });
        flatten_into(node.children, depth + 1, &child_prefix, out);
    }
}

pub(crate) fn count_nodes(roots: &[TreeNode]) -> usize {
    roots
        .iter()
        .map(|n| 1 + count_nodes(&n.children))
        .sum()
}

// ---------------------------------------------------------------------------
// Stage 2: simplify
// ---------------------------------------------------------------------------

fn is_collapsible(node: &TreeNode) -> bool {
    if node
        .data
        .state
        .get("selected")
        .is_some_and(|v| !v.is_empty())
    {
        return false;
    }
    // A text with embedded clickable markers must keep its own line.
    if node.data.text.contains('\u{27e8}') && node.data.text.contains('\u{27e9}') {
        return false;
    }
    WRAPPER_TAGS.contains(&node.data.tag.as_str())
        || RE_TRANSPARENT_ROLE.is_match(&node.data.attrs)
}

/// Attribute string with transparent roles and ids stripped; what remains
/// counts as meaningful content.
pub(crate) fn meaningful_attrs(attrs: &str) -> String {
    let stripped = RE_TRANSPARENT_ROLE.replace_all(attrs, "");
    let stripped = RE_ID_ATTR.replace_all(&stripped, "");
    stripped
        .trim_matches(|c: char| c == ',' || c == ' ')
        .to_string()
}

fn children_text(node: &TreeNode) -> String {
    let parts: Vec<&str> = node
        .children
        .iter()
        .filter(|c| !c.data.text.is_empty())
        .map(|c| c.data.text.as_str())
        .collect();
    parts.join(" ")
}

fn text_overlap(parent_text: &str, child_text: &str) -> bool {
    let p = parent_text.trim();
    let c = child_text.trim();
    if p.is_empty() || c.is_empty() {
        return false;
    }
    if p == c {
        return true;
    }
    let (shorter, longer) = if c.chars().count() <= p.chars().count() {
        (c, p)
    } else {
        (p, c)
    };
    let shorter_len = shorter.chars().count();
    let longer_len = longer.chars().count();
    longer.contains(shorter) && shorter_len >= 8 && shorter_len as f64 > longer_len as f64 * 0.5
}

fn simplify(children: Vec<TreeNode>) -> Vec<TreeNode> {
    let mut result = Vec::with_capacity(children.len());
    for mut node in children {
        node.children = simplify(std::mem::take(&mut node.children));

        let collapsible = is_collapsible(&node);
        let n_children = node.children.len();

        // Parent text that merely repeats the children adds nothing.
        if !node.data.text.is_empty() && n_children > 0 {
            let ct = children_text(&node);
            if !ct.is_empty() {
                let text_len = node.data.text.chars().count();
                let ct_len = ct.chars().count();
                if node.data.text == ct
                    || ct.starts_with(&node.data.text)
                    || (node.data.text.starts_with(&ct)
                        && ct_len as f64 > text_len as f64 * 0.8)
                {
                    node.data.text.clear();
                }
            }
        }

        // The inverse: inert children whose text overlaps the parent's.
        if !node.data.text.is_empty() && n_children > 0 {
            let parent_text = node.data.text.clone();
            for child in &mut node.children {
                if !child.data.text.is_empty()
                    && child.data.actions.is_empty()
                    && text_overlap(&parent_text, &child.data.text)
                {
                    child.data.text.clear();
                }
            }
        }

        let has_content =
            !node.data.text.is_empty() || !meaningful_attrs(&node.data.attrs).is_empty();

        if collapsible && !has_content {
            match node.children.len() {
                0 => continue,
                1 => result.push(node.children.pop().expect("one child")),
                _ => result.extend(node.children),
            }
            continue;
        }
        result.push(node);
    }
    result
}

// ---------------------------------------------------------------------------
// Stage 3: collapse popups
// ---------------------------------------------------------------------------

fn is_popup(node: &TreeNode) -> bool {
    for role in crate::types::POPUP_ROLES {
        if node.data.attrs.contains(&format!(r#"role="{role}""#)) {
            return true;
        }
    }
    let tag = &node.data.tag;
    if tag == "dialog" {
        return true;
    }
    tag.contains('-') && tag.to_lowercase().contains("dialog")
}

fn collapse_popups(roots: Vec<TreeNode>) -> Vec<TreeNode> {
    roots
        .into_iter()
        .map(|mut node| {
            if is_popup(&node) && !node.children.is_empty() {
                let n = count_nodes(&node.children);
                node.data.text = format!("\u{b7}\u{b7}\u{b7} {n} children");
                node.children.clear();
                return node;
            }
            node.children = collapse_popups(std::mem::take(&mut node.children));
            node
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stage 4: truncate long lists
// ---------------------------------------------------------------------------

fn has_interactive(node: &TreeNode) -> bool {
    !node.data.actions.is_empty() || node.children.iter().any(has_interactive)
}

fn truncate_long_lists(roots: &mut [TreeNode], max_items: usize, show_head: usize) {
    for node in roots.iter_mut() {
        truncate_long_lists(&mut node.children, max_items, show_head);
        let n = node.children.len();
        if n <= max_items {
            continue;
        }
        // Only homogeneous, mostly inert lists are truncated: at least 70%
        // share one tag and at most 30% contain an interactive descendant.
        let mut tag_freq: ahash::AHashMap<&str, usize> = ahash::AHashMap::new();
        for c in &node.children {
            *tag_freq.entry(c.data.tag.as_str()).or_default() += 1;
        }
        let top = tag_freq.values().copied().max().unwrap_or(0);
        if (top as f64) < n as f64 * 0.7 {
            continue;
        }
        let interactive = node.children.iter().filter(|c| has_interactive(c)).count();
        if interactive as f64 > n as f64 * 0.3 {
            continue;
        }
        node.children.truncate(show_head);
        node.children.push(TreeNode {
            data: NodeData {
                tag: "\u{2026}".to_string(),
                text: format!("+{} more ({n} total)", n - show_head),
                ..NodeData::default()
            },
            children: Vec::new(),
        });
    }
}

// ---------------------------------------------------------------------------
// Stage 5: prune empty leaves
// ---------------------------------------------------------------------------

fn prune_empty_leaves(roots: Vec<TreeNode>) -> Vec<TreeNode> {
    roots
        .into_iter()
        .filter_map(|mut node| {
            node.children = prune_empty_leaves(std::mem::take(&mut node.children));
            let empty = node.children.is_empty()
                && node.data.text.trim().is_empty()
                && node.data.actions.is_empty()
                && meaningful_attrs(&node.data.attrs).is_empty();
            if empty {
                None
            } else {
                Some(node)
            }
        })
        .collect()
}
