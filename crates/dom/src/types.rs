//! Core node and snapshot types shared by the walker, the compressor
//! pipeline and the assembler.
//!
//! The flat node lists are plain JSON shapes: an in-page walker script
//! returns exactly this structure, and the server-side walker mirrors it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Interaction affordance of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Click,
    Type,
    Select,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::Select => "select",
        }
    }
}

/// Most elements carry at most one action.
pub type ActionList = SmallVec<[Action; 2]>;

/// State attributes, keyed by attribute name. BTreeMap keeps rendering
/// and diffing deterministic.
pub type StateMap = BTreeMap<String, String>;

/// Payload shared by raw and filtered nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub tag: String,
    /// Pre-rendered attribute string, e.g. `id="q", role="searchbox"`.
    #[serde(default)]
    pub attrs: String,
    #[serde(default)]
    pub text: String,
    /// Preferred CSS locator (anchored on `data-bid` when available).
    #[serde(default)]
    pub selector: String,
    /// Absolute XPath locator.
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub actions: ActionList,
    /// Human-intent string used by the interactive list and the differ.
    #[serde(default)]
    pub label: String,
    /// Associated `<label>` text for form controls.
    #[serde(default, rename = "formLabel", skip_serializing_if = "String::is_empty")]
    pub form_label: String,
    #[serde(default)]
    pub state: StateMap,
    /// Inlined elements render only as a marker inside the parent's text,
    /// never as their own tree line.
    #[serde(default)]
    pub inlined: bool,
}

/// Walker output: one entry per visible element, pre-order document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    /// 1-based emission sequence.
    pub idx: u32,
    /// Tree depth below `<body>`.
    pub depth: u16,
    #[serde(flatten)]
    pub data: NodeData,
}

/// Compressor output: same payload, addressed by hierarchical id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredNode {
    /// Hierarchical id, e.g. `1.3.2`. Dotted integer order recovers
    /// pre-order traversal of the filtered tree.
    pub hid: String,
    pub depth: u16,
    #[serde(flatten)]
    pub data: NodeData,
}

impl FilteredNode {
    /// Sort key: the hid parsed as a tuple of integers.
    pub fn hid_path(&self) -> Vec<u32> {
        self.hid
            .split('.')
            .filter_map(|p| p.parse().ok())
            .collect()
    }
}

/// One entry of the snapshot's interactive element list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveEntry {
    pub hid: String,
    pub depth: u16,
    pub tag: String,
    pub label: String,
    pub selector: String,
    pub xpath: String,
    pub actions: ActionList,
    pub state: StateMap,
}

/// Compression statistics for one walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub raw_html_chars: usize,
    pub raw_html_tokens: usize,
    pub tree_chars: usize,
    pub tree_tokens: usize,
    pub compression_ratio: f64,
    pub nodes_before_filter: usize,
    pub nodes_after_filter: usize,
}

/// The assembled result of one walk: rendered tree, locator maps,
/// interactive list and statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tree: String,
    /// hid -> CSS selector.
    pub node_map: BTreeMap<String, String>,
    /// hid -> absolute XPath.
    pub xpath_map: BTreeMap<String, String>,
    /// Nodes with at least one action.
    pub interactive: Vec<InteractiveEntry>,
    pub stats: SnapshotStats,
}

// ---------------------------------------------------------------------------
// Walker constant tables
// ---------------------------------------------------------------------------

/// Tags never walked or emitted.
pub const SKIP_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "svg", "head", "br", "hr",
    "iframe", "object", "embed", "template", "slot", "col",
];

/// Tags whose text is folded into the parent node's text.
pub const INLINE_TAGS: &[&str] = &[
    "a", "span", "strong", "em", "b", "i", "u", "s", "code", "kbd", "mark",
    "small", "sub", "sup", "abbr", "cite", "time", "label",
];

/// Attributes rendered for every element.
pub const GLOBAL_ATTRS: &[&str] = &["id", "role", "aria-label", "title"];

/// Per-tag attribute whitelist, on top of [`GLOBAL_ATTRS`].
pub fn tag_attr_rules(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href"],
        "img" => &["src", "alt"],
        "input" => &["type", "name", "placeholder", "value"],
        "textarea" => &["name", "placeholder"],
        "select" => &["name"],
        "option" => &["value"],
        "button" => &["type"],
        "form" => &["action", "method"],
        "video" | "audio" => &["src"],
        "source" => &["src", "type"],
        "th" | "td" => &["colspan", "rowspan"],
        _ => &[],
    }
}

/// Attributes copied into a node's state map.
pub const STATE_ATTRS: &[&str] = &[
    "disabled",
    "checked",
    "readonly",
    "required",
    "aria-expanded",
    "aria-selected",
    "aria-checked",
    "aria-pressed",
    "aria-current",
    "aria-valuenow",
    "aria-valuemin",
    "aria-valuemax",
];

/// `<input type=...>` values that accept typed text.
pub const TYPEABLE_INPUT_TYPES: &[&str] = &[
    "text", "search", "email", "password", "url", "tel", "number", "",
];

/// `<input type=...>` values that act as buttons.
pub const CLICKABLE_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image"];

// ---------------------------------------------------------------------------
// Pipeline constant tables
// ---------------------------------------------------------------------------

/// Structural tags eligible for wrapper collapse.
pub const WRAPPER_TAGS: &[&str] = &[
    "div", "span", "section", "article", "main", "header", "footer", "aside",
    "figure", "figcaption", "nav", "details", "summary", "hgroup", "center",
    "font", "big", "nobr", "marquee", "thead", "tbody", "tfoot", "colgroup",
];

/// Roles that make an element semantically transparent.
pub const TRANSPARENT_ROLES: &[&str] = &["none", "presentation"];

/// Roles that mark popup containers.
pub const POPUP_ROLES: &[&str] = &["dialog", "alertdialog"];
