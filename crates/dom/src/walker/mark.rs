//! In-arena marking phases, run before emission.
//!
//! Phase A assigns `data-bid` identifiers. Phase B decides static
//! visibility and classifies icon surrogates into `data-bicon`. Phase C
//! detects switchable sibling groups (tab panels, dropdown bodies) and
//! unhides their inactive members under `data-bgroup`.
//!
//! When the page was already annotated by the in-page marker script the
//! existing attributes are honored: live bids stay authoritative so the
//! emitted selectors resolve against the live DOM, and computed-style
//! visibility decisions are kept where the static rules cannot see them.

use crate::config::Config;
use crate::page::{PageArena, PageId};
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use std::sync::LazyLock;

static RE_DISPLAY_NONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").expect("static regex"));
static RE_VISIBILITY_HIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)visibility\s*:\s*hidden").expect("static regex"));
static RE_OPACITY_ZERO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)opacity\s*:\s*0(?:\.0+)?\s*(?:;|$)").expect("static regex"));
static RE_ICON_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(?:icon[_-]?)?(.+)").expect("static regex"));

const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea"];

/// Compiled per-walk hint patterns built from the configuration lists.
pub(crate) struct Hints {
    prefix_re: Option<Regex>,
    material_re: Option<Regex>,
    semantic: Vec<(String, Regex)>,
    state_re: Option<Regex>,
}

impl Hints {
    pub(crate) fn new(cfg: &Config) -> Self {
        let prefix_re = if cfg.icon_class_prefixes.is_empty() {
            None
        } else {
            let alts = cfg
                .icon_class_prefixes
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?:{alts})-([a-zA-Z][\w-]*)")).ok()
        };
        let material_re = if cfg.material_icon_classes.is_empty() {
            None
        } else {
            let alts = cfg
                .material_icon_classes
                .iter()
                .map(|c| regex::escape(c).replace(r"\-", "[_-]"))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&alts).ok()
        };
        let semantic = cfg
            .semantic_keywords
            .iter()
            .filter_map(|kw| {
                let pattern = format!(r"(?:^|[\s_-]){}(?:$|[\s_-])", regex::escape(kw));
                Regex::new(&pattern).ok().map(|re| (kw.clone(), re))
            })
            .collect();
        let state_re = if cfg.switchable_state_classes.is_empty() {
            None
        } else {
            let alts = cfg
                .switchable_state_classes
                .iter()
                .map(|c| regex::escape(c))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{alts})\b")).ok()
        };
        Self {
            prefix_re,
            material_re,
            semantic,
            state_re,
        }
    }
}

/// Run all marking phases.
pub(crate) fn apply(arena: &mut PageArena, cfg: &Config) {
    let hints = Hints::new(cfg);
    assign_bids(arena);
    mark_hidden(arena);
    classify_icons(arena, &hints);
    mark_switch_groups(arena, &hints);
}

/// Phase A: tag every element with an incrementing `data-bid`, unless the
/// in-page marker already did.
fn assign_bids(arena: &mut PageArena) {
    let elements = arena.body_elements();
    if elements.iter().any(|&id| arena.has_attr(id, "data-bid")) {
        return;
    }
    let mut counter = 0u64;
    for id in elements {
        counter += 1;
        arena.set_attr(id, "data-bid", &counter.to_string());
    }
}

/// Static hidden rules. The computed-style and zero-rect decisions belong
/// to the in-page marker and arrive as pre-set `data-bhidden`.
pub(crate) fn statically_hidden(arena: &PageArena, id: PageId) -> bool {
    if arena.has_attr(id, "hidden") {
        return true;
    }
    if arena
        .attr(id, "aria-hidden")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    let tag = arena.tag(id).unwrap_or("");
    if tag == "input"
        && arena
            .attr(id, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    if tag == "dialog" && !arena.has_attr(id, "open") {
        return true;
    }
    if let Some(style) = arena.attr(id, "style") {
        if RE_DISPLAY_NONE.is_match(style)
            || RE_VISIBILITY_HIDDEN.is_match(style)
            || RE_OPACITY_ZERO.is_match(style)
        {
            return true;
        }
    }
    false
}

/// Phase B, visibility half.
fn mark_hidden(arena: &mut PageArena) {
    for id in arena.body_elements() {
        if arena.attr(id, "data-bhidden") == Some("1") {
            continue;
        }
        if statically_hidden(arena, id) {
            arena.set_attr(id, "data-bhidden", "1");
        }
    }
}

/// Phase B, icon half: derive an icon surrogate for elements with no text
/// and no aria-label, in order: icon-library class suffix, material icon
/// ligature, SVG use fragment, SVG title, semantic ancestor class token.
fn classify_icons(arena: &mut PageArena, hints: &Hints) {
    let body = arena.body();
    for id in arena.body_elements() {
        if arena.attr(id, "data-bhidden") == Some("1") || arena.has_attr(id, "data-bicon") {
            continue;
        }
        let class = arena.attr(id, "class").unwrap_or("").to_string();
        let is_material = hints
            .material_re
            .as_ref()
            .is_some_and(|re| re.is_match(&class));
        let text = arena.text_content(id);
        // Material ligature text is a glyph name, not page text.
        if (!text.is_empty() && !is_material) || arena.has_attr(id, "aria-label") {
            continue;
        }

        let mut icon = String::new();
        if let Some(re) = &hints.prefix_re {
            if let Some(caps) = re.captures(&class) {
                icon = caps[1].to_string();
            }
        }
        if icon.is_empty() && is_material && !text.is_empty() && text.chars().count() < 40 {
            icon = text.clone();
        }
        if icon.is_empty() {
            icon = svg_use_fragment(arena, id).unwrap_or_default();
        }
        if icon.is_empty() {
            icon = svg_title(arena, id).unwrap_or_default();
        }
        if icon.is_empty() {
            icon = semantic_ancestor_token(arena, id, body, hints).unwrap_or_default();
        }
        if !icon.is_empty() {
            arena.set_attr(id, "data-bicon", &icon);
        }
    }
}

fn svg_use_fragment(arena: &PageArena, id: PageId) -> Option<String> {
    let use_el = arena
        .descendants(id)
        .into_iter()
        .find(|&d| arena.tag(d) == Some("use"))?;
    let href = arena.attr(use_el, "href")?;
    let caps = RE_ICON_FRAGMENT.captures(href)?;
    Some(caps[1].to_string())
}

fn svg_title(arena: &PageArena, id: PageId) -> Option<String> {
    let title = arena.descendants(id).into_iter().find(|&d| {
        arena.tag(d) == Some("title")
            && arena.parent(d).is_some_and(|p| arena.tag(p) == Some("svg"))
    })?;
    let text = arena.text_content(title);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Scan up to N ancestors (4 for interactive elements, 1 otherwise) for a
/// class token matching one of the semantic keywords.
fn semantic_ancestor_token(
    arena: &PageArena,
    id: PageId,
    body: Option<PageId>,
    hints: &Hints,
) -> Option<String> {
    let tag = arena.tag(id).unwrap_or("");
    let role = arena.attr(id, "role").unwrap_or("");
    let interactive =
        INTERACTIVE_TAGS.contains(&tag) || role == "button" || role == "link";
    let max_levels = if interactive { 4 } else { 1 };

    let mut node = Some(id);
    for _ in 0..max_levels {
        let current = node?;
        if Some(current) == body {
            return None;
        }
        let class = arena.attr(current, "class").unwrap_or("").to_lowercase();
        if !class.is_empty() {
            for (keyword, re) in &hints.semantic {
                if re.is_match(&class) {
                    return Some(keyword.clone());
                }
            }
        }
        node = arena.parent(current);
    }
    None
}

/// Phase C: for parents with both hidden and visible same-shape children,
/// annotate the group and make the hidden members walkable again.
fn mark_switch_groups(arena: &mut PageArena, hints: &Hints) {
    let Some(state_re) = &hints.state_re else {
        return;
    };

    let hidden_ids: Vec<PageId> = arena
        .body_elements()
        .into_iter()
        .filter(|&id| arena.attr(id, "data-bhidden") == Some("1"))
        .collect();

    let mut seen: AHashSet<PageId> = AHashSet::new();
    for el in hidden_ids {
        let Some(parent) = arena.parent(el) else {
            continue;
        };
        if !seen.insert(parent) {
            continue;
        }
        let children: Vec<PageId> = arena
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| arena.has_attr(c, "data-bid"))
            .collect();
        if children.len() < 2 {
            continue;
        }

        let mut groups: AHashMap<String, Vec<PageId>> = AHashMap::new();
        for &child in &children {
            let class = arena.attr(child, "class").unwrap_or("");
            let normalized = state_re.replace_all(class, "");
            let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
            let key = format!("{}|{}", arena.tag(child).unwrap_or(""), normalized);
            groups.entry(key).or_default().push(child);
        }

        for (key, members) in groups {
            if members.len() < 2 {
                continue;
            }
            // Classless groups are too generic for tab-panel detection.
            if key.ends_with('|') {
                continue;
            }
            let (hidden, visible): (Vec<PageId>, Vec<PageId>) = members
                .into_iter()
                .partition(|&m| arena.attr(m, "data-bhidden") == Some("1"));
            if hidden.is_empty() || visible.is_empty() {
                continue;
            }
            for m in visible {
                arena.set_attr(m, "data-bgroup", "active");
            }
            for m in hidden {
                arena.remove_attr(m, "data-bhidden");
                arena.set_attr(m, "data-bgroup", "inactive");
                for d in arena.descendants(m) {
                    if arena.is_element(d) && arena.has_attr(d, "data-bhidden") {
                        arena.remove_attr(d, "data-bhidden");
                    }
                }
            }
        }
    }
}
