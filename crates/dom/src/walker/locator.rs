//! CSS and XPath locator generation.
//!
//! The CSS selector prefers stable anchors in priority order: `data-bid`
//! (always present after marking), element id, aria-label, name, and only
//! then a structural ancestor chain. The XPath is always the absolute path.

use crate::page::{PageArena, PageId};

pub(crate) fn css_selector(arena: &PageArena, id: PageId) -> String {
    if let Some(bid) = arena.attr(id, "data-bid") {
        return format!("[data-bid=\"{bid}\"]");
    }
    if let Some(tid) = arena.attr(id, "id") {
        return format!("#{tid}");
    }
    let tag = arena.tag(id).unwrap_or_default();
    if let Some(aria) = arena.attr(id, "aria-label") {
        let safe = aria.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("{tag}[aria-label=\"{safe}\"]");
    }
    if let Some(name) = arena.attr(id, "name") {
        return format!("{tag}[name=\"{name}\"]");
    }

    // Structural fallback: ancestor chain with :nth-of-type where needed,
    // stopping early at the first ancestor with an id.
    let mut parts: Vec<String> = Vec::new();
    let mut el = id;
    loop {
        let tag = arena.tag(el).unwrap_or_default().to_string();
        let Some(parent) = arena.parent(el) else {
            parts.push(tag);
            break;
        };
        if let Some(eid) = arena.attr(el, "id") {
            parts.push(format!("#{eid}"));
            break;
        }
        parts.push(position_selector(arena, parent, el, &tag, true));
        el = parent;
    }
    parts.reverse();
    parts.join(" > ")
}

pub(crate) fn xpath_selector(arena: &PageArena, id: PageId) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut el = id;
    loop {
        let tag = arena.tag(el).unwrap_or_default().to_string();
        let Some(parent) = arena.parent(el) else {
            parts.push(tag);
            break;
        };
        parts.push(position_selector(arena, parent, el, &tag, false));
        el = parent;
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// `tag` when the element is the only sibling of its tag, otherwise
/// `tag:nth-of-type(i)` (CSS) or `tag[i]` (XPath), 1-indexed.
fn position_selector(
    arena: &PageArena,
    parent: PageId,
    el: PageId,
    tag: &str,
    css: bool,
) -> String {
    let siblings: Vec<PageId> = arena
        .children(parent)
        .iter()
        .copied()
        .filter(|&c| arena.tag(c) == Some(tag))
        .collect();
    if siblings.len() == 1 {
        tag.to_string()
    } else {
        let idx = siblings.iter().position(|&s| s == el).unwrap_or(0) + 1;
        if css {
            format!("{tag}:nth-of-type({idx})")
        } else {
            format!("{tag}[{idx}]")
        }
    }
}
