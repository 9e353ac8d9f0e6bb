//! Action and state detection, plus the curated attribute rendering.

use crate::page::{PageArena, PageId};
use crate::types::{
    tag_attr_rules, Action, ActionList, StateMap, CLICKABLE_INPUT_TYPES, GLOBAL_ATTRS,
    STATE_ATTRS, TYPEABLE_INPUT_TYPES,
};
use crate::utils::{src_basename, truncate_chars};
use smallvec::smallvec;

/// Decide what an agent can do with an element from its tag, role and
/// (for inputs) the `type` attribute.
pub(crate) fn detect_actions(tag: &str, role: &str, input_type: &str) -> ActionList {
    if tag == "a" || role == "link" {
        return smallvec![Action::Click];
    }
    if tag == "button" || role == "button" {
        return smallvec![Action::Click];
    }
    if tag == "input" {
        if TYPEABLE_INPUT_TYPES.contains(&input_type) {
            return smallvec![Action::Type];
        }
        if CLICKABLE_INPUT_TYPES.contains(&input_type)
            || input_type == "checkbox"
            || input_type == "radio"
        {
            return smallvec![Action::Click];
        }
        return ActionList::new();
    }
    if tag == "textarea" || role == "combobox" {
        return smallvec![Action::Type];
    }
    if tag == "select" {
        return smallvec![Action::Select];
    }
    if matches!(
        role,
        "checkbox" | "radio" | "switch" | "tab" | "menuitem" | "option"
    ) {
        return smallvec![Action::Click];
    }
    ActionList::new()
}

/// Collect state attributes. Bare boolean attributes become `"true"`; form
/// controls also carry their current `value`, capped at 80 chars.
pub(crate) fn detect_state(arena: &PageArena, id: PageId) -> StateMap {
    let mut state = StateMap::new();
    for &attr in STATE_ATTRS {
        if let Some(val) = arena.attr(id, attr) {
            let rendered = if val.is_empty() { "true" } else { val };
            state.insert(attr.to_string(), rendered.to_string());
        }
    }
    if matches!(arena.tag(id), Some("input" | "textarea" | "select")) {
        if let Some(val) = arena.attr(id, "value") {
            state.insert("value".to_string(), truncate_chars(val, 80));
        }
    }
    state
}

/// Render the curated attribute subset as a single display string.
///
/// `href` renders as a bare key, `src` is reduced to its basename, form
/// `action` keeps only the path, everything else is capped at 80 chars.
pub(crate) fn format_attrs(arena: &PageArena, id: PageId) -> String {
    let tag = arena.tag(id).unwrap_or("");
    let mut pairs: Vec<String> = Vec::new();
    let keys = GLOBAL_ATTRS.iter().chain(tag_attr_rules(tag).iter());
    for &key in keys {
        let Some(val) = arena.attr(id, key) else {
            continue;
        };
        let val = val.trim();
        if val.is_empty() {
            continue;
        }
        match key {
            "href" => pairs.push("href".to_string()),
            "src" => {
                if let Some(fname) = src_basename(val) {
                    if !fname.is_empty() && fname.chars().count() <= 80 {
                        pairs.push(format!("src=\"{fname}\""));
                        continue;
                    }
                }
                pairs.push("src".to_string());
            }
            "action" => {
                let path = val.split('?').next().unwrap_or(val);
                pairs.push(format!("action=\"{}\"", truncate_chars(path, 60)));
            }
            _ => pairs.push(format!("{key}=\"{}\"", truncate_chars(val, 80))),
        }
    }
    pairs.join(", ")
}
