//! The live DOM walker, mirrored server-side.
//!
//! `walk` parses serialized HTML into a [`PageArena`], runs the marking
//! phases (identifier assignment, visibility, icon surrogates, switchable
//! sibling groups) and emits the flat, depth-tagged raw node list in
//! pre-order. When the session layer already ran the in-page marker script
//! the walk honors its annotations instead of recomputing them.

mod affordance;
mod locator;
mod mark;

use crate::config::Config;
use crate::page::{PageArena, PageId};
use crate::types::{ActionList, NodeData, RawNode, INLINE_TAGS, SKIP_TAGS};
use crate::utils::truncate_chars;

pub(crate) use affordance::detect_actions;

/// Walk serialized HTML into the raw node list.
pub fn walk(html: &str, cfg: &Config) -> Vec<RawNode> {
    let mut arena = PageArena::parse(html, &cfg.carousel_clone_selectors);
    mark::apply(&mut arena, cfg);

    let mut emitter = Emitter {
        arena: &arena,
        cfg,
        nodes: Vec::new(),
        count: 0,
    };
    if let Some(body) = arena.body() {
        emitter.walk_children(body, 0);
    }
    tracing::debug!(nodes = emitter.nodes.len(), "walked page");
    emitter.nodes
}

struct Emitter<'a> {
    arena: &'a PageArena,
    cfg: &'a Config,
    nodes: Vec<RawNode>,
    count: usize,
}

impl Emitter<'_> {
    fn walk_children(&mut self, el: PageId, depth: u16) {
        if self.count >= self.cfg.max_nodes || depth > self.cfg.max_depth {
            return;
        }
        for &child in self.arena.children(el) {
            if self.count >= self.cfg.max_nodes {
                return;
            }
            let Some(tag) = self.arena.tag(child) else {
                continue;
            };
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            if self.is_hidden(child) {
                continue;
            }
            if tag == "tr" {
                self.emit_table_row(child, depth);
                continue;
            }
            self.emit_element(child, depth);
        }
    }

    fn is_hidden(&self, id: PageId) -> bool {
        // Switchable group members stay walkable regardless of the static
        // rules; the group detection already decided their visibility.
        if matches!(
            self.arena.attr(id, "data-bgroup"),
            Some("active") | Some("inactive")
        ) {
            return false;
        }
        if self.arena.attr(id, "data-bhidden") == Some("1") {
            return true;
        }
        mark::statically_hidden(self.arena, id)
    }

    /// Direct text plus inline-children expansion. Inline children that
    /// carry an action are wrapped in angle markers to signal an embedded
    /// clickable span.
    fn collect_text(&self, el: PageId) -> String {
        let mut parts: Vec<String> = Vec::new();
        for &child in self.arena.children(el) {
            if let Some(t) = self.arena.text(child) {
                let t = t.trim();
                if !t.is_empty() {
                    parts.push(t.to_string());
                }
                continue;
            }
            let Some(tag) = self.arena.tag(child) else {
                continue;
            };
            if !INLINE_TAGS.contains(&tag) {
                continue;
            }
            let child_text = self.arena.text_content(child);
            if child_text.is_empty() {
                continue;
            }
            if self.actions_of(child).is_empty() {
                parts.push(child_text);
            } else {
                parts.push(format!("\u{27e8}{child_text}\u{27e9}"));
            }
        }
        parts.join(" ")
    }

    fn actions_of(&self, id: PageId) -> ActionList {
        let tag = self.arena.tag(id).unwrap_or("");
        let role = self.arena.attr(id, "role").unwrap_or("");
        let input_type = self
            .arena
            .attr(id, "type")
            .unwrap_or("")
            .to_ascii_lowercase();
        detect_actions(tag, role, &input_type)
    }

    /// A `<tr>` becomes one node with pipe-joined cell texts. Cells are
    /// walked only when they contain an interactive element, so clickable
    /// buttons inside rows survive without re-emitting static cells.
    fn emit_table_row(&mut self, tr: PageId, depth: u16) {
        let mut cell_texts: Vec<String> = Vec::new();
        let mut cells: Vec<PageId> = Vec::new();
        for &c in self.arena.children(tr) {
            if matches!(self.arena.tag(c), Some("td" | "th")) {
                let mut text = self.collect_text(c);
                if text.is_empty() {
                    text = self.arena.text_content(c);
                }
                cell_texts.push(truncate_chars(&text, 500));
                cells.push(c);
            }
        }
        let row_text = cell_texts.join(" | ");

        self.count += 1;
        self.nodes.push(RawNode {
            idx: self.count as u32,
            depth,
            data: NodeData {
                tag: "tr".to_string(),
                attrs: affordance::format_attrs(self.arena, tr),
                text: row_text.clone(),
                selector: locator::css_selector(self.arena, tr),
                xpath: locator::xpath_selector(self.arena, tr),
                actions: ActionList::new(),
                label: row_text,
                form_label: String::new(),
                state: affordance::detect_state(self.arena, tr),
                inlined: false,
            },
        });

        for cell in cells {
            let has_interactive = self.arena.descendants(cell).into_iter().any(|d| {
                self.arena
                    .tag(d)
                    .is_some_and(|t| !SKIP_TAGS.contains(&t))
                    && !self.actions_of(d).is_empty()
            });
            if has_interactive {
                self.walk_children(cell, depth + 1);
            }
        }
    }

    fn emit_element(&mut self, el: PageId, depth: u16) {
        let arena = self.arena;
        let tag = arena.tag(el).unwrap_or_default().to_string();

        let text = self.collect_text(el);
        let attrs = affordance::format_attrs(arena, el);
        let selector = locator::css_selector(arena, el);
        let xpath = locator::xpath_selector(arena, el);
        let actions = self.actions_of(el);
        let mut state = affordance::detect_state(arena, el);
        match arena.attr(el, "data-bgroup") {
            Some("active") => {
                state.insert("selected".to_string(), "true".to_string());
            }
            Some("inactive") => {
                state.insert("hidden".to_string(), "true".to_string());
            }
            _ => {}
        }

        let icon = arena.attr(el, "data-bicon").unwrap_or("").to_string();
        let img_name = if matches!(tag.as_str(), "img" | "video" | "audio" | "source") {
            arena
                .attr(el, "src")
                .and_then(crate::utils::src_basename)
                .map(|fname| match fname.rsplit_once('.') {
                    Some((stem, _)) => stem.to_string(),
                    None => fname,
                })
                .unwrap_or_default()
        } else {
            String::new()
        };

        let label = pick_label(
            &text,
            arena.attr(el, "aria-label").unwrap_or(""),
            arena.attr(el, "title").unwrap_or(""),
            &icon,
            arena.attr(el, "placeholder").unwrap_or(""),
            arena.attr(el, "alt").unwrap_or(""),
            &img_name,
            arena.attr(el, "value").unwrap_or(""),
        );

        let block_children: Vec<PageId> = arena
            .element_children(el)
            .filter(|&c| arena.tag(c).is_some_and(|t| !SKIP_TAGS.contains(&t)))
            .collect();

        let inlined =
            INLINE_TAGS.contains(&tag.as_str()) && !actions.is_empty() && block_children.is_empty();
        let aria_label = arena.attr(el, "aria-label").unwrap_or("");
        let display_text = if inlined {
            String::new()
        } else if !text.is_empty() {
            text
        } else if !icon.is_empty() {
            format!("[icon: {icon}]")
        } else {
            // Text-less labelled elements still read as their label.
            aria_label.to_string()
        };

        let form_label = if matches!(tag.as_str(), "input" | "textarea" | "select") {
            self.form_label(el)
        } else {
            String::new()
        };

        self.count += 1;
        self.nodes.push(RawNode {
            idx: self.count as u32,
            depth,
            data: NodeData {
                tag,
                attrs,
                text: display_text,
                selector,
                xpath,
                actions,
                label,
                form_label,
                state,
                inlined,
            },
        });

        if !block_children.is_empty() {
            self.walk_children(el, depth + 1);
        }
    }

    /// Associated `<label>` text for a form control: a `label[for]` match
    /// anywhere in the document, or the nearest wrapping `<label>`.
    fn form_label(&self, control: PageId) -> String {
        if let Some(cid) = self.arena.attr(control, "id") {
            for el in self.arena.all_elements() {
                if self.arena.tag(el) == Some("label")
                    && self.arena.attr(el, "for") == Some(cid)
                {
                    return truncate_chars(self.arena.text_content(el).trim(), 80);
                }
            }
        }
        let mut node = self.arena.parent(control);
        while let Some(p) = node {
            match self.arena.tag(p) {
                Some("label") => {
                    return truncate_chars(self.arena.text_content(p).trim(), 80)
                }
                Some("body") | None => break,
                _ => {}
            }
            node = self.arena.parent(p);
        }
        String::new()
    }
}

/// Label fallback chain: text, aria-label, title, icon surrogate,
/// placeholder, alt, image basename, value.
#[allow(clippy::too_many_arguments)]
fn pick_label(
    text: &str,
    aria_label: &str,
    title: &str,
    icon: &str,
    placeholder: &str,
    alt: &str,
    img_name: &str,
    value: &str,
) -> String {
    let label = if !text.is_empty() {
        text.to_string()
    } else if !aria_label.is_empty() {
        aria_label.to_string()
    } else if !title.is_empty() {
        title.to_string()
    } else if !icon.is_empty() {
        format!("[icon: {icon}]")
    } else if !placeholder.is_empty() {
        placeholder.to_string()
    } else if !alt.is_empty() {
        alt.to_string()
    } else if !img_name.is_empty() {
        format!("[img: {img_name}]")
    } else if !value.is_empty() {
        value.to_string()
    } else {
        String::new()
    };
    truncate_chars(&label, 500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn walk_default(html: &str) -> Vec<RawNode> {
        walk(html, &Config::default())
    }

    fn by_tag<'a>(nodes: &'a [RawNode], tag: &str) -> Vec<&'a RawNode> {
        nodes.iter().filter(|n| n.data.tag == tag).collect()
    }

    #[test]
    fn emits_preorder_with_depths() {
        let nodes = walk_default(
            "<body><div><p>one</p><p>two</p></div><section>tail</section></body>",
        );
        let shape: Vec<(u32, u16, &str)> = nodes
            .iter()
            .map(|n| (n.idx, n.depth, n.data.tag.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![(1, 0, "div"), (2, 1, "p"), (3, 1, "p"), (4, 0, "section")]
        );
    }

    #[test]
    fn hidden_subtrees_are_skipped() {
        let nodes = walk_default(
            "<body><div style=\"display:none\"><button>never</button></div><p>kept</p></body>",
        );
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].data.tag, "p");
    }

    #[test]
    fn inline_action_child_is_inlined_with_marker() {
        let nodes = walk_default(
            "<body><p>Read the <a href=\"/doc\">manual</a> first</p></body>",
        );
        let p = &by_tag(&nodes, "p")[0];
        assert_eq!(p.data.text, "Read the \u{27e8}manual\u{27e9} first");
        let a = &by_tag(&nodes, "a")[0];
        assert!(a.data.inlined);
        assert!(a.data.text.is_empty());
        assert_eq!(a.data.actions.as_slice(), &[Action::Click]);
        assert_eq!(a.data.label, "manual");
    }

    #[test]
    fn inline_without_action_keeps_plain_text() {
        let nodes = walk_default("<body><p>very <em>nice</em> page</p></body>");
        let p = &by_tag(&nodes, "p")[0];
        assert_eq!(p.data.text, "very nice page");
        let em = &by_tag(&nodes, "em")[0];
        assert!(!em.data.inlined);
    }

    #[test]
    fn table_row_renders_pipe_joined_cells() {
        let nodes = walk_default(
            "<body><table><tbody><tr><td>Name</td><td>Value</td>\
             <td><button>Edit</button></td></tr></tbody></table></body>",
        );
        let tr = &by_tag(&nodes, "tr")[0];
        assert_eq!(tr.data.text, "Name | Value | Edit");
        // Only the interactive cell's content is walked.
        assert!(by_tag(&nodes, "td").is_empty());
        let button = &by_tag(&nodes, "button")[0];
        assert_eq!(button.data.actions.as_slice(), &[Action::Click]);
        assert_eq!(button.depth, tr.depth + 1);
    }

    #[test]
    fn icon_button_gets_icon_label() {
        let nodes = walk_default(
            "<body><button><svg><use href=\"#icon-x\"></use></svg></button></body>",
        );
        let button = &by_tag(&nodes, "button")[0];
        assert_eq!(button.data.text, "[icon: x]");
        assert_eq!(button.data.label, "[icon: x]");
    }

    #[test]
    fn aria_label_beats_icon() {
        let nodes = walk_default(
            "<body><button aria-label=\"Close\"><svg><use href=\"#icon-x\"></use></svg></button></body>",
        );
        let button = &by_tag(&nodes, "button")[0];
        assert_eq!(button.data.label, "Close");
        assert_eq!(button.data.attrs, "aria-label=\"Close\"");
    }

    #[test]
    fn switch_group_members_carry_state() {
        let nodes = walk_default(
            "<body><ul>\
             <li class=\"tab active\">one</li>\
             <li class=\"tab\" style=\"display:none\">two</li>\
             </ul></body>",
        );
        let lis = by_tag(&nodes, "li");
        assert_eq!(lis.len(), 2);
        assert_eq!(lis[0].data.state.get("selected").map(String::as_str), Some("true"));
        assert_eq!(lis[1].data.state.get("hidden").map(String::as_str), Some("true"));
    }

    #[test]
    fn form_label_resolves_for_attribute() {
        let nodes = walk_default(
            "<body><label for=\"email\">Email address</label>\
             <input id=\"email\" type=\"email\"></body>",
        );
        let input = &by_tag(&nodes, "input")[0];
        assert_eq!(input.data.form_label, "Email address");
        assert_eq!(input.data.actions.as_slice(), &[Action::Type]);
    }

    #[test]
    fn max_nodes_caps_emission() {
        let mut cfg = Config::default();
        cfg.max_nodes = 3;
        let html = "<body><p>1</p><p>2</p><p>3</p><p>4</p><p>5</p></body>";
        let nodes = walk(html, &cfg);
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn selectors_anchor_on_bid() {
        let nodes = walk_default("<body><div><button>Go</button></div></body>");
        for n in &nodes {
            assert!(n.data.selector.starts_with("[data-bid=\""));
            assert!(n.data.xpath.starts_with("/html/body/"));
        }
    }
}
