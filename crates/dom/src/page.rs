//! Index-based storage for a parsed page.
//!
//! `scraper` (html5ever) is only the parse frontend; the document is copied
//! into an owned arena right away so the walker phases can annotate elements
//! (`data-bid`, `data-bhidden`, ...) without fighting the parser's tree.
//!
//! Layout:
//!
//! ```text
//! PageArena: Vec<PageNode>
//!            [Node0][Node1][Node2]...
//!             4-byte indices, parent + ordered children per node
//! ```

use ahash::AHashMap;
use ego_tree;
use scraper::{Html, Node, Selector};
use smallvec::SmallVec;

/// Index into the arena.
pub type PageId = u32;

#[derive(Debug)]
pub enum PageValue {
    Element {
        /// Lowercase local name.
        tag: String,
        attrs: AHashMap<String, String>,
    },
    Text(String),
}

#[derive(Debug)]
pub struct PageNode {
    pub parent: Option<PageId>,
    pub children: SmallVec<[PageId; 4]>,
    pub value: PageValue,
}

#[derive(Debug, Default)]
pub struct PageArena {
    nodes: Vec<PageNode>,
    root: Option<PageId>,
    body: Option<PageId>,
}

impl PageArena {
    /// Parse an HTML document into an arena. Elements matched by
    /// `hidden_selectors` (carousel/slider clones) are pre-marked
    /// `data-bhidden="1"` so only the canonical copy is walked.
    pub fn parse(html: &str, hidden_selectors: &[String]) -> Self {
        let doc = Html::parse_document(html);
        let mut arena = PageArena {
            nodes: Vec::with_capacity(1024),
            root: None,
            body: None,
        };

        let mut ego_map: AHashMap<ego_tree::NodeId, PageId> = AHashMap::new();
        let root_ref = doc.root_element();
        let root_id = arena.convert(*root_ref, None, &mut ego_map);
        arena.root = Some(root_id);
        arena.body = arena.find_tag(root_id, "body").or(Some(root_id));

        for raw in hidden_selectors {
            let Ok(selector) = Selector::parse(raw) else {
                tracing::warn!(selector = %raw, "ignoring unparsable clone selector");
                continue;
            };
            for matched in doc.select(&selector) {
                if let Some(&id) = ego_map.get(&matched.id()) {
                    arena.set_attr(id, "data-bhidden", "1");
                }
            }
        }

        arena
    }

    fn convert(
        &mut self,
        root: ego_tree::NodeRef<'_, Node>,
        parent: Option<PageId>,
        ego_map: &mut AHashMap<ego_tree::NodeId, PageId>,
    ) -> PageId {
        // Iterative pre-order: children are pushed reversed so they are
        // created, and attached to their parent, in document order.
        let mut stack: Vec<(ego_tree::NodeRef<'_, Node>, Option<PageId>)> =
            vec![(root, parent)];
        let mut root_id = 0;
        let mut first = true;
        while let Some((node, parent)) = stack.pop() {
            let value = match node.value() {
                Node::Element(el) => {
                    let mut attrs = AHashMap::new();
                    for (name, val) in el.attrs() {
                        attrs.insert(name.to_string(), val.to_string());
                    }
                    PageValue::Element {
                        tag: el.name().to_ascii_lowercase(),
                        attrs,
                    }
                }
                Node::Text(text) => {
                    let s: &str = &text.text;
                    PageValue::Text(s.to_string())
                }
                _ => continue,
            };
            let id = self.push(PageNode {
                parent,
                children: SmallVec::new(),
                value,
            });
            if let Node::Element(_) = node.value() {
                ego_map.insert(node.id(), id);
            }
            if let Some(p) = parent {
                self.nodes[p as usize].children.push(id);
            }
            if first {
                root_id = id;
                first = false;
            }
            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }
        root_id
    }

    fn push(&mut self, node: PageNode) -> PageId {
        let id = self.nodes.len() as PageId;
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: PageId) -> &PageNode {
        &self.nodes[id as usize]
    }

    pub fn root(&self) -> Option<PageId> {
        self.root
    }

    /// The `<body>` element, or the document root for fragments.
    pub fn body(&self) -> Option<PageId> {
        self.body
    }

    pub fn is_element(&self, id: PageId) -> bool {
        matches!(self.node(id).value, PageValue::Element { .. })
    }

    pub fn tag(&self, id: PageId) -> Option<&str> {
        match &self.node(id).value {
            PageValue::Element { tag, .. } => Some(tag),
            PageValue::Text(_) => None,
        }
    }

    pub fn text(&self, id: PageId) -> Option<&str> {
        match &self.node(id).value {
            PageValue::Text(t) => Some(t),
            PageValue::Element { .. } => None,
        }
    }

    pub fn attr(&self, id: PageId, name: &str) -> Option<&str> {
        match &self.node(id).value {
            PageValue::Element { attrs, .. } => attrs.get(name).map(|s| s.as_str()),
            PageValue::Text(_) => None,
        }
    }

    pub fn has_attr(&self, id: PageId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: PageId, name: &str, value: &str) {
        if let PageValue::Element { attrs, .. } = &mut self.nodes[id as usize].value {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, id: PageId, name: &str) {
        if let PageValue::Element { attrs, .. } = &mut self.nodes[id as usize].value {
            attrs.remove(name);
        }
    }

    pub fn parent(&self, id: PageId) -> Option<PageId> {
        self.node(id).parent
    }

    pub fn children(&self, id: PageId) -> &[PageId] {
        &self.node(id).children
    }

    pub fn element_children(&self, id: PageId) -> impl Iterator<Item = PageId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: PageId) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut stack: Vec<PageId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            for &c in self.children(n).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Pre-order element descendants of `<body>`, excluding body itself.
    /// This is the walker's "every element" order.
    pub fn body_elements(&self) -> Vec<PageId> {
        match self.body {
            Some(body) => self
                .descendants(body)
                .into_iter()
                .filter(|&id| self.is_element(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Aggregated descendant text: trimmed segments joined by spaces.
    pub fn text_content(&self, id: PageId) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(own) = self.text(id) {
            let own = own.trim();
            if !own.is_empty() {
                parts.push(own);
            }
        }
        for d in self.descendants(id) {
            if let Some(t) = self.text(d) {
                let t = t.trim();
                if !t.is_empty() {
                    parts.push(t);
                }
            }
        }
        parts.join(" ")
    }

    /// First descendant element with the given tag, pre-order.
    pub fn find_tag(&self, id: PageId, tag: &str) -> Option<PageId> {
        if self.tag(id) == Some(tag) {
            return Some(id);
        }
        self.descendants(id)
            .into_iter()
            .find(|&d| self.tag(d) == Some(tag))
    }

    /// All element ids in arena order (pre-order over the whole document).
    pub fn all_elements(&self) -> impl Iterator<Item = PageId> + '_ {
        (0..self.nodes.len() as PageId).filter(|&id| self.is_element(id))
    }
}
