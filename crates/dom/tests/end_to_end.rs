//! Full-stack scenarios: HTML in, snapshot out.

use pagelens_dom::assembler::AssembleOptions;
use pagelens_dom::compressor::builtin;
use pagelens_dom::compressor::profile::ResolvedSettings;
use pagelens_dom::{assemble, diff_dom, walk, Config};

fn snapshot(html: &str) -> pagelens_dom::Snapshot {
    let cfg = Config::default();
    let raw = walk(html, &cfg);
    let profile = builtin::default_profile();
    let settings = ResolvedSettings::resolve(&profile, None);
    let filtered = profile.process(
        raw.iter().map(|n| (n.depth, n.data.clone())).collect(),
        &settings,
    );
    assemble(raw.len(), &filtered, html.chars().count(), &AssembleOptions::full())
}

fn filtered_nodes(html: &str) -> Vec<pagelens_dom::FilteredNode> {
    let cfg = Config::default();
    let raw = walk(html, &cfg);
    let profile = builtin::default_profile();
    let settings = ResolvedSettings::resolve(&profile, None);
    profile.process(
        raw.iter().map(|n| (n.depth, n.data.clone())).collect(),
        &settings,
    )
}

#[test]
fn nested_wrappers_collapse_to_a_single_line() {
    let snap = snapshot("<body><div><div><span>Hello</span></div></div></body>");
    assert_eq!(snap.tree, "[1] span: Hello");
    assert_eq!(snap.stats.nodes_after_filter, 1);
    assert!(snap.stats.nodes_after_filter <= snap.stats.nodes_before_filter);
}

#[test]
fn labelled_icon_button_renders_label_text() {
    let snap = snapshot(
        "<body><button aria-label=\"Close\"><svg><use href=\"#icon-x\"></use></svg></button></body>",
    );
    assert_eq!(
        snap.tree,
        "[1] button(aria-label=\"Close\") [click]: Close"
    );
    assert_eq!(snap.interactive.len(), 1);
    assert_eq!(snap.interactive[0].label, "Close");
}

#[test]
fn inert_item_list_truncates_to_head_plus_placeholder() {
    let mut html = String::from("<body><ul>");
    for i in 0..60 {
        html.push_str(&format!("<li>item {i}</li>"));
    }
    html.push_str("</ul></body>");
    let snap = snapshot(&html);

    let lines: Vec<&str> = snap.tree.lines().collect();
    assert_eq!(lines[0], "[1] ul");
    assert_eq!(lines[1], "  [1.1] li: item 0");
    assert_eq!(lines[10], "  [1.10] li: item 9");
    assert_eq!(lines[11], "  [1.11] \u{2026}: +50 more (60 total)");
    assert_eq!(lines.len(), 12);
}

#[test]
fn closed_dialog_is_invisible_and_open_dialog_folds() {
    let closed = snapshot("<body><dialog><p>hidden modal</p></dialog><p>page</p></body>");
    assert!(!closed.tree.contains("hidden modal"));

    let mut html = String::from("<body><div role=\"dialog\">");
    for i in 0..40 {
        html.push_str(&format!("<p>row {i}</p>"));
    }
    html.push_str("</div></body>");
    let open = snapshot(&html);
    assert!(open.tree.contains("\u{b7}\u{b7}\u{b7} 40 children"));
    assert!(!open.tree.contains("row 3"));
}

#[test]
fn table_row_keeps_one_line_plus_nested_button() {
    let snap = snapshot(
        "<body><table><tr><td>Name</td><td>Value</td><td><button>Edit</button></td></tr></table></body>",
    );
    let lines: Vec<&str> = snap.tree.lines().collect();
    let tr_line = lines.iter().find(|l| l.contains("] tr")).unwrap();
    assert!(tr_line.ends_with("tr: Name | Value | Edit"));
    let button_line = lines.iter().find(|l| l.contains("] button")).unwrap();
    assert!(button_line.contains("[click]"));
    assert!(button_line.contains(": Edit"));
    assert!(!snap.tree.contains("] td"));
}

#[test]
fn switchable_tabs_walk_hidden_panel_with_group_state() {
    let snap = snapshot(
        "<body><ul>\
         <li class=\"tab active\">Overview</li>\
         <li class=\"tab\" style=\"display:none\">Pricing</li>\
         <li class=\"tab\" style=\"display:none\">Reviews</li>\
         </ul></body>",
    );
    assert!(snap.tree.contains("{selected}: Overview"));
    assert!(snap.tree.contains("{hidden}: Pricing"));
    assert!(snap.tree.contains("{hidden}: Reviews"));
}

#[test]
fn every_tree_hid_is_resolvable() {
    let snap = snapshot(
        "<body><nav><a href=\"/a\">Home</a><a href=\"/b\">Docs</a></nav>\
         <main><h1>Title</h1><p>Body text with a <a href=\"/c\">link</a></p>\
         <form><label for=\"q\">Query</label><input id=\"q\" type=\"search\"></form></main></body>",
    );
    let mut seen = std::collections::BTreeSet::new();
    for line in snap.tree.lines() {
        let start = line.find('[').unwrap() + 1;
        let end = line.find(']').unwrap();
        let hid = &line[start..end];
        assert!(seen.insert(hid.to_string()), "duplicate hid {hid}");
        assert!(snap.node_map.contains_key(hid), "hid {hid} missing in node_map");
        assert!(snap.xpath_map.contains_key(hid), "hid {hid} missing in xpath_map");
    }
    for entry in &snap.interactive {
        assert!(snap.node_map.contains_key(&entry.hid));
        assert!(!entry.actions.is_empty());
    }
}

#[test]
fn hids_sort_back_into_preorder() {
    let nodes = filtered_nodes(
        "<body><ul><li>a<p>deep</p></li><li>b</li></ul><p>tail</p></body>",
    );
    let mut sorted = nodes.clone();
    sorted.sort_by_key(|n| n.hid_path());
    let original: Vec<&str> = nodes.iter().map(|n| n.hid.as_str()).collect();
    let resorted: Vec<&str> = sorted.iter().map(|n| n.hid.as_str()).collect();
    assert_eq!(original, resorted);
}

#[test]
fn recompressing_a_filtered_list_is_a_fixed_point() {
    let mut html = String::from("<body><div><section>");
    for i in 0..30 {
        html.push_str(&format!("<div><p>paragraph {i}</p></div>"));
    }
    html.push_str("</section></div></body>");
    let first = filtered_nodes(&html);

    let profile = builtin::default_profile();
    let settings = ResolvedSettings::resolve(&profile, None);
    let second = profile.process(
        first.iter().map(|n| (n.depth, n.data.clone())).collect(),
        &settings,
    );
    assert_eq!(first.len(), second.len());
}

#[test]
fn diffing_a_snapshot_against_itself_is_empty() {
    let nodes = filtered_nodes(
        "<body><button>One</button><button>Two</button><input type=\"text\"></body>",
    );
    let diff = diff_dom(&nodes, &nodes, 20);
    assert!(!diff.has_changes);
    assert_eq!(diff.summary, "no changes");
}

#[test]
fn interaction_diff_tracks_moves_and_state() {
    let before = filtered_nodes(
        "<body><div><p>intro</p>\
         <button data-bid=\"7\" aria-expanded=\"false\">Menu</button></div></body>",
    );
    let after = filtered_nodes(
        "<body><div><p>intro</p><p>inserted</p>\
         <button data-bid=\"7\" aria-expanded=\"true\">Menu</button></div></body>",
    );
    let diff = diff_dom(&before, &after, 20);
    let button_changes: Vec<_> = diff
        .changed
        .iter()
        .filter(|c| c.label.contains("Menu"))
        .collect();
    let fields: Vec<&str> = button_changes.iter().map(|c| c.field.as_str()).collect();
    assert!(fields.contains(&"hid"));
    assert!(fields.contains(&"state.aria-expanded"));
}

#[test]
fn compression_shrinks_a_verbose_page() {
    let mut html = String::from("<html><head><title>t</title></head><body>");
    for i in 0..50 {
        html.push_str(&format!(
            "<div class=\"row wrapper padding-large margin-auto\"><div><div>\
             <span>entry number {i}</span></div></div></div>"
        ));
    }
    html.push_str("</body></html>");
    let snap = snapshot(&html);
    assert!(snap.stats.tree_chars < snap.stats.raw_html_chars);
    assert!(snap.stats.compression_ratio < 1.0);
    assert!(snap.stats.nodes_after_filter <= snap.stats.nodes_before_filter);
    assert!(snap.tree.contains("entry number 0"));
}
