//! Bundled compressor profiles.
//!
//! These mirror the sites the product ships tuned filters for. They are
//! constructed in code, cannot be overwritten or deleted, and are all
//! disabled for URL matching by default (see `Config::disabled_compressors`).

use super::profile::{
    AttrPattern, CompressorProfile, GatedPattern, NoiseRules, SectionSkip, SettingKind,
    SettingSpec,
};
use serde_json::json;

/// Names reserved for bundled profiles; user profiles cannot shadow them.
pub const OFFICIAL_PROFILES: &[&str] = &[
    "google_search",
    "wikipedia",
    "youtube",
    "github",
    "stackoverflow",
    "amazon",
    "hackernews",
];

pub const BUILTIN_VERSION: &str = "2025.07.1";

/// Look up a built-in profile by name.
pub fn get(name: &str) -> Option<CompressorProfile> {
    match name {
        "default" => Some(default_profile()),
        "google_search" => Some(google_search()),
        "wikipedia" => Some(wikipedia()),
        "stackoverflow" => Some(stackoverflow()),
        "youtube" => Some(youtube()),
        _ => None,
    }
}

/// Built-in names that participate in tier-2 URL matching.
pub fn matchable_names() -> Vec<&'static str> {
    vec!["google_search", "stackoverflow", "wikipedia", "youtube"]
}

fn number_setting(key: &str, label: &str, default: u64, desc: &str) -> SettingSpec {
    SettingSpec {
        key: key.to_string(),
        label: label.to_string(),
        kind: SettingKind::Number,
        default: json!(default),
        desc: desc.to_string(),
    }
}

fn bool_setting(key: &str, label: &str, default: bool, desc: &str) -> SettingSpec {
    SettingSpec {
        key: key.to_string(),
        label: label.to_string(),
        kind: SettingKind::Boolean,
        default: json!(default),
        desc: desc.to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn always(items: &[&str]) -> Vec<GatedPattern> {
    items.iter().map(|s| GatedPattern::always(s)).collect()
}

/// General-purpose profile: no prefilter, stock pipeline parameters.
pub fn default_profile() -> CompressorProfile {
    CompressorProfile {
        id: "default".to_string(),
        version: BUILTIN_VERSION.to_string(),
        description: "General-purpose node filtering and simplification".to_string(),
        settings: vec![
            number_setting("max_items", "Max List Items", 50, "Maximum items before truncation"),
            number_setting("show_head", "Show Head", 10, "Items to keep when truncating"),
        ],
        ..CompressorProfile::default()
    }
}

/// Google Search: results, knowledge panels and navigation.
pub fn google_search() -> CompressorProfile {
    CompressorProfile {
        id: "google_search".to_string(),
        version: BUILTIN_VERSION.to_string(),
        description: "Google Search results, knowledge panels and navigation".to_string(),
        url_patterns: strings(&["*google.com/search*", "*google.*/search*"]),
        settings: vec![
            number_setting("max_items", "Max List Items", 30, "Maximum items before truncation"),
            number_setting("show_head", "Show Head", 10, "Items to keep when truncating"),
            bool_setting("remove_footer", "Remove Footer", true, "Strip footer navigation and links"),
        ],
        noise: NoiseRules {
            tags: strings(&["footer", "style", "script", "noscript", "svg", "path"]),
            texts: always(&[
                "Sign in",
                "Settings",
                "Privacy",
                "Terms",
                "Advertising",
                "Business",
                "About",
                "How Search works",
            ]),
            attr_substrings: vec![AttrPattern {
                contains: r#"role="contentinfo""#.to_string(),
                unless_contains: None,
                lowercase: false,
                when: Some("remove_footer".to_string()),
            }],
            ..NoiseRules::default()
        },
        max_items: 30,
        show_head: 10,
        ..CompressorProfile::default()
    }
}

/// Wikipedia: article content, table of contents and infoboxes.
pub fn wikipedia() -> CompressorProfile {
    CompressorProfile {
        id: "wikipedia".to_string(),
        version: BUILTIN_VERSION.to_string(),
        description: "Wikipedia article content, table of contents and infoboxes".to_string(),
        url_patterns: strings(&["*wikipedia.org/wiki/*", "*wikipedia.org/w/*"]),
        settings: vec![
            number_setting("max_items", "Max List Items", 40, "Maximum items before truncation"),
            number_setting("show_head", "Show Head", 15, "Items to keep when truncating"),
            bool_setting(
                "skip_references",
                "Skip References",
                true,
                "Remove References/External links sections",
            ),
            bool_setting(
                "remove_edit_links",
                "Remove Edit Links",
                true,
                "Strip [edit] and [citation needed] links",
            ),
        ],
        noise: NoiseRules {
            tags: strings(&["footer", "style", "script", "noscript", "svg", "sup"]),
            texts: vec![
                GatedPattern::when("[edit]", "remove_edit_links"),
                GatedPattern::when("[citation needed]", "remove_edit_links"),
            ],
            attr_substrings: vec![AttrPattern {
                contains: r#"role="navigation""#.to_string(),
                unless_contains: Some("mw-".to_string()),
                lowercase: false,
                when: None,
            }],
            ..NoiseRules::default()
        },
        skip_sections: Some(SectionSkip {
            heading_tags: strings(&["h2", "h3"]),
            titles: strings(&[
                "External links",
                "References",
                "Notes",
                "Citations",
                "Further reading",
                "Bibliography",
            ]),
            when: Some("skip_references".to_string()),
        }),
        max_items: 40,
        show_head: 15,
        ..CompressorProfile::default()
    }
}

/// Stack Overflow: question, answers, votes and comments.
pub fn stackoverflow() -> CompressorProfile {
    CompressorProfile {
        id: "stackoverflow".to_string(),
        version: BUILTIN_VERSION.to_string(),
        description: "Stack Overflow question, answers, votes and comments".to_string(),
        url_patterns: strings(&[
            "*stackoverflow.com/questions/*",
            "*stackexchange.com/questions/*",
        ]),
        settings: vec![
            number_setting("max_items", "Max List Items", 30, "Maximum items before truncation"),
            number_setting("show_head", "Show Head", 10, "Items to keep when truncating"),
            bool_setting(
                "remove_sidebar",
                "Remove Sidebar",
                true,
                "Strip right sidebar (ads, related questions)",
            ),
        ],
        noise: NoiseRules {
            tags: strings(&["footer", "style", "script", "noscript", "svg"]),
            texts: always(&[
                "Teams",
                "Advertising",
                "Talent",
                "Company",
                "Stack Overflow for Teams",
            ]),
            attr_substrings: vec![
                AttrPattern {
                    contains: "js-sidebar-zone".to_string(),
                    unless_contains: None,
                    lowercase: false,
                    when: Some("remove_sidebar".to_string()),
                },
                AttrPattern {
                    contains: "sidebar".to_string(),
                    unless_contains: None,
                    lowercase: true,
                    when: Some("remove_sidebar".to_string()),
                },
                AttrPattern {
                    contains: "js-consent-banner".to_string(),
                    unless_contains: None,
                    lowercase: false,
                    when: None,
                },
            ],
            ..NoiseRules::default()
        },
        max_items: 30,
        show_head: 10,
        ..CompressorProfile::default()
    }
}

/// YouTube: video info, search results and comments.
pub fn youtube() -> CompressorProfile {
    CompressorProfile {
        id: "youtube".to_string(),
        version: BUILTIN_VERSION.to_string(),
        description: "YouTube video info, search results and comments".to_string(),
        url_patterns: strings(&["*youtube.com/*", "*youtu.be/*"]),
        settings: vec![
            number_setting("max_items", "Max List Items", 20, "Maximum items before truncation"),
            number_setting("show_head", "Show Head", 8, "Items to keep when truncating"),
            bool_setting(
                "remove_miniplayer",
                "Remove Miniplayer",
                true,
                "Strip miniplayer overlay",
            ),
            bool_setting(
                "remove_guide",
                "Remove Guide Drawer",
                true,
                "Strip sidebar navigation drawer",
            ),
        ],
        noise: NoiseRules {
            tags: strings(&["footer", "style", "script", "noscript", "svg", "path"]),
            tag_substrings: vec![
                GatedPattern::when("ytd-miniplayer", "remove_miniplayer"),
                GatedPattern::when("ytd-popup", "remove_miniplayer"),
                GatedPattern::when("tp-yt-app-drawer", "remove_guide"),
                GatedPattern::when("ytd-guide", "remove_guide"),
            ],
            texts: always(&[
                "Terms",
                "Privacy",
                "Policy & Safety",
                "How YouTube works",
                "Test new features",
                "NFL Sunday Ticket",
            ]),
            ..NoiseRules::default()
        },
        max_items: 20,
        show_head: 8,
        ..CompressorProfile::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_resolves() {
        for name in ["default", "google_search", "wikipedia", "stackoverflow", "youtube"] {
            let profile = get(name).unwrap();
            assert_eq!(profile.id, name);
            assert!(!profile.version.is_empty());
        }
        assert!(get("nope").is_none());
    }

    #[test]
    fn default_has_no_prefilter() {
        let p = default_profile();
        assert!(p.noise.tags.is_empty());
        assert!(p.url_patterns.is_empty());
        assert_eq!(p.max_items, 50);
    }

    #[test]
    fn matchable_names_exclude_default() {
        assert!(!matchable_names().contains(&"default"));
    }
}
