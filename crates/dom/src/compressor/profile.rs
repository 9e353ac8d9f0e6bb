//! Data-driven compressor profiles.
//!
//! A profile is the declarative replacement for a user-editable script:
//! URL patterns, a settings schema, a noise prefilter and pipeline
//! parameters. The untrusted part is pure data, so a broken user profile
//! can at worst filter nothing; it can never execute code.

use crate::compressor::pipeline::{self, PipelineParams};
use crate::types::{FilteredNode, NodeData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One entry of a profile's settings schema, surfaced to configuration UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingSpec {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub default: Value,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Number,
    Boolean,
    String,
}

/// A rule entry that can be switched off by a boolean setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatedPattern {
    pub value: String,
    /// Name of a boolean setting gating this entry. Missing settings
    /// default to enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl GatedPattern {
    pub fn always(value: &str) -> Self {
        Self {
            value: value.to_string(),
            when: None,
        }
    }

    pub fn when(value: &str, setting: &str) -> Self {
        Self {
            value: value.to_string(),
            when: Some(setting.to_string()),
        }
    }
}

/// Attribute-substring noise rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrPattern {
    pub contains: String,
    /// Exempts nodes whose attrs also contain this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless_contains: Option<String>,
    /// Match against the lowercased attribute string.
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// Noise prefilter: nodes matched here never reach the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseRules {
    /// Exact tag matches.
    pub tags: Vec<String>,
    /// Tag substring matches (custom elements like `ytd-miniplayer`).
    pub tag_substrings: Vec<GatedPattern>,
    /// Exact trimmed-text matches.
    pub texts: Vec<GatedPattern>,
    pub attr_substrings: Vec<AttrPattern>,
}

/// Heading-delimited section skipping (reference sections and the like).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSkip {
    pub heading_tags: Vec<String>,
    pub titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// A complete compressor profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorProfile {
    pub id: String,
    pub version: String,
    pub description: String,
    pub url_patterns: Vec<String>,
    pub settings: Vec<SettingSpec>,
    pub noise: NoiseRules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_sections: Option<SectionSkip>,
    pub max_items: usize,
    pub show_head: usize,
}

impl Default for CompressorProfile {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: String::new(),
            description: String::new(),
            url_patterns: Vec::new(),
            settings: Vec::new(),
            noise: NoiseRules::default(),
            skip_sections: None,
            max_items: 50,
            show_head: 10,
        }
    }
}

/// Settings resolved for one run: schema defaults overlaid with the
/// per-profile user overrides from the configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSettings(HashMap<String, Value>);

impl ResolvedSettings {
    pub fn resolve(
        profile: &CompressorProfile,
        overrides: Option<&HashMap<String, Value>>,
    ) -> Self {
        let mut values: HashMap<String, Value> = profile
            .settings
            .iter()
            .map(|s| (s.key.clone(), s.default.clone()))
            .collect();
        if let Some(overrides) = overrides {
            for (k, v) in overrides {
                values.insert(k.clone(), v.clone());
            }
        }
        Self(values)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.0
    }

    /// Boolean gate lookup; unknown keys are enabled.
    fn enabled(&self, gate: &Option<String>) -> bool {
        match gate {
            None => true,
            Some(key) => self.0.get(key).and_then(Value::as_bool).unwrap_or(true),
        }
    }

    fn usize_or(&self, key: &str, fallback: usize) -> usize {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(fallback)
    }
}

impl CompressorProfile {
    /// Run the prefilter and the fixed pipeline.
    pub fn process(
        &self,
        nodes: Vec<(u16, NodeData)>,
        settings: &ResolvedSettings,
    ) -> Vec<FilteredNode> {
        let mut kept: Vec<(u16, NodeData)> = nodes
            .into_iter()
            .filter(|(_, data)| !self.is_noise(data, settings))
            .collect();

        if let Some(skip) = &self.skip_sections {
            if settings.enabled(&skip.when) {
                kept = drop_skipped_sections(kept, skip);
            }
        }

        let params = PipelineParams {
            max_items: settings.usize_or("max_items", self.max_items),
            show_head: settings.usize_or("show_head", self.show_head),
            ..PipelineParams::default()
        };
        pipeline::run(kept, &params)
    }

    fn is_noise(&self, data: &NodeData, settings: &ResolvedSettings) -> bool {
        if self.noise.tags.iter().any(|t| *t == data.tag) {
            return true;
        }
        for pat in &self.noise.tag_substrings {
            if settings.enabled(&pat.when) && data.tag.contains(&pat.value) {
                return true;
            }
        }
        let text = data.text.trim();
        for pat in &self.noise.texts {
            if settings.enabled(&pat.when) && text == pat.value {
                return true;
            }
        }
        for pat in &self.noise.attr_substrings {
            if !settings.enabled(&pat.when) {
                continue;
            }
            let hit = if pat.lowercase {
                data.attrs.to_lowercase().contains(&pat.contains)
            } else {
                data.attrs.contains(&pat.contains)
            };
            if !hit {
                continue;
            }
            if let Some(exempt) = &pat.unless_contains {
                if data.attrs.contains(exempt.as_str()) {
                    continue;
                }
            }
            return true;
        }
        false
    }
}

/// Linear scan dropping nodes inside a skipped heading section. A section
/// ends at the next heading of the same or a higher level.
fn drop_skipped_sections(
    nodes: Vec<(u16, NodeData)>,
    skip: &SectionSkip,
) -> Vec<(u16, NodeData)> {
    let mut result = Vec::with_capacity(nodes.len());
    let mut skip_depth: Option<u16> = None;
    for (depth, data) in nodes {
        let is_heading = skip.heading_tags.iter().any(|t| *t == data.tag);
        if is_heading && should_skip_title(&data.text, &skip.titles) {
            skip_depth = Some(depth);
            continue;
        }
        if let Some(d) = skip_depth {
            if is_heading && depth <= d {
                skip_depth = None;
            } else {
                continue;
            }
        }
        result.push((depth, data));
    }
    result
}

fn should_skip_title(text: &str, titles: &[String]) -> bool {
    let title = text.trim().trim_end_matches("[edit]").trim();
    titles.iter().any(|t| t == title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::builtin;

    fn data(tag: &str, text: &str) -> NodeData {
        NodeData {
            tag: tag.to_string(),
            text: text.to_string(),
            ..NodeData::default()
        }
    }

    #[test]
    fn noise_tags_are_dropped() {
        let profile = builtin::google_search();
        let settings = ResolvedSettings::resolve(&profile, None);
        let nodes = vec![
            (0u16, data("p", "result")),
            (0, data("footer", "about")),
            (0, data("p", "Sign in")),
        ];
        let out = profile.process(nodes, &settings);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data.text, "result");
    }

    #[test]
    fn gating_setting_disables_a_rule() {
        let profile = builtin::google_search();
        let mut overrides = HashMap::new();
        overrides.insert("remove_footer".to_string(), Value::Bool(false));
        let settings = ResolvedSettings::resolve(&profile, Some(&overrides));
        let mut contentinfo = data("p", "footer links");
        contentinfo.attrs = r#"role="contentinfo""#.to_string();
        let out = profile.process(vec![(0u16, contentinfo)], &settings);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn unless_contains_exempts_matching_attrs() {
        let profile = builtin::wikipedia();
        let settings = ResolvedSettings::resolve(&profile, None);
        let mut site_nav = data("p", "site nav");
        site_nav.attrs = r#"role="navigation""#.to_string();
        let mut article_nav = data("p", "article nav");
        article_nav.attrs = r#"id="mw-toc", role="navigation""#.to_string();
        let out = profile.process(vec![(0u16, site_nav), (0, article_nav)], &settings);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data.text, "article nav");
    }

    #[test]
    fn skipped_sections_end_at_same_level_heading() {
        let profile = builtin::wikipedia();
        let settings = ResolvedSettings::resolve(&profile, None);
        let nodes = vec![
            (0u16, data("h2", "History")),
            (1, data("p", "old things")),
            (0, data("h2", "References[edit]")),
            (1, data("p", "[1] citation")),
            (2, data("p", "[2] citation")),
            (0, data("h2", "Legacy")),
            (1, data("p", "still here")),
        ];
        let out = profile.process(nodes, &settings);
        let texts: Vec<&str> = out.iter().map(|n| n.data.text.as_str()).collect();
        assert!(texts.contains(&"old things"));
        assert!(texts.contains(&"still here"));
        assert!(!texts.iter().any(|t| t.contains("citation")));
        assert!(!texts.iter().any(|t| t.contains("References")));
    }

    #[test]
    fn settings_override_pipeline_params() {
        let profile = builtin::default_profile();
        let mut overrides = HashMap::new();
        overrides.insert("max_items".to_string(), Value::from(5u64));
        overrides.insert("show_head".to_string(), Value::from(2u64));
        let settings = ResolvedSettings::resolve(&profile, Some(&overrides));
        let mut nodes = vec![(0u16, data("ul", ""))];
        for i in 0..10 {
            nodes.push((1, data("li", &format!("x{i}"))));
        }
        let out = profile.process(nodes, &settings);
        let children: Vec<_> = out.iter().filter(|n| n.depth == 1).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(children[2].data.text, "+8 more (10 total)");
    }

    #[test]
    fn profile_round_trips_as_json() {
        let profile = builtin::youtube();
        let json = serde_json::to_string_pretty(&profile).unwrap();
        let back: CompressorProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "youtube");
        assert_eq!(back.url_patterns, profile.url_patterns);
    }
}
