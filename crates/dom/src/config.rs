//! Centralized runtime configuration.
//!
//! Every tunable of the walker, pipeline and session layer lives here with
//! its default. Only user overrides are persisted; defaults are merged back
//! in on every read, so new keys pick up their defaults transparently.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// One URL-pattern to compressor-profile mapping. First match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorRule {
    pub pattern: String,
    pub script: String,
}

/// Merged configuration snapshot. Callers take a fresh snapshot on each
/// invocation; nothing holds one across operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Walker emission caps
    pub max_nodes: usize,
    pub max_depth: u16,

    // Navigation timeouts (ms)
    pub nav_timeout: u64,
    pub reload_timeout: u64,

    // Page load waits (ms)
    pub load_wait: u64,
    pub network_idle_wait: u64,
    /// Quiet interval for the mutation-observer settle after interactions.
    pub dom_settle_wait: u64,

    // Interaction budgets (ms) - passed through to the driver layer
    pub click_timeout: u64,
    pub input_timeout: u64,
    pub hover_timeout: u64,
    pub scroll_timeout: u64,
    pub wait_for_element_timeout: u64,
    pub type_delay: u64,
    pub scroll_pixels: i64,

    // Walker heuristics. The gray-text and icon-size knobs are consumed by
    // the in-page marker only; they are reserved on the server-side mirror.
    pub gray_text_min_rgb: u32,
    pub gray_text_max_diff: u32,
    pub icon_max_size: u32,

    // Walker hint lists
    pub icon_class_prefixes: Vec<String>,
    pub material_icon_classes: Vec<String>,
    pub semantic_keywords: Vec<String>,
    pub carousel_clone_selectors: Vec<String>,
    pub switchable_state_classes: Vec<String>,

    // Lite-mode text truncation (0 = no truncation)
    pub lite_text_max: usize,
    pub lite_text_head: usize,

    // Browser
    pub headless: bool,

    // Benchmark
    pub benchmark_timeout: u64,
    pub benchmark_idle_wait: u64,

    /// User URL rules, checked before profile-declared patterns.
    pub compressor_rules: Vec<CompressorRule>,
    /// Official profiles excluded from pattern matching. All off by default;
    /// remove a name to enable it.
    pub disabled_compressors: Vec<String>,
    /// Per-profile setting overrides, e.g. `{"youtube": {"max_items": 10}}`.
    pub compressor_settings: HashMap<String, HashMap<String, Value>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nodes: 20_000,
            max_depth: 50,

            nav_timeout: 15_000,
            reload_timeout: 15_000,

            load_wait: 1_500,
            network_idle_wait: 500,
            dom_settle_wait: 500,

            click_timeout: 5_000,
            input_timeout: 5_000,
            hover_timeout: 5_000,
            scroll_timeout: 5_000,
            wait_for_element_timeout: 10_000,
            type_delay: 20,
            scroll_pixels: 500,

            gray_text_min_rgb: 150,
            gray_text_max_diff: 20,
            icon_max_size: 80,

            icon_class_prefixes: to_strings(&[
                "fa", "fas", "far", "fab", "fal", "fad", "bi", "icon",
                "anticon", "glyphicon", "mdi", "ri", "el-icon", "lucide",
                "heroicon",
            ]),
            material_icon_classes: to_strings(&[
                "material-icons",
                "material-icons-outlined",
                "material-icons-round",
                "material-icons-sharp",
                "material-icons-two-tone",
                "material-symbols-outlined",
                "material-symbols-rounded",
                "material-symbols-sharp",
            ]),
            semantic_keywords: to_strings(&[
                "search", "login", "logout", "signin", "signout", "signup",
                "register", "cart", "checkout", "payment", "subscribe",
                "unsubscribe", "contact", "comment", "reply", "send",
                "message", "share", "repost", "forward", "download", "upload",
                "export", "import", "filter", "sort", "reset", "close",
                "cancel", "dismiss", "delete", "remove", "trash", "edit",
                "modify", "rename", "save", "submit", "confirm", "apply",
                "add", "create", "new", "copy", "paste", "duplicate", "undo",
                "redo", "prev", "next", "back", "expand", "collapse",
                "toggle", "menu", "sidebar", "drawer", "dropdown", "play",
                "pause", "stop", "mute", "unmute", "volume", "fullscreen",
                "minimize", "maximize", "like", "dislike", "favorite",
                "bookmark", "star", "follow", "unfollow", "print", "refresh",
                "reload", "sync", "settings", "config", "preferences",
                "options", "help", "info", "warning", "error", "notification",
                "bell", "alert", "profile", "avatar", "account", "user",
                "home", "dashboard", "calendar", "date", "time", "location",
                "map", "pin", "phone", "call", "email", "mail", "camera",
                "photo", "image", "gallery", "file", "folder", "document",
                "attach", "link", "unlink", "external", "lock", "unlock",
                "password", "key", "eye", "visible", "hidden", "show",
                "hide", "zoom-in", "zoom-out", "magnify", "theme",
                "dark-mode", "light-mode", "language", "translate", "globe",
            ]),
            carousel_clone_selectors: to_strings(&[
                ".swiper-slide-duplicate",
                ".slick-cloned",
                ".owl-item.cloned",
                ".flickity-slider > .is-selected ~ .is-duplicate",
            ]),
            switchable_state_classes: to_strings(&[
                "active", "current", "show", "showing", "on", "selected",
                "open", "visible", "hide", "hidden", "fade", "in", "out",
                "collapsed", "expanded", "collapsing",
            ]),

            lite_text_max: 50,
            lite_text_head: 30,

            headless: false,

            benchmark_timeout: 30_000,
            benchmark_idle_wait: 8_000,

            compressor_rules: Vec::new(),
            disabled_compressors: to_strings(&[
                "google_search",
                "wikipedia",
                "youtube",
                "stackoverflow",
            ]),
            compressor_settings: HashMap::new(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration store: defaults plus a persisted override map.
///
/// Writes go through [`ConfigStore::apply`], which only accepts known keys
/// whose values deserialize into the field type; everything else is
/// silently dropped, so a bad client cannot wedge the store.
pub struct ConfigStore {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

struct Inner {
    overrides: serde_json::Map<String, Value>,
    merged: Config,
}

impl ConfigStore {
    /// In-memory store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: RwLock::new(Inner {
                overrides: serde_json::Map::new(),
                merged: Config::default(),
            }),
        }
    }

    /// Store persisting overrides to `path`. A missing or corrupt file
    /// yields pure defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let overrides = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Map<String, Value>>(&s).ok())
            .unwrap_or_default();
        let merged = merge(&overrides);
        Self {
            path: Some(path),
            inner: RwLock::new(Inner { overrides, merged }),
        }
    }

    /// Current merged configuration. Cheap clone; call once per operation.
    pub fn snapshot(&self) -> Config {
        self.inner.read().expect("config lock poisoned").merged.clone()
    }

    /// Apply updates. Unknown keys and type mismatches are ignored.
    pub fn apply(&self, updates: &serde_json::Map<String, Value>) -> Result<()> {
        let known = serde_json::to_value(Config::default())?;
        let known = known.as_object().expect("config serializes to an object");
        {
            let mut inner = self.inner.write().expect("config lock poisoned");
            for (key, value) in updates {
                if !known.contains_key(key) {
                    continue;
                }
                let mut candidate = inner.overrides.clone();
                candidate.insert(key.clone(), value.clone());
                // Accept the key only if the merged result still deserializes.
                if serde_json::from_value::<Config>(Value::Object(overlay(
                    known.clone(),
                    &candidate,
                )))
                .is_ok()
                {
                    inner.overrides = candidate;
                }
            }
            inner.merged = merge(&inner.overrides);
        }
        self.save()
    }

    /// Drop all overrides.
    pub fn reset(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().expect("config lock poisoned");
            inner.overrides.clear();
            inner.merged = Config::default();
        }
        self.save()
    }

    /// Only the user-changed values.
    pub fn overrides(&self) -> serde_json::Map<String, Value> {
        self.inner.read().expect("config lock poisoned").overrides.clone()
    }

    fn save(&self) -> Result<()> {
        if let Some(path) = &self.path {
            let inner = self.inner.read().expect("config lock poisoned");
            let body = serde_json::to_string_pretty(&inner.overrides)?;
            std::fs::write(path, body)?;
        }
        Ok(())
    }
}

fn merge(overrides: &serde_json::Map<String, Value>) -> Config {
    let base = serde_json::to_value(Config::default()).expect("config serializes");
    let merged = overlay(
        base.as_object().expect("config is an object").clone(),
        overrides,
    );
    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

fn overlay(
    mut base: serde_json::Map<String, Value>,
    overrides: &serde_json::Map<String, Value>,
) -> serde_json::Map<String, Value> {
    for (k, v) in overrides {
        if base.contains_key(k) {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.max_nodes, 20_000);
        assert_eq!(cfg.max_depth, 50);
        assert_eq!(cfg.dom_settle_wait, 500);
        assert!(cfg.icon_class_prefixes.contains(&"fa".to_string()));
        assert!(cfg.disabled_compressors.contains(&"wikipedia".to_string()));
    }

    #[test]
    fn apply_accepts_known_keys_only() {
        let store = ConfigStore::in_memory();
        let mut updates = serde_json::Map::new();
        updates.insert("max_nodes".into(), serde_json::json!(100));
        updates.insert("no_such_key".into(), serde_json::json!(1));
        updates.insert("max_depth".into(), serde_json::json!("not a number"));
        store.apply(&updates).unwrap();
        let cfg = store.snapshot();
        assert_eq!(cfg.max_nodes, 100);
        assert_eq!(cfg.max_depth, 50);
        assert_eq!(store.overrides().len(), 1);
    }

    #[test]
    fn persists_overrides_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        {
            let store = ConfigStore::open(&path);
            let mut updates = serde_json::Map::new();
            updates.insert("lite_text_max".into(), serde_json::json!(99));
            store.apply(&updates).unwrap();
        }
        let body = std::fs::read_to_string(&path).unwrap();
        let on_disk: serde_json::Map<String, Value> =
            serde_json::from_str(&body).unwrap();
        assert_eq!(on_disk.len(), 1);

        let store = ConfigStore::open(&path);
        assert_eq!(store.snapshot().lite_text_max, 99);
        assert_eq!(store.snapshot().lite_text_head, 30);
    }

    #[test]
    fn reset_restores_defaults() {
        let store = ConfigStore::in_memory();
        let mut updates = serde_json::Map::new();
        updates.insert("max_nodes".into(), serde_json::json!(5));
        store.apply(&updates).unwrap();
        store.reset().unwrap();
        assert_eq!(store.snapshot(), Config::default());
    }
}
