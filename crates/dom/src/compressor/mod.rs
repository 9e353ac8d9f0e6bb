//! Compressor selection and execution.
//!
//! A compressor is chosen by the page URL through two tiers: user rules
//! from the configuration win over profile-declared URL patterns, and
//! everything falls back to `default`. A failing profile is logged and
//! silently replaced by the default profile for the run; that is the one
//! error this crate recovers from on the caller's behalf.

pub mod builtin;
pub mod pipeline;
pub mod profile;
pub mod store;

pub use pipeline::PipelineParams;
pub use profile::{CompressorProfile, ResolvedSettings, SettingKind, SettingSpec};
pub use store::{ProfileInfo, ProfileStore};

use crate::config::Config;
use crate::types::{FilteredNode, RawNode};
use crate::utils::glob_match;
use std::path::PathBuf;
use std::sync::Arc;

pub struct CompressorRegistry {
    store: ProfileStore,
}

impl CompressorRegistry {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: ProfileStore::new(profile_dir),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Pick the profile name for a URL.
    ///
    /// Tier 1: user rules, first match wins. Tier 2: profile-declared
    /// patterns in sorted name order, skipping disabled profiles.
    /// Fallback: `default`.
    pub fn select(&self, url: &str, cfg: &Config) -> String {
        for rule in &cfg.compressor_rules {
            if rule.pattern.is_empty() || rule.script.is_empty() {
                continue;
            }
            if glob_match(&rule.pattern, url) {
                return rule.script.clone();
            }
        }

        let mut candidates: Vec<String> = builtin::matchable_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in self.store.user_profile_names() {
            if name != "default" && !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        candidates.sort();

        for name in candidates {
            if cfg.disabled_compressors.contains(&name) {
                continue;
            }
            let Ok(profile) = self.store.load(&name) else {
                continue;
            };
            if profile
                .url_patterns
                .iter()
                .any(|p| !p.is_empty() && glob_match(p, url))
            {
                return name;
            }
        }
        "default".to_string()
    }

    /// Select, resolve settings and run. Returns the profile name actually
    /// used together with the filtered nodes.
    pub fn run(
        &self,
        url: &str,
        raw_nodes: &[RawNode],
        cfg: &Config,
    ) -> (String, Vec<FilteredNode>) {
        let name = self.select(url, cfg);
        let profile = match self.store.load(&name) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(
                    compressor = %name,
                    error = %err,
                    "compressor failed, falling back to default"
                );
                return ("default".to_string(), self.run_named("default", raw_nodes, cfg));
            }
        };
        let filtered = self.run_profile(&name, &profile, raw_nodes, cfg);
        tracing::debug!(
            compressor = %name,
            before = raw_nodes.len(),
            after = filtered.len(),
            "compressed node list"
        );
        (name, filtered)
    }

    fn run_named(&self, name: &str, raw_nodes: &[RawNode], cfg: &Config) -> Vec<FilteredNode> {
        let profile = self
            .store
            .load(name)
            .unwrap_or_else(|_| Arc::new(builtin::default_profile()));
        self.run_profile(name, &profile, raw_nodes, cfg)
    }

    fn run_profile(
        &self,
        name: &str,
        profile: &CompressorProfile,
        raw_nodes: &[RawNode],
        cfg: &Config,
    ) -> Vec<FilteredNode> {
        let settings =
            ResolvedSettings::resolve(profile, cfg.compressor_settings.get(name));
        let pairs = raw_nodes
            .iter()
            .map(|n| (n.depth, n.data.clone()))
            .collect();
        profile.process(pairs, &settings)
    }
}

impl std::fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressorRegistry").finish_non_exhaustive()
    }
}
