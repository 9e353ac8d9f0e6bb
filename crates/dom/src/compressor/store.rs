//! On-disk store for user compressor profiles.
//!
//! User profiles live as `<name>.json` in one directory. Loads are lazy
//! and cached by file mtime in a process-wide map, so an edit on disk is
//! picked up transparently without a restart and warm reads take no lock.

use super::builtin::{self, OFFICIAL_PROFILES};
use super::profile::{CompressorProfile, ResolvedSettings, SettingSpec};
use crate::config::Config;
use crate::error::{DomError, Result};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Metadata row for profile listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub official: bool,
    pub enabled: bool,
    pub url_patterns: Vec<String>,
    pub id: String,
    pub version: String,
    pub settings: Vec<SettingSpec>,
    pub settings_values: HashMap<String, Value>,
    /// Another profile declares the same id.
    pub id_conflict: bool,
}

struct CachedProfile {
    mtime: SystemTime,
    profile: Arc<CompressorProfile>,
}

pub struct ProfileStore {
    dir: PathBuf,
    cache: DashMap<String, CachedProfile>,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Resolve a profile: built-ins first, then the user directory.
    pub fn load(&self, name: &str) -> Result<Arc<CompressorProfile>> {
        if let Some(profile) = builtin::get(name) {
            return Ok(Arc::new(profile));
        }
        let path = self.path_of(name);
        let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => {
                self.cache.remove(name);
                return Err(DomError::ProfileNotFound(name.to_string()));
            }
        };
        if let Some(cached) = self.cache.get(name) {
            if cached.mtime == mtime {
                return Ok(Arc::clone(&cached.profile));
            }
        }
        let body = std::fs::read_to_string(&path)?;
        let profile: CompressorProfile = serde_json::from_str(&body)
            .map_err(|e| DomError::CompressorFailure {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let profile = Arc::new(profile);
        self.cache.insert(
            name.to_string(),
            CachedProfile {
                mtime,
                profile: Arc::clone(&profile),
            },
        );
        Ok(profile)
    }

    /// Names of user profiles on disk, sorted.
    pub fn user_profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| {
                        let path = e.path();
                        if path.extension().and_then(|s| s.to_str()) != Some("json") {
                            return None;
                        }
                        let stem = path.file_stem()?.to_str()?;
                        if stem.starts_with('_') {
                            return None;
                        }
                        Some(stem.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn read_source(&self, name: &str) -> Result<String> {
        if builtin::get(name).is_some() {
            let profile = builtin::get(name).expect("checked above");
            return Ok(serde_json::to_string_pretty(&profile)?);
        }
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(DomError::ProfileNotFound(name.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    /// Write or create a user profile. Refuses reserved names and rejects
    /// bodies that do not validate as a profile document.
    pub fn write(&self, name: &str, body: &str) -> Result<()> {
        if name == "default" {
            return Err(DomError::ScriptValidation(
                "cannot overwrite the default compressor".to_string(),
            ));
        }
        if OFFICIAL_PROFILES.contains(&name) {
            return Err(DomError::ScriptValidation(format!(
                "cannot overwrite official profile '{name}'"
            )));
        }
        if !is_valid_name(name) {
            return Err(DomError::ScriptValidation(format!(
                "invalid profile name '{name}'"
            )));
        }
        serde_json::from_str::<CompressorProfile>(body)
            .map_err(|e| DomError::ScriptValidation(format!("not a valid profile: {e}")))?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_of(name), body)?;
        self.cache.remove(name);
        Ok(())
    }

    /// Delete a user profile. Built-ins and official names are protected.
    pub fn delete(&self, name: &str) -> Result<()> {
        if name == "default" {
            return Err(DomError::ScriptValidation(
                "cannot delete the default compressor".to_string(),
            ));
        }
        if OFFICIAL_PROFILES.contains(&name) {
            return Err(DomError::ScriptValidation(format!(
                "cannot delete official profile '{name}'"
            )));
        }
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(DomError::ProfileNotFound(name.to_string()));
        }
        std::fs::remove_file(path)?;
        self.cache.remove(name);
        Ok(())
    }

    /// All profiles (built-in plus user) with metadata, duplicate-id
    /// detection and resolved setting values.
    pub fn list(&self, cfg: &Config) -> Vec<ProfileInfo> {
        let mut names: Vec<(String, bool)> = vec![("default".to_string(), true)];
        for name in builtin::matchable_names() {
            names.push((name.to_string(), true));
        }
        for name in self.user_profile_names() {
            if !names.iter().any(|(n, _)| *n == name) {
                names.push((name, false));
            }
        }

        let mut rows: Vec<ProfileInfo> = Vec::new();
        let mut id_counts: HashMap<String, usize> = HashMap::new();
        for (name, is_builtin) in names {
            let Ok(profile) = self.load(&name) else {
                continue;
            };
            let resolved_id = if profile.id.is_empty() {
                name.clone()
            } else {
                profile.id.clone()
            };
            *id_counts.entry(resolved_id.clone()).or_default() += 1;
            let overrides = cfg.compressor_settings.get(&name);
            let settings_values =
                ResolvedSettings::resolve(&profile, overrides).values().clone();
            rows.push(ProfileInfo {
                name: name.clone(),
                description: profile.description.clone(),
                builtin: is_builtin && name == "default",
                official: OFFICIAL_PROFILES.contains(&name.as_str()),
                enabled: !cfg.disabled_compressors.contains(&name),
                url_patterns: profile.url_patterns.clone(),
                id: resolved_id,
                version: profile.version.clone(),
                settings: profile.settings.clone(),
                settings_values,
                id_conflict: false,
            });
        }
        for row in &mut rows {
            row.id_conflict = id_counts.get(&row.id).copied().unwrap_or(0) > 1;
        }
        rows
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
