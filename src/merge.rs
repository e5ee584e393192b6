use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;

/// Deep-merge `patch` into `target`, returning a new document.
///
/// Nested objects compose key by key. Anything else in the patch (scalars,
/// arrays, null, or an object landing on a non-object) replaces the existing
/// value wholesale.
pub fn merge(target: &Value, patch: &Value) -> Value {
    match (target, patch) {
        (Value::Object(base), Value::Object(incoming)) => Value::Object(merge_maps(base, incoming)),
        (_, incoming) => incoming.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in incoming {
        let merged = match (out.get(key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(_)) => merge(existing, value),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Parse a configuration document. Anything that is not a JSON object is
/// treated as empty.
fn parse_document(path: &Path, bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(doc @ Value::Object(_)) => doc,
        Ok(_) => {
            warn!(path = %path.display(), "config is not an object, treating as empty");
            Value::Object(Map::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid config, treating as empty");
            Value::Object(Map::new())
        }
    }
}

/// Load a configuration document; missing or unreadable files are empty.
pub fn load_document(path: &Path) -> Value {
    match fs::read(path) {
        Ok(bytes) => parse_document(path, &bytes),
        Err(_) => {
            debug!(path = %path.display(), "no existing config");
            Value::Object(Map::new())
        }
    }
}

pub fn backup_path(path: &Path, now_ms: i64) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".bak.{now_ms}"));
    path.with_file_name(name)
}

/// Copy `bytes` to a fresh backup next to `path`. An existing backup is
/// never overwritten; a numeric suffix is added instead.
fn write_backup(path: &Path, now_ms: i64, bytes: &[u8]) -> Result<PathBuf> {
    let base = backup_path(path, now_ms);
    let mut candidate = base.clone();
    let mut attempt = 1u32;
    loop {
        match File::create_new(&candidate) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .with_context(|| format!("Failed to write backup {}", candidate.display()))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let mut name = base.file_name().unwrap_or_default().to_os_string();
                name.push(format!(".{attempt}"));
                candidate = base.with_file_name(name);
                attempt += 1;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create backup {}", candidate.display()))
            }
        }
    }
}

/// Result of applying a patch to a file on disk.
#[derive(Debug)]
pub struct MergeOutcome {
    pub merged: Value,
    /// Where the pre-merge file was copied, if there was one.
    pub backup: Option<PathBuf>,
}

/// Merge `patch` into the document at `path` and write the result back.
///
/// An existing file is first copied byte-for-byte to
/// `<path>.bak.<now_ms>`, then replaced via temp file and rename. A file that
/// exists but cannot be read is an error; nothing is written. Write failures
/// are returned to the caller.
pub fn apply(path: &Path, patch: &Value, now_ms: i64) -> Result<MergeOutcome> {
    let original = match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let current = match &original {
        Some(bytes) => parse_document(path, bytes),
        None => Value::Object(Map::new()),
    };
    let merged = merge(&current, patch);

    let backup = match original {
        Some(bytes) => {
            let backup = write_backup(path, now_ms, &bytes)?;
            info!(backup = %backup.display(), "backed up existing config");
            Some(backup)
        }
        None => None,
    };

    let mut data = serde_json::to_string_pretty(&merged)?;
    data.push('\n');
    write_atomic(path, data.as_bytes())?;
    info!(path = %path.display(), "config written");

    Ok(MergeOutcome { merged, backup })
}

/// A provider/model registration to splice into an agent config.
#[derive(Debug, Clone, Default)]
pub struct ProviderPatch {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api: Option<String>,
    pub api_key: Option<String>,
}

impl ProviderPatch {
    /// Registers the provider under `models.providers` and makes the model
    /// the agents' default primary.
    pub fn to_document(&self) -> Value {
        let mut provider = Map::new();
        if let Some(url) = &self.base_url {
            provider.insert("baseUrl".into(), json!(url));
        }
        if let Some(api) = &self.api {
            provider.insert("api".into(), json!(api));
        }
        if let Some(key) = &self.api_key {
            provider.insert("apiKey".into(), json!(key));
        }
        provider.insert(
            "models".into(),
            json!([{ "id": self.model, "name": self.model }]),
        );

        json!({
            "models": {
                "mode": "merge",
                "providers": { self.provider.clone(): provider },
            },
            "agents": {
                "defaults": {
                    "model": { "primary": format!("{}/{}", self.provider, self.model) },
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scalar_is_overridden() {
        let merged = merge(&json!({"a": {"b": 1}}), &json!({"a": {"b": 2}}));
        assert_eq!(merged, json!({"a": {"b": 2}}));
    }

    #[test]
    fn scalar_replaces_mapping() {
        let merged = merge(&json!({"a": {"b": 1}}), &json!({"a": 5}));
        assert_eq!(merged, json!({"a": 5}));
    }

    #[test]
    fn mapping_replaces_scalar() {
        let merged = merge(&json!({"a": 5}), &json!({"a": {"b": 1}}));
        assert_eq!(merged, json!({"a": {"b": 1}}));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let merged = merge(&json!({"a": [1, 2]}), &json!({"a": [3]}));
        assert_eq!(merged, json!({"a": [3]}));
    }

    #[test]
    fn null_in_patch_overwrites() {
        let merged = merge(&json!({"a": {"b": 1}, "c": 2}), &json!({"a": null}));
        assert_eq!(merged, json!({"a": null, "c": 2}));
    }

    #[test]
    fn unrelated_keys_survive_at_every_level() {
        let target = json!({"gateway": {"port": 1}, "models": {"providers": {"old": {"x": 1}}}});
        let patch = json!({"models": {"providers": {"new": {"y": 2}}}});
        let merged = merge(&target, &patch);
        assert_eq!(
            merged,
            json!({
                "gateway": {"port": 1},
                "models": {"providers": {"old": {"x": 1}, "new": {"y": 2}}}
            })
        );
    }

    #[test]
    fn disjoint_patches_commute() {
        let target = json!({"keep": true, "nested": {"k": 0}});
        let p1 = json!({"a": 1, "nested": {"x": [1]}});
        let p2 = json!({"b": {"c": 2}, "nested": {"y": "z"}});
        assert_eq!(
            merge(&merge(&target, &p1), &p2),
            merge(&merge(&target, &p2), &p1)
        );
    }

    #[test]
    fn target_is_not_mutated() {
        let target = json!({"a": {"b": 1}});
        let _ = merge(&target, &json!({"a": {"b": 2}}));
        assert_eq!(target, json!({"a": {"b": 1}}));
    }

    #[test]
    fn apply_backs_up_existing_file_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        let original = "{ \"gateway\": {\"port\": 18789},\n  \"theme\": \"dark\" }";
        fs::write(&path, original).unwrap();

        let outcome = apply(&path, &json!({"gateway": {"bind": "lan"}}), 1234).unwrap();

        let backup = outcome.backup.unwrap();
        assert_eq!(backup, dir.path().join("openclaw.json.bak.1234"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), original);

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .collect();
        assert_eq!(backups.len(), 1);

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"gateway": {"port": 18789, "bind": "lan"}, "theme": "dark"})
        );
        assert_eq!(written, outcome.merged);
    }

    #[test]
    fn apply_without_existing_file_makes_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("openclaw.json");

        let outcome = apply(&path, &json!({"a": 1}), 1).unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(load_document(&path), json!({"a": 1}));
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn apply_over_invalid_file_treats_it_as_empty_but_still_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        fs::write(&path, "not json at all").unwrap();

        let outcome = apply(&path, &json!({"a": 1}), 7).unwrap();
        assert_eq!(outcome.merged, json!({"a": 1}));
        assert_eq!(
            fs::read_to_string(outcome.backup.unwrap()).unwrap(),
            "not json at all"
        );
    }

    #[test]
    fn same_millisecond_applies_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        fs::write(&path, r#"{"v": 0}"#).unwrap();

        let first = apply(&path, &json!({"v": 1}), 55).unwrap();
        let second = apply(&path, &json!({"v": 2}), 55).unwrap();

        let first_backup = first.backup.unwrap();
        let second_backup = second.backup.unwrap();
        assert_ne!(first_backup, second_backup);
        assert_eq!(second_backup, dir.path().join("openclaw.json.bak.55.1"));
        assert_eq!(fs::read_to_string(first_backup).unwrap(), r#"{"v": 0}"#);
        assert_eq!(load_document(&second_backup), json!({"v": 1}));
        assert_eq!(load_document(&path), json!({"v": 2}));
    }

    #[test]
    fn unreadable_existing_config_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        // Exists but cannot be read as a file.
        let path = dir.path().join("openclaw.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), "keep").unwrap();

        assert!(apply(&path, &json!({"a": 1}), 3).is_err());
        assert!(path.is_dir());
        assert_eq!(fs::read_to_string(path.join("inner")).unwrap(), "keep");
        assert!(!dir.path().join("openclaw.json.bak.3").exists());
    }

    #[test]
    fn apply_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.json");
        fs::write(&path, "{}").unwrap();
        apply(&path, &json!({"a": 1}), 9).unwrap();
        assert!(!crate::atomic::temp_path(&path).exists());
    }

    #[test]
    fn apply_surfaces_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        assert!(apply(&blocker.join("openclaw.json"), &json!({"a": 1}), 1).is_err());
    }

    #[test]
    fn provider_patch_shape() {
        let patch = ProviderPatch {
            provider: "moonshot".into(),
            model: "kimi-k2".into(),
            base_url: Some("https://api.example.test/v1".into()),
            api: Some("openai-completions".into()),
            api_key: None,
        };
        let doc = patch.to_document();
        assert_eq!(doc["agents"]["defaults"]["model"]["primary"], "moonshot/kimi-k2");
        let provider = &doc["models"]["providers"]["moonshot"];
        assert_eq!(provider["baseUrl"], "https://api.example.test/v1");
        assert_eq!(provider["models"][0]["id"], "kimi-k2");
        assert!(provider.get("apiKey").is_none());
    }

    #[test]
    fn provider_patch_keeps_other_providers_and_agent_settings() {
        let existing = json!({
            "agents": {"defaults": {"workspace": "~/w", "model": {"primary": "a/b", "fallbacks": ["c/d"]}}},
            "models": {"providers": {"anthropic": {"apiKey": "k"}}}
        });
        let patch = ProviderPatch {
            provider: "p".into(),
            model: "m".into(),
            ..Default::default()
        };
        let merged = merge(&existing, &patch.to_document());
        assert_eq!(merged["agents"]["defaults"]["workspace"], "~/w");
        assert_eq!(merged["agents"]["defaults"]["model"]["primary"], "p/m");
        assert_eq!(merged["agents"]["defaults"]["model"]["fallbacks"], json!(["c/d"]));
        assert_eq!(merged["models"]["providers"]["anthropic"]["apiKey"], "k");
    }
}
