use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::warn;

use crate::scan::default_record_roots;

const APP_NAME: &str = "clawsave";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub record_roots: Option<Vec<PathBuf>>,
    pub checkpoint_path: Option<PathBuf>,
    pub pricing_path: Option<PathBuf>,
    pub openclaw_config: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved file locations for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    pub record_roots: Vec<PathBuf>,
    pub checkpoint: PathBuf,
    pub pricing: PathBuf,
    pub openclaw_config: PathBuf,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

pub fn parse_config(data: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(data)
}

/// Read `config.toml`. Logging is not initialised yet when this runs, so
/// the caller decides whether to report the returned warning.
pub fn load_config_from(path: &Path) -> (Config, Option<String>) {
    let Ok(data) = fs::read_to_string(path) else {
        return (Config::default(), None);
    };

    match parse_config(&data) {
        Ok(config) => (config, None),
        Err(e) => (
            Config::default(),
            Some(format!("invalid config at {}: {}", path.display(), e)),
        ),
    }
}

pub fn load_config() -> (Config, Option<String>) {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => (Config::default(), None),
    }
}

fn default_openclaw_config() -> PathBuf {
    if let Ok(dir) = std::env::var("OPENCLAW_STATE_DIR") {
        return PathBuf::from(dir).join("openclaw.json");
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".openclaw")
        .join("openclaw.json")
}

impl Config {
    pub fn resolve(&self) -> Paths {
        let dirs = project_dirs();
        let checkpoint = self.checkpoint_path.clone().unwrap_or_else(|| match &dirs {
            Some(d) => d.data_dir().join("checkpoint.json"),
            None => PathBuf::from("checkpoint.json"),
        });
        let pricing = self.pricing_path.clone().unwrap_or_else(|| match &dirs {
            Some(d) => d.config_dir().join("pricing.json"),
            None => PathBuf::from("pricing.json"),
        });

        Paths {
            record_roots: self
                .record_roots
                .clone()
                .unwrap_or_else(default_record_roots),
            checkpoint,
            pricing,
            openclaw_config: self
                .openclaw_config
                .clone()
                .unwrap_or_else(default_openclaw_config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_keys() {
        let config = parse_config(
            r#"
record_roots = ["/srv/agents", "/home/me/.openclaw/agents"]
checkpoint_path = "/var/lib/clawsave/checkpoint.json"
pricing_path = "/etc/clawsave/pricing.json"
openclaw_config = "/home/me/.openclaw/openclaw.json"
log_level = "debug"
"#,
        )
        .unwrap();
        let paths = config.resolve();
        assert_eq!(paths.record_roots.len(), 2);
        assert_eq!(
            paths.checkpoint,
            PathBuf::from("/var/lib/clawsave/checkpoint.json")
        );
        assert_eq!(paths.pricing, PathBuf::from("/etc/clawsave/pricing.json"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn empty_config_resolves_defaults() {
        let config = parse_config("").unwrap();
        let paths = config.resolve();
        assert!(paths.checkpoint.ends_with("checkpoint.json"));
        assert!(paths.pricing.ends_with("pricing.json"));
        assert!(paths.openclaw_config.ends_with("openclaw.json"));
    }

    #[test]
    fn invalid_config_falls_back_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "record_roots = 5").unwrap();
        let (config, warning) = load_config_from(&path);
        assert!(config.record_roots.is_none());
        assert!(warning.is_some());
    }

    #[test]
    fn missing_config_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (_, warning) = load_config_from(&dir.path().join("config.toml"));
        assert!(warning.is_none());
    }
}
