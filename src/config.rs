//! Configuration loading.
//!
//! Settings come from a TOML file (every key optional) and are then
//! overridden by environment variables. The resulting [`Config`] is built
//! once by the binary and handed to each component explicitly.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `IMG_SQLITE_PATH` | `db.path` |
//! | `IMAGE_PATH` | `storage.image_path` |
//! | `IMGCAT_BIND` | `server.bind` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/imagemetadata.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
        }
    }
}

fn default_image_path() -> PathBuf {
    PathBuf::from("./data/images")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

/// Reads the config file at `path` (defaults if it does not exist),
/// applies environment overrides and validates the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

impl Config {
    /// Applies overrides looked up through `lookup` (the process
    /// environment in production). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("IMG_SQLITE_PATH") {
            self.db.path = PathBuf::from(path);
        }
        if let Some(path) = get("IMAGE_PATH") {
            self.storage.image_path = PathBuf::from(path);
        }
        if let Some(bind) = get("IMGCAT_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            anyhow::bail!("server.bind must not be empty");
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("./data/imagemetadata.sqlite"));
        assert_eq!(cfg.storage.image_path, PathBuf::from("./data/images"));
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.server.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_partial_sections() {
        let cfg = parse_config(
            r#"
[db]
path = "/tmp/meta.sqlite"

[server]
max_upload_bytes = 1024
"#,
        )
        .unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("/tmp/meta.sqlite"));
        assert_eq!(cfg.storage.image_path, PathBuf::from("./data/images"));
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.server.max_upload_bytes, 1024);
    }

    #[test]
    fn test_invalid_toml_errors() {
        assert!(parse_config("[db\npath = 3").is_err());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut cfg = parse_config("[storage]\nimage_path = \"/srv/a\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            ("IMG_SQLITE_PATH", "/srv/meta.sqlite"),
            ("IMAGE_PATH", "/srv/images"),
            ("IMGCAT_BIND", "0.0.0.0:9000"),
        ]
        .into_iter()
        .collect();

        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.db.path, PathBuf::from("/srv/meta.sqlite"));
        assert_eq!(cfg.storage.image_path, PathBuf::from("/srv/images"));
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_empty_override_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|k| (k == "IMAGE_PATH").then(|| "  ".to_string()));
        assert_eq!(cfg.storage.image_path, PathBuf::from("./data/images"));
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        let cfg = parse_config("[server]\nmax_upload_bytes = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert!(!cfg.server.bind.is_empty());
        assert!(cfg.server.max_upload_bytes > 0);
    }
}
