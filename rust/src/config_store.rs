use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use toml::map::Map;
use toml::Value;

use crate::path_utils::expand_tilde;

pub const DEFAULT_UPLOAD_URL: &str = "https://sm.ms/api/upload";
pub const DEFAULT_CLEAR_URL: &str = "https://sm.ms/api/clear";

/// Optional user settings read from the `[app]` table of a TOML file.
#[derive(Debug)]
pub struct ConfigStore {
    pub path: Option<PathBuf>,
    doc: Value,
}

impl ConfigStore {
    /// Reads `path` when it exists; a missing file yields the defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::empty());
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let mut store = Self::parse(&text)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        store.path = Some(path);
        Ok(store)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value = toml::from_str(text)?;
        if doc.get("app").is_some_and(|app| !app.is_table()) {
            return Err(anyhow!("[app] must be a table"));
        }
        Ok(Self { path: None, doc })
    }

    fn empty() -> Self {
        Self {
            path: None,
            doc: Value::Table(Map::new()),
        }
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        self.app_str("history_path").map(|raw| expand_tilde(Path::new(raw)))
    }

    pub fn upload_url(&self) -> String {
        self.app_str("upload_url")
            .unwrap_or(DEFAULT_UPLOAD_URL)
            .to_string()
    }

    pub fn clear_url(&self) -> String {
        self.app_str("clear_url")
            .unwrap_or(DEFAULT_CLEAR_URL)
            .to_string()
    }

    pub fn timeout_sec(&self) -> u64 {
        self.app_table()
            .and_then(|t| t.get("timeout_sec"))
            .and_then(Value::as_integer)
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(30)
    }

    pub fn confirm_delete(&self) -> bool {
        self.app_table()
            .and_then(|t| t.get("confirm_delete"))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn default_comment(&self) -> String {
        self.app_str("default_comment").unwrap_or_default().to_string()
    }

    fn app_table(&self) -> Option<&Map<String, Value>> {
        self.doc.as_table()?.get("app")?.as_table()
    }

    fn app_str(&self, key: &str) -> Option<&str> {
        self.app_table()
            .and_then(|t| t.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}
