use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use crate::config_store::ConfigStore;

pub const HISTORY_FILE_NAME: &str = ".sm.ms.history";

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("failed to resolve the home directory"))
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

pub fn resolve_config_path(raw: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = raw {
        let path = expand_tilde(&path);
        if path.is_absolute() {
            return Some(path);
        }
        if let Ok(cwd) = env::current_dir() {
            return Some(cwd.join(path));
        }
        return Some(path);
    }

    dirs::config_dir().map(|dir| dir.join("smms").join("config.toml"))
}

/// Command line value first, then the config file, then `~/.sm.ms.history`.
pub fn resolve_history_path(raw: Option<PathBuf>, config: &ConfigStore) -> Result<PathBuf> {
    if let Some(path) = raw {
        return Ok(expand_tilde(&path));
    }
    if let Some(path) = config.history_path() {
        return Ok(path);
    }
    Ok(home_dir()?.join(HISTORY_FILE_NAME))
}

/// Expands each shell-style pattern against the filesystem, keeping regular
/// files only. Order follows the patterns and duplicates are dropped.
pub fn expand_image_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let paths =
            glob::glob(pattern).with_context(|| format!("invalid image pattern `{pattern}`"))?;
        for path in paths.filter_map(|entry| entry.ok()) {
            if path.is_file() && seen.insert(path.clone()) {
                images.push(path);
            }
        }
    }
    Ok(images)
}
