use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const APP_DIR: &str = "deckcheck";
const CACHE_FILE: &str = "cache.json";
const CONFIG_FILE: &str = "config.json";

pub const KEY_API_KEY: &str = "steam-api-key";
pub const KEY_USER_ID: &str = "user-id";
pub const KEY_PRESERVE_USER_ID: &str = "preserve-user-id";
pub const KNOWN_KEYS: [&str; 3] = [KEY_API_KEY, KEY_USER_ID, KEY_PRESERVE_USER_ID];

/// Default location for the cache and settings files.
pub fn default_dir() -> Result<PathBuf, AppError> {
    let mut dir = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| AppError::Internal("config directory not found".to_string()))?;
    dir.push(APP_DIR);
    Ok(dir)
}

pub fn default_cache_path() -> Result<PathBuf, AppError> {
    Ok(default_dir()?.join(CACHE_FILE))
}

pub fn default_config_path() -> Result<PathBuf, AppError> {
    Ok(default_dir()?.join(CONFIG_FILE))
}

/// User settings persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub preserve_user_id: bool,
}

impl Settings {
    /// Missing file yields defaults. Anything unreadable is an error; settings
    /// are user-authored and are not silently replaced.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(AppError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(self)?;
            fs::write(path, json)
        };
        write().map_err(|e| AppError::Config(format!("cannot write {}: {e}", path.display())))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match key {
            KEY_API_KEY => Ok(self.steam_api_key.clone()),
            KEY_USER_ID => Ok(self.user_id.clone()),
            KEY_PRESERVE_USER_ID => Ok(Some(self.preserve_user_id.to_string())),
            _ => Err(unknown_key(key)),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        let non_empty = || (!value.is_empty()).then(|| value.to_string());
        match key {
            KEY_API_KEY => self.steam_api_key = non_empty(),
            KEY_USER_ID => self.user_id = non_empty(),
            KEY_PRESERVE_USER_ID => {
                self.preserve_user_id = match value {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(AppError::InvalidArgument(format!(
                            "{KEY_PRESERVE_USER_ID} must be 'true' or 'false'"
                        )));
                    }
                }
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> AppError {
    AppError::InvalidArgument(format!(
        "unknown config key '{key}' (expected one of: {})",
        KNOWN_KEYS.join(", ")
    ))
}
