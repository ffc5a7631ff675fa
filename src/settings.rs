use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const URL_ENV: &str = "MEDLYTICS_URL";
pub const TOKEN_ENV: &str = "MEDLYTICS_TOKEN";
/// Overrides the config directory; used by the integration tests.
pub const CONFIG_DIR_ENV: &str = "MEDLYTICS_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_export_dir() -> String {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .to_string_lossy()
        .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            export_dir: default_export_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("medlytics")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn read_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => Settings::default(),
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Settings as stored on disk, without environment overrides.
pub fn load_stored_settings() -> Settings {
    read_settings(&settings_path())
}

/// Settings with `MEDLYTICS_URL` / `MEDLYTICS_TOKEN` applied on top.
pub fn load_settings() -> Settings {
    let mut settings = load_stored_settings();
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var(URL_ENV).filter(|v| !v.is_empty()) {
        settings.base_url = url;
    }
    if let Some(token) = var(TOKEN_ENV).filter(|v| !v.is_empty()) {
        settings.api_token = Some(token);
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    write_settings(&settings_path(), settings)
}

/// Set one key by name, as used by `medlytics config set`.
pub fn set_value(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "base_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(AppError::Settings(format!(
                    "base_url must start with http:// or https:// (got '{value}')"
                )));
            }
            settings.base_url = value.trim_end_matches('/').to_string();
        }
        "api_token" => {
            settings.api_token = if value.is_empty() { None } else { Some(value.to_string()) };
        }
        "export_dir" => settings.export_dir = shellexpand_path(value),
        "timeout_secs" => {
            settings.timeout_secs = value
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::Settings(format!("invalid timeout_secs: {value}")))?;
        }
        other => return Err(AppError::Settings(format!("unknown setting: {other}"))),
    }
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
