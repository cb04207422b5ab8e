use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adb::runner::OutputEncoding;
use crate::error::AdbError;

pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_DEVICE_DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Canonical UI attribute set, hyphenated exactly as the device markup emits
/// them.
pub fn default_ui_attributes() -> Vec<String> {
    [
        "resource-id",
        "text",
        "class",
        "package",
        "content-desc",
        "bounds",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    pub adb_path: String,
    pub default_port: u16,
    pub output_encoding: OutputEncoding,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            default_port: DEFAULT_PORT,
            // Device property output can carry high-byte characters that are
            // not valid UTF-8.
            output_encoding: OutputEncoding::Latin1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorConfig {
    pub renderer_path: String,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u32,
    pub buffer_size: Option<u32>,
    pub window_title: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            renderer_path: "ffmpeg".to_string(),
            width: 420,
            height: 960,
            bit_rate: 1_000_000,
            buffer_size: Some(1024),
            window_title: "Android Screen".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiSettings {
    pub device_dump_path: String,
    pub attributes: Vec<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            device_dump_path: DEFAULT_DEVICE_DUMP_PATH.to_string(),
            attributes: default_ui_attributes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub version: String,
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ADB_CONTROL_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(".adb_control_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(".adb_control_config.backup.json")
}

pub fn load_config() -> Result<Config, AdbError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &Config) -> Result<(), AdbError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<Config, AdbError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AdbError::system(format!("Failed to read config: {err}"), ""))?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|err| AdbError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &Config,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AdbError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AdbError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AdbError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn validate_config(mut config: Config) -> Config {
    let defaults = MirrorConfig::default();
    if config.bridge.adb_path.trim().is_empty() {
        config.bridge.adb_path = "adb".to_string();
    }
    if config.bridge.default_port == 0 {
        config.bridge.default_port = DEFAULT_PORT;
    }
    if config.mirror.renderer_path.trim().is_empty() {
        config.mirror.renderer_path = defaults.renderer_path;
    }
    if config.mirror.width == 0 || config.mirror.height == 0 {
        config.mirror.width = defaults.width;
        config.mirror.height = defaults.height;
    }
    if config.mirror.bit_rate == 0 {
        config.mirror.bit_rate = defaults.bit_rate;
    }
    if config.ui.device_dump_path.trim().is_empty() {
        config.ui.device_dump_path = DEFAULT_DEVICE_DUMP_PATH.to_string();
    }
    if config.ui.attributes.is_empty() {
        config.ui.attributes = default_ui_attributes();
    }
    config
}
