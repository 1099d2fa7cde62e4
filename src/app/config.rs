use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;
use tracing::warn;

pub const SECURITY_LEVELS: [&str; 3] = ["low", "medium", "high"];
pub const DEFAULT_SECURITY_LEVEL: &str = "medium";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemOptimizations {
    #[serde(default)]
    pub cpu_throttle: bool,
    #[serde(default)]
    pub background_apps: Vec<String>,
}

impl Default for SystemOptimizations {
    fn default() -> Self {
        Self {
            cpu_throttle: false,
            background_apps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantConfig {
    #[serde(default = "default_voice_commands")]
    pub voice_commands: HashMap<String, String>,
    #[serde(default = "default_security_level")]
    pub security_level: String,
    #[serde(default)]
    pub system_optimizations: SystemOptimizations,
    /// Directory holding the termux/platform helper binaries; empty means
    /// plain $PATH lookup.
    #[serde(default)]
    pub toolbox_dir: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            voice_commands: default_voice_commands(),
            security_level: default_security_level(),
            system_optimizations: SystemOptimizations::default(),
            toolbox_dir: String::new(),
        }
    }
}

impl AssistantConfig {
    /// Used when an existing config file cannot be parsed: no mappings are
    /// trusted, everything else falls back to defaults.
    pub fn fallback() -> Self {
        Self {
            voice_commands: HashMap::new(),
            ..Self::default()
        }
    }
}

fn default_voice_commands() -> HashMap<String, String> {
    HashMap::from([
        (
            "open camera".to_string(),
            "am start -a android.media.action.IMAGE_CAPTURE".to_string(),
        ),
        (
            "battery status".to_string(),
            "termux-battery-status".to_string(),
        ),
        (
            "wifi settings".to_string(),
            "am start -a android.settings.WIFI_SETTINGS".to_string(),
        ),
    ])
}

fn default_security_level() -> String {
    DEFAULT_SECURITY_LEVEL.to_string()
}

pub fn config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".droidkeeper").join("config.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

/// Loads the config, creating the file with defaults on first run. A file
/// that exists but cannot be read or parsed yields the fallback config; the
/// failure is logged, never propagated.
pub fn load_or_init(path: &Path, trace_id: &str) -> Result<AssistantConfig, AppError> {
    if !path.exists() {
        let config = AssistantConfig::default();
        save_config(&config, path, trace_id)?;
        return Ok(config);
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "Failed to read config, using fallback");
            return Ok(AssistantConfig::fallback());
        }
    };
    match serde_json::from_str::<AssistantConfig>(&raw) {
        Ok(config) => Ok(validate_config(config)),
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "Failed to parse config, using fallback");
            Ok(AssistantConfig::fallback())
        }
    }
}

pub fn save_config(config: &AssistantConfig, path: &Path, trace_id: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_config_path(path));
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

fn validate_config(mut config: AssistantConfig) -> AssistantConfig {
    if !SECURITY_LEVELS.contains(&config.security_level.as_str()) {
        config.security_level = default_security_level();
    }
    config
        .system_optimizations
        .background_apps
        .retain(|pkg| !pkg.trim().is_empty());
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trip_preserves_config() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");

        let mut config = AssistantConfig::default();
        config
            .voice_commands
            .insert("open terminal".to_string(), "am start -n com.termux/.app.TermuxActivity".to_string());
        config.system_optimizations.cpu_throttle = true;
        config.system_optimizations.background_apps = vec!["com.example.app".to_string()];

        save_config(&config, &path, "trace-test").expect("save");
        let loaded = load_or_init(&path, "trace-test").expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_creates_defaults() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");

        let config = load_or_init(&path, "trace-test").expect("load");
        assert!(path.exists(), "first run should create the config file");
        assert_eq!(config, AssistantConfig::default());
        assert_eq!(
            config.voice_commands.get("open camera").map(String::as_str),
            Some("am start -a android.media.action.IMAGE_CAPTURE")
        );
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_mapping() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(&path, "{not valid json").expect("write");

        let config = load_or_init(&path, "trace-test").expect("load");
        assert!(config.voice_commands.is_empty());
        assert_eq!(config.security_level, DEFAULT_SECURITY_LEVEL);
    }

    #[test]
    fn unknown_security_level_resets_to_default() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            serde_json::json!({
                "security_level": "paranoid",
                "system_optimizations": {"background_apps": ["com.example.app", "  "]}
            })
            .to_string(),
        )
        .expect("write");

        let config = load_or_init(&path, "trace-test").expect("load");
        assert_eq!(config.security_level, DEFAULT_SECURITY_LEVEL);
        assert_eq!(
            config.system_optimizations.background_apps,
            vec!["com.example.app".to_string()]
        );
    }

    #[test]
    fn save_keeps_a_backup_of_the_previous_file() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");

        let first = AssistantConfig::default();
        save_config(&first, &path, "trace-test").expect("save first");
        let mut second = AssistantConfig::default();
        second.security_level = "high".to_string();
        save_config(&second, &path, "trace-test").expect("save second");

        let backup = backup_config_path(&path);
        assert!(backup.exists());
        let restored: AssistantConfig =
            serde_json::from_str(&fs::read_to_string(&backup).expect("read")).expect("parse");
        assert_eq!(restored, first);
    }
}
