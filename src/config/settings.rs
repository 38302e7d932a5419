//! Loads [`RouterSettings`] from a JSON file, grounded on the reference
//! gateway's `config/settings.rs::load_settings()` contract: path resolution,
//! existence check, canonicalization with a working-directory traversal
//! guard, size cap, then `serde_json::from_str`.

use crate::models::Channel;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;

/// The config-file root: `{version, default_timeout_ms, kafka_brokers,
/// channels, persistence_config?}`. `persistence_config` is opaque — this
/// crate never interprets it, only forwards it to the persistence
/// collaborator's own constructor (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    pub version: u8,
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub kafka_brokers: Vec<String>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub persistence_config: serde_json::Value,
}

/// Loads and parses `RouterSettings` from the path named by
/// `ROUTER_CONFIG_PATH`, defaulting to `./config.json`.
pub fn load_settings() -> Result<RouterSettings, Box<dyn std::error::Error>> {
    let config_path = std::env::var("ROUTER_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());

    debug!("Loading router configuration from: {config_path}");

    let path = Path::new(&config_path);
    if !path.exists() {
        return Err(format!("Cannot resolve config path '{config_path}'").into());
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("Cannot resolve config path '{config_path}': {e}"))?;
    let current_dir = std::env::current_dir().map_err(|e| format!("Cannot get current directory: {e}"))?;
    if !canonical_path.starts_with(&current_dir) {
        warn!("Config path '{config_path}' is outside working directory");
        return Err("Config path outside working directory".into());
    }

    let metadata = fs::metadata(&canonical_path).map_err(|e| format!("Cannot read config file metadata: {e}"))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(format!("Config file too large: {} bytes (max: {MAX_CONFIG_SIZE} bytes)", metadata.len()).into());
    }

    let config_data = fs::read_to_string(&canonical_path).map_err(|e| format!("Cannot read config file: {e}"))?;
    let settings: RouterSettings = serde_json::from_str(&config_data).map_err(|e| format!("Invalid JSON: {e}"))?;

    debug!("Loaded router configuration with {} channels", settings.channels.len());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        // Placed under the crate root (test process cwd) rather than the
        // system temp dir, so `load_settings`'s working-directory guard
        // accepts it.
        let dir = tempfile::tempdir_in(".").unwrap();
        let path = dir.path().join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    #[test]
    fn loads_well_formed_config() {
        let (_dir, path) = write_config(
            r#"{"version":1,"default_timeout_ms":5000,"kafka_brokers":["broker:9092"],"channels":[]}"#,
        );
        std::env::set_var("ROUTER_CONFIG_PATH", &path);
        let settings = load_settings().unwrap();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.default_timeout_ms, 5000);
        assert_eq!(settings.kafka_brokers, vec!["broker:9092".to_string()]);
        std::env::remove_var("ROUTER_CONFIG_PATH");
    }

    #[test]
    fn missing_file_is_an_error() {
        std::env::set_var("ROUTER_CONFIG_PATH", "/nonexistent/config.json");
        assert!(load_settings().is_err());
        std::env::remove_var("ROUTER_CONFIG_PATH");
    }

    #[test]
    fn malformed_json_is_an_error() {
        let (_dir, path) = write_config("{not json");
        std::env::set_var("ROUTER_CONFIG_PATH", &path);
        assert!(load_settings().is_err());
        std::env::remove_var("ROUTER_CONFIG_PATH");
    }
}
