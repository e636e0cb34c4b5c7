//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_setup::BackendConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Print JSON instead of text
    #[serde(default)]
    pub json: bool,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [backend]
            socketcan = false
            default_bitrate = 250000

            [[backend.virtual_channels]]
            name = "vcan0"

            [[backend.virtual_channels]]
            name = "vcan1"
            bitrate = 125000
            bitrates = [125000, 250000]

            [output]
            json = true
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(!config.backend.socketcan);
        assert_eq!(config.backend.default_bitrate, 250_000);
        assert_eq!(config.backend.virtual_channels.len(), 2);
        assert_eq!(config.backend.virtual_channels[1].bitrate, Some(125_000));
        assert!(config.backend.cache_databases);
        assert!(config.output.json);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.backend.virtual_channels.is_empty());
        assert_eq!(config.backend.default_bitrate, 500_000);
        assert!(!config.output.json);
    }

    #[test]
    fn test_load_config_reports_bad_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[backend\n").unwrap();
        file.flush().unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
