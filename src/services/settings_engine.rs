// Gateway Settings Engine
// Loads, saves and updates gateway settings: key material, platform defaults, transport and logging.
// Settings are stored as a JSON file at the platform-specific config path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::platform;
use crate::services::path_address::PathAddress;
use crate::types::errors::SettingsError;
use crate::types::settings::GatewaySettings;

/// Environment variable that overrides the settings file location.
pub const CONFIG_PATH_ENV: &str = "VOCAB_GATEWAY_CONFIG";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<GatewaySettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &GatewaySettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: GatewaySettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// Path precedence: `path_override`, then `$VOCAB_GATEWAY_CONFIG`, then
    /// `settings.json` in the platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| {
                platform::get_config_dir()
                    .join("settings.json")
                    .to_string_lossy()
                    .to_string()
            });

        Self {
            config_path,
            settings: GatewaySettings::default(),
        }
    }

    /// Resolved SQLite path: the configured one or `<data dir>/vocab-gateway.db`.
    pub fn database_path(&self) -> PathBuf {
        match &self.settings.database.path {
            Some(p) => PathBuf::from(p),
            None => platform::get_data_dir().join("vocab-gateway.db"),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// A missing file yields defaults; a malformed one is a serialization error.
    fn load(&mut self) -> Result<GatewaySettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = GatewaySettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: GatewaySettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Updates an individual setting by path, e.g. `"transport.timeout_ms"`.
    ///
    /// The key must already exist in the settings tree. The result is
    /// re-deserialized to validate the value, then saved to disk.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        let address = PathAddress::parse(key)
            .map_err(|e| SettingsError::InvalidKey(e.to_string()))?;

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        if address.get(&json_value).is_none() {
            return Err(SettingsError::InvalidKey(format!(
                "Key '{}' not found in settings",
                key
            )));
        }
        address.set(&mut json_value, value);

        let new_settings: GatewaySettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.settings = new_settings;
        self.save()
    }

    /// Resets all settings to defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = GatewaySettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
