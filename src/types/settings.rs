use serde::{Deserialize, Serialize};

/// Top-level gateway settings container, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GatewaySettings {
    #[serde(default)]
    pub crypto: CryptoSettings,
    #[serde(default)]
    pub platform: PlatformSettings,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Process-wide RSA key pair used for credentials at rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CryptoSettings {
    pub public_key_pem: Option<String>,
    pub private_key_pem: Option<String>,
    pub key_bits: usize,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            public_key_pem: None,
            private_key_pem: None,
            key_bits: 2048,
        }
    }
}

/// Platform-managed vendor used when a caller has no working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlatformSettings {
    pub endpoint_url: String,
    pub model_name: String,
    /// Plaintext or `rsa:`-encoded platform secret.
    pub secret: Option<String>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            endpoint_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model_name: "deepseek-chat".to_string(),
            secret: None,
        }
    }
}

/// Outbound call settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `filter`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// SQLite location. `None` uses the platform data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DatabaseSettings {
    pub path: Option<String>,
}
