use thiserror::Error;

// === PathError ===

/// Errors raised while parsing or writing a path expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    /// The path string does not follow the `key[index].key` grammar.
    #[error("Invalid path expression '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

// === CryptoError ===

/// Errors related to credential encryption and key handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CryptoError {
    /// The plaintext was empty or otherwise unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The plaintext exceeds the OAEP capacity of the key.
    #[error("Payload too large: {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    /// Ciphertext was malformed or produced by a different key pair.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    /// Encryption operation failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// The provided key is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// Key pair generation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
}

// === TransportError ===

/// Classified failures of an outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// No response arrived within the timeout (milliseconds).
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
    /// The upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// Connection, TLS or I/O failure.
    #[error("Network error: {0}")]
    Network(String),
    /// The request could not be built locally; nothing was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// === ExtractError ===

/// Errors raised while reading generated text out of a response body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The response body is not valid JSON.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Nothing (or only an empty value) was found at the content path.
    #[error("No content extracted at '{0}'")]
    NoContentExtracted(String),
}

// === StoreError ===

/// Errors related to configuration and profile persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record with the given ID was not found.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
    /// A stored JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The configuration failed structural validation.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Secret encryption failed while persisting.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === GatewayError ===

/// Classified failures surfaced by the AI gateway to the rest of the application.
///
/// Each variant maps to a stable [`GatewayError::code`] so UI layers can react
/// to the reason (prompt for a new credential, show a cooldown, ...).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The configuration is structurally invalid. Raised before any network call.
    #[error("Invalid configuration: {0}")]
    Validation(String),
    /// The upstream rejected the credential (401/403).
    #[error("Authentication rejected by upstream (HTTP {status})")]
    AuthFailure { status: u16 },
    /// The upstream throttled the call (429).
    #[error("Rate limited by upstream")]
    RateLimited,
    /// The call did not complete within the timeout (milliseconds).
    #[error("Upstream call timed out after {0} ms")]
    Timeout(u64),
    /// Any other non-success status.
    #[error("Upstream error (HTTP {status}): {body}")]
    Upstream { status: u16, body: String },
    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),
    /// The response body could not be parsed.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
    /// The response parsed but held no content at the configured path.
    #[error("No content at response path '{0}'")]
    NoContentExtracted(String),
    /// A stored credential could not be decrypted.
    #[error("Credential decryption failed: {0}")]
    DecryptionFailed(String),
    /// A credential is larger than the key can encrypt.
    #[error("Credential too large: {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    /// Empty or unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Key handling or encryption failed for another reason.
    #[error("Credential crypto error: {0}")]
    Crypto(String),
    /// No usable credential could be resolved for the call.
    #[error("No usable credential: {0}")]
    MissingSecret(String),
    /// Configuration with the given ID was not found.
    #[error("Configuration not found: {0}")]
    NotFound(String),
    /// Persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation_error",
            GatewayError::AuthFailure { .. } => "auth_failure",
            GatewayError::RateLimited => "rate_limited",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::Network(_) => "network_error",
            GatewayError::MalformedResponse(_) => "malformed_response",
            GatewayError::NoContentExtracted(_) => "no_content_extracted",
            GatewayError::DecryptionFailed(_) => "decryption_failed",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::Crypto(_) => "crypto_error",
            GatewayError::MissingSecret(_) => "missing_secret",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Storage(_) => "storage_error",
        }
    }

    /// True for failures observed on the upstream call itself (transport or
    /// response interpretation). Only these flip a configuration to unavailable.
    pub fn is_call_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::AuthFailure { .. }
                | GatewayError::RateLimited
                | GatewayError::Timeout(_)
                | GatewayError::Upstream { .. }
                | GatewayError::Network(_)
                | GatewayError::MalformedResponse(_)
                | GatewayError::NoContentExtracted(_)
        )
    }
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(ms) => GatewayError::Timeout(ms),
            TransportError::HttpStatus { status: 401, .. } => GatewayError::AuthFailure { status: 401 },
            TransportError::HttpStatus { status: 403, .. } => GatewayError::AuthFailure { status: 403 },
            TransportError::HttpStatus { status: 429, .. } => GatewayError::RateLimited,
            TransportError::HttpStatus { status, body } => GatewayError::Upstream { status, body },
            TransportError::Network(msg) => GatewayError::Network(msg),
            TransportError::InvalidRequest(msg) => GatewayError::Validation(msg),
        }
    }
}

impl From<ExtractError> for GatewayError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::MalformedResponse(msg) => GatewayError::MalformedResponse(msg),
            ExtractError::NoContentExtracted(path) => GatewayError::NoContentExtracted(path),
        }
    }
}

impl From<CryptoError> for GatewayError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidInput(msg) => GatewayError::InvalidInput(msg),
            CryptoError::PayloadTooLarge { len, max } => GatewayError::PayloadTooLarge { len, max },
            CryptoError::DecryptionFailed(msg) => GatewayError::DecryptionFailed(msg),
            other => GatewayError::Crypto(other.to_string()),
        }
    }
}

impl From<PathError> for GatewayError {
    fn from(e: PathError) -> Self {
        GatewayError::Validation(e.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => GatewayError::NotFound(id),
            StoreError::Validation(msg) => GatewayError::Validation(msg),
            StoreError::Crypto(c) => c.into(),
            other => GatewayError::Storage(other.to_string()),
        }
    }
}
