//! Credential cryptography: RSA-OAEP (SHA-256) key pairs and the `rsa:`
//! at-rest encoding for AI provider secrets.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::{info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::errors::CryptoError;

/// Prefix marking an encrypted secret at rest.
pub const SECRET_PREFIX: &str = "rsa:";

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// SHA-256 output length in bytes.
const HASH_LENGTH: usize = 32;

/// A key pair in PEM form (SPKI public key, PKCS#8 private key).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPairPem {
    pub public_key_pem: String,
    pub private_key_pem: String,
}

/// Trait defining the PEM-level credential crypto operations.
pub trait CryptoServiceTrait {
    /// Generates a new RSA key pair of `bits` size.
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPairPem, CryptoError>;

    /// Encrypts `plaintext` with RSA-OAEP/SHA-256, returning base64 ciphertext.
    fn encrypt(&self, plaintext: &str, public_key_pem: &str) -> Result<String, CryptoError>;

    /// Decrypts base64 ciphertext produced by [`CryptoServiceTrait::encrypt`].
    fn decrypt(&self, ciphertext_b64: &str, private_key_pem: &str) -> Result<Zeroizing<String>, CryptoError>;

    /// Structural validity check. Never fails.
    fn validate_key(&self, pem: &str, expect_private: bool) -> bool;
}

/// Stateless implementation of [`CryptoServiceTrait`] on top of the `rsa` crate.
pub struct CryptoService;

impl CryptoService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest plaintext OAEP/SHA-256 can carry under `key`.
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(2 * HASH_LENGTH + 2)
}

fn parse_public_key(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("Unreadable public key: {}", e)))
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    let key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("Unreadable private key: {}", e)))?;
    key.validate()
        .map_err(|e| CryptoError::InvalidKey(format!("Inconsistent private key: {}", e)))?;
    Ok(key)
}

fn encrypt_with(key: &RsaPublicKey, plaintext: &str) -> Result<String, CryptoError> {
    if plaintext.is_empty() {
        return Err(CryptoError::InvalidInput("Plaintext must not be empty".to_string()));
    }

    let max = max_plaintext_len(key);
    if plaintext.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            len: plaintext.len(),
            max,
        });
    }

    let mut rng = rand::thread_rng();
    let ciphertext = key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(BASE64.encode(ciphertext))
}

fn decrypt_with(key: &RsaPrivateKey, ciphertext_b64: &str) -> Result<Zeroizing<String>, CryptoError> {
    let ciphertext = BASE64
        .decode(ciphertext_b64.trim())
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

    let plaintext = key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .map_err(|_| {
            CryptoError::DecryptionFailed("Invalid key or corrupted ciphertext".to_string())
        })?;

    match String::from_utf8(plaintext) {
        Ok(text) => Ok(Zeroizing::new(text)),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(CryptoError::DecryptionFailed("Plaintext is not valid UTF-8".to_string()))
        }
    }
}

fn generate_keys(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey), CryptoError> {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

fn encode_pair(private: &RsaPrivateKey, public: &RsaPublicKey) -> Result<KeyPairPem, CryptoError> {
    let private_key_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_key_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    Ok(KeyPairPem {
        public_key_pem,
        private_key_pem: private_key_pem.to_string(),
    })
}

impl CryptoServiceTrait for CryptoService {
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPairPem, CryptoError> {
        let (private, public) = generate_keys(bits)?;
        encode_pair(&private, &public)
    }

    fn encrypt(&self, plaintext: &str, public_key_pem: &str) -> Result<String, CryptoError> {
        let key = parse_public_key(public_key_pem)?;
        encrypt_with(&key, plaintext)
    }

    fn decrypt(&self, ciphertext_b64: &str, private_key_pem: &str) -> Result<Zeroizing<String>, CryptoError> {
        let key = parse_private_key(private_key_pem)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        decrypt_with(&key, ciphertext_b64)
    }

    fn validate_key(&self, pem: &str, expect_private: bool) -> bool {
        if expect_private {
            parse_private_key(pem).is_ok()
        } else {
            parse_public_key(pem).is_ok()
        }
    }
}

/// The process-wide key pair protecting stored secrets.
///
/// Built once at startup and shared read-only behind an `Arc`.
pub struct SecretKeyring {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl SecretKeyring {
    /// Loads a keyring from a PEM pair. The public key must belong to the private key.
    pub fn from_pem(public_key_pem: &str, private_key_pem: &str) -> Result<Self, CryptoError> {
        let private = parse_private_key(private_key_pem)?;
        let public = parse_public_key(public_key_pem)?;
        if RsaPublicKey::from(&private) != public {
            return Err(CryptoError::InvalidKey(
                "Public key does not match private key".to_string(),
            ));
        }
        Ok(Self { private, public })
    }

    /// Generates a fresh keyring.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let (private, public) = generate_keys(bits)?;
        Ok(Self { private, public })
    }

    /// Loads the configured key pair, or generates one and writes it back to
    /// the settings file so the operator can keep it.
    ///
    /// A pair is generated only when neither half is configured.
    ///
    /// # Errors
    /// `CryptoError::InvalidKey` when a configured key is missing its other
    /// half, does not parse, or the halves do not match. The settings file is
    /// left untouched.
    pub fn load_or_generate(settings: &mut SettingsEngine) -> Result<Self, CryptoError> {
        let crypto = settings.get_settings().crypto.clone();

        match (&crypto.public_key_pem, &crypto.private_key_pem) {
            (Some(public_pem), Some(private_pem)) => {
                let keyring = Self::from_pem(public_pem, private_pem).map_err(|e| {
                    CryptoError::InvalidKey(format!("configured credential key pair is unusable: {}", e))
                })?;
                info!(bits = keyring.public.size() * 8, "loaded credential key pair");
                return Ok(keyring);
            }
            (None, None) => {}
            _ => {
                return Err(CryptoError::InvalidKey(
                    "only one half of the credential key pair is configured".to_string(),
                ))
            }
        }

        let keyring = Self::generate(crypto.key_bits)?;
        let pems = keyring.to_pem()?;
        let persisted = settings
            .set_value("crypto.public_key_pem", serde_json::Value::String(pems.public_key_pem))
            .and_then(|_| {
                settings.set_value(
                    "crypto.private_key_pem",
                    serde_json::Value::String(pems.private_key_pem),
                )
            });

        match persisted {
            Ok(()) => warn!(
                path = settings.get_config_path(),
                "generated a new credential key pair; back up this settings file"
            ),
            Err(e) => warn!(
                error = %e,
                "generated a new credential key pair but could not persist it; \
                 it lives only for this process"
            ),
        }

        Ok(keyring)
    }

    /// PEM encoding of this key pair.
    pub fn to_pem(&self) -> Result<KeyPairPem, CryptoError> {
        encode_pair(&self.private, &self.public)
    }

    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Largest secret (in bytes) this keyring can encrypt.
    pub fn max_plaintext_len(&self) -> usize {
        max_plaintext_len(&self.public)
    }

    /// Raw OAEP encryption, base64 without prefix.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        encrypt_with(&self.public, plaintext)
    }

    /// Raw OAEP decryption of base64 ciphertext without prefix.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<Zeroizing<String>, CryptoError> {
        decrypt_with(&self.private, ciphertext_b64)
    }

    /// Encodes a secret for storage: `"rsa:" + base64(ciphertext)`.
    pub fn encrypt_secret(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(format!("{}{}", SECRET_PREFIX, self.encrypt(plaintext)?))
    }

    /// Recovers a stored secret.
    ///
    /// Values without the `rsa:` prefix are legacy plaintext and are returned
    /// unchanged.
    pub fn decrypt_secret(&self, stored: &str) -> Result<Zeroizing<String>, CryptoError> {
        match stored.strip_prefix(SECRET_PREFIX) {
            Some(ciphertext) => self.decrypt(ciphertext),
            None => {
                if !stored.is_empty() {
                    warn!("stored secret is not encrypted; passing legacy plaintext through");
                }
                Ok(Zeroizing::new(stored.to_string()))
            }
        }
    }
}

/// True if `stored` carries the `rsa:` at-rest encoding.
pub fn is_encrypted_secret(stored: &str) -> bool {
    stored.starts_with(SECRET_PREFIX)
}
