//! Per-user credential preferences: whether the user brings their own secret
//! for the system-default configuration, and that secret (encrypted).

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::database::connection::Database;
use crate::managers::config_manager::ConfigManager;
use crate::services::crypto_service::SecretKeyring;
use crate::types::ai::SecretProfile;
use crate::types::errors::StoreError;

/// Trait defining secret profile operations.
pub trait ProfileManagerTrait {
    /// Stores the preference. `secret` is plaintext and is encrypted before storage;
    /// `None` or an empty value leaves the user with no custom secret.
    fn set_custom_secret(&self, owner_id: &str, use_custom_secret: bool, secret: Option<&str>) -> Result<SecretProfile, StoreError>;
    fn get(&self, owner_id: &str) -> Result<Option<SecretProfile>, StoreError>;
}

/// Secret profile store backed by SQLite + the process keyring.
pub struct ProfileManager {
    db: Arc<Database>,
    keyring: Arc<SecretKeyring>,
}

impl ProfileManager {
    pub fn new(db: Arc<Database>, keyring: Arc<SecretKeyring>) -> Self {
        Self { db, keyring }
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<SecretProfile> {
        Ok(SecretProfile {
            owner_id: row.get(0)?,
            use_custom_secret: row.get(1)?,
            custom_secret: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl ProfileManagerTrait for ProfileManager {
    fn set_custom_secret(&self, owner_id: &str, use_custom_secret: bool, secret: Option<&str>) -> Result<SecretProfile, StoreError> {
        let encoded = match secret.filter(|s| !s.is_empty()) {
            Some(plaintext) => Some(self.keyring.encrypt_secret(plaintext)?),
            None => None,
        };

        let profile = SecretProfile {
            owner_id: owner_id.to_string(),
            use_custom_secret,
            custom_secret: encoded,
            updated_at: ConfigManager::now_ms(),
        };

        self.db.connection().execute(
            "INSERT OR REPLACE INTO user_secret_profiles (owner_id, use_custom_secret, custom_secret, updated_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![profile.owner_id, profile.use_custom_secret, profile.custom_secret, profile.updated_at],
        )?;

        Ok(profile)
    }

    fn get(&self, owner_id: &str) -> Result<Option<SecretProfile>, StoreError> {
        Ok(self
            .db
            .connection()
            .query_row(
                "SELECT owner_id, use_custom_secret, custom_secret, updated_at \
                 FROM user_secret_profiles WHERE owner_id = ?1",
                params![owner_id],
                Self::row_to_profile,
            )
            .optional()?)
    }
}
