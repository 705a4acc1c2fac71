//! AI configuration store.
//!
//! CRUD for per-user AI configurations plus the availability bookkeeping the
//! gateway performs after every call, backed by SQLite via `rusqlite`.
//! Secrets are encrypted with the process keyring before they touch disk.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::connection::Database;
use crate::services::crypto_service::{is_encrypted_secret, SecretKeyring};
use crate::services::request_materializer::validate_config;
use crate::types::ai::{AIConfiguration, AIConfigurationDraft, SecretPlacement};
use crate::types::errors::StoreError;

const SELECT_COLUMNS: &str = "id, owner_id, endpoint_url, secret, secret_placement, custom_header_name, \
     secret_body_path, model_name, request_template, response_template_example, message_list_path, \
     role_field_path, text_field_path, response_text_path, response_thinking_path, user_role_value, \
     assistant_role_value, system_role_value, extra_headers, is_available, is_system_default, \
     last_used_at, created_at, updated_at";

/// Trait defining configuration persistence operations.
pub trait ConfigManagerTrait {
    fn create(&self, owner_id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError>;
    /// Replaces the owner-editable fields. An empty draft secret keeps the stored one.
    /// Availability is reset: an edited configuration is untested again.
    fn update(&self, owner_id: &str, id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError>;
    fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<AIConfiguration, StoreError>;
    fn list_for_owner(&self, owner_id: &str) -> Result<Vec<AIConfiguration>, StoreError>;
    fn most_recent_available(&self, owner_id: &str) -> Result<Option<AIConfiguration>, StoreError>;
    /// Returns the owner's system default, inserting `draft` as one if none exists.
    fn ensure_system_default(&self, owner_id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError>;
    /// Writes `is_available` and `last_used_at` in one statement.
    /// Returns `false` if the configuration no longer exists.
    fn record_outcome(&self, id: &str, success: bool, at_ms: i64) -> Result<bool, StoreError>;
    /// Re-encrypts stored secrets lacking the `rsa:` prefix. Returns how many
    /// were rewritten; values too large for the key are left as they are.
    fn migrate_legacy_secrets(&self) -> Result<usize, StoreError>;
}

/// Configuration store backed by SQLite + the process keyring.
pub struct ConfigManager {
    db: Arc<Database>,
    keyring: Arc<SecretKeyring>,
}

impl ConfigManager {
    pub fn new(db: Arc<Database>, keyring: Arc<SecretKeyring>) -> Self {
        Self { db, keyring }
    }

    /// Current UNIX timestamp in milliseconds.
    pub fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    fn encode_secret(&self, plaintext: &str) -> Result<String, StoreError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        Ok(self.keyring.encrypt_secret(plaintext)?)
    }

    fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
        let text: String = row.get(idx)?;
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_config(row: &rusqlite::Row) -> rusqlite::Result<AIConfiguration> {
        let placement: String = row.get(4)?;
        let example: Option<String> = row.get(9)?;
        let response_template_example = match example {
            Some(text) => Some(
                serde_json::from_str(&text)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?,
            ),
            None => None,
        };

        Ok(AIConfiguration {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            settings: AIConfigurationDraft {
                endpoint_url: row.get(2)?,
                secret: row.get(3)?,
                secret_placement: SecretPlacement::from_str_lossy(&placement),
                custom_header_name: row.get(5)?,
                secret_body_path: row.get(6)?,
                model_name: row.get(7)?,
                request_template: Self::json_column(row, 8)?,
                response_template_example,
                message_list_path: row.get(10)?,
                role_field_path: row.get(11)?,
                text_field_path: row.get(12)?,
                response_text_path: row.get(13)?,
                response_thinking_path: row.get(14)?,
                user_role_value: row.get(15)?,
                assistant_role_value: row.get(16)?,
                system_role_value: row.get(17)?,
                extra_headers: Self::json_column(row, 18)?,
            },
            is_available: row.get(19)?,
            is_system_default: row.get(20)?,
            last_used_at: row.get(21)?,
            created_at: row.get(22)?,
            updated_at: row.get(23)?,
        })
    }

    fn query_one(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Option<AIConfiguration>, StoreError> {
        let sql = format!("SELECT {} FROM ai_configurations {}", SELECT_COLUMNS, filter);
        Ok(conn.query_row(&sql, args, Self::row_to_config).optional()?)
    }

    fn validate(draft: &AIConfigurationDraft) -> Result<(), StoreError> {
        validate_config(draft).map_err(|e| StoreError::Validation(e.to_string()))
    }

    fn insert(&self, conn: &Connection, owner_id: &str, draft: &AIConfigurationDraft, stored_secret: &str, system_default: bool) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Self::now_ms();
        let example = draft
            .response_template_example
            .as_ref()
            .map(Self::to_json)
            .transpose()?;

        conn.execute(
            "INSERT INTO ai_configurations (id, owner_id, endpoint_url, secret, secret_placement, \
             custom_header_name, secret_body_path, model_name, request_template, response_template_example, \
             message_list_path, role_field_path, text_field_path, response_text_path, response_thinking_path, \
             user_role_value, assistant_role_value, system_role_value, extra_headers, is_available, \
             is_system_default, last_used_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, 0, ?20, NULL, ?21, ?21)",
            params![
                id,
                owner_id,
                draft.endpoint_url,
                stored_secret,
                draft.secret_placement.as_str(),
                draft.custom_header_name,
                draft.secret_body_path,
                draft.model_name,
                Self::to_json(&draft.request_template)?,
                example,
                draft.message_list_path,
                draft.role_field_path,
                draft.text_field_path,
                draft.response_text_path,
                draft.response_thinking_path,
                draft.user_role_value,
                draft.assistant_role_value,
                draft.system_role_value,
                Self::to_json(&draft.extra_headers)?,
                system_default,
                now,
            ],
        )?;
        Ok(id)
    }
}

impl ConfigManagerTrait for ConfigManager {
    fn create(&self, owner_id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError> {
        Self::validate(&draft)?;
        let stored_secret = self.encode_secret(&draft.secret)?;

        let conn = self.db.connection();
        let id = self.insert(&conn, owner_id, &draft, &stored_secret, false)?;
        Self::query_one(&conn, "WHERE id = ?1", params![id])?.ok_or(StoreError::NotFound(id))
    }

    fn update(&self, owner_id: &str, id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError> {
        Self::validate(&draft)?;
        let new_secret = self.encode_secret(&draft.secret)?;
        let example = draft
            .response_template_example
            .as_ref()
            .map(Self::to_json)
            .transpose()?;

        let conn = self.db.connection();
        let affected = conn.execute(
            "UPDATE ai_configurations SET endpoint_url = ?3, \
             secret = CASE WHEN ?4 = '' THEN secret ELSE ?4 END, secret_placement = ?5, \
             custom_header_name = ?6, secret_body_path = ?7, model_name = ?8, request_template = ?9, \
             response_template_example = ?10, message_list_path = ?11, role_field_path = ?12, \
             text_field_path = ?13, response_text_path = ?14, response_thinking_path = ?15, \
             user_role_value = ?16, assistant_role_value = ?17, system_role_value = ?18, \
             extra_headers = ?19, is_available = 0, last_used_at = NULL, updated_at = ?20 \
             WHERE id = ?1 AND owner_id = ?2",
            params![
                id,
                owner_id,
                draft.endpoint_url,
                new_secret,
                draft.secret_placement.as_str(),
                draft.custom_header_name,
                draft.secret_body_path,
                draft.model_name,
                Self::to_json(&draft.request_template)?,
                example,
                draft.message_list_path,
                draft.role_field_path,
                draft.text_field_path,
                draft.response_text_path,
                draft.response_thinking_path,
                draft.user_role_value,
                draft.assistant_role_value,
                draft.system_role_value,
                Self::to_json(&draft.extra_headers)?,
                Self::now_ms(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::query_one(&conn, "WHERE id = ?1", params![id])?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let affected = self.db.connection().execute(
            "DELETE FROM ai_configurations WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<AIConfiguration, StoreError> {
        let conn = self.db.connection();
        Self::query_one(&conn, "WHERE id = ?1", params![id])?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list_for_owner(&self, owner_id: &str) -> Result<Vec<AIConfiguration>, StoreError> {
        let conn = self.db.connection();
        let sql = format!(
            "SELECT {} FROM ai_configurations WHERE owner_id = ?1 \
             ORDER BY COALESCE(last_used_at, 0) DESC, created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], Self::row_to_config)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn most_recent_available(&self, owner_id: &str) -> Result<Option<AIConfiguration>, StoreError> {
        let conn = self.db.connection();
        Self::query_one(
            &conn,
            "WHERE owner_id = ?1 AND is_available = 1 \
             ORDER BY COALESCE(last_used_at, 0) DESC, created_at DESC LIMIT 1",
            params![owner_id],
        )
    }

    fn ensure_system_default(&self, owner_id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, StoreError> {
        Self::validate(&draft)?;
        let stored_secret = self.encode_secret(&draft.secret)?;

        // Lookup and insert share one lock so concurrent first calls create a single default.
        let conn = self.db.connection();
        let filter = "WHERE owner_id = ?1 AND is_system_default = 1 ORDER BY created_at LIMIT 1";
        if let Some(existing) = Self::query_one(&conn, filter, params![owner_id])? {
            return Ok(existing);
        }

        let id = self.insert(&conn, owner_id, &draft, &stored_secret, true)?;
        info!(owner_id, config_id = %id, "created system default AI configuration");
        Self::query_one(&conn, "WHERE id = ?1", params![id])?.ok_or(StoreError::NotFound(id))
    }

    fn record_outcome(&self, id: &str, success: bool, at_ms: i64) -> Result<bool, StoreError> {
        let affected = self.db.connection().execute(
            "UPDATE ai_configurations SET is_available = ?2, last_used_at = ?3 WHERE id = ?1",
            params![id, success, at_ms],
        )?;
        Ok(affected > 0)
    }

    fn migrate_legacy_secrets(&self) -> Result<usize, StoreError> {
        let legacy: Vec<(String, String)> = {
            let conn = self.db.connection();
            let mut stmt = conn.prepare("SELECT id, secret FROM ai_configurations WHERE secret != ''")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<(String, String)>, _>>()?
                .into_iter()
                .filter(|(_, secret)| !is_encrypted_secret(secret))
                .collect()
        };

        let mut migrated = 0;
        for (id, plaintext) in &legacy {
            let encoded = match self.keyring.encrypt_secret(plaintext) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(config_id = %id, error = %e, "legacy secret could not be re-encrypted");
                    continue;
                }
            };
            migrated += self.db.connection().execute(
                "UPDATE ai_configurations SET secret = ?2 WHERE id = ?1 AND secret = ?3",
                params![id, encoded, plaintext],
            )?;
        }

        if migrated > 0 {
            info!(count = migrated, "re-encrypted legacy plaintext secrets");
        }
        Ok(migrated)
    }
}
