//! App Core for Vocab Gateway.
//!
//! Central struct holding the keyring, stores and lifecycle, and the single
//! entry point the RPC layer talks to.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::database::connection::Database;
use crate::logging;
use crate::managers::config_manager::{ConfigManager, ConfigManagerTrait};
use crate::managers::profile_manager::{ProfileManager, ProfileManagerTrait};
use crate::services::config_lifecycle::ConfigLifecycle;
use crate::services::crypto_service::SecretKeyring;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::services::transport::{HttpTransport, Transport};
use crate::types::ai::{AIConfiguration, AIConfigurationDraft, ConversationTurn, Generation, SecretProfile, TestResult};
use crate::types::errors::GatewayError;
use crate::types::settings::GatewaySettings;

/// Central application struct holding all managers and services.
pub struct App {
    pub db: Arc<Database>,
    pub keyring: Arc<SecretKeyring>,
    pub config_manager: Arc<ConfigManager>,
    pub profile_manager: Arc<ProfileManager>,
    pub lifecycle: ConfigLifecycle,
    pub settings: GatewaySettings,
}

impl App {
    /// Creates a new App from the settings file at `config_path` (or the
    /// default location), generating a key pair on first run.
    pub fn new(config_path: Option<String>) -> Result<Self, Box<dyn Error>> {
        let mut engine = SettingsEngine::new(config_path);
        let settings = engine.load()?;
        logging::init_logging(&settings.logging.filter);

        let keyring = Arc::new(SecretKeyring::load_or_generate(&mut engine)?);
        let db_path = engine.database_path();
        let db = Arc::new(Database::open(&db_path)?);
        info!(database = %db_path.display(), config = engine.get_config_path(), "gateway storage opened");

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        let app = Self::with_parts(db, keyring, transport, engine.get_settings().clone());
        app.startup();
        Ok(app)
    }

    /// Wires an App from already-built parts. Used by [`App::new`] and by tests
    /// that need an in-memory database or a scripted transport.
    pub fn with_parts(
        db: Arc<Database>,
        keyring: Arc<SecretKeyring>,
        transport: Arc<dyn Transport>,
        settings: GatewaySettings,
    ) -> Self {
        let config_manager = Arc::new(ConfigManager::new(db.clone(), keyring.clone()));
        let profile_manager = Arc::new(ProfileManager::new(db.clone(), keyring.clone()));
        let lifecycle = ConfigLifecycle::new(
            config_manager.clone(),
            profile_manager.clone(),
            keyring.clone(),
            transport,
            settings.platform.clone(),
            Duration::from_millis(settings.transport.timeout_ms),
        );

        Self {
            db,
            keyring,
            config_manager,
            profile_manager,
            lifecycle,
            settings,
        }
    }

    /// Startup sequence: re-encrypt any plaintext secrets left by older versions.
    /// Returns how many were migrated.
    pub fn startup(&self) -> usize {
        match self.config_manager.migrate_legacy_secrets() {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "legacy secret migration failed");
                0
            }
        }
    }

    pub async fn generate(
        &self,
        caller_id: &str,
        prompt: &str,
        history: &[ConversationTurn],
        explicit_secret: Option<&str>,
    ) -> Result<Generation, GatewayError> {
        self.lifecycle.generate(caller_id, prompt, history, explicit_secret).await
    }

    pub fn create_configuration(&self, owner_id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, GatewayError> {
        Ok(self.config_manager.create(owner_id, draft)?)
    }

    pub fn update_configuration(&self, owner_id: &str, id: &str, draft: AIConfigurationDraft) -> Result<AIConfiguration, GatewayError> {
        Ok(self.config_manager.update(owner_id, id, draft)?)
    }

    pub fn delete_configuration(&self, owner_id: &str, id: &str) -> Result<(), GatewayError> {
        Ok(self.config_manager.delete(owner_id, id)?)
    }

    /// Fetches a configuration owned by `owner_id`. Someone else's id reads as not found.
    pub fn get_configuration(&self, owner_id: &str, id: &str) -> Result<AIConfiguration, GatewayError> {
        let config = self.config_manager.get(id)?;
        if config.owner_id != owner_id {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(config)
    }

    pub fn list_configurations(&self, owner_id: &str) -> Result<Vec<AIConfiguration>, GatewayError> {
        Ok(self.config_manager.list_for_owner(owner_id)?)
    }

    /// Tests a stored configuration. Failures, including an unknown id, come
    /// back inside the result.
    pub async fn test_configuration(&self, owner_id: &str, id: &str, secret_override: Option<&str>) -> TestResult {
        match self.get_configuration(owner_id, id) {
            Ok(config) => self.lifecycle.test_configuration(&config, secret_override).await,
            Err(e) => TestResult::failed(&e),
        }
    }

    pub async fn test_raw_secret(&self, owner_id: &str, draft: AIConfigurationDraft, raw_secret: &str) -> TestResult {
        self.lifecycle.test_raw_secret(owner_id, draft, raw_secret).await
    }

    pub fn set_custom_secret(&self, owner_id: &str, use_custom_secret: bool, secret: Option<&str>) -> Result<SecretProfile, GatewayError> {
        Ok(self.profile_manager.set_custom_secret(owner_id, use_custom_secret, secret)?)
    }

    /// Encrypts a secret into its `rsa:` storage form.
    pub fn encrypt_secret(&self, plaintext: &str) -> Result<String, GatewayError> {
        Ok(self.keyring.encrypt_secret(plaintext)?)
    }

    /// Recovers a stored secret. Unprefixed legacy values come back unchanged.
    pub fn decrypt_secret(&self, stored: &str) -> Result<Zeroizing<String>, GatewayError> {
        Ok(self.keyring.decrypt_secret(stored)?)
    }

    pub fn public_key_pem(&self) -> Result<String, GatewayError> {
        Ok(self.keyring.public_key_pem()?)
    }
}
