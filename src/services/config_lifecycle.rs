//! Configuration lifecycle: picks a usable configuration for a caller,
//! resolves the credential, performs the call and keeps the configuration's
//! availability in step with call outcomes.
//!
//! States per configuration: `Untested -> Available <-> Unavailable`, driven
//! only by [`ConfigLifecycle::invoke`] outcomes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::managers::config_manager::{ConfigManager, ConfigManagerTrait};
use crate::managers::profile_manager::{ProfileManager, ProfileManagerTrait};
use crate::services::crypto_service::SecretKeyring;
use crate::services::request_materializer::{build_request, validate_config, MaterializedRequest};
use crate::services::response_extractor::extract;
use crate::services::transport::Transport;
use crate::types::ai::{AIConfiguration, AIConfigurationDraft, ConversationTurn, Generation, TestResult};
use crate::types::errors::{GatewayError, TransportError};
use crate::types::settings::PlatformSettings;

/// Prompt sent when testing a configuration.
pub const TEST_PROMPT: &str = "Hello";

/// Drives configuration resolution and calls.
pub struct ConfigLifecycle {
    configs: Arc<ConfigManager>,
    profiles: Arc<ProfileManager>,
    keyring: Arc<SecretKeyring>,
    transport: Arc<dyn Transport>,
    platform: PlatformSettings,
    timeout: Duration,
}

impl ConfigLifecycle {
    pub fn new(
        configs: Arc<ConfigManager>,
        profiles: Arc<ProfileManager>,
        keyring: Arc<SecretKeyring>,
        transport: Arc<dyn Transport>,
        platform: PlatformSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            configs,
            profiles,
            keyring,
            transport,
            platform,
            timeout,
        }
    }

    /// Shape of the system default configuration. Its secret is resolved at call time.
    pub fn system_default_draft(&self) -> AIConfigurationDraft {
        AIConfigurationDraft::openai_compatible(&self.platform.endpoint_url, &self.platform.model_name, "")
    }

    /// The caller's most recently used available configuration, or their
    /// system default (created on first use).
    pub fn resolve(&self, caller_id: &str) -> Result<AIConfiguration, GatewayError> {
        if let Some(config) = self.configs.most_recent_available(caller_id)? {
            debug!(caller_id, config_id = %config.id, "resolved available configuration");
            return Ok(config);
        }
        let config = self.configs.ensure_system_default(caller_id, self.system_default_draft())?;
        debug!(caller_id, config_id = %config.id, "falling back to system default configuration");
        Ok(config)
    }

    /// Credential precedence: explicit per-call secret, then the user's own
    /// secret (the configuration's, or the profile's custom secret for the
    /// system default), then the platform secret.
    ///
    /// # Errors
    /// `GatewayError::MissingSecret` when the user opted into a custom secret
    /// but left it empty, or when nothing usable exists.
    /// `GatewayError::DecryptionFailed` when a stored secret cannot be recovered.
    pub fn resolve_secret(&self, config: &AIConfiguration, explicit: Option<&str>) -> Result<Zeroizing<String>, GatewayError> {
        if let Some(secret) = explicit.filter(|s| !s.is_empty()) {
            return Ok(Zeroizing::new(secret.to_string()));
        }

        if !config.is_system_default {
            let secret = self.keyring.decrypt_secret(&config.settings.secret)?;
            if secret.is_empty() {
                return Err(GatewayError::MissingSecret(
                    "configuration has no stored secret".to_string(),
                ));
            }
            return Ok(secret);
        }

        if let Some(profile) = self.profiles.get(&config.owner_id)?.filter(|p| p.use_custom_secret) {
            let stored = profile.custom_secret.unwrap_or_default();
            let secret = self.keyring.decrypt_secret(&stored)?;
            if secret.is_empty() {
                return Err(GatewayError::MissingSecret(
                    "custom secret is enabled but empty".to_string(),
                ));
            }
            return Ok(secret);
        }

        if !config.settings.secret.is_empty() {
            return Ok(self.keyring.decrypt_secret(&config.settings.secret)?);
        }

        match self.platform.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(stored) => Ok(self.keyring.decrypt_secret(stored)?),
            None => Err(GatewayError::MissingSecret(
                "no platform secret is configured".to_string(),
            )),
        }
    }

    async fn call(&self, config: &AIConfiguration, request: &MaterializedRequest) -> Result<Generation, GatewayError> {
        let pending = self.transport.post(
            &config.settings.endpoint_url,
            &request.headers,
            &request.body,
            self.timeout,
        );
        let raw = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_millis() as u64))??;

        Ok(extract(&raw, &config.settings)?.generation)
    }

    /// Best-effort bookkeeping: a storage failure is logged, never returned.
    fn record(&self, config: &AIConfiguration, success: bool) {
        if config.id.is_empty() {
            return;
        }
        match self.configs.record_outcome(&config.id, success, ConfigManager::now_ms()) {
            Ok(true) => {}
            Ok(false) => debug!(config_id = %config.id, "configuration removed before outcome was recorded"),
            Err(e) => warn!(config_id = %config.id, error = %e, "failed to record configuration availability"),
        }
    }

    /// Materializes, sends and extracts one call, then records the outcome.
    ///
    /// Validation errors are returned before any network activity and leave
    /// availability untouched. The outcome is recorded only after the
    /// transport has answered; dropping this future while the call is
    /// pending records nothing.
    pub async fn invoke(
        &self,
        config: &AIConfiguration,
        secret: &str,
        prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<Generation, GatewayError> {
        validate_config(&config.settings)?;
        let request = build_request(&config.settings, secret, prompt, history)?;

        let started = Instant::now();
        let outcome = self.call(config, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => {
                info!(config_id = %config.id, elapsed_ms, "AI call succeeded");
                self.record(config, true);
            }
            Err(e) => {
                warn!(config_id = %config.id, elapsed_ms, code = e.code(), error = %e, "AI call failed");
                if e.is_call_failure() {
                    self.record(config, false);
                }
            }
        }

        outcome
    }

    /// Runs [`ConfigLifecycle::invoke`] with [`TEST_PROMPT`], capturing any
    /// failure into the result.
    pub async fn test(&self, config: &AIConfiguration, secret: &str) -> TestResult {
        match self.invoke(config, secret, TEST_PROMPT, &[]).await {
            Ok(generation) => TestResult::passed(generation),
            Err(e) => TestResult::failed(&e),
        }
    }

    /// Generates text for `caller_id` through their resolved configuration.
    pub async fn generate(
        &self,
        caller_id: &str,
        prompt: &str,
        history: &[ConversationTurn],
        explicit_secret: Option<&str>,
    ) -> Result<Generation, GatewayError> {
        if prompt.trim().is_empty() {
            return Err(GatewayError::InvalidInput("prompt must not be empty".to_string()));
        }
        let config = self.resolve(caller_id)?;
        let secret = self.resolve_secret(&config, explicit_secret)?;
        self.invoke(&config, &secret, prompt, history).await
    }

    /// Tests a stored configuration, with an optional secret override.
    pub async fn test_configuration(&self, config: &AIConfiguration, secret_override: Option<&str>) -> TestResult {
        match self.resolve_secret(config, secret_override) {
            Ok(secret) => self.test(config, &secret).await,
            Err(e) => TestResult::failed(&e),
        }
    }

    /// Tests an unsaved configuration with a raw credential. Nothing is persisted.
    pub async fn test_raw_secret(&self, owner_id: &str, draft: AIConfigurationDraft, raw_secret: &str) -> TestResult {
        if raw_secret.is_empty() {
            return TestResult::failed(&GatewayError::InvalidInput(
                "secret must not be empty".to_string(),
            ));
        }
        let config = AIConfiguration::transient(owner_id, draft);
        self.test(&config, raw_secret).await
    }
}
