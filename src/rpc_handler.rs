//! RPC method handler for the gateway JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! `App`. Stored secrets never leave through this layer.

use serde::Serialize;
use serde_json::{json, Value};

use crate::app::App;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait};
use crate::types::ai::{AIConfiguration, AIConfigurationDraft, ConversationTurn};
use crate::types::errors::GatewayError;

/// Error half of an RPC response: `{"code": ..., "message": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

impl RpcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new("invalid_params", message)
    }

    pub fn to_json(&self) -> Value {
        json!({"code": self.code, "message": self.message})
    }
}

impl From<GatewayError> for RpcError {
    fn from(e: GatewayError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(format!("missing {}", key)))
}

fn opt_str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn draft_param(params: &Value) -> Result<AIConfigurationDraft, RpcError> {
    let raw = params
        .get("config")
        .cloned()
        .ok_or_else(|| RpcError::invalid_params("missing config"))?;
    serde_json::from_value(raw).map_err(|e| RpcError::invalid_params(format!("invalid config: {}", e)))
}

fn history_param(params: &Value) -> Result<Vec<ConversationTurn>, RpcError> {
    match params.get("history") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| RpcError::invalid_params(format!("invalid history: {}", e))),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new("internal_error", e.to_string()))
}

/// Client view of a configuration: secret blanked, state spelled out.
fn config_json(config: &AIConfiguration) -> Result<Value, RpcError> {
    let mut value = to_json(&config.redacted())?;
    if let Value::Object(map) = &mut value {
        map.insert("state".to_string(), to_json(&config.state())?);
    }
    Ok(value)
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(RpcError)` carrying a stable code.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, RpcError> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Generation ───
        "ai.generate" => {
            let caller_id = str_param(params, "caller_id")?;
            let prompt = str_param(params, "prompt")?;
            let history = history_param(params)?;
            let secret = opt_str_param(params, "secret");
            let generation = app.generate(caller_id, prompt, &history, secret).await?;
            Ok(json!({"content": generation.content, "thinking": generation.thinking}))
        }

        // ─── Configurations ───
        "ai.config.create" => {
            let owner_id = str_param(params, "owner_id")?;
            let config = app.create_configuration(owner_id, draft_param(params)?)?;
            config_json(&config)
        }
        "ai.config.update" => {
            let owner_id = str_param(params, "owner_id")?;
            let id = str_param(params, "id")?;
            let config = app.update_configuration(owner_id, id, draft_param(params)?)?;
            config_json(&config)
        }
        "ai.config.delete" => {
            let owner_id = str_param(params, "owner_id")?;
            let id = str_param(params, "id")?;
            app.delete_configuration(owner_id, id)?;
            Ok(json!({"ok": true}))
        }
        "ai.config.get" => {
            let owner_id = str_param(params, "owner_id")?;
            let id = str_param(params, "id")?;
            config_json(&app.get_configuration(owner_id, id)?)
        }
        "ai.config.list" => {
            let owner_id = str_param(params, "owner_id")?;
            let configs = app.list_configurations(owner_id)?;
            let items = configs.iter().map(config_json).collect::<Result<Vec<_>, _>>()?;
            Ok(json!({"items": items}))
        }
        "ai.config.test" => {
            let owner_id = str_param(params, "owner_id")?;
            let id = str_param(params, "id")?;
            let result = app.test_configuration(owner_id, id, opt_str_param(params, "secret")).await;
            to_json(&result)
        }
        "ai.secret.test" => {
            let owner_id = str_param(params, "owner_id")?;
            let secret = str_param(params, "secret")?;
            let result = app.test_raw_secret(owner_id, draft_param(params)?, secret).await;
            to_json(&result)
        }

        // ─── Secret profiles ───
        "ai.profile.set_secret" => {
            let owner_id = str_param(params, "owner_id")?;
            let use_custom = params
                .get("use_custom_secret")
                .and_then(|v| v.as_bool())
                .ok_or_else(|| RpcError::invalid_params("missing use_custom_secret"))?;
            let profile = app.set_custom_secret(owner_id, use_custom, opt_str_param(params, "secret"))?;
            Ok(json!({
                "owner_id": profile.owner_id,
                "use_custom_secret": profile.use_custom_secret,
                "has_custom_secret": profile.custom_secret.is_some(),
                "updated_at": profile.updated_at
            }))
        }

        // ─── Credential crypto ───
        "secret.encrypt" => {
            let plaintext = str_param(params, "plaintext")?;
            Ok(json!({"secret": app.encrypt_secret(plaintext)?}))
        }
        "crypto.public_key" => Ok(json!({
            "public_key_pem": app.public_key_pem()?,
            "max_plaintext_len": app.keyring.max_plaintext_len()
        })),
        "crypto.validate_key" => {
            let pem = str_param(params, "pem")?;
            let private = params.get("private").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(json!({"valid": CryptoService::new().validate_key(pem, private)}))
        }

        _ => Err(RpcError::new("method_not_found", format!("unknown method: {}", method))),
    }
}
