//! Unit tests for the RPC handler: every JSON-RPC method dispatched by
//! `handle_method`, using an in-memory database and a canned transport.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use vocab_gateway::app::App;
use vocab_gateway::database::Database;
use vocab_gateway::rpc_handler::handle_method;
use vocab_gateway::services::crypto_service::{SecretKeyring, DEFAULT_KEY_BITS};
use vocab_gateway::services::transport::Transport;
use vocab_gateway::types::errors::TransportError;
use vocab_gateway::types::settings::GatewaySettings;

/// Answers every call with `reply`, remembering the Authorization header.
struct CannedTransport {
    reply: Result<String, TransportError>,
    last_auth: Mutex<Option<String>>,
}

#[async_trait]
impl Transport for CannedTransport {
    async fn post(
        &self,
        _url: &str,
        headers: &BTreeMap<String, String>,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        *self.last_auth.lock().unwrap() = headers.get("Authorization").cloned();
        self.reply.clone()
    }
}

fn keyring() -> Arc<SecretKeyring> {
    static KEYRING: OnceLock<Arc<SecretKeyring>> = OnceLock::new();
    KEYRING
        .get_or_init(|| Arc::new(SecretKeyring::generate(DEFAULT_KEY_BITS).unwrap()))
        .clone()
}

fn setup_with(reply: Result<String, TransportError>) -> (App, Arc<CannedTransport>) {
    let transport = Arc::new(CannedTransport { reply, last_auth: Mutex::new(None) });
    let mut settings = GatewaySettings::default();
    settings.platform.secret = Some("platform-secret".into());
    let db = Arc::new(Database::open_in_memory().unwrap());
    (App::with_parts(db, keyring(), transport.clone(), settings), transport)
}

fn setup() -> (App, Arc<CannedTransport>) {
    setup_with(Ok(r#"{"choices":[{"message":{"content":"hola"}}]}"#.to_string()))
}

fn config_params(secret: &str) -> Value {
    json!({
        "endpoint_url": "https://api.example.com/v1/chat",
        "secret": secret,
        "model_name": "m",
        "request_template": {"model": "m", "messages": []},
        "message_list_path": "messages",
        "response_text_path": "choices[0].message.content"
    })
}

// ─── Ping / unknown ───

#[tokio::test]
async fn test_ping() {
    let (app, _) = setup();
    let res = handle_method(&app, "ping", &json!({})).await.unwrap();
    assert_eq!(res, json!({"pong": true}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _) = setup();
    let err = handle_method(&app, "nonexistent.method", &json!({})).await.unwrap_err();
    assert_eq!(err.code, "method_not_found");
    assert!(err.message.contains("unknown method"));
}

#[tokio::test]
async fn test_missing_params_are_invalid() {
    let (app, _) = setup();
    let err = handle_method(&app, "ai.generate", &json!({"caller_id": "alice"})).await.unwrap_err();
    assert_eq!(err.code, "invalid_params");
    assert_eq!(err.message, "missing prompt");
}

// ─── Generation ───

#[tokio::test]
async fn test_generate() {
    let (app, transport) = setup();
    let res = handle_method(
        &app,
        "ai.generate",
        &json!({
            "caller_id": "alice",
            "prompt": "translate 'hello'",
            "history": [{"role": "user", "text": "hi"}, {"role": "assistant", "text": "hey"}]
        }),
    )
    .await
    .unwrap();

    assert_eq!(res, json!({"content": "hola", "thinking": null}));
    assert_eq!(transport.last_auth.lock().unwrap().as_deref(), Some("Bearer platform-secret"));
}

#[tokio::test]
async fn test_generate_error_carries_code() {
    let (app, _) = setup_with(Err(TransportError::HttpStatus { status: 429, body: String::new() }));
    let err = handle_method(&app, "ai.generate", &json!({"caller_id": "alice", "prompt": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.code, "rate_limited");
    assert_eq!(err.to_json()["code"], json!("rate_limited"));
}

#[tokio::test]
async fn test_generate_rejects_bad_history() {
    let (app, _) = setup();
    let err = handle_method(
        &app,
        "ai.generate",
        &json!({"caller_id": "alice", "prompt": "x", "history": "not a list"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, "invalid_params");
}

// ─── Configurations ───

#[tokio::test]
async fn test_config_crud_never_returns_secret() {
    let (app, _) = setup();

    let created = handle_method(&app, "ai.config.create", &json!({"owner_id": "alice", "config": config_params("sk-1")}))
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["secret"], json!(""));
    assert_eq!(created["state"], json!("untested"));
    assert_eq!(created["role_field_path"], json!("role"));

    let fetched = handle_method(&app, "ai.config.get", &json!({"owner_id": "alice", "id": id})).await.unwrap();
    assert_eq!(fetched["secret"], json!(""));
    assert_eq!(fetched["model_name"], json!("m"));

    let mut changed = config_params("");
    changed["model_name"] = json!("m2");
    let updated = handle_method(&app, "ai.config.update", &json!({"owner_id": "alice", "id": id, "config": changed}))
        .await
        .unwrap();
    assert_eq!(updated["model_name"], json!("m2"));

    let list = handle_method(&app, "ai.config.list", &json!({"owner_id": "alice"})).await.unwrap();
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
    assert!(!list.to_string().contains("rsa:"));

    let foreign = handle_method(&app, "ai.config.get", &json!({"owner_id": "bob", "id": id})).await.unwrap_err();
    assert_eq!(foreign.code, "not_found");

    handle_method(&app, "ai.config.delete", &json!({"owner_id": "alice", "id": id})).await.unwrap();
    let list = handle_method(&app, "ai.config.list", &json!({"owner_id": "alice"})).await.unwrap();
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_config_create_validation_error() {
    let (app, _) = setup();
    let mut params = config_params("k");
    params["secret_placement"] = json!("body");
    let err = handle_method(&app, "ai.config.create", &json!({"owner_id": "alice", "config": params}))
        .await
        .unwrap_err();
    assert_eq!(err.code, "validation_error");
}

#[tokio::test]
async fn test_config_test_flips_state() {
    let (app, transport) = setup();
    let created = handle_method(&app, "ai.config.create", &json!({"owner_id": "alice", "config": config_params("sk-1")}))
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let result = handle_method(&app, "ai.config.test", &json!({"owner_id": "alice", "id": id})).await.unwrap();
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["content"], json!("hola"));
    assert_eq!(transport.last_auth.lock().unwrap().as_deref(), Some("Bearer sk-1"));

    let fetched = handle_method(&app, "ai.config.get", &json!({"owner_id": "alice", "id": id})).await.unwrap();
    assert_eq!(fetched["state"], json!("available"));
}

#[tokio::test]
async fn test_secret_test_reports_failure_in_result() {
    let (app, _) = setup_with(Err(TransportError::HttpStatus { status: 401, body: String::new() }));
    let result = handle_method(
        &app,
        "ai.secret.test",
        &json!({"owner_id": "alice", "secret": "sk-wrong", "config": config_params("")}),
    )
    .await
    .unwrap();
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error_code"], json!("auth_failure"));
}

// ─── Profiles and crypto ───

#[tokio::test]
async fn test_profile_set_secret() {
    let (app, transport) = setup();
    let res = handle_method(
        &app,
        "ai.profile.set_secret",
        &json!({"owner_id": "alice", "use_custom_secret": true, "secret": "byo"}),
    )
    .await
    .unwrap();
    assert_eq!(res["has_custom_secret"], json!(true));
    assert!(res.get("custom_secret").is_none());

    handle_method(&app, "ai.generate", &json!({"caller_id": "alice", "prompt": "x"})).await.unwrap();
    assert_eq!(transport.last_auth.lock().unwrap().as_deref(), Some("Bearer byo"));
}

#[tokio::test]
async fn test_secret_encrypt_and_public_key() {
    let (app, _) = setup();

    let res = handle_method(&app, "secret.encrypt", &json!({"plaintext": "sk-abc"})).await.unwrap();
    let sealed = res["secret"].as_str().unwrap();
    assert!(sealed.starts_with("rsa:"));
    assert_eq!(app.keyring.decrypt_secret(sealed).unwrap().as_str(), "sk-abc");

    let too_big = handle_method(&app, "secret.encrypt", &json!({"plaintext": "x".repeat(191)})).await.unwrap_err();
    assert_eq!(too_big.code, "payload_too_large");

    let empty = handle_method(&app, "secret.encrypt", &json!({"plaintext": ""})).await.unwrap_err();
    assert_eq!(empty.code, "invalid_input");

    let key = handle_method(&app, "crypto.public_key", &json!({})).await.unwrap();
    assert_eq!(key["max_plaintext_len"], json!(190));
    let pem = key["public_key_pem"].as_str().unwrap();
    assert!(pem.contains("BEGIN PUBLIC KEY"));

    let valid = handle_method(&app, "crypto.validate_key", &json!({"pem": pem})).await.unwrap();
    assert_eq!(valid["valid"], json!(true));
    let as_private = handle_method(&app, "crypto.validate_key", &json!({"pem": pem, "private": true})).await.unwrap();
    assert_eq!(as_private["valid"], json!(false));
}
