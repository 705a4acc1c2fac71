//! Builds the outbound headers and body for one call from a configuration's
//! request template, the credential, the conversation history and the new prompt.

use std::collections::BTreeMap;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::services::path_address::PathAddress;
use crate::types::ai::{AIConfigurationDraft, ChatRole, ConversationTurn, SecretPlacement};
use crate::types::errors::GatewayError;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";

/// Headers and body ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedRequest {
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_required(field: &str, path: &str) -> Result<PathAddress, GatewayError> {
    PathAddress::parse(path)
        .map_err(|e| GatewayError::Validation(format!("{}: {}", field, e)))
}

fn check_header(name: &str, value: Option<&str>) -> Result<(), GatewayError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| GatewayError::Validation(format!("invalid header name '{}'", name)))?;
    if let Some(v) = value {
        HeaderValue::from_str(v)
            .map_err(|_| GatewayError::Validation(format!("invalid value for header '{}'", name)))?;
    }
    Ok(())
}

/// Sets the credential header, dropping any differently-cased entry with the
/// same name so only one credential header is sent.
fn insert_credential(headers: &mut BTreeMap<String, String>, name: &str, value: String) -> Result<(), GatewayError> {
    HeaderValue::from_str(&value).map_err(|_| {
        GatewayError::Validation(format!("secret is not a valid value for header '{}'", name))
    })?;
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
    Ok(())
}

/// Structural validation run before any network call.
///
/// # Errors
/// `GatewayError::Validation` naming the first offending field.
pub fn validate_config(config: &AIConfigurationDraft) -> Result<(), GatewayError> {
    let url = Url::parse(&config.endpoint_url)
        .map_err(|e| GatewayError::Validation(format!("endpoint_url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(GatewayError::Validation(format!(
            "endpoint_url: unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if !config.request_template.is_object() && !config.request_template.is_array() {
        return Err(GatewayError::Validation(
            "request_template must be an object or a list".to_string(),
        ));
    }

    match config.secret_placement {
        SecretPlacement::Header => {}
        SecretPlacement::Body => {
            let path = non_blank(&config.secret_body_path).ok_or_else(|| {
                GatewayError::Validation("secret_body_path is required for body placement".to_string())
            })?;
            parse_required("secret_body_path", path)?;
        }
        SecretPlacement::CustomHeader => {
            let name = non_blank(&config.custom_header_name).ok_or_else(|| {
                GatewayError::Validation(
                    "custom_header_name is required for custom_header placement".to_string(),
                )
            })?;
            check_header(name, None)?;
        }
    }

    parse_required("response_text_path", &config.response_text_path)?;
    if let Some(path) = non_blank(&config.response_thinking_path) {
        parse_required("response_thinking_path", path)?;
    }

    if let Some(path) = non_blank(&config.message_list_path) {
        parse_required("message_list_path", path)?;
        parse_required("role_field_path", &config.role_field_path)?;
        parse_required("text_field_path", &config.text_field_path)?;
    }

    for (field, value) in [
        ("user_role_value", &config.user_role_value),
        ("assistant_role_value", &config.assistant_role_value),
        ("system_role_value", &config.system_role_value),
    ] {
        if value.trim().is_empty() {
            return Err(GatewayError::Validation(format!("{} must not be empty", field)));
        }
    }

    for (name, value) in &config.extra_headers {
        check_header(name, Some(value))?;
    }

    Ok(())
}

/// Maps a conversation role to the vendor's role string.
pub fn map_role(config: &AIConfigurationDraft, role: &ChatRole) -> String {
    match role {
        ChatRole::User => config.user_role_value.clone(),
        ChatRole::Assistant => config.assistant_role_value.clone(),
        ChatRole::System => config.system_role_value.clone(),
        ChatRole::Other(raw) => raw.clone(),
    }
}

fn message_record(role_path: &PathAddress, text_path: &PathAddress, role: String, text: &str) -> Value {
    let mut record = Value::Object(Map::new());
    role_path.set(&mut record, Value::String(role));
    text_path.set(&mut record, Value::String(text.to_string()));
    record
}

/// Materializes one outbound request.
///
/// The stored template and `history` are only read; the body is a deep copy.
///
/// # Errors
/// `GatewayError::Validation` if a configured path does not parse, or if a
/// header-placed secret cannot be sent as a header value.
pub fn build_request(
    config: &AIConfigurationDraft,
    secret: &str,
    prompt: &str,
    history: &[ConversationTurn],
) -> Result<MaterializedRequest, GatewayError> {
    let mut headers = config.extra_headers.clone();
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE)) {
        headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
    }

    match config.secret_placement {
        SecretPlacement::Header => {
            insert_credential(&mut headers, AUTHORIZATION, format!("Bearer {}", secret))?;
        }
        SecretPlacement::CustomHeader => {
            let name = non_blank(&config.custom_header_name).ok_or_else(|| {
                GatewayError::Validation(
                    "custom_header_name is required for custom_header placement".to_string(),
                )
            })?;
            insert_credential(&mut headers, name, secret.to_string())?;
        }
        SecretPlacement::Body => {}
    }

    let mut body = config.request_template.clone();

    if config.secret_placement == SecretPlacement::Body {
        let path = non_blank(&config.secret_body_path).ok_or_else(|| {
            GatewayError::Validation("secret_body_path is required for body placement".to_string())
        })?;
        parse_required("secret_body_path", path)?.set(&mut body, Value::String(secret.to_string()));
    }

    if let Some(list_path) = non_blank(&config.message_list_path) {
        let list_path = parse_required("message_list_path", list_path)?;
        let role_path = parse_required("role_field_path", &config.role_field_path)?;
        let text_path = parse_required("text_field_path", &config.text_field_path)?;

        let mut messages: Vec<Value> = history
            .iter()
            .filter(|turn| turn.role != ChatRole::System)
            .map(|turn| message_record(&role_path, &text_path, map_role(config, &turn.role), &turn.text))
            .collect();
        messages.push(message_record(
            &role_path,
            &text_path,
            map_role(config, &ChatRole::User),
            prompt,
        ));

        if !messages.is_empty() {
            list_path.set(&mut body, Value::Array(messages));
        }
    }

    Ok(MaterializedRequest { headers, body })
}
