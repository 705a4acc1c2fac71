use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the credential is placed on the outbound request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecretPlacement {
    /// `Authorization: Bearer <secret>`.
    #[default]
    Header,
    /// Written into the request body at `secret_body_path`.
    Body,
    /// Sent as the value of the header named by `custom_header_name`.
    CustomHeader,
}

impl SecretPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretPlacement::Header => "header",
            SecretPlacement::Body => "body",
            SecretPlacement::CustomHeader => "custom_header",
        }
    }

    /// Unknown or empty values fall back to [`SecretPlacement::Header`].
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "body" => SecretPlacement::Body,
            "custom_header" => SecretPlacement::CustomHeader,
            _ => SecretPlacement::Header,
        }
    }
}

/// Everything the owner of a configuration may set.
///
/// `secret` holds plaintext on the way in; storage only ever sees the
/// `rsa:` encoding of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIConfigurationDraft {
    pub endpoint_url: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub secret_placement: SecretPlacement,
    #[serde(default)]
    pub custom_header_name: Option<String>,
    #[serde(default)]
    pub secret_body_path: Option<String>,
    pub model_name: String,
    pub request_template: Value,
    #[serde(default)]
    pub response_template_example: Option<Value>,
    #[serde(default)]
    pub message_list_path: Option<String>,
    #[serde(default = "default_role_field_path")]
    pub role_field_path: String,
    #[serde(default = "default_text_field_path")]
    pub text_field_path: String,
    pub response_text_path: String,
    #[serde(default)]
    pub response_thinking_path: Option<String>,
    #[serde(default = "default_user_role")]
    pub user_role_value: String,
    #[serde(default = "default_assistant_role")]
    pub assistant_role_value: String,
    #[serde(default = "default_system_role")]
    pub system_role_value: String,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

fn default_role_field_path() -> String {
    "role".to_string()
}

fn default_text_field_path() -> String {
    "content".to_string()
}

fn default_user_role() -> String {
    "user".to_string()
}

fn default_assistant_role() -> String {
    "assistant".to_string()
}

fn default_system_role() -> String {
    "system".to_string()
}

impl AIConfigurationDraft {
    /// OpenAI chat-completions compatible shape used for system defaults.
    pub fn openai_compatible(endpoint_url: &str, model_name: &str, secret: &str) -> Self {
        Self {
            endpoint_url: endpoint_url.to_string(),
            secret: secret.to_string(),
            secret_placement: SecretPlacement::Header,
            custom_header_name: None,
            secret_body_path: None,
            model_name: model_name.to_string(),
            request_template: serde_json::json!({ "model": model_name, "messages": [] }),
            response_template_example: Some(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "...", "reasoning_content": "..." } }]
            })),
            message_list_path: Some("messages".to_string()),
            role_field_path: default_role_field_path(),
            text_field_path: default_text_field_path(),
            response_text_path: "choices[0].message.content".to_string(),
            response_thinking_path: Some("choices[0].message.reasoning_content".to_string()),
            user_role_value: default_user_role(),
            assistant_role_value: default_assistant_role(),
            system_role_value: default_system_role(),
            extra_headers: BTreeMap::new(),
        }
    }
}

/// A stored AI configuration owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIConfiguration {
    pub id: String,
    pub owner_id: String,
    /// Stored settings. `settings.secret` holds the `rsa:` encoding (or a
    /// legacy plaintext value), never a freshly supplied plaintext.
    #[serde(flatten)]
    pub settings: AIConfigurationDraft,
    pub is_available: bool,
    pub is_system_default: bool,
    /// Unix milliseconds of the last call or test.
    pub last_used_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AIConfiguration {
    /// Builds an unsaved configuration around a draft, e.g. for testing a raw
    /// credential. The draft's secret is kept as given.
    pub fn transient(owner_id: &str, draft: AIConfigurationDraft) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.to_string(),
            settings: draft,
            is_available: false,
            is_system_default: false,
            last_used_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Lifecycle state derived from the availability flag and usage stamp.
    pub fn state(&self) -> AvailabilityState {
        match (self.is_available, self.last_used_at) {
            (true, _) => AvailabilityState::Available,
            (false, None) => AvailabilityState::Untested,
            (false, Some(_)) => AvailabilityState::Unavailable,
        }
    }

    /// Copy safe to hand back to clients: the stored secret is blanked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.settings.secret = String::new();
        copy
    }
}

/// Health of a configuration as seen from its call outcomes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    Untested,
    Available,
    Unavailable,
}

/// Role of a participant in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    /// Anything else, forwarded verbatim.
    #[serde(untagged)]
    Other(String),
}

/// One prior turn of a conversation, passed by value into a single request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: &str) -> Self {
        Self { role: ChatRole::User, text: text.to_string() }
    }

    pub fn assistant(text: &str) -> Self {
        Self { role: ChatRole::Assistant, text: text.to_string() }
    }

    pub fn system(text: &str) -> Self {
        Self { role: ChatRole::System, text: text.to_string() }
    }
}

/// Normalized generation result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    pub content: String,
    pub thinking: Option<String>,
}

/// Outcome of testing a configuration. Never carries an exception path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub success: bool,
    pub content: Option<String>,
    pub thinking: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl TestResult {
    pub fn passed(generation: Generation) -> Self {
        Self {
            success: true,
            content: Some(generation.content),
            thinking: generation.thinking,
            error: None,
            error_code: None,
        }
    }

    pub fn failed(error: &crate::types::errors::GatewayError) -> Self {
        Self {
            success: false,
            content: None,
            thinking: None,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
        }
    }
}

/// Per-user credential preference used when no explicit secret is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretProfile {
    pub owner_id: String,
    pub use_custom_secret: bool,
    /// `rsa:`-encoded custom secret, if one was provided.
    pub custom_secret: Option<String>,
    pub updated_at: i64,
}
