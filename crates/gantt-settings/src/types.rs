//! Settings types. Field names are camelCase in the JSON file.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub orchestrator: OrchestratorSettings,
    pub logging: LoggingSettings,
}

/// Network endpoint and static asset settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Port serving both the WebSocket endpoint and static assets.
    pub port: u16,
    /// Directory holding the built browser client.
    pub static_dir: String,
    /// Origin allowed by CORS.
    pub frontend_origin: String,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub max_send_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            static_dir: "../frontend/dist".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            max_send_queue: 256,
        }
    }
}

/// Model provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    /// Sent as `reasoning_effort` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Upper bound for one gateway call.
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5-nano".to_string(),
            reasoning_effort: Some("low".to_string()),
            timeout_ms: 30_000,
        }
    }
}

/// How tool arguments are checked against the catalog before forwarding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentValidation {
    /// Forward untouched, no check.
    Off,
    /// Forward untouched, log violations.
    #[default]
    Warn,
    /// Refuse to forward; report violations back to the model.
    Enforce,
}

/// Turn loop and history retention settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorSettings {
    /// Gateway invocations allowed per user message.
    pub max_turns: u32,
    /// Exchanges retained after the priming message.
    pub max_history_pairs: usize,
    pub argument_validation: ArgumentValidation,
    /// Send a generic apology to the client when the gateway fails.
    pub notify_on_gateway_failure: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_turns: 3,
            max_history_pairs: 20,
            argument_validation: ArgumentValidation::Warn,
            notify_on_gateway_failure: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Provider API key (redacted in Debug, zeroized on drop).
#[derive(Clone)]
pub struct ApiKey(pub SecretString);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}
