use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::errors::GatewayError;
use crate::messages::{Message, ToolCall};

/// Token accounting reported by the provider for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Provider reply reduced to what the orchestrator acts on: optional free
/// text and at most one tool call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedReply {
    pub assistant_text: Option<String>,
    pub tool_call: Option<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl NormalizedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            assistant_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool(tool_call: ToolCall) -> Self {
        Self {
            tool_call: Some(tool_call),
            ..Default::default()
        }
    }

    /// Neither text nor a tool call.
    pub fn is_empty(&self) -> bool {
        self.assistant_text.is_none() && self.tool_call.is_none()
    }
}

/// Single-call adapter in front of the model provider.
///
/// One invocation performs exactly one outbound request. Implementations do
/// not retry and must not assume idempotence.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        catalog: &Catalog,
    ) -> Result<NormalizedReply, GatewayError>;
}
