use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SystemPriming,
    User,
    Assistant,
    ToolResult,
}

/// One entry of a connection's conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum Message {
    SystemPriming {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCall>,
    },
    ToolResult {
        tool_call_id: ToolCallId,
        content: String,
    },
}

/// A tool invocation selected by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The only actionable instruction ever sent to the browser: the tool name
/// and its arguments, untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub cmd: String,
    pub params: serde_json::Value,
}

impl Message {
    pub fn priming(content: impl Into<String>) -> Self {
        Message::SystemPriming {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn assistant_tool_call(content: impl Into<String>, tool_call: ToolCall) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_call: Some(tool_call),
        }
    }

    pub fn tool_result(tool_call_id: ToolCallId, content: impl Into<String>) -> Self {
        Message::ToolResult {
            tool_call_id,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::SystemPriming { .. } => Role::SystemPriming,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult { .. } => Role::ToolResult,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::SystemPriming { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::ToolResult { content, .. } => content,
        }
    }

    /// The tool call recorded on an assistant message, if any.
    pub fn tool_call(&self) -> Option<&ToolCall> {
        match self {
            Message::Assistant { tool_call, .. } => tool_call.as_ref(),
            _ => None,
        }
    }

    pub fn is_priming(&self) -> bool {
        matches!(self, Message::SystemPriming { .. })
    }
}

impl CommandEnvelope {
    pub fn from_tool_call(call: &ToolCall) -> Self {
        Self {
            cmd: call.name.clone(),
            params: call.arguments.clone(),
        }
    }

    /// Encode as the JSON string carried by the outbound `tool_call` event.
    pub fn to_wire_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
