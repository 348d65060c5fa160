//! Translation between conversation history and the OpenAI chat-completions
//! wire format.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use gantt_core::{Catalog, GatewayError, Message, NormalizedReply, TokenUsage, ToolCall, ToolCallId};

/// Build the `/chat/completions` request body.
pub fn build_request_body(
    messages: &[Message],
    catalog: &Catalog,
    model: &str,
    reasoning_effort: Option<&str>,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": convert_messages(messages),
    });

    if !catalog.is_empty() {
        body["tools"] = json!(catalog.to_openai_tools());
    }
    if let Some(effort) = reasoning_effort {
        body["reasoning_effort"] = json!(effort);
    }

    body
}

/// Convert history to provider messages.
///
/// A tool result is only sent when it directly follows the assistant message
/// carrying the matching call; an orphan (left at the front after trimming)
/// would be rejected by the provider and is skipped.
pub fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut result = Vec::with_capacity(messages.len());
    let mut pending_call: Option<&ToolCallId> = None;

    for msg in messages {
        match msg {
            Message::SystemPriming { content } => {
                pending_call = None;
                result.push(json!({"role": "system", "content": content}));
            }
            Message::User { content } => {
                pending_call = None;
                result.push(json!({"role": "user", "content": content}));
            }
            Message::Assistant { content, tool_call } => {
                let mut entry = json!({"role": "assistant", "content": content});
                if let Some(call) = tool_call {
                    entry["tool_calls"] = json!([convert_tool_call(call)]);
                }
                pending_call = tool_call.as_ref().map(|c| &c.id);
                result.push(entry);
            }
            Message::ToolResult {
                tool_call_id,
                content,
            } => {
                if pending_call.take() != Some(tool_call_id) {
                    debug!(tool_call_id = %tool_call_id, "skipping orphaned tool result");
                    continue;
                }
                result.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                }));
            }
        }
    }

    result
}

fn convert_tool_call(call: &ToolCall) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": call.arguments.to_string(),
        }
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Normalize a chat-completions response: first choice only, first tool
/// call only, empty text treated as absent.
pub fn parse_response(body: &str) -> Result<NormalizedReply, GatewayError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("malformed completion: {e}")))?;

    let usage = completion.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(GatewayError::InvalidResponse("completion has no choices".into()));
    };

    let assistant_text = choice.message.content.filter(|text| !text.trim().is_empty());

    let mut calls = choice.message.tool_calls.unwrap_or_default();
    if calls.len() > 1 {
        debug!(dropped = calls.len() - 1, "model returned several tool calls, keeping the first");
    }
    let tool_call = if calls.is_empty() {
        None
    } else {
        let first = calls.swap_remove(0);
        Some(ToolCall {
            id: ToolCallId::from_raw(first.id),
            arguments: parse_arguments(&first.function.name, &first.function.arguments)?,
            name: first.function.name,
        })
    };

    Ok(NormalizedReply {
        assistant_text,
        tool_call,
        usage,
    })
}

fn parse_arguments(tool: &str, raw: &str) -> Result<Value, GatewayError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw).map_err(|e| {
        GatewayError::InvalidResponse(format!("arguments for {tool} are not valid JSON: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: ToolCallId::from_raw(id),
            name: name.into(),
            arguments: json!({"level": "week"}),
        }
    }

    #[test]
    fn converts_each_role() {
        let messages = vec![
            Message::priming("You are a Gantt assistant"),
            Message::user("zoom to weeks"),
            Message::assistant_tool_call("", call("call_1", "zoom")),
            Message::tool_result(ToolCallId::from_raw("call_1"), ""),
            Message::assistant_text("Done."),
        ];
        let wire = convert_messages(&messages);
        assert_eq!(wire.len(), 5);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "zoom");
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"level":"week"}"#
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert!(wire[4].get("tool_calls").is_none());
    }

    #[test]
    fn orphaned_tool_result_is_skipped() {
        let messages = vec![
            Message::priming("p"),
            Message::tool_result(ToolCallId::from_raw("call_gone"), "{}"),
            Message::user("hi"),
        ];
        let wire = convert_messages(&messages);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1]["role"], "user");
    }

    #[test]
    fn request_body_carries_tools_and_effort() {
        let catalog = Catalog::builtin().unwrap();
        let body = build_request_body(&[Message::priming("p")], &catalog, "gpt-5-nano", Some("low"));
        assert_eq!(body["model"], "gpt-5-nano");
        assert_eq!(body["reasoning_effort"], "low");
        assert_eq!(body["tools"].as_array().unwrap().len(), catalog.len());

        let body = build_request_body(&[Message::priming("p")], &catalog, "m", None);
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn parses_text_reply_with_usage() {
        let reply = parse_response(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}],
                "usage":{"prompt_tokens":10,"completion_tokens":3,"total_tokens":13}}"#,
        )
        .unwrap();
        assert_eq!(reply.assistant_text.as_deref(), Some("Hello!"));
        assert!(reply.tool_call.is_none());
        assert_eq!(reply.usage.unwrap().total_tokens, 13);
    }

    #[test]
    fn keeps_only_the_first_tool_call() {
        let reply = parse_response(
            r#"{"choices":[{"message":{"content":null,"tool_calls":[
                {"id":"call_a","type":"function","function":{"name":"zoom","arguments":"{\"level\":\"day\"}"}},
                {"id":"call_b","type":"function","function":{"name":"undo","arguments":"{}"}}
            ]}}]}"#,
        )
        .unwrap();
        assert!(reply.assistant_text.is_none());
        let call = reply.tool_call.unwrap();
        assert_eq!(call.id.as_str(), "call_a");
        assert_eq!(call.name, "zoom");
        assert_eq!(call.arguments, json!({"level": "day"}));
    }

    #[test]
    fn blank_text_and_empty_arguments() {
        let reply = parse_response(
            r#"{"choices":[{"message":{"content":"  ","tool_calls":[
                {"id":"call_a","type":"function","function":{"name":"undo","arguments":""}}
            ]}}]}"#,
        )
        .unwrap();
        assert!(reply.assistant_text.is_none());
        assert_eq!(reply.tool_call.unwrap().arguments, json!({}));
    }

    #[test]
    fn malformed_arguments_are_an_error() {
        let err = parse_response(
            r#"{"choices":[{"message":{"tool_calls":[
                {"id":"c","type":"function","function":{"name":"zoom","arguments":"{level"}}
            ]}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(msg) if msg.contains("zoom")));
    }

    #[test]
    fn no_choices_is_an_error() {
        assert!(matches!(
            parse_response(r#"{"choices":[]}"#),
            Err(GatewayError::InvalidResponse(_))
        ));
        assert!(matches!(parse_response("<html>"), Err(GatewayError::InvalidResponse(_))));
    }
}
