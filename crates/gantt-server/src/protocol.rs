//! WebSocket frames. Every text frame is `{"event": ..., "data": ...}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gantt_engine::{ClientReply, UserInput};

pub const USER_MSG: &str = "user_msg";
pub const ASSISTANT_MSG: &str = "assistant_msg";
pub const TOOL_CALL: &str = "tool_call";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("user_msg payload must be an object or a JSON string")]
    BadPayload,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct UserMsgPayload {
    message: String,
    #[serde(default, alias = "project")]
    state: Option<Value>,
}

/// Decode an inbound text frame into a user turn.
pub fn parse_inbound(text: &str) -> Result<UserInput, ProtocolError> {
    let frame: Frame = serde_json::from_str(text)?;
    if frame.event != USER_MSG {
        return Err(ProtocolError::UnknownEvent(frame.event));
    }

    let payload: UserMsgPayload = match frame.data {
        Value::String(raw) => serde_json::from_str(&raw)?,
        data @ Value::Object(_) => serde_json::from_value(data)?,
        _ => return Err(ProtocolError::BadPayload),
    };

    Ok(UserInput {
        message: payload.message,
        chart_state: match payload.state {
            Some(Value::Null) | None => json!({}),
            Some(state) => state,
        },
    })
}

/// Encode an outbound reply. Commands travel as a JSON string inside `data`.
pub fn encode_reply(reply: &ClientReply) -> Result<String, serde_json::Error> {
    let frame = match reply {
        ClientReply::AssistantText(text) => Frame {
            event: ASSISTANT_MSG.to_string(),
            data: Value::String(text.clone()),
        },
        ClientReply::Command(envelope) => Frame {
            event: TOOL_CALL.to_string(),
            data: Value::String(envelope.to_wire_string()?),
        },
    };
    serde_json::to_string(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantt_core::CommandEnvelope;

    #[test]
    fn object_payload() {
        let input = parse_inbound(
            r#"{"event":"user_msg","data":{"message":"add a task","state":{"tasks":[],"links":[]}}}"#,
        )
        .unwrap();
        assert_eq!(input.message, "add a task");
        assert_eq!(input.chart_state, json!({"tasks": [], "links": []}));
    }

    #[test]
    fn string_payload_with_project_alias() {
        let data = json!({"message": "zoom", "project": {"tasks": [{"id": 1}]}}).to_string();
        let frame = json!({"event": "user_msg", "data": data}).to_string();
        let input = parse_inbound(&frame).unwrap();
        assert_eq!(input.message, "zoom");
        assert_eq!(input.chart_state["tasks"][0]["id"], 1);
    }

    #[test]
    fn missing_state_defaults_to_empty_object() {
        let input = parse_inbound(r#"{"event":"user_msg","data":{"message":"hi"}}"#).unwrap();
        assert_eq!(input.chart_state, json!({}));

        let input =
            parse_inbound(r#"{"event":"user_msg","data":{"message":"hi","state":null}}"#).unwrap();
        assert_eq!(input.chart_state, json!({}));
    }

    #[test]
    fn rejects_bad_frames() {
        assert!(matches!(parse_inbound("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            parse_inbound(r#"{"event":"ping","data":{}}"#),
            Err(ProtocolError::UnknownEvent(e)) if e == "ping"
        ));
        assert!(matches!(
            parse_inbound(r#"{"event":"user_msg","data":42}"#),
            Err(ProtocolError::BadPayload)
        ));
        assert!(matches!(
            parse_inbound(r#"{"event":"user_msg","data":{"state":{}}}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn assistant_text_frame() {
        let wire = encode_reply(&ClientReply::AssistantText("**Done**".into())).unwrap();
        let frame: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(frame, json!({"event": "assistant_msg", "data": "**Done**"}));
    }

    #[test]
    fn tool_call_frame_carries_json_string() {
        let wire = encode_reply(&ClientReply::Command(CommandEnvelope {
            cmd: "zoom".into(),
            params: json!({"level": "week"}),
        }))
        .unwrap();
        let frame: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(frame["event"], "tool_call");
        let inner: Value = serde_json::from_str(frame["data"].as_str().unwrap()).unwrap();
        assert_eq!(inner, json!({"cmd": "zoom", "params": {"level": "week"}}));
    }
}
