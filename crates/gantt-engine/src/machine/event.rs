use gantt_core::{GatewayError, NormalizedReply};

#[derive(Clone, Debug)]
pub enum TurnEvent {
    /// A chat message arrives; `chart_state` is the serialized chart the
    /// client sent with it.
    UserMessage { text: String, chart_state: String },
    GatewayReply(NormalizedReply),
    GatewayFailed(GatewayError),
    ConnectionClosed,
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::UserMessage { .. } => "user_message",
            TurnEvent::GatewayReply(_) => "gateway_reply",
            TurnEvent::GatewayFailed(_) => "gateway_failed",
            TurnEvent::ConnectionClosed => "connection_closed",
        }
    }
}
