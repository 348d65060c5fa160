use gantt_core::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to encode chart state: {0}")]
    StateEncoding(#[from] serde_json::Error),

    #[error("no transition from {state} on {event}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}
