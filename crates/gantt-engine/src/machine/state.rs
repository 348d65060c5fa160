use gantt_core::{Catalog, CommandEnvelope};
use gantt_settings::ArgumentValidation;

/// Immutable inputs for one turn.
#[derive(Clone, Copy, Debug)]
pub struct TurnContext<'a> {
    pub catalog: &'a Catalog,
    pub max_turns: u32,
    pub argument_validation: ArgumentValidation,
    pub notify_on_gateway_failure: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnState {
    AwaitUserInput,
    /// Waiting on gateway call number `turn` (1-based).
    ModelTurn { turn: u32, chart_state: String },
    EmitCommand { envelope: CommandEnvelope },
    /// Ended on text alone (includes a skip with text).
    EmitText,
    /// Ended with nothing for the client.
    NoOp,
    TurnLimitExceeded,
    Failed { error_kind: &'static str },
    /// Connection closed while the turn was in flight.
    Abandoned,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnState::AwaitUserInput | TurnState::ModelTurn { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::AwaitUserInput => "await_user_input",
            TurnState::ModelTurn { .. } => "model_turn",
            TurnState::EmitCommand { .. } => "emit_command",
            TurnState::EmitText => "emit_text",
            TurnState::NoOp => "no_op",
            TurnState::TurnLimitExceeded => "turn_limit_exceeded",
            TurnState::Failed { .. } => "failed",
            TurnState::Abandoned => "abandoned",
        }
    }
}
