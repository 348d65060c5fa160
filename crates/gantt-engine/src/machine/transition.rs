use serde_json::json;

use gantt_core::{
    Catalog, CapabilityKind, CommandEnvelope, Message, NormalizedReply, ToolCall,
};
use gantt_settings::ArgumentValidation;

use super::{Effect, TurnContext, TurnEvent, TurnState};
use crate::error::EngineError;

pub const TURN_LIMIT_MESSAGE: &str = "Unable to complete, too many steps.";
pub const GATEWAY_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't reach the assistant service. Please try again.";

#[derive(Debug, PartialEq)]
pub struct Transition {
    pub state: TurnState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: TurnState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

pub fn transition(
    ctx: &TurnContext<'_>,
    state: TurnState,
    event: TurnEvent,
) -> Result<Transition, EngineError> {
    match (state, event) {
        (_, TurnEvent::ConnectionClosed) => Ok(Transition::to(TurnState::Abandoned)),

        (TurnState::AwaitUserInput, TurnEvent::UserMessage { text, chart_state }) => {
            Ok(Transition {
                state: TurnState::ModelTurn {
                    turn: 1,
                    chart_state,
                },
                effects: vec![
                    Effect::AppendHistory(Message::user(text)),
                    Effect::CallGateway { turn: 1 },
                ],
            })
        }

        (TurnState::ModelTurn { turn, chart_state }, TurnEvent::GatewayReply(reply)) => {
            Ok(on_reply(ctx, turn, chart_state, reply))
        }

        (TurnState::ModelTurn { .. }, TurnEvent::GatewayFailed(error)) => {
            let mut effects = Vec::new();
            if ctx.notify_on_gateway_failure {
                effects.push(Effect::SendText(GATEWAY_FAILURE_MESSAGE.to_string()));
            }
            Ok(Transition {
                state: TurnState::Failed {
                    error_kind: error.error_kind(),
                },
                effects,
            })
        }

        (state, event) => Err(EngineError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}

fn on_reply(
    ctx: &TurnContext<'_>,
    turn: u32,
    chart_state: String,
    reply: NormalizedReply,
) -> Transition {
    let NormalizedReply {
        assistant_text,
        tool_call,
        ..
    } = reply;

    let Some(call) = tool_call else {
        return match assistant_text {
            Some(text) => Transition {
                state: TurnState::EmitText,
                effects: vec![
                    Effect::AppendHistory(Message::assistant_text(text.clone())),
                    Effect::SendText(text),
                ],
            },
            None => Transition::to(TurnState::NoOp),
        };
    };

    let mut effects = Vec::new();
    let text = assistant_text.unwrap_or_default();
    let replied = !text.is_empty();
    if replied {
        effects.push(Effect::SendText(text.clone()));
    }

    let call_id = call.id.clone();
    match ctx.catalog.kind(&call.name) {
        CapabilityKind::StateQuery => {
            effects.push(Effect::AppendHistory(Message::assistant_tool_call(text, call)));
            effects.push(Effect::AppendHistory(Message::tool_result(
                call_id,
                chart_state.clone(),
            )));
            continue_or_give_up(ctx, turn, chart_state, effects)
        }
        CapabilityKind::Skip => {
            effects.push(Effect::AppendHistory(Message::assistant_tool_call(text, call)));
            effects.push(Effect::AppendHistory(Message::tool_result(call_id, "")));
            Transition {
                state: if replied {
                    TurnState::EmitText
                } else {
                    TurnState::NoOp
                },
                effects,
            }
        }
        CapabilityKind::Action | CapabilityKind::Unknown => {
            let problems = match ctx.argument_validation {
                ArgumentValidation::Off => Vec::new(),
                ArgumentValidation::Warn | ArgumentValidation::Enforce => {
                    argument_problems(ctx.catalog, &call)
                }
            };

            if !problems.is_empty() && ctx.argument_validation == ArgumentValidation::Enforce {
                let rejection = json!({
                    "error": "arguments rejected",
                    "problems": problems,
                })
                .to_string();
                effects.push(Effect::AppendHistory(Message::assistant_tool_call(text, call)));
                effects.push(Effect::AppendHistory(Message::tool_result(call_id, rejection)));
                return continue_or_give_up(ctx, turn, chart_state, effects);
            }

            if !problems.is_empty() {
                effects.push(Effect::WarnArguments {
                    tool: call.name.clone(),
                    problems,
                });
            }

            let envelope = CommandEnvelope::from_tool_call(&call);
            effects.push(Effect::AppendHistory(Message::assistant_tool_call(text, call)));
            effects.push(Effect::AppendHistory(Message::tool_result(call_id, "")));
            effects.push(Effect::SendCommand(envelope.clone()));
            Transition {
                state: TurnState::EmitCommand { envelope },
                effects,
            }
        }
    }
}

/// Loop back to the model if the budget allows, otherwise end the turn with
/// the fixed limit message.
fn continue_or_give_up(
    ctx: &TurnContext<'_>,
    turn: u32,
    chart_state: String,
    mut effects: Vec<Effect>,
) -> Transition {
    if turn >= ctx.max_turns {
        effects.push(Effect::SendText(TURN_LIMIT_MESSAGE.to_string()));
        return Transition {
            state: TurnState::TurnLimitExceeded,
            effects,
        };
    }
    let next = turn + 1;
    effects.push(Effect::CallGateway { turn: next });
    Transition {
        state: TurnState::ModelTurn {
            turn: next,
            chart_state,
        },
        effects,
    }
}

fn argument_problems(catalog: &Catalog, call: &ToolCall) -> Vec<String> {
    match catalog.check_arguments(&call.name, &call.arguments) {
        Some(violations) => violations.iter().map(ToString::to_string).collect(),
        None => vec![format!("{} is not in the catalog", call.name)],
    }
}
