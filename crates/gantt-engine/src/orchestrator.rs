use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use gantt_core::{
    Catalog, CommandEnvelope, ConnectionId, GatewayError, LlmGateway, Message, NormalizedReply,
};
use gantt_settings::OrchestratorSettings;
use gantt_telemetry::UsageLedger;

use crate::error::EngineError;
use crate::history::{self, ConversationStore};
use crate::machine::{transition, Effect, TurnContext, TurnEvent, TurnState};
use crate::prompt;

/// Something the browser should see.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientReply {
    AssistantText(String),
    Command(CommandEnvelope),
}

/// Outbound side of a connection. Delivery must not block the turn;
/// returns `false` when the reply could not be queued.
pub trait ClientSink: Send + Sync {
    fn deliver(&self, reply: ClientReply) -> bool;
}

/// A chat message plus the chart snapshot that accompanied it.
#[derive(Clone, Debug, Default)]
pub struct UserInput {
    pub message: String,
    pub chart_state: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Command { cmd: String },
    Text,
    NoOp,
    TurnLimitExceeded,
    Failed { error_kind: &'static str },
    Abandoned,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub gateway_calls: u32,
}

/// Drives the turn state machine for every connection.
pub struct Orchestrator {
    gateway: Arc<dyn LlmGateway>,
    catalog: Arc<Catalog>,
    store: Arc<ConversationStore>,
    usage: Arc<UsageLedger>,
    settings: OrchestratorSettings,
    gateway_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        catalog: Arc<Catalog>,
        store: Arc<ConversationStore>,
        usage: Arc<UsageLedger>,
        settings: OrchestratorSettings,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            catalog,
            store,
            usage,
            settings,
            gateway_timeout,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn usage(&self) -> &Arc<UsageLedger> {
        &self.usage
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Admit a connection. Its history is created by the first message.
    pub fn open_connection(&self, connection_id: &ConnectionId) {
        self.store.open(connection_id);
    }

    /// Forget a connection. An in-flight turn on it finishes without
    /// writing back, and later messages on it are dropped.
    pub fn close_connection(&self, connection_id: &ConnectionId) {
        if self.store.delete(connection_id) {
            debug!(connection_id = %connection_id, "conversation history dropped");
        }
    }

    /// Run one user turn to completion.
    ///
    /// The connection's history stays locked for the whole turn, so a
    /// second message on the same connection waits for this one.
    #[instrument(skip_all, fields(connection_id = %connection_id))]
    pub async fn handle_user_message(
        &self,
        connection_id: &ConnectionId,
        input: UserInput,
        sink: &dyn ClientSink,
    ) -> Result<TurnReport, EngineError> {
        let chart_state = serde_json::to_string(&input.chart_state)?;
        let Some(slot) = self
            .store
            .get_or_create(connection_id, prompt::priming_for_today)
        else {
            info!("connection is not open, dropping message");
            return Ok(TurnReport {
                outcome: TurnOutcome::Abandoned,
                gateway_calls: 0,
            });
        };
        let mut history = slot.lock().await;
        let mut working = history.clone();

        let ctx = TurnContext {
            catalog: &self.catalog,
            max_turns: self.settings.max_turns,
            argument_validation: self.settings.argument_validation,
            notify_on_gateway_failure: self.settings.notify_on_gateway_failure,
        };

        let mut state = TurnState::AwaitUserInput;
        let mut event = TurnEvent::UserMessage {
            text: input.message,
            chart_state,
        };
        let mut gateway_calls = 0;

        loop {
            let step = transition(&ctx, state, event)?;
            state = step.state;

            let mut next_call = None;
            for effect in step.effects {
                match effect {
                    Effect::AppendHistory(message) => working.push(message),
                    Effect::CallGateway { turn } => next_call = Some(turn),
                    Effect::SendText(text) => {
                        if !sink.deliver(ClientReply::AssistantText(text)) {
                            warn!("assistant message not delivered");
                        }
                    }
                    Effect::SendCommand(envelope) => {
                        info!(tool = %envelope.cmd, "forwarding command");
                        if !sink.deliver(ClientReply::Command(envelope)) {
                            warn!("command not delivered");
                        }
                    }
                    Effect::WarnArguments { tool, problems } => {
                        for problem in &problems {
                            warn!(tool = %tool, problem = %problem, "tool arguments do not match catalog");
                        }
                    }
                }
            }

            if state.is_terminal() {
                break;
            }
            let Some(turn) = next_call else {
                return Err(EngineError::InvalidTransition {
                    state: state.name(),
                    event: "no_gateway_call",
                });
            };

            gateway_calls += 1;
            event = match self.call_gateway(&working, turn).await {
                _ if slot.is_retired() => TurnEvent::ConnectionClosed,
                Ok(reply) => TurnEvent::GatewayReply(reply),
                Err(e) => TurnEvent::GatewayFailed(e),
            };
        }

        let outcome = outcome_of(state)?;

        if outcome == TurnOutcome::Abandoned || slot.is_retired() {
            info!(gateway_calls, "connection closed mid-turn, discarding result");
            return Ok(TurnReport {
                outcome: TurnOutcome::Abandoned,
                gateway_calls,
            });
        }

        history::trim(&mut working, self.settings.max_history_pairs);
        *history = working;

        info!(outcome = ?outcome, gateway_calls, history_len = history.len(), "turn complete");
        Ok(TurnReport {
            outcome,
            gateway_calls,
        })
    }

    async fn call_gateway(
        &self,
        messages: &[Message],
        turn: u32,
    ) -> Result<NormalizedReply, GatewayError> {
        debug!(turn, messages = messages.len(), "invoking gateway");
        let result = match tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.complete(messages, &self.catalog),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.gateway_timeout)),
        };

        match &result {
            Ok(reply) => {
                self.usage.record(reply.usage.as_ref());
                debug!(
                    turn,
                    tool = reply.tool_call.as_ref().map(|c| c.name.as_str()),
                    has_text = reply.assistant_text.is_some(),
                    "gateway replied"
                );
            }
            Err(e) => {
                self.usage.record_failure();
                error!(turn, error_kind = e.error_kind(), error = %e, "gateway call failed");
            }
        }
        result
    }
}

/// Map the state a turn stopped in to its outcome.
fn outcome_of(state: TurnState) -> Result<TurnOutcome, EngineError> {
    Ok(match state {
        TurnState::EmitCommand { envelope } => TurnOutcome::Command { cmd: envelope.cmd },
        TurnState::EmitText => TurnOutcome::Text,
        TurnState::NoOp => TurnOutcome::NoOp,
        TurnState::TurnLimitExceeded => TurnOutcome::TurnLimitExceeded,
        TurnState::Failed { error_kind } => TurnOutcome::Failed { error_kind },
        TurnState::Abandoned => TurnOutcome::Abandoned,
        TurnState::AwaitUserInput | TurnState::ModelTurn { .. } => {
            return Err(EngineError::InvalidTransition {
                state: state.name(),
                event: "turn_ended",
            })
        }
    })
}
