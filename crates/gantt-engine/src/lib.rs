//! Conversation state and the turn loop that relays chat messages to the
//! model and model tool calls back to the chart.

pub mod error;
pub mod history;
pub mod machine;
pub mod orchestrator;
pub mod prompt;

pub use error::EngineError;
pub use history::{ConversationSlot, ConversationStore};
pub use orchestrator::{ClientReply, ClientSink, Orchestrator, TurnOutcome, TurnReport, UserInput};
