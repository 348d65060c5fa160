use gantt_core::{CommandEnvelope, Message};

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    AppendHistory(Message),
    CallGateway { turn: u32 },
    SendText(String),
    SendCommand(CommandEnvelope),
    /// Arguments or tool name did not match the catalog; forwarded anyway.
    WarnArguments { tool: String, problems: Vec<String> },
}
