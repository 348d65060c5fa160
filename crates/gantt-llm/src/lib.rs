//! Model provider adapters implementing [`gantt_core::LlmGateway`].

pub mod converter;
pub mod mock;
pub mod openai;

pub use mock::{MockGateway, MockReply};
pub use openai::OpenAiGateway;
