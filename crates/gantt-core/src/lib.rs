//! Shared domain types for the Gantt relay: identifiers, conversation
//! messages, the capability catalog and the LLM gateway contract.

pub mod catalog;
pub mod errors;
pub mod gateway;
pub mod ids;
pub mod messages;
pub mod schema;

pub use catalog::{Catalog, CapabilityDescriptor, CapabilityKind, CatalogError};
pub use errors::GatewayError;
pub use gateway::{LlmGateway, NormalizedReply, TokenUsage};
pub use ids::{ConnectionId, ToolCallId};
pub use messages::{CommandEnvelope, Message, Role, ToolCall};
