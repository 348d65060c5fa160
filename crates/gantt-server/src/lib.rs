//! WebSocket front door for the relay: accepts chat messages from the
//! browser, runs turns through the orchestrator, and pushes replies and
//! chart commands back.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use error::ServerError;
pub use server::{build_router, start, AppState, ServerHandle};
