//! The turn state machine.
//!
//! `transition` is pure: it takes the current state and an event and
//! returns the next state plus the effects the driver must perform.

mod effect;
mod event;
mod state;
mod transition;

pub use effect::Effect;
pub use event::TurnEvent;
pub use state::{TurnContext, TurnState};
pub use transition::{transition, Transition, GATEWAY_FAILURE_MESSAGE, TURN_LIMIT_MESSAGE};
