//! Session storage, the ask/feed/retry state machine and the terminal
//! front end.

mod controller;
mod store;
mod terminal;

pub use controller::{
    SessionController, CLIENT_ERROR_MESSAGE, NO_MATCHING_API_MESSAGE, SAFETY_INSTRUCTION,
};
pub use store::{spawn_eviction, SessionStore};
pub use terminal::{run_terminal_chat, EXIT_COMMAND};
