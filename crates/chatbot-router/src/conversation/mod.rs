//! Conversation memory
//!
//! Bounded per-session history kept in process memory, with per-session
//! request serialization.

mod store;
pub mod types;

pub use store::{ConversationStore, SessionGuard};
pub use types::{ConversationTurn, Role, SessionId};
