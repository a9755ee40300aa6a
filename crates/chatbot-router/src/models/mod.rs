pub mod chat;

pub use chat::{AddIntentRequest, AddIntentResponse, MessageRequest, MessageResponse};
