pub mod health;
pub mod intents;
pub mod message;
