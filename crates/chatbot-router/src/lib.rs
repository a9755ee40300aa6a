pub mod classifier;
pub mod config;
pub mod conversation;
pub mod handlers;
pub mod intents;
pub mod llm;
pub mod matching;
pub mod models;
pub mod nlp;
pub mod router;
pub mod routes;
pub mod state;
pub mod utils;
