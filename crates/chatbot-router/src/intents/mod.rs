//! Intent definitions and their JSON-file persistence

pub mod store;
pub mod types;

pub use store::{IntentStore, StoreError};
pub use types::{Intent, IntentFile, DEFAULT_TAG};
