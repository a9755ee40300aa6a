use axum::extract::FromRef;
use std::sync::Arc;

use crate::intents::IntentStore;
use crate::router::MessageRouter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<MessageRouter>,
}

impl AppState {
    pub fn new(router: MessageRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }
}

impl FromRef<AppState> for Arc<IntentStore> {
    fn from_ref(state: &AppState) -> Self {
        state.router.intents().clone()
    }
}
