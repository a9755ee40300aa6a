use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::types::{ConversationTurn, SessionId};

/// Per-session slot: the bounded history plus a gate that serializes
/// requests of the same session
#[derive(Default)]
struct SessionSlot {
    turns: Mutex<VecDeque<ConversationTurn>>,
    gate: Arc<AsyncMutex<()>>,
}

/// Thread-safe in-memory conversation store
///
/// Each session keeps at most `max_turns` turns, oldest evicted first.
/// Nothing expires and there is no global cap; state lives for the process.
#[derive(Clone)]
pub struct ConversationStore {
    sessions: Arc<DashMap<SessionId, Arc<SessionSlot>>>,
    max_turns: usize,
}

/// Held while a request for a session is in flight
pub struct SessionGuard {
    _permit: OwnedMutexGuard<()>,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        info!("Initializing conversation store (max {} turns per session)", max_turns);
        Self {
            sessions: Arc::new(DashMap::new()),
            max_turns,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn slot(&self, session_id: &str) -> Arc<SessionSlot> {
        if let Some(slot) = self.sessions.get(session_id) {
            return slot.value().clone();
        }
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Wait for exclusive use of a session.
    /// Other requests for the same id queue until the guard drops.
    pub async fn serialize(&self, session_id: &str) -> SessionGuard {
        let gate = self.slot(session_id).gate.clone();
        SessionGuard {
            _permit: gate.lock_owned().await,
        }
    }

    /// Append a turn, evicting the oldest beyond the window
    pub fn append(&self, session_id: &str, turn: ConversationTurn) {
        if self.max_turns == 0 {
            return;
        }

        let slot = self.slot(session_id);
        let mut turns = slot.turns.lock();
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
        debug!("Session {} now holds {} turns", session_id, turns.len());
    }

    /// Most recent `limit` turns in original order
    pub fn get_recent(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let Some(slot) = self.sessions.get(session_id).map(|s| s.value().clone()) else {
            return Vec::new();
        };

        let turns = slot.turns.lock();
        let skip = turns.len().saturating_sub(limit);
        turns.iter().skip(skip).cloned().collect()
    }

    /// Drop the history of a session. The slot stays so that queued
    /// requests keep their ordering.
    pub fn clear(&self, session_id: &str) {
        if let Some(slot) = self.sessions.get(session_id) {
            slot.turns.lock().clear();
            info!("Cleared conversation history for session {}", session_id);
        }
    }

    /// Number of sessions seen since start
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
