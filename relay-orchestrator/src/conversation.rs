//! Per-user bounded conversation histories
//!
//! In-memory only. Appends trim from the front once the cap is reached;
//! the sweeper evicts whole conversations idle past the threshold. Turn
//! logic and the sweeper both mutate the map, so it lives behind one
//! mutex.

use chrono::Utc;
use relay_core::Timestamp;
use relay_llm::ChatMessage;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// One user's conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub turns: Vec<ChatMessage>,
    pub last_activity_at: Timestamp,
}

/// Map of user id to bounded conversation.
pub struct ConversationStore {
    max_turns: usize,
    idle_timeout: Duration,
    map: Mutex<HashMap<String, Conversation>>,
}

impl ConversationStore {
    pub fn new(max_turns: usize, idle_timeout: Duration) -> Self {
        Self {
            max_turns,
            idle_timeout,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Append a turn, trimming the oldest entries past the cap and
    /// bumping the activity timestamp.
    pub fn append(&self, user_id: &str, message: ChatMessage) {
        let mut map = lock(&self.map);
        let conversation = map.entry(user_id.to_string()).or_insert_with(|| Conversation {
            turns: Vec::new(),
            last_activity_at: Utc::now(),
        });
        conversation.turns.push(message);
        if conversation.turns.len() > self.max_turns {
            let excess = conversation.turns.len() - self.max_turns;
            conversation.turns.drain(..excess);
            debug!(%user_id, excess, "trimmed conversation history");
        }
        conversation.last_activity_at = Utc::now();
    }

    /// Snapshot of a user's turns for the next model call.
    pub fn snapshot(&self, user_id: &str) -> Vec<ChatMessage> {
        lock(&self.map)
            .get(user_id)
            .map(|conversation| conversation.turns.clone())
            .unwrap_or_default()
    }

    /// Number of turns currently held for a user.
    pub fn turn_count(&self, user_id: &str) -> usize {
        lock(&self.map)
            .get(user_id)
            .map(|conversation| conversation.turns.len())
            .unwrap_or(0)
    }

    /// Evict conversations idle past the threshold. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));
        let mut map = lock(&self.map);
        let before = map.len();
        map.retain(|_, conversation| conversation.last_activity_at > cutoff);
        let evicted = before - map.len();
        if evicted > 0 {
            info!(evicted, "evicted idle conversations");
        }
        evicted
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        lock(&self.map).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
