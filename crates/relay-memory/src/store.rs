//! Bounded in-process conversation memory.
//!
//! Each conversation keeps an ordered window of role-tagged turns. Two caps
//! keep a long-lived process from leaking: a per-conversation turn cap
//! (oldest turns drop first) and a global conversation cap (least recently
//! active conversation evicts first).

use chrono::{DateTime, Utc};
use relay_core::config::MemoryConfig;
use relay_core::message::Turn;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

struct Conversation {
    turns: VecDeque<Turn>,
    last_activity: DateTime<Utc>,
}

/// Conversation memory store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Conversation>>>,
    max_turns: usize,
    max_conversations: usize,
}

impl MemoryStore {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_turns: config.max_turns.max(1),
            max_conversations: config.max_conversations.max(1),
        }
    }

    /// Append a turn, creating the conversation lazily.
    pub fn append(&self, conversation_id: &str, turn: Turn) {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        if !map.contains_key(conversation_id) && map.len() >= self.max_conversations {
            // Evict the least recently active conversation to make room.
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, c)| c.last_activity)
                .map(|(id, _)| id.clone())
            {
                debug!("evicting idle conversation {oldest}");
                map.remove(&oldest);
            }
        }

        let conv = map
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                turns: VecDeque::new(),
                last_activity: Utc::now(),
            });

        conv.turns.push_back(turn);
        while conv.turns.len() > self.max_turns {
            conv.turns.pop_front();
        }
        conv.last_activity = Utc::now();
    }

    /// Ordered history window for a conversation. Empty when unknown.
    pub fn history(&self, conversation_id: &str) -> Vec<Turn> {
        let map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.get(conversation_id)
            .map(|c| c.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a conversation's history. Idempotent.
    pub fn clear(&self, conversation_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.remove(conversation_id);
    }

    /// Number of tracked conversations.
    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(max_turns: usize, max_conversations: usize) -> MemoryStore {
        MemoryStore::new(&MemoryConfig {
            db_path: ":memory:".into(),
            max_turns,
            max_conversations,
        })
    }

    #[test]
    fn test_append_and_history_order() {
        let store = test_store(10, 10);
        store.append("a", Turn::user("Hello"));
        store.append("a", Turn::assistant("Hi there"));

        let history = store.history("a");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Turn::user("Hello"));
        assert_eq!(history[1], Turn::assistant("Hi there"));
    }

    #[test]
    fn test_turn_cap_drops_oldest() {
        let store = test_store(3, 10);
        for i in 0..5 {
            store.append("a", Turn::user(format!("msg {i}")));
        }
        let history = store.history("a");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "msg 2");
        assert_eq!(history[2].content, "msg 4");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = test_store(10, 10);
        store.append("a", Turn::user("Hello"));
        store.clear("a");
        assert!(store.history("a").is_empty());
        store.clear("a");
        assert!(store.history("a").is_empty());
    }

    #[test]
    fn test_conversation_cap_evicts_least_recent() {
        let store = test_store(10, 2);
        store.append("first", Turn::user("one"));
        store.append("second", Turn::user("two"));
        // Touch "first" so "second" becomes the eviction candidate.
        store.append("first", Turn::user("again"));
        store.append("third", Turn::user("three"));

        assert_eq!(store.len(), 2);
        assert!(!store.history("first").is_empty());
        assert!(store.history("second").is_empty());
        assert!(!store.history("third").is_empty());
    }

    #[test]
    fn test_unknown_conversation_is_empty() {
        let store = test_store(10, 10);
        assert!(store.history("nobody").is_empty());
    }
}
