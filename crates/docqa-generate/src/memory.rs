//! Per-conversation chat history.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Bounded history per conversation id.
///
/// Keeps the last `max_turns` exchanges (one user message plus one
/// assistant reply each); older ones are dropped. At most
/// `max_conversations` ids are tracked; recording a new one beyond that
/// forgets the least recently used conversation.
pub struct ConversationMemory {
    max_turns: usize,
    conversations: Mutex<LruCache<String, VecDeque<Turn>>>,
}

impl ConversationMemory {
    pub fn new(max_turns: usize, max_conversations: usize) -> Self {
        let capacity = NonZeroUsize::new(max_conversations).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_turns,
            conversations: Mutex::new(LruCache::new(capacity)),
        }
    }

    // History is rebuilt from scratch on poison rather than failing queries
    fn lock(&self) -> MutexGuard<'_, LruCache<String, VecDeque<Turn>>> {
        self.conversations.lock().unwrap_or_else(|poisoned| {
            let mut guard = poisoned.into_inner();
            guard.clear();
            guard
        })
    }

    pub fn record(&self, conversation_id: &str, question: &str, answer: &str) {
        if self.max_turns == 0 {
            return;
        }
        let mut conversations = self.lock();
        let turns = conversations.get_or_insert_mut(conversation_id.to_string(), VecDeque::new);
        turns.push_back(Turn {
            role: Role::User,
            text: question.to_string(),
        });
        turns.push_back(Turn {
            role: Role::Assistant,
            text: answer.to_string(),
        });
        while turns.len() > self.max_turns * 2 {
            turns.pop_front();
        }
    }

    pub fn turns(&self, conversation_id: &str) -> Vec<Turn> {
        self.lock()
            .get(conversation_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History as `User: ...` / `Assistant: ...` lines; empty when unknown.
    pub fn render(&self, conversation_id: &str) -> String {
        self.turns(conversation_id)
            .iter()
            .map(|turn| match turn.role {
                Role::User => format!("User: {}", turn.text),
                Role::Assistant => format!("Assistant: {}", turn.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&self, conversation_id: &str) {
        self.lock().pop(conversation_id);
    }

    /// Number of tracked conversations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
