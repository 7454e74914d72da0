//! # Conversation Store Module
//!
//! In-memory storage of per-sender conversation state behind a trait so the
//! backend can be swapped (e.g. for a durable or per-key-locking store)
//! without touching the message handler.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::conversation::Conversation;

/// Key-value storage for conversation state, keyed by sender id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, sender: &str) -> Option<Conversation>;
    async fn put(&self, sender: &str, conversation: Conversation);
    async fn remove(&self, sender: &str);
    async fn len(&self) -> usize;
    /// Remove conversations idle for longer than `ttl_secs`. Returns the
    /// number of evicted records.
    async fn evict_idle(&self, ttl_secs: u64) -> usize;
}

/// Default backend: a process-local map. State does not survive restarts.
///
/// Locking is map-level only; two deliveries for the same sender can
/// interleave between `get` and `put`.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, sender: &str) -> Option<Conversation> {
        let conversations = self.conversations.read().await;
        conversations.get(sender).cloned()
    }

    async fn put(&self, sender: &str, conversation: Conversation) {
        let mut conversations = self.conversations.write().await;
        conversations.insert(sender.to_string(), conversation);
    }

    async fn remove(&self, sender: &str) {
        let mut conversations = self.conversations.write().await;
        conversations.remove(sender);
    }

    async fn len(&self) -> usize {
        let conversations = self.conversations.read().await;
        conversations.len()
    }

    async fn evict_idle(&self, ttl_secs: u64) -> usize {
        let cutoff = Utc::now() - Duration::seconds(ttl_secs as i64);
        let mut conversations = self.conversations.write().await;
        let before = conversations.len();
        conversations.retain(|_, conversation| conversation.touched_at > cutoff);
        before - conversations.len()
    }
}
