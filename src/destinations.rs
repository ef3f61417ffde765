use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::RwLock;

/// Per-chat upload destination ("folder") chosen by the user.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Overwrites whatever destination the chat had before. Any text is accepted.
    async fn set_destination(&self, chat_id: ChatId, name: String);
    /// Returns `None` until the chat has set a destination.
    async fn get_destination(&self, chat_id: ChatId) -> Option<String>;
}

/// Destinations kept in process memory; lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryDestinations {
    inner: Arc<RwLock<HashMap<ChatId, String>>>,
}

impl InMemoryDestinations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DestinationStore for InMemoryDestinations {
    async fn set_destination(&self, chat_id: ChatId, name: String) {
        let mut destinations = self.inner.write().await;
        info!("Chat {} set destination: {}", chat_id, name);
        destinations.insert(chat_id, name);
    }

    async fn get_destination(&self, chat_id: ChatId) -> Option<String> {
        self.inner.read().await.get(&chat_id).cloned()
    }
}
