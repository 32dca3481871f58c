//! Live channel map shared by the relay, the dispatcher and the setup wizard.

use std::sync::{Arc, RwLock};

use crate::common::messages::ChannelCategory;
use crate::config::types::ChannelsConfig;

/// Category -> Discord channel map that can be replaced at runtime.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    inner: Arc<RwLock<ChannelsConfig>>,
}

impl ChannelMap {
    pub fn new(channels: ChannelsConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(channels)),
        }
    }

    pub fn get(&self, category: ChannelCategory) -> Option<u64> {
        self.read().get(category)
    }

    pub fn snapshot(&self) -> ChannelsConfig {
        self.read().clone()
    }

    pub fn replace(&self, channels: ChannelsConfig) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = channels;
    }

    /// Whether `channel_id` is the chat channel, the only channel relayed upstream.
    pub fn is_chat_channel(&self, channel_id: u64) -> bool {
        self.get(ChannelCategory::Chat) == Some(channel_id)
    }

    /// Categories mapped to at least one channel.
    pub fn configured(&self) -> Vec<ChannelCategory> {
        let channels = self.snapshot();
        ChannelCategory::ALL
            .into_iter()
            .filter(|c| channels.get(*c).is_some())
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ChannelsConfig> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
