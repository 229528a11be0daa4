use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{AvailabilityResult, ConsumerId, DateRange, ItemId};

const CHANNEL_CAPACITY: usize = 256;

/// Cache invalidation for one item. Carries the authoritative post-commit
/// availability over the touched range when the mutation had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub item_id: ItemId,
    pub consumer_id: Option<ConsumerId>,
    pub range: Option<DateRange>,
    pub availability: Option<AvailabilityResult>,
}

/// Broadcast hub for per-item change notifications.
pub struct NotifyHub {
    channels: DashMap<ItemId, broadcast::Sender<ChangeEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to an item. Creates the channel if needed.
    pub fn subscribe(&self, item_id: ItemId) -> broadcast::Receiver<ChangeEvent> {
        self.channels
            .entry(item_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, event: ChangeEvent) {
        if let Some(sender) = self.channels.get(&event.item_id) {
            let _ = sender.send(event);
        }
    }
}
