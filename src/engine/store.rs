use std::sync::Arc;

use dashmap::DashMap;

use crate::model::*;

use super::SharedItemState;

/// One item's slice of the interval store. Pure collection, no validation.
pub trait IntervalStore {
    fn append(&mut self, interval: ReservationInterval);
    /// Remove every interval held by `consumer_id`, returning what was removed.
    fn remove_by_consumer(&mut self, consumer_id: ConsumerId) -> Vec<ReservationInterval>;
    /// All intervals, ordered by start date.
    fn list(&self) -> &[ReservationInterval];
}

impl IntervalStore for ItemState {
    fn append(&mut self, interval: ReservationInterval) {
        self.insert_interval(interval);
    }

    fn remove_by_consumer(&mut self, consumer_id: ConsumerId) -> Vec<ReservationInterval> {
        self.remove_consumer(consumer_id)
    }

    fn list(&self) -> &[ReservationInterval] {
        &self.intervals
    }
}

/// Item-keyed store: lock-guarded live state for writers, published snapshots for readers.
pub struct InMemoryStore {
    items: DashMap<ItemId, SharedItemState>,
    snapshots: DashMap<ItemId, SharedSnapshot>,
    /// Reverse lookup: consumer → items it holds units on.
    consumer_items: DashMap<ConsumerId, Vec<ItemId>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            snapshots: DashMap::new(),
            consumer_items: DashMap::new(),
        }
    }

    // ── Items ────────────────────────────────────────────────

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn contains_item(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    /// Live, lock-guarded state. Writers only; readers use `list_by_item`.
    pub fn get_item(&self, id: &ItemId) -> Option<SharedItemState> {
        self.items.get(id).map(|e| e.value().clone())
    }

    /// Register a new item together with its first published snapshot.
    pub fn insert_item(&self, id: ItemId, state: SharedItemState, snapshot: ItemSnapshot) {
        self.items.insert(id, state);
        self.snapshots.insert(id, Arc::new(snapshot));
    }

    /// Sorted, so callers taking several locks get a stable order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.items.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Read path ────────────────────────────────────────────

    /// Last committed copy of the item. Never touches the item lock.
    pub fn list_by_item(&self, id: &ItemId) -> Option<SharedSnapshot> {
        self.snapshots.get(id).map(|e| e.value().clone())
    }

    /// Snapshots of every item, ordered by item id.
    pub fn all_snapshots(&self) -> Vec<SharedSnapshot> {
        let mut all: Vec<SharedSnapshot> = self.snapshots.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.item.id);
        all
    }

    /// Called by the writer while it still holds the item lock.
    pub fn publish(&self, state: &ItemState) {
        self.snapshots.insert(state.item.id, Arc::new(state.snapshot()));
    }

    // ── Consumer index ───────────────────────────────────────

    /// Items the consumer holds units on, sorted by item id.
    pub fn items_for_consumer(&self, consumer_id: &ConsumerId) -> Vec<ItemId> {
        self.consumer_items
            .get(consumer_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn index_consumer(&self, consumer_id: ConsumerId, item_id: ItemId) {
        let mut items = self.consumer_items.entry(consumer_id).or_default();
        if !items.contains(&item_id) {
            items.push(item_id);
            items.sort();
        }
    }

    /// Drops the consumer entry entirely once its last item is gone.
    pub fn unindex_consumer(&self, consumer_id: &ConsumerId, item_id: &ItemId) {
        let now_empty = match self.consumer_items.get_mut(consumer_id) {
            Some(mut items) => {
                items.retain(|i| i != item_id);
                items.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.consumer_items.remove_if(consumer_id, |_, items| items.is_empty());
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply a hold/flag event to an item (caller holds the write lock).
    /// `ItemCreated` is handled at the map level and batches are expanded by the engine.
    pub fn apply_event(&self, rs: &mut ItemState, event: &Event) {
        match event {
            Event::ItemFlagsUpdated {
                is_under_maintenance,
                is_active,
                ..
            } => {
                rs.item.is_under_maintenance = *is_under_maintenance;
                rs.item.is_active = *is_active;
            }
            Event::HoldReplaced {
                item_id,
                consumer_id,
                kind,
                range,
                units,
            } => {
                rs.remove_by_consumer(*consumer_id);
                rs.append(ReservationInterval {
                    item_id: *item_id,
                    consumer_id: *consumer_id,
                    kind: *kind,
                    range: *range,
                    units: *units,
                });
                self.index_consumer(*consumer_id, *item_id);
            }
            Event::HoldsConverted { item_id, from, to } => {
                let removed = rs.remove_by_consumer(*from);
                let mut remaining_from = false;
                for interval in removed {
                    if interval.kind == ReservationKind::Proposal {
                        rs.append(ReservationInterval {
                            consumer_id: *to,
                            kind: ReservationKind::Booking,
                            ..interval
                        });
                    } else {
                        remaining_from = true;
                        rs.append(interval);
                    }
                }
                self.index_consumer(*to, *item_id);
                if !remaining_from {
                    self.unindex_consumer(from, item_id);
                }
            }
            Event::HoldReleased {
                item_id,
                consumer_id,
            } => {
                rs.remove_by_consumer(*consumer_id);
                self.unindex_consumer(consumer_id, item_id);
            }
            Event::ItemCreated { .. } | Event::Batch(_) => {}
        }
        self.publish(rs);
    }
}
