use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type ItemId = Ulid;
pub type ConsumerId = Ulid;

/// Days since 0001-01-01 (CE). Sweep arithmetic runs on these.
pub type DayNumber = i32;

pub fn day_number(date: NaiveDate) -> DayNumber {
    date.num_days_from_ce()
}

pub fn from_day_number(n: DayNumber) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(n).unwrap_or(NaiveDate::MAX)
}

/// Inclusive date range `[start, end]`.
///
/// Not validated on construction; the allocator rejects `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Number of days covered, 0 for an inverted range.
    pub fn days(&self) -> i64 {
        if !self.is_valid() {
            return 0;
        }
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Who owns a hold. Both kinds count toward capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationKind {
    Booking,
    Proposal,
}

impl ReservationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReservationKind::Booking => "booking",
            ReservationKind::Proposal => "proposal",
        }
    }
}

/// A fixed unit count held by one consumer on one item over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInterval {
    pub item_id: ItemId,
    pub consumer_id: ConsumerId,
    pub kind: ReservationKind,
    pub range: DateRange,
    pub units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: Option<String>,
    pub total_units: u32,
    pub is_under_maintenance: bool,
    pub is_active: bool,
}

impl InventoryItem {
    pub fn new(id: ItemId, name: Option<String>, total_units: u32) -> Self {
        Self {
            id,
            name,
            total_units,
            is_under_maintenance: false,
            is_active: true,
        }
    }
}

/// Intervals overlapping `window`, given a slice sorted by `range.start`.
/// Binary search skips everything starting after the window.
pub fn overlapping<'a>(
    intervals: &'a [ReservationInterval],
    window: &DateRange,
) -> impl Iterator<Item = &'a ReservationInterval> + use<'a> {
    let right_bound = intervals.partition_point(|i| i.range.start <= window.end);
    let window_start = window.start;
    intervals[..right_bound]
        .iter()
        .filter(move |i| i.range.end >= window_start)
}

/// Mutable per-item state. Guarded by the item's write lock.
#[derive(Debug, Clone)]
pub struct ItemState {
    pub item: InventoryItem,
    /// Live holds, sorted by `range.start`.
    pub intervals: Vec<ReservationInterval>,
}

impl ItemState {
    pub fn new(item: InventoryItem) -> Self {
        Self {
            item,
            intervals: Vec::new(),
        }
    }

    pub fn insert_interval(&mut self, interval: ReservationInterval) {
        let pos = self
            .intervals
            .partition_point(|i| i.range.start <= interval.range.start);
        self.intervals.insert(pos, interval);
    }

    /// Remove every interval owned by `consumer_id`, preserving order of the rest.
    pub fn remove_consumer(&mut self, consumer_id: ConsumerId) -> Vec<ReservationInterval> {
        let mut removed = Vec::new();
        self.intervals.retain(|i| {
            if i.consumer_id == consumer_id {
                removed.push(i.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn holds_consumer(&self, consumer_id: ConsumerId) -> bool {
        self.intervals.iter().any(|i| i.consumer_id == consumer_id)
    }

    pub fn overlapping(&self, window: &DateRange) -> impl Iterator<Item = &ReservationInterval> {
        overlapping(&self.intervals, window)
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            item: self.item.clone(),
            intervals: self.intervals.clone(),
        }
    }
}

/// Immutable copy of an item published after each commit for the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub item: InventoryItem,
    pub intervals: Vec<ReservationInterval>,
}

pub type SharedSnapshot = Arc<ItemSnapshot>;

/// Journal record format. One event per atomic mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemCreated {
        id: ItemId,
        name: Option<String>,
        total_units: u32,
    },
    ItemFlagsUpdated {
        id: ItemId,
        is_under_maintenance: bool,
        is_active: bool,
    },
    /// Drop every hold of `consumer_id` on the item, then append the new one.
    HoldReplaced {
        item_id: ItemId,
        consumer_id: ConsumerId,
        kind: ReservationKind,
        range: DateRange,
        units: u32,
    },
    /// Proposal-kind holds of `from` become booking-kind holds of `to`.
    HoldsConverted {
        item_id: ItemId,
        from: ConsumerId,
        to: ConsumerId,
    },
    HoldReleased {
        item_id: ItemId,
        consumer_id: ConsumerId,
    },
    /// Multi-item mutation journalled as one frame so replay is all-or-nothing.
    Batch(Vec<Event>),
}

impl Event {
    /// The item a single-item event touches; `None` for batches.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Event::ItemCreated { id, .. } | Event::ItemFlagsUpdated { id, .. } => Some(*id),
            Event::HoldReplaced { item_id, .. }
            | Event::HoldsConverted { item_id, .. }
            | Event::HoldReleased { item_id, .. } => Some(*item_id),
            Event::Batch(_) => None,
        }
    }

    /// Flatten batches into their single-item events, in order.
    pub fn expand(&self) -> Vec<&Event> {
        match self {
            Event::Batch(events) => events.iter().flat_map(Event::expand).collect(),
            single => vec![single],
        }
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveMode {
    /// The consumer's existing hold, if any, still counts during validation.
    Create,
    /// The consumer's existing hold is excluded while validating its replacement.
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    pub item_id: ItemId,
    pub consumer_id: ConsumerId,
    pub kind: ReservationKind,
    pub range: DateRange,
    pub units: u32,
    pub mode: ReserveMode,
    /// Bound on waiting for the item lock. `None` defers to the engine config.
    pub lock_timeout: Option<std::time::Duration>,
}

impl ReserveRequest {
    pub fn create(item_id: ItemId, consumer_id: ConsumerId, kind: ReservationKind, range: DateRange, units: u32) -> Self {
        Self {
            item_id,
            consumer_id,
            kind,
            range,
            units,
            mode: ReserveMode::Create,
            lock_timeout: None,
        }
    }

    pub fn edit(item_id: ItemId, consumer_id: ConsumerId, kind: ReservationKind, range: DateRange, units: u32) -> Self {
        Self {
            mode: ReserveMode::Edit,
            ..Self::create(item_id, consumer_id, kind, range, units)
        }
    }

    pub fn with_lock_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn exclude_consumer(&self) -> Option<ConsumerId> {
        match self.mode {
            ReserveMode::Edit => Some(self.consumer_id),
            ReserveMode::Create => None,
        }
    }
}

// ── Query types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub item_id: ItemId,
    pub range: DateRange,
    /// Holds of this consumer are ignored (re-validating its own edit).
    pub exclude_consumer: Option<ConsumerId>,
}

impl AvailabilityQuery {
    pub fn new(item_id: ItemId, range: DateRange) -> Self {
        Self {
            item_id,
            range,
            exclude_consumer: None,
        }
    }

    pub fn excluding(mut self, consumer_id: ConsumerId) -> Self {
        self.exclude_consumer = Some(consumer_id);
        self
    }
}

/// Units safe to reserve on every day of the queried range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub available_units: u32,
    pub is_under_maintenance: bool,
}

/// A maximal run of days with constant availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSegment {
    pub range: DateRange,
    pub available_units: u32,
}
