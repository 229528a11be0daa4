use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock, oneshot};
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;
use crate::observability::*;

use super::availability::compute_availability;
use super::conflict::{check_capacity, check_reservable, check_sequence, validate_request};
use super::{Engine, EngineError, JournalCommand, JournalControl};

fn full_range_availability(rs: &ItemState, range: DateRange) -> AvailabilityResult {
    compute_availability(&rs.item, &rs.intervals, &AvailabilityQuery::new(rs.item.id, range))
}

fn hold_event(req: &ReserveRequest) -> Event {
    Event::HoldReplaced {
        item_id: req.item_id,
        consumer_id: req.consumer_id,
        kind: req.kind,
        range: req.range,
        units: req.units,
    }
}

/// Every consumer that has no hold on the item yet adds one interval.
fn check_interval_budget<'a>(
    rs: &ItemState,
    consumers: impl IntoIterator<Item = &'a ConsumerId>,
) -> Result<(), EngineError> {
    let mut fresh: Vec<ConsumerId> = consumers
        .into_iter()
        .copied()
        .filter(|c| !rs.holds_consumer(*c))
        .collect();
    fresh.sort_unstable();
    fresh.dedup();
    if !fresh.is_empty() && rs.intervals.len() + fresh.len() > MAX_INTERVALS_PER_ITEM {
        return Err(EngineError::LimitExceeded("too many intervals on item"));
    }
    Ok(())
}

impl Engine {
    pub async fn create_item(
        &self,
        id: ItemId,
        name: Option<String>,
        total_units: u32,
    ) -> Result<(), EngineError> {
        if total_units == 0 {
            return Err(EngineError::LimitExceeded("item needs at least one unit"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("item name too long"));
        }
        let _admin = self.admin.lock().await;
        if self.store.item_count() >= MAX_ITEMS {
            return Err(EngineError::LimitExceeded("too many items"));
        }
        if self.store.contains_item(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ItemCreated {
            id,
            name: name.clone(),
            total_units,
        };
        self.journal_append(&event).await?;
        let rs = ItemState::new(InventoryItem::new(id, name, total_units));
        let snapshot = rs.snapshot();
        self.store.insert_item(id, Arc::new(RwLock::new(rs)), snapshot);
        metrics::gauge!(ITEMS_ACTIVE).set(self.store.item_count() as f64);
        info!("item {id} created with {total_units} units");
        self.announce(id, None, None, None);
        Ok(())
    }

    pub async fn set_maintenance(&self, id: ItemId, under_maintenance: bool) -> Result<(), EngineError> {
        self.update_flags(id, |item| item.is_under_maintenance = under_maintenance)
            .await
    }

    pub async fn set_active(&self, id: ItemId, active: bool) -> Result<(), EngineError> {
        self.update_flags(id, |item| item.is_active = active).await
    }

    async fn update_flags(&self, id: ItemId, change: impl FnOnce(&mut InventoryItem)) -> Result<(), EngineError> {
        let mut guard = self.lock_item(id, None).await?;
        let mut item = guard.item.clone();
        change(&mut item);
        let event = Event::ItemFlagsUpdated {
            id,
            is_under_maintenance: item.is_under_maintenance,
            is_active: item.is_active,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);
        info!(
            "item {id} flags: under_maintenance={} active={}",
            item.is_under_maintenance, item.is_active
        );
        self.announce(id, None, None, None);
        Ok(())
    }

    /// Validate a hold and, if every day of the range has room, replace the
    /// consumer's prior hold on the item with it.
    ///
    /// Returns availability over the reserved range after the commit.
    pub async fn reserve(&self, req: ReserveRequest) -> Result<AvailabilityResult, EngineError> {
        let started = Instant::now();
        let result = self.reserve_locked(&req).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(RESERVATIONS_TOTAL, "kind" => req.kind.label(), "outcome" => outcome).increment(1);
        metrics::histogram!(RESERVE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    /// Reject holds on a suspended item from its published snapshot, without
    /// queueing behind its writers. The check repeats under the lock.
    fn precheck_reservable(&self, item_id: ItemId) -> Result<(), EngineError> {
        let snapshot = self.store.list_by_item(&item_id).ok_or(EngineError::NotFound(item_id))?;
        check_reservable(&snapshot.item)
    }

    async fn reserve_locked(&self, req: &ReserveRequest) -> Result<AvailabilityResult, EngineError> {
        validate_request(req)?;
        self.precheck_reservable(req.item_id)?;
        let mut guard = self.lock_item(req.item_id, req.lock_timeout).await?;
        check_reservable(&guard.item)?;
        check_interval_budget(&guard, [&req.consumer_id])?;
        let available = check_capacity(&guard.item, &guard.intervals, req)?;

        self.persist_and_apply(&mut guard, &hold_event(req)).await?;
        let after = full_range_availability(&guard, req.range);
        drop(guard);

        debug!(
            "{} {} holds {} of {} units on item {} for {}..={}",
            req.kind.label(),
            req.consumer_id,
            req.units,
            available,
            req.item_id,
            req.range.start,
            req.range.end
        );
        self.announce(req.item_id, Some(req.consumer_id), Some(req.range), Some(after));
        Ok(after)
    }

    /// Reserve on several items at once. All-or-nothing: one rejection commits nothing.
    /// Requests for the same item are validated in order, each seeing the ones before it.
    pub async fn reserve_batch(&self, requests: Vec<ReserveRequest>) -> Result<Vec<AvailabilityResult>, EngineError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        for req in &requests {
            validate_request(req)?;
        }

        // Lock in sorted item order so overlapping batches cannot deadlock.
        let mut by_item: BTreeMap<ItemId, Vec<&ReserveRequest>> = BTreeMap::new();
        for req in &requests {
            by_item.entry(req.item_id).or_default().push(req);
        }
        for item_id in by_item.keys() {
            self.precheck_reservable(*item_id)?;
        }
        let mut guards: BTreeMap<ItemId, OwnedRwLockWriteGuard<ItemState>> = BTreeMap::new();
        for (item_id, group) in &by_item {
            let bound = group.iter().find_map(|r| r.lock_timeout);
            guards.insert(*item_id, self.lock_item(*item_id, bound).await?);
        }

        for (item_id, group) in &by_item {
            let guard = &guards[item_id];
            check_interval_budget(guard, group.iter().map(|r| &r.consumer_id))?;
            check_sequence(guard, group)?;
        }

        let events: Vec<Event> = requests.iter().map(hold_event).collect();
        self.journal_append(&Event::Batch(events.clone())).await?;
        for event in &events {
            if let Some(item_id) = event.item_id()
                && let Some(guard) = guards.get_mut(&item_id)
            {
                self.store.apply_event(guard, event);
            }
        }

        let results: Vec<AvailabilityResult> = requests
            .iter()
            .map(|req| full_range_availability(&guards[&req.item_id], req.range))
            .collect();
        drop(guards);

        metrics::counter!(RESERVATIONS_TOTAL, "kind" => "batch", "outcome" => "ok")
            .increment(requests.len() as u64);
        info!("batch of {} holds committed across {} items", requests.len(), by_item.len());
        for (req, after) in requests.iter().zip(&results) {
            self.announce(req.item_id, Some(req.consumer_id), Some(req.range), Some(*after));
        }
        Ok(results)
    }

    /// Drop a consumer's hold on one item. Returns the number of intervals removed.
    pub async fn cancel(&self, item_id: ItemId, consumer_id: ConsumerId) -> Result<usize, EngineError> {
        let mut guard = self.lock_item(item_id, None).await?;
        let held: Vec<DateRange> = guard
            .intervals
            .iter()
            .filter(|i| i.consumer_id == consumer_id)
            .map(|i| i.range)
            .collect();
        if held.is_empty() {
            return Err(EngineError::NotFound(consumer_id));
        }
        let event = Event::HoldReleased {
            item_id,
            consumer_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let released: Vec<(DateRange, AvailabilityResult)> = held
            .iter()
            .map(|range| (*range, full_range_availability(&guard, *range)))
            .collect();
        drop(guard);

        metrics::counter!(CANCELLATIONS_TOTAL).increment(released.len() as u64);
        debug!("released {} hold(s) of {consumer_id} on item {item_id}", released.len());
        for (range, after) in &released {
            self.announce(item_id, Some(consumer_id), Some(*range), Some(*after));
        }
        Ok(released.len())
    }

    /// Cancel a consumer everywhere (e.g. a declined multi-place proposal).
    /// Each item is released in its own atomic step.
    pub async fn cancel_consumer(&self, consumer_id: ConsumerId) -> Result<Vec<ItemId>, EngineError> {
        let items = self.store.items_for_consumer(&consumer_id);
        if items.is_empty() {
            return Err(EngineError::NotFound(consumer_id));
        }
        let mut released = Vec::with_capacity(items.len());
        for item_id in items {
            match self.cancel(item_id, consumer_id).await {
                Ok(_) => released.push(item_id),
                // Lost a race with another cancellation.
                Err(EngineError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(released)
    }

    /// Replace every proposal-kind hold of `proposal_id` with a booking-kind
    /// hold of `booking_id` over the same dates and units.
    ///
    /// Committed totals do not change, so capacity is not re-checked.
    pub async fn convert_proposal(
        &self,
        proposal_id: ConsumerId,
        booking_id: ConsumerId,
    ) -> Result<Vec<ItemId>, EngineError> {
        if proposal_id == booking_id {
            return Err(EngineError::AlreadyExists(booking_id));
        }
        let mut guards = Vec::new();
        for item_id in self.store.items_for_consumer(&proposal_id) {
            let guard = self.lock_item(item_id, None).await?;
            let has_proposal = guard
                .intervals
                .iter()
                .any(|i| i.consumer_id == proposal_id && i.kind == ReservationKind::Proposal);
            if has_proposal {
                if guard.holds_consumer(booking_id) {
                    return Err(EngineError::AlreadyExists(booking_id));
                }
                guards.push(guard);
            }
        }
        if guards.is_empty() {
            return Err(EngineError::NotFound(proposal_id));
        }

        let events: Vec<Event> = guards
            .iter()
            .map(|g| Event::HoldsConverted {
                item_id: g.item.id,
                from: proposal_id,
                to: booking_id,
            })
            .collect();
        self.journal_append(&Event::Batch(events.clone())).await?;
        for (guard, event) in guards.iter_mut().zip(&events) {
            self.store.apply_event(guard, event);
        }
        let items: Vec<ItemId> = guards.iter().map(|g| g.item.id).collect();
        drop(guards);

        info!("proposal {proposal_id} converted to booking {booking_id} on {} item(s)", items.len());
        for item_id in &items {
            self.announce(*item_id, Some(booking_id), None, None);
        }
        Ok(items)
    }

    /// Rewrite the journal as the minimal event set that recreates the current state.
    /// Holds every item lock for the duration, so no commit can slip between
    /// the snapshot and the rewrite.
    pub async fn compact_journal(&self) -> Result<usize, EngineError> {
        let Some(tx) = &self.journal_tx else {
            return Ok(0);
        };
        let _admin = self.admin.lock().await;
        let mut guards = Vec::new();
        for item_id in self.store.item_ids() {
            if let Some(shared) = self.store.get_item(&item_id) {
                guards.push(shared.write_owned().await);
            }
        }

        let mut events = Vec::new();
        for guard in &guards {
            let item = &guard.item;
            events.push(Event::ItemCreated {
                id: item.id,
                name: item.name.clone(),
                total_units: item.total_units,
            });
            if item.is_under_maintenance || !item.is_active {
                events.push(Event::ItemFlagsUpdated {
                    id: item.id,
                    is_under_maintenance: item.is_under_maintenance,
                    is_active: item.is_active,
                });
            }
            for interval in &guard.intervals {
                events.push(Event::HoldReplaced {
                    item_id: interval.item_id,
                    consumer_id: interval.consumer_id,
                    kind: interval.kind,
                    range: interval.range,
                    units: interval.units,
                });
            }
        }
        let written = events.len();

        let (response, rx) = oneshot::channel();
        tx.send(JournalCommand::Control(JournalControl::Rewrite { events, response }))
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))?;
        drop(guards);
        info!("journal compacted to {written} events");
        Ok(written)
    }
}
