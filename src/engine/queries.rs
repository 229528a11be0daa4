use std::collections::HashMap;

use chrono::NaiveDate;

use crate::catalog::{CatalogPage, CatalogQuery, build_page};
use crate::limits::*;
use crate::model::*;
use crate::observability::AVAILABILITY_QUERIES_TOTAL;

use super::availability::{availability_profile, compute_availability};
use super::conflict::validate_query_range;
use super::occupancy::{OccupancyState, classify};
use super::{Engine, EngineError};

// Reads run over published snapshots and never wait on a writer.
impl Engine {
    fn snapshot(&self, item_id: ItemId) -> Result<SharedSnapshot, EngineError> {
        self.store
            .list_by_item(&item_id)
            .ok_or(EngineError::NotFound(item_id))
    }

    /// Free units over the query range, computed from the published snapshot.
    pub fn availability(&self, query: &AvailabilityQuery) -> Result<AvailabilityResult, EngineError> {
        validate_query_range(&query.range)?;
        let snap = self.snapshot(query.item_id)?;
        metrics::counter!(AVAILABILITY_QUERIES_TOTAL, "path" => "single").increment(1);
        Ok(compute_availability(&snap.item, &snap.intervals, query))
    }

    /// One range, many items. Unknown ids are an error, not a silent skip.
    pub fn compute_batch(
        &self,
        item_ids: &[ItemId],
        range: DateRange,
    ) -> Result<HashMap<ItemId, AvailabilityResult>, EngineError> {
        if item_ids.len() > MAX_BATCH_ITEMS {
            return Err(EngineError::LimitExceeded("too many items in batch query"));
        }
        validate_query_range(&range)?;
        let mut results = HashMap::with_capacity(item_ids.len());
        for id in item_ids {
            let snap = self.snapshot(*id)?;
            let result = compute_availability(&snap.item, &snap.intervals, &AvailabilityQuery::new(*id, range));
            results.insert(*id, result);
        }
        metrics::counter!(AVAILABILITY_QUERIES_TOTAL, "path" => "batch").increment(item_ids.len() as u64);
        Ok(results)
    }

    /// Contiguous segments of constant free count across `range`.
    pub fn availability_profile(&self, item_id: ItemId, range: DateRange) -> Result<Vec<ProfileSegment>, EngineError> {
        validate_query_range(&range)?;
        let snap = self.snapshot(item_id)?;
        Ok(availability_profile(&snap.item, &snap.intervals, &range))
    }

    /// Occupancy on a single day.
    pub fn occupancy(&self, item_id: ItemId, as_of: NaiveDate) -> Result<OccupancyState, EngineError> {
        let snap = self.snapshot(item_id)?;
        let result = compute_availability(
            &snap.item,
            &snap.intervals,
            &AvailabilityQuery::new(item_id, DateRange::single(as_of)),
        );
        Ok(classify(&snap.item, &result))
    }

    /// One page of items with their availability over `query.range` and the
    /// occupancy classified from it. `total` counts every match, not just the page.
    pub fn list_catalog(&self, query: &CatalogQuery) -> Result<CatalogPage, EngineError> {
        validate_query_range(&query.range)?;
        let snapshots = self.store.all_snapshots();
        metrics::counter!(AVAILABILITY_QUERIES_TOTAL, "path" => "catalog").increment(snapshots.len() as u64);
        Ok(build_page(&snapshots, query))
    }

    pub fn get_item(&self, item_id: ItemId) -> Result<InventoryItem, EngineError> {
        Ok(self.snapshot(item_id)?.item.clone())
    }

    /// All items, ordered by id.
    pub fn list_items(&self) -> Vec<InventoryItem> {
        self.store
            .all_snapshots()
            .iter()
            .map(|s| s.item.clone())
            .collect()
    }

    /// Live holds on one item, sorted by start date.
    pub fn holds(&self, item_id: ItemId) -> Result<Vec<ReservationInterval>, EngineError> {
        Ok(self.snapshot(item_id)?.intervals.clone())
    }

    /// Items a consumer currently holds units on.
    pub fn consumer_items(&self, consumer_id: ConsumerId) -> Vec<ItemId> {
        self.store.items_for_consumer(&consumer_id)
    }

    /// Every committed interval across all items, optionally narrowed to one kind.
    pub fn committed_intervals(&self, kind: Option<ReservationKind>) -> Vec<ReservationInterval> {
        self.store
            .all_snapshots()
            .iter()
            .flat_map(|s| s.intervals.iter())
            .filter(|i| kind.is_none_or(|k| k == i.kind))
            .cloned()
            .collect()
    }
}
