use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::availability::compute_availability;

/// Shape checks that need no item state.
pub(crate) fn validate_request(req: &ReserveRequest) -> Result<(), EngineError> {
    if !req.range.is_valid() || req.units == 0 {
        return Err(EngineError::InvalidRange);
    }
    if req.range.days() > MAX_RESERVATION_DAYS {
        return Err(EngineError::LimitExceeded("reservation range too wide"));
    }
    Ok(())
}

pub(crate) fn validate_query_range(range: &DateRange) -> Result<(), EngineError> {
    if !range.is_valid() {
        return Err(EngineError::InvalidRange);
    }
    if range.days() > MAX_QUERY_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// Flag guards. Maintenance is reported ahead of inactivity.
pub(crate) fn check_reservable(item: &InventoryItem) -> Result<(), EngineError> {
    if item.is_under_maintenance {
        return Err(EngineError::ItemUnderMaintenance(item.id));
    }
    if !item.is_active {
        return Err(EngineError::ItemInactive(item.id));
    }
    Ok(())
}

/// Capacity check against `intervals` (sorted). Returns the free count it validated against.
pub(crate) fn check_capacity(
    item: &InventoryItem,
    intervals: &[ReservationInterval],
    req: &ReserveRequest,
) -> Result<u32, EngineError> {
    let available = free_for(item, intervals, req);
    if req.units > available {
        return Err(EngineError::CapacityExceeded {
            available,
            requested: req.units,
        });
    }
    Ok(available)
}

fn free_for(item: &InventoryItem, intervals: &[ReservationInterval], req: &ReserveRequest) -> u32 {
    let query = AvailabilityQuery {
        item_id: item.id,
        range: req.range,
        exclude_consumer: req.exclude_consumer(),
    };
    compute_availability(item, intervals, &query).available_units
}

/// Validate a group of requests for one item in order, each seeing the ones before it.
pub(crate) fn check_sequence(
    rs: &ItemState,
    requests: &[&ReserveRequest],
) -> Result<(), EngineError> {
    check_reservable(&rs.item)?;
    if requests.len() == 1 {
        check_capacity(&rs.item, &rs.intervals, requests[0])?;
        return Ok(());
    }
    let mut scratch = rs.clone();
    for req in requests {
        check_capacity(&scratch.item, &scratch.intervals, req)?;
        scratch.remove_consumer(req.consumer_id);
        scratch.insert_interval(ReservationInterval {
            item_id: req.item_id,
            consumer_id: req.consumer_id,
            kind: req.kind,
            range: req.range,
            units: req.units,
        });
    }
    Ok(())
}
