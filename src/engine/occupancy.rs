use serde::{Deserialize, Serialize};

use crate::model::{AvailabilityResult, InventoryItem};

/// Display state of an item for listing/grid views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupancyState {
    UnderMaintenance,
    Occupied,
    Vacant,
    PartiallyAvailable,
}

impl OccupancyState {
    pub fn label(&self) -> &'static str {
        match self {
            OccupancyState::UnderMaintenance => "under_maintenance",
            OccupancyState::Occupied => "occupied",
            OccupancyState::Vacant => "vacant",
            OccupancyState::PartiallyAvailable => "partially_available",
        }
    }
}

pub fn classify(item: &InventoryItem, result: &AvailabilityResult) -> OccupancyState {
    if item.is_under_maintenance || result.is_under_maintenance {
        OccupancyState::UnderMaintenance
    } else if result.available_units == 0 {
        OccupancyState::Occupied
    } else if result.available_units >= item.total_units {
        OccupancyState::Vacant
    } else {
        OccupancyState::PartiallyAvailable
    }
}
