use serde::{Deserialize, Serialize};

use crate::engine::{OccupancyState, classify, compute_availability};
use crate::limits::MAX_PAGE_SIZE;
use crate::model::*;

/// Presentation hint echoed back on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Layout {
    #[default]
    List,
    Grid,
}

/// Paging and presentation, passed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub offset: usize,
    pub page_size: usize,
    pub layout: Layout,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            page_size: 50,
            layout: Layout::List,
        }
    }
}

/// Listing filter. `None` filters match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub range: DateRange,
    pub active: Option<bool>,
    pub under_maintenance: Option<bool>,
    pub occupancy: Option<OccupancyState>,
    pub view: ViewConfig,
}

impl CatalogQuery {
    /// Everything over `range`, first page, default view.
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            active: None,
            under_maintenance: None,
            occupancy: None,
            view: ViewConfig::default(),
        }
    }
}

/// An item with its availability over the query range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub item: InventoryItem,
    pub availability: AvailabilityResult,
    pub occupancy: OccupancyState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    /// Matching items before paging.
    pub total: usize,
    pub layout: Layout,
    pub entries: Vec<CatalogEntry>,
}

fn flags_match(query: &CatalogQuery, item: &InventoryItem) -> bool {
    query.active.is_none_or(|a| a == item.is_active)
        && query.under_maintenance.is_none_or(|m| m == item.is_under_maintenance)
}

/// Filter and page `snapshots`, which must already be in listing order.
pub fn build_page(snapshots: &[SharedSnapshot], query: &CatalogQuery) -> CatalogPage {
    let page_size = query.view.page_size.clamp(1, MAX_PAGE_SIZE);
    let mut total = 0;
    let mut entries = Vec::new();
    for snap in snapshots {
        if !flags_match(query, &snap.item) {
            continue;
        }
        let availability = compute_availability(
            &snap.item,
            &snap.intervals,
            &AvailabilityQuery::new(snap.item.id, query.range),
        );
        let occupancy = classify(&snap.item, &availability);
        if query.occupancy.is_some_and(|o| o != occupancy) {
            continue;
        }
        total += 1;
        if total > query.view.offset && entries.len() < page_size {
            entries.push(CatalogEntry {
                item: snap.item.clone(),
                availability,
                occupancy,
            });
        }
    }
    CatalogPage {
        total,
        layout: query.view.layout,
        entries,
    }
}
