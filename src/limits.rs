//! Hard caps that keep a single caller from exhausting the engine.

pub const MAX_ITEMS: usize = 100_000;
pub const MAX_INTERVALS_PER_ITEM: usize = 50_000;
pub const MAX_NAME_LEN: usize = 256;

/// Longest hold a single reservation may cover (ten years).
pub const MAX_RESERVATION_DAYS: i64 = 3_660;
/// Widest availability query window (twenty years).
pub const MAX_QUERY_DAYS: i64 = 7_320;

pub const MAX_BATCH_SIZE: usize = 1_000;
/// Items per batch availability call.
pub const MAX_BATCH_ITEMS: usize = 10_000;
pub const MAX_PAGE_SIZE: usize = 500;
