use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;

pub const CHECK_EVERY: Duration = Duration::from_secs(5);

/// Start the compactor for a journalled engine. Returns `None` when there is
/// no journal or compaction is disabled (threshold 0).
pub fn spawn_compactor(engine: &Arc<Engine>) -> Option<JoinHandle<()>> {
    let threshold = engine.config().compact_threshold;
    if engine.config().journal_path.is_none() || threshold == 0 {
        return None;
    }
    let compactor_engine = engine.clone();
    Some(tokio::spawn(async move {
        run_compactor(compactor_engine, threshold).await;
    }))
}

/// Background task that compacts the journal once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_EVERY);
    loop {
        interval.tick().await;
        if compact_if_due(&engine, threshold).await {
            debug!("compactor pass done");
        }
    }
}

/// One compactor pass. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appended = engine.appends_since_compact().await;
    if threshold == 0 || appended < threshold {
        return false;
    }
    match engine.compact_journal().await {
        Ok(events) => {
            info!("compacted journal after {appended} appends ({events} events kept)");
            true
        }
        Err(e) => {
            warn!("journal compaction failed: {e}");
            false
        }
    }
}
