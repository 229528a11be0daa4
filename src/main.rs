use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use slotledger::compactor::spawn_compactor;

use slotledger::config::EngineConfig;
use slotledger::engine::Engine;
use slotledger::notify::NotifyHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    slotledger::observability::init(config.metrics_port)?;

    info!(
        "journal: {}",
        config
            .journal_path
            .as_ref()
            .map_or("disabled (in-memory)".to_string(), |p| p.display().to_string())
    );
    info!("  lock_timeout: {:?}", config.lock_timeout);
    info!("  compact_threshold: {}", config.compact_threshold);

    let engine = Arc::new(Engine::new(config, Arc::new(NotifyHub::new()))?);

    match std::env::args().nth(1).as_deref() {
        Some("compact") => {
            let kept = engine.compact_journal().await?;
            println!("{}", json!({ "compacted": true, "events": kept }));
            return Ok(());
        }
        Some("serve") => {
            serve(engine).await;
            return Ok(());
        }
        _ => {}
    }

    let today = chrono::Local::now().date_naive();
    let mut items = Vec::new();
    for item in engine.list_items() {
        let occupancy = engine.occupancy(item.id, today)?;
        let holds = engine.holds(item.id)?.len();
        items.push(json!({
            "id": item.id.to_string(),
            "name": item.name,
            "total_units": item.total_units,
            "is_active": item.is_active,
            "is_under_maintenance": item.is_under_maintenance,
            "occupancy": occupancy.label(),
            "holds": holds,
        }));
    }
    let summary = json!({
        "date": today.to_string(),
        "items": items,
        "journal_appends_since_compact": engine.appends_since_compact().await,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Keep the engine open with its compactor running until SIGTERM or ctrl-c.
async fn serve(engine: Arc<Engine>) {
    let compactor = spawn_compactor(&engine);
    info!(
        "serving {} items, compactor {}",
        engine.list_items().len(),
        if compactor.is_some() { "running" } else { "disabled" }
    );

    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutdown signal received");
    if let Some(handle) = compactor {
        handle.abort();
    }
}
