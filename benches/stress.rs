use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use slotledger::catalog::CatalogQuery;
use slotledger::config::EngineConfig;
use slotledger::engine::{Engine, EngineError};
use slotledger::model::*;
use slotledger::notify::NotifyHub;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn days(offset: u64, len: u64) -> DateRange {
    let start = base() + Days::new(offset);
    DateRange::new(start, start + Days::new(len))
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

async fn setup(engine: &Engine) -> Vec<ItemId> {
    let capacities = [1, 1, 1, 1, 1, 5, 5, 5, 10, 10];
    let mut items = Vec::new();
    for &units in &capacities {
        let id = Ulid::new();
        engine.create_item(id, None, units).await.unwrap();
        items.push(id);
    }
    println!("  created {} items", items.len());
    items
}

async fn phase1_sequential(engine: &Engine, item: ItemId) {
    let n = 2_000u64;
    let mut latencies = Vec::with_capacity(n as usize);
    let start = Instant::now();
    for i in 0..n {
        let req = ReserveRequest::create(item, Ulid::new(), ReservationKind::Booking, days(i, 0), 1);
        let t = Instant::now();
        engine.reserve(req).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} reservations in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_contended(engine: Arc<Engine>, items: &[ItemId]) {
    let n_tasks = 16;
    let n_per_task = 250;
    let rejected = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        let item = items[t % items.len()];
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                let range = days((j % 60) as u64, 6);
                let req = ReserveRequest::create(item, Ulid::new(), ReservationKind::Proposal, range, 1);
                match engine.reserve(req).await {
                    Ok(_) => {}
                    Err(EngineError::CapacityExceeded { .. }) => {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => eprintln!("reserve error: {e}"),
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} attempts = {total} total in {:.2}s = {ops:.0} ops/sec ({} rejected)",
        elapsed.as_secs_f64(),
        rejected.load(Ordering::Relaxed)
    );
}

async fn phase3_read_under_load(engine: Arc<Engine>, items: &[ItemId]) {
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for (w, &item) in items.iter().enumerate().take(4) {
        let engine = engine.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let me = Ulid::new();
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let req = ReserveRequest::edit(item, me, ReservationKind::Booking, days(w as u64 * 7 + i % 90, 3), 1);
                let _ = engine.reserve(req).await;
                i += 1;
                tokio::task::yield_now().await;
            }
        }));
    }

    let n_readers = 8;
    let reads_per_reader = 2_000;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let engine = engine.clone();
        let reader_items = items.to_vec();
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let item = reader_items[(r + i) % reader_items.len()];
                let query = AvailabilityQuery::new(item, days(0, 180));
                let t = Instant::now();
                let _ = engine.availability(&query).unwrap();
                latencies.push(t.elapsed());
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }
    print_latency("availability query", &mut all_latencies);
}

async fn phase4_catalog(engine: &Engine) {
    let mut latencies = Vec::new();
    for i in 0..200 {
        let query = CatalogQuery::new(days(i % 30, 30));
        let t = Instant::now();
        let _ = engine.list_catalog(&query).unwrap();
        latencies.push(t.elapsed());
    }
    print_latency("catalog page", &mut latencies);
}

#[tokio::main]
async fn main() {
    let config = match std::env::var("SLOTLEDGER_BENCH_JOURNAL") {
        Ok(path) => EngineConfig::with_journal(path),
        Err(_) => EngineConfig::in_memory(),
    };
    println!("=== slotledger stress benchmark ===");
    println!(
        "journal: {}\n",
        config
            .journal_path
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    let engine = Arc::new(Engine::new(config, Arc::new(NotifyHub::new())).expect("open engine"));

    println!("[setup]");
    let items = setup(&engine).await;

    println!("\n[phase 1] sequential reserve throughput");
    phase1_sequential(&engine, items[9]).await;

    println!("\n[phase 2] contended reserve throughput");
    phase2_contended(engine.clone(), &items).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(engine.clone(), &items).await;

    println!("\n[phase 4] catalog listing");
    phase4_catalog(&engine).await;

    println!("\n=== benchmark complete ===");
}
