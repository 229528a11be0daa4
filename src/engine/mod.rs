mod availability;
mod conflict;
mod error;
mod mutations;
mod occupancy;
mod queries;
mod store;

pub use availability::{availability_profile, compute_availability, peak_committed};
pub use error::EngineError;
pub use occupancy::{OccupancyState, classify};
pub use store::{InMemoryStore, IntervalStore};

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::journal::Journal;
use crate::model::*;
use crate::notify::{ChangeEvent, NotifyHub};

pub type SharedItemState = Arc<RwLock<ItemState>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Control(JournalControl),
}

/// Commands that run between append groups, never inside one.
pub(super) enum JournalControl {
    Rewrite {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the journal. Every append that is already queued when the first one
/// arrives joins its batch, and the whole batch shares one fsync.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            JournalCommand::Append { event, response } => (event, response),
            JournalCommand::Control(control) => {
                handle_control(&mut journal, control);
                continue;
            }
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                JournalCommand::Append { event, response } => batch.push((event, response)),
                JournalCommand::Control(control) => {
                    deferred = Some(control);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        // All or nothing: a failed group is truncated away, so every caller sees the same outcome.
        let result = journal.append_batch(batch.iter().map(|(event, _)| event));
        metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!("journal append of {} events failed: {e}", batch.len());
        }
        for (_, tx) in batch {
            let _ = tx.send(match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            });
        }

        if let Some(control) = deferred {
            handle_control(&mut journal, control);
        }
    }
    debug!("journal writer stopped");
}

fn handle_control(journal: &mut Journal, control: JournalControl) {
    match control {
        JournalControl::Rewrite { events, response } => {
            let result = journal.rewrite(&events);
            if result.is_ok() {
                debug!("journal {} rewritten with {} events", journal.path().display(), events.len());
            }
            let _ = response.send(result);
        }
        JournalControl::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
    }
}

pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) journal_tx: Option<mpsc::Sender<JournalCommand>>,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
    /// Serialises item creation against compaction.
    pub(super) admin: Mutex<()>,
}

impl Engine {
    /// Build an engine, replaying the journal if one is configured.
    /// With a journal this must run inside a tokio runtime (the writer is spawned).
    pub fn new(config: EngineConfig, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let mut engine = Self {
            store: InMemoryStore::new(),
            journal_tx: None,
            notify,
            config,
            admin: Mutex::new(()),
        };

        if let Some(path) = engine.config.journal_path.clone() {
            let events = Journal::replay(&path)?;
            let replayed = events.len();
            for event in &events {
                engine.replay_event(event);
            }
            let journal = Journal::open(&path)?;
            let (tx, rx) = mpsc::channel(4096);
            tokio::spawn(journal_writer_loop(journal, rx));
            engine.journal_tx = Some(tx);
            info!(
                "journal {} replayed: {replayed} events, {} items",
                path.display(),
                engine.store.item_count()
            );
        }
        metrics::gauge!(crate::observability::ITEMS_ACTIVE).set(engine.store.item_count() as f64);
        Ok(engine)
    }

    pub fn in_memory() -> Self {
        Self {
            store: InMemoryStore::new(),
            journal_tx: None,
            notify: Arc::new(NotifyHub::new()),
            config: EngineConfig::in_memory(),
            admin: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replay runs before anyone else can see the store, so the locks are uncontended.
    /// Never use blocking_write here: replay may run inside an async context.
    fn replay_event(&self, event: &Event) {
        for single in event.expand() {
            self.replay_single(single);
        }
    }

    fn replay_single(&self, event: &Event) {
        match event {
            Event::ItemCreated {
                id,
                name,
                total_units,
            } => {
                let rs = ItemState::new(InventoryItem::new(*id, name.clone(), *total_units));
                let snapshot = rs.snapshot();
                self.store.insert_item(*id, Arc::new(RwLock::new(rs)), snapshot);
            }
            other => {
                if let Some(shared) = other.item_id().and_then(|id| self.store.get_item(&id)) {
                    let mut guard = shared.try_write().expect("replay: uncontended write");
                    self.store.apply_event(&mut guard, other);
                }
            }
        }
    }

    /// Write an event through the group-commit writer. No-op for in-memory engines.
    pub(super) async fn journal_append(&self, event: &Event) -> Result<(), EngineError> {
        let Some(tx) = &self.journal_tx else {
            return Ok(());
        };
        let (response, rx) = oneshot::channel();
        tx.send(JournalCommand::Append {
            event: event.clone(),
            response,
        })
        .await
        .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    /// Journal, then apply and publish. Nothing is applied if the journal write fails.
    pub(super) async fn persist_and_apply(&self, rs: &mut ItemState, event: &Event) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        self.store.apply_event(rs, event);
        Ok(())
    }

    pub(super) fn announce(&self, item_id: ItemId, consumer_id: Option<ConsumerId>, range: Option<DateRange>, availability: Option<AvailabilityResult>) {
        self.notify.send(ChangeEvent {
            item_id,
            consumer_id,
            range,
            availability,
        });
    }

    /// Exclusive scope over one item. Waits at most `bound` (or the configured
    /// fallback); waits indefinitely when neither is set.
    pub(super) async fn lock_item(
        &self,
        item_id: ItemId,
        bound: Option<Duration>,
    ) -> Result<OwnedRwLockWriteGuard<ItemState>, EngineError> {
        let shared = self.store.get_item(&item_id).ok_or(EngineError::NotFound(item_id))?;
        match bound.or(self.config.lock_timeout) {
            Some(limit) => tokio::time::timeout(limit, shared.write_owned())
                .await
                .map_err(|_| {
                    metrics::counter!(crate::observability::LOCK_TIMEOUTS_TOTAL).increment(1);
                    debug!("lock on item {item_id} not acquired within {limit:?}");
                    EngineError::ConcurrentModification(item_id)
                }),
            None => Ok(shared.write_owned().await),
        }
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let Some(tx) = &self.journal_tx else {
            return 0;
        };
        let (response, rx) = oneshot::channel();
        let command = JournalCommand::Control(JournalControl::AppendsSinceCompact { response });
        if tx.send(command).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
