mod admission;
mod error;
mod mutations;
mod queries;
mod store;

pub use error::EngineError;
pub use store::SlotTable;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::info;

use crate::model::*;
use crate::wal::Wal;

pub type SharedTimeState = Arc<RwLock<TimeState>>;
pub(super) type TimeWriteGuard = OwnedRwLockWriteGuard<TimeState>;

/// Result of an admission attempt. Rejections are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(Reservation),
    /// No slot at that time, or the slot's max party size is too small.
    NoInventoryForPartySize,
    InventoryAtCapacity,
    /// A reservation with the same `(email, date, time)` already exists.
    ConstraintViolated,
}

impl Admission {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Admission::Admitted(_) => "admitted",
            Admission::NoInventoryForPartySize => "no_inventory_for_party_size",
            Admission::InventoryAtCapacity => "inventory_at_capacity",
            Admission::ConstraintViolated => "constraint_violated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Some reservation falls on or after the requested date; nothing changed.
    ReservationsExist,
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush what we have first, then handle the non-append command.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

pub struct Engine {
    pub(super) slots: SlotTable,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) scope: CapacityScope,
}

/// Apply the part of `event` that concerns `ts.time` (caller holds the lock).
pub(super) fn apply_to_time(ts: &mut TimeState, event: &Event) {
    match event {
        Event::SlotsDefined {
            times,
            max_party_size,
            max_reservations,
        } => {
            if times.contains(&ts.time) {
                ts.slot = Some(Slot {
                    time: ts.time,
                    max_party_size: *max_party_size,
                    max_reservations: *max_reservations,
                });
            }
        }
        Event::ReservationAdmitted {
            id,
            name,
            email,
            party_size,
            date,
            time,
        } => {
            if *time != ts.time {
                return;
            }
            let reservation = Reservation {
                id: *id,
                name: name.clone(),
                email: email.clone(),
                party_size: *party_size,
                date: *date,
                time: *time,
            };
            // Duplicates are filtered before logging; a replayed one is dropped.
            if let Err(dup) = ts.insert_reservation(reservation) {
                tracing::warn!("dropping duplicate reservation {} for {} at {} {}", dup.id, dup.email, dup.date, dup.time);
            }
        }
    }
}

/// Write event to WAL via the background group-commit writer.
async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}

/// Quarter-hours an event touches.
fn event_times(event: &Event) -> Vec<SlotTime> {
    match event {
        Event::SlotsDefined { times, .. } => times.clone(),
        Event::ReservationAdmitted { time, .. } => vec![*time],
    }
}

impl Engine {
    /// Open the engine on `wal_path`, replaying any existing log. Must run inside a tokio runtime.
    pub fn new(wal_path: PathBuf, scope: CapacityScope) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        // Replay into plain states before they are shared, so no locking is needed.
        let mut states = SlotTable::empty_states();
        for event in &events {
            for time in event_times(event) {
                apply_to_time(&mut states[time.index()], event);
            }
        }
        if !events.is_empty() {
            info!("replayed {} WAL events from {}", events.len(), wal_path.display());
        }

        Ok(Self {
            slots: SlotTable::new(states),
            wal_tx,
            scope,
        })
    }

    pub fn capacity_scope(&self) -> CapacityScope {
        self.scope
    }

    /// WAL-append, then apply to every held guard. Nothing is applied if the append fails.
    ///
    /// Runs on its own task that owns the guards, so a caller dropped mid-await
    /// cannot leave a durable record unapplied: the task finishes and releases
    /// the locks either way.
    pub(super) async fn persist_and_apply(
        &self,
        mut guards: Vec<TimeWriteGuard>,
        event: Event,
    ) -> Result<(), EngineError> {
        let wal_tx = self.wal_tx.clone();
        let task = tokio::spawn(async move {
            wal_append(&wal_tx, &event).await?;
            for guard in guards.iter_mut() {
                apply_to_time(guard, &event);
            }
            Ok::<(), EngineError>(())
        });
        task.await
            .map_err(|e| EngineError::WalError(format!("persist task failed: {e}")))?
    }
}
