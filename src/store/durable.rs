use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{info, warn};

use crate::model::*;
use crate::wal::Wal;

use super::{Inventory, Ledger, MemoryStore, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
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
/// 3. Drain all immediately available Appends.
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
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
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

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(compact(wal, &events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => {}
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into
    // the next batch.
    let flush_result = wal.flush_sync();
    match append_err {
        Some(e) => Err(e),
        None => flush_result,
    }
}

fn compact(wal: &mut Wal, events: &[Event]) -> io::Result<()> {
    Wal::write_compact_file(wal.path(), events)?;
    wal.swap_compact_file()
}

/// [`MemoryStore`] whose every mutation is logged and fsynced before it is
/// applied. State is rebuilt from the log on open.
pub struct WalStore {
    inner: MemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Orders station mutations with their log records.
    station_lock: Mutex<()>,
    compact_threshold: u64,
}

impl WalStore {
    /// Replay the log at `path` and start the writer task. The log is
    /// compacted right away when it holds more than `compact_threshold`
    /// records. Must be called inside a tokio runtime.
    pub async fn open(path: &Path, compact_threshold: u64) -> Result<Self, StoreError> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            inner: MemoryStore::from_events(&events),
            wal_tx,
            station_lock: Mutex::new(()),
            compact_threshold,
        };
        info!(
            path = %path.display(),
            events = events.len(),
            stations = store.inner.station_count(),
            reservations = store.inner.reservation_count().await,
            "replayed write-ahead log"
        );

        if events.len() as u64 > compact_threshold {
            store.compact().await?;
        }
        Ok(store)
    }

    /// Add `seed` when the log holds no stations yet. Returns how many
    /// stations were added.
    pub async fn seed_if_empty(&self, seed: Vec<NewStation>) -> Result<usize, StoreError> {
        if self.inner.station_count() > 0 {
            return Ok(0);
        }
        let count = seed.len();
        for new in seed {
            self.add_station(new).await?;
        }
        Ok(count)
    }

    /// Rewrite the log as the minimal event list for the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        // Both locks held so no append can slip between snapshot and swap.
        let _stations = self.station_lock.lock().await;
        let book = self.inner.book_write().await;
        let events = self.inner.snapshot_events(&book);
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))??;
        info!(events = count, "compacted write-ahead log");
        Ok(())
    }

    /// Compact once more than `compact_threshold` records were appended
    /// since the last compaction. Callers must not hold either lock.
    /// Failures are logged, not returned.
    async fn maybe_compact(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return;
        }
        let Ok(appends) = rx.await else { return };
        if appends > self.compact_threshold
            && let Err(e) = self.compact().await
        {
            warn!(error = %e, "write-ahead log compaction failed");
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    async fn append_reservation(
        &self,
        new: NewReservation,
        exclusive: bool,
    ) -> Result<Reservation, StoreError> {
        let mut book = self.inner.book_write().await;
        if exclusive
            && let Some((station, reservation)) = book.first_conflict(&new.stations, &new.span)
        {
            return Err(StoreError::Conflict {
                station,
                reservation,
            });
        }
        let id = book.allocate_id();
        let reservation = new.into_reservation(id, local_now());
        let event = Event::ReservationConfirmed {
            reservation: reservation.clone(),
        };
        self.wal_append(&event).await?;
        book.insert(reservation.clone());
        Ok(reservation)
    }
}

#[async_trait]
impl Inventory for WalStore {
    async fn list_stations(&self, include_offline: bool) -> Result<Vec<Station>, StoreError> {
        self.inner.list_stations(include_offline).await
    }

    async fn get_station(&self, id: StationId) -> Result<Option<Station>, StoreError> {
        self.inner.get_station(id).await
    }

    async fn add_station(&self, new: NewStation) -> Result<Station, StoreError> {
        let guard = self.station_lock.lock().await;
        let station = new.into_station(self.inner.allocate_station_id()?);
        let event = Event::StationAdded {
            station: station.clone(),
        };
        self.wal_append(&event).await?;
        self.inner.apply_station_event(&event);
        drop(guard);
        self.maybe_compact().await;
        Ok(station)
    }

    async fn set_online(&self, id: StationId, online: bool) -> Result<Station, StoreError> {
        let guard = self.station_lock.lock().await;
        if !self.inner.contains_station(id) {
            return Err(StoreError::UnknownStation(id));
        }
        let event = Event::StationStatusChanged { id, online };
        self.wal_append(&event).await?;
        self.inner.apply_station_event(&event);
        drop(guard);
        self.maybe_compact().await;
        self.inner
            .get_station(id)
            .await?
            .ok_or(StoreError::UnknownStation(id))
    }
}

#[async_trait]
impl Ledger for WalStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let reservation = self.append_reservation(new, false).await?;
        self.maybe_compact().await;
        Ok(reservation)
    }

    async fn create_exclusive(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let reservation = self.append_reservation(new, true).await?;
        self.maybe_compact().await;
        Ok(reservation)
    }

    async fn list_overlapping(&self, span: Span) -> Result<Vec<Reservation>, StoreError> {
        self.inner.list_overlapping(span).await
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.inner.list(from, to).await
    }
}
