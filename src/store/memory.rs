use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::limits::MAX_STATIONS;
use crate::model::*;

use super::{Inventory, Ledger, StoreError, within};

/// Volatile inventory + ledger. The reservation book sits behind a single
/// write lock so a conflict check and its append cannot interleave with
/// another booking.
pub struct MemoryStore {
    stations: DashMap<StationId, Station>,
    next_station_id: AtomicU32,
    book: RwLock<ReservationBook>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
            next_station_id: AtomicU32::new(1),
            book: RwLock::new(ReservationBook::new()),
        }
    }

    /// Store pre-populated with stations, ids allocated in order from 1.
    pub fn with_stations(seed: impl IntoIterator<Item = NewStation>) -> Self {
        let store = Self::new();
        for new in seed {
            let id = store.next_station_id.fetch_add(1, Ordering::Relaxed);
            store.stations.insert(id, new.into_station(id));
        }
        store
    }

    /// Rebuild state from a replayed event log.
    pub(crate) fn from_events(events: &[Event]) -> Self {
        let mut store = Self::new();
        let mut book = ReservationBook::new();
        for event in events {
            match event {
                Event::ReservationConfirmed { reservation } => book.insert(reservation.clone()),
                other => store.apply_station_event(other),
            }
        }
        store.book = RwLock::new(book);
        store
    }

    // ── Inventory internals ──────────────────────────────────

    pub(crate) fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub(crate) fn allocate_station_id(&self) -> Result<StationId, StoreError> {
        if self.stations.len() >= MAX_STATIONS {
            return Err(StoreError::InventoryFull);
        }
        Ok(self.next_station_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn contains_station(&self, id: StationId) -> bool {
        self.stations.contains_key(&id)
    }

    /// Apply a station event. Reservation events go through the book guard.
    pub(crate) fn apply_station_event(&self, event: &Event) {
        match event {
            Event::StationAdded { station } => {
                self.next_station_id
                    .fetch_max(station.id + 1, Ordering::Relaxed);
                self.stations.insert(station.id, station.clone());
            }
            Event::StationStatusChanged { id, online } => {
                if let Some(mut station) = self.stations.get_mut(id) {
                    station.online = *online;
                }
            }
            Event::ReservationConfirmed { .. } => {}
        }
    }

    fn sorted_stations(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self.stations.iter().map(|e| e.value().clone()).collect();
        stations.sort_by_key(|s| s.id);
        stations
    }

    // ── Ledger internals ─────────────────────────────────────

    pub(crate) async fn book_write(&self) -> RwLockWriteGuard<'_, ReservationBook> {
        self.book.write().await
    }

    pub(crate) async fn reservation_count(&self) -> usize {
        self.book.read().await.len()
    }

    /// Minimal event list that recreates the current state.
    pub(crate) fn snapshot_events(&self, book: &ReservationBook) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .sorted_stations()
            .into_iter()
            .map(|station| Event::StationAdded { station })
            .collect();
        events.extend(book.iter().map(|r| Event::ReservationConfirmed {
            reservation: r.clone(),
        }));
        events
    }
}

#[async_trait]
impl Inventory for MemoryStore {
    async fn list_stations(&self, include_offline: bool) -> Result<Vec<Station>, StoreError> {
        let mut stations = self.sorted_stations();
        if !include_offline {
            stations.retain(|s| s.online);
        }
        Ok(stations)
    }

    async fn get_station(&self, id: StationId) -> Result<Option<Station>, StoreError> {
        Ok(self.stations.get(&id).map(|e| e.value().clone()))
    }

    async fn add_station(&self, new: NewStation) -> Result<Station, StoreError> {
        let id = self.allocate_station_id()?;
        let station = new.into_station(id);
        self.stations.insert(id, station.clone());
        Ok(station)
    }

    async fn set_online(&self, id: StationId, online: bool) -> Result<Station, StoreError> {
        let mut station = self
            .stations
            .get_mut(&id)
            .ok_or(StoreError::UnknownStation(id))?;
        station.online = online;
        Ok(station.clone())
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let mut book = self.book.write().await;
        let id = book.allocate_id();
        let reservation = new.into_reservation(id, local_now());
        book.insert(reservation.clone());
        Ok(reservation)
    }

    async fn create_exclusive(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let mut book = self.book.write().await;
        if let Some((station, reservation)) = book.first_conflict(&new.stations, &new.span) {
            return Err(StoreError::Conflict {
                station,
                reservation,
            });
        }
        let id = book.allocate_id();
        let reservation = new.into_reservation(id, local_now());
        book.insert(reservation.clone());
        Ok(reservation)
    }

    async fn list_overlapping(&self, span: Span) -> Result<Vec<Reservation>, StoreError> {
        let book = self.book.read().await;
        Ok(book.overlapping(&span).cloned().collect())
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.book.read().await.get(id).cloned())
    }

    async fn list(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let book = self.book.read().await;
        Ok(book.iter().filter(|r| within(r, from, to)).cloned().collect())
    }
}
