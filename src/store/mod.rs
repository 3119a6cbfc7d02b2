//! Storage seam for the inventory and the reservation ledger.
//!
//! The engine only talks to [`Inventory`] and [`Ledger`]; [`MemoryStore`]
//! keeps everything in process, [`WalStore`] layers a write-ahead log on top
//! of it so state survives restarts.

mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("station {0} not found")]
    UnknownStation(StationId),
    #[error("station {station} is already booked by reservation {reservation}")]
    Conflict {
        station: StationId,
        reservation: ReservationId,
    },
    #[error("inventory is full")]
    InventoryFull,
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAL error: {0}")]
    Wal(String),
}

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Stations ordered by id; offline ones only when asked for.
    async fn list_stations(&self, include_offline: bool) -> Result<Vec<Station>, StoreError>;

    async fn get_station(&self, id: StationId) -> Result<Option<Station>, StoreError>;

    async fn add_station(&self, new: NewStation) -> Result<Station, StoreError>;

    async fn set_online(&self, id: StationId, online: bool) -> Result<Station, StoreError>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append with a fresh id. No overlap check.
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    /// Check that none of the requested stations is held during the
    /// requested span and append, as one atomic write. Fails with
    /// [`StoreError::Conflict`] otherwise.
    async fn create_exclusive(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    /// Reservations overlapping `span`, ordered by start.
    async fn list_overlapping(&self, span: Span) -> Result<Vec<Reservation>, StoreError>;

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// Reservations starting at or after `from` and ending at or before `to`.
    async fn list(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Reservation>, StoreError>;
}

pub(crate) fn within(r: &Reservation, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> bool {
    from.is_none_or(|f| r.span.start >= f) && to.is_none_or(|t| r.span.end <= t)
}
