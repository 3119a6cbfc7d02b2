mod error;
mod mutations;
mod params;
mod queries;
mod slots;
mod validation;
#[cfg(test)]
mod tests;

pub use error::{EngineError, ErrorKind};
pub use params::{
    BookingRequest, SlotParams, SlotQuery, parse_date, parse_minute_of_day, parse_timestamp,
};
pub use slots::compute_slots;

use std::sync::Arc;

use crate::model::Catalog;
use crate::store::{Inventory, Ledger};

/// The booking back end: slot search, booking and inventory over a pair of
/// storage seams. Cheap to share behind an `Arc`; all state lives in the
/// stores.
pub struct Engine {
    inventory: Arc<dyn Inventory>,
    ledger: Arc<dyn Ledger>,
    catalog: Catalog,
}

impl Engine {
    pub fn new(inventory: Arc<dyn Inventory>, ledger: Arc<dyn Ledger>, catalog: Catalog) -> Self {
        Self {
            inventory,
            ledger,
            catalog,
        }
    }

    /// Engine over a single store that serves as both inventory and ledger.
    pub fn from_store<S>(store: Arc<S>, catalog: Catalog) -> Self
    where
        S: Inventory + Ledger + 'static,
    {
        Self::new(store.clone(), store, catalog)
    }
}
