use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::model::*;
use crate::observability::{SLOTS_RETURNED, SLOT_QUERY_DURATION_SECONDS};

use super::{Engine, EngineError, SlotParams, SlotQuery, compute_slots};

impl Engine {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Stations ordered by id. With `only_groups`, one station per hall
    /// (the lowest id) and no ungrouped stations.
    pub async fn list_hosts(
        &self,
        include_offline: bool,
        only_groups: bool,
    ) -> Result<Vec<Station>, EngineError> {
        let stations = self.inventory.list_stations(include_offline).await?;
        if only_groups {
            return Ok(group_representatives(&stations));
        }
        Ok(stations)
    }

    pub async fn halls(&self) -> Result<Vec<Hall>, EngineError> {
        let stations = self.inventory.list_stations(true).await?;
        Ok(halls(&stations))
    }

    /// Parse a raw query string and compute its slots.
    pub async fn slots(&self, params: SlotParams) -> Result<Vec<Slot>, EngineError> {
        let query = SlotQuery::try_from(params)?;
        self.available_slots(&query).await
    }

    pub async fn available_slots(&self, query: &SlotQuery) -> Result<Vec<Slot>, EngineError> {
        let started = Instant::now();
        let window = query.window();
        // Overlap, not containment: a booking that started the evening
        // before still holds its station at the start of the window.
        let reservations = self.ledger.list_overlapping(window).await?;
        let stations = self.inventory.list_stations(true).await?;

        let slots = compute_slots(query, &stations, &reservations);

        metrics::histogram!(SLOT_QUERY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        metrics::histogram!(SLOTS_RETURNED).record(slots.len() as f64);
        debug!(
            date = %query.date,
            start = query.start_minute,
            end = query.effective_end_minute(),
            reservations = reservations.len(),
            slots = slots.len(),
            "computed slots"
        );
        Ok(slots)
    }

    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.ledger
            .get(id)
            .await?
            .ok_or(EngineError::ReservationNotFound(id))
    }

    pub async fn list_reservations(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<Reservation>, EngineError> {
        Ok(self.ledger.list(from, to).await?)
    }
}
