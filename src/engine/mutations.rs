use tracing::{info, warn};

use crate::model::*;
use crate::observability::{BOOKINGS_TOTAL, error_label};

use super::validation::{validate_reservation, validate_station};
use super::{BookingRequest, Engine, EngineError};

impl Engine {
    /// Validate a kiosk booking and commit it. Every requested station must
    /// exist, be online and be free for the whole span; the freedom check
    /// and the append happen atomically in the ledger.
    pub async fn book(&self, request: BookingRequest) -> Result<Reservation, EngineError> {
        let result = self.try_book(request).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => error_label(e.kind()),
        };
        metrics::counter!(BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn try_book(&self, request: BookingRequest) -> Result<Reservation, EngineError> {
        let new = NewReservation::try_from(request)?;
        validate_reservation(&new)?;

        for &id in &new.stations {
            match self.inventory.get_station(id).await? {
                None => return Err(EngineError::UnknownStation(id)),
                Some(station) if !station.online => return Err(EngineError::StationOffline(id)),
                Some(_) => {}
            }
        }

        let reservation = match self.ledger.create_exclusive(new).await {
            Ok(r) => r,
            Err(e) => {
                let e = EngineError::from(e);
                if let EngineError::Conflict {
                    station,
                    reservation,
                } = &e
                {
                    warn!(station, reservation, "booking rejected, station already held");
                }
                return Err(e);
            }
        };
        info!(
            id = reservation.id,
            stations = ?reservation.stations,
            from = %reservation.span.start,
            to = %reservation.span.end,
            "booking confirmed"
        );
        Ok(reservation)
    }

    pub async fn add_station(&self, new: NewStation) -> Result<Station, EngineError> {
        validate_station(&new)?;
        let station = self.inventory.add_station(new).await?;
        info!(id = station.id, name = %station.name, "station added");
        Ok(station)
    }

    pub async fn set_station_online(
        &self,
        id: StationId,
        online: bool,
    ) -> Result<Station, EngineError> {
        let station = self.inventory.set_online(id, online).await?;
        info!(id, online, "station status changed");
        Ok(station)
    }
}
