use thiserror::Error;

use crate::model::{ReservationId, StationId};
use crate::store::StoreError;

/// How a caller should treat an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input. Not retryable as is.
    Validation,
    NotFound,
    /// A requested station is already held for an overlapping time.
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Date parameter is required")]
    MissingDate,
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("invalid timestamp {0:?}, expected YYYY-MM-DD HH:MM:SS or ISO 8601")]
    InvalidTimestamp(String),
    #[error("{field} must be a positive integer, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("at least one station is required")]
    NoStations,
    #[error("station {0} is listed more than once")]
    DuplicateStation(StationId),
    #[error("station {0} does not exist")]
    UnknownStation(StationId),
    #[error("station {0} is offline")]
    StationOffline(StationId),
    #[error("booking must end after it starts")]
    EmptySpan,
    #[error("station name must not be empty")]
    EmptyName,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("station {station} is already booked by reservation {reservation} for an overlapping time")]
    Conflict {
        station: StationId,
        reservation: ReservationId,
    },
    #[error("station {0} not found")]
    StationNotFound(StationId),
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),
    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::StationNotFound(_) | Self::ReservationNotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownStation(id) => Self::StationNotFound(id),
            StoreError::Conflict {
                station,
                reservation,
            } => Self::Conflict {
                station,
                reservation,
            },
            StoreError::InventoryFull => Self::LimitExceeded("too many stations"),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let conflict: EngineError = StoreError::Conflict {
            station: 2,
            reservation: 7,
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(
            conflict.to_string(),
            "station 2 is already booked by reservation 7 for an overlapping time"
        );

        let missing: EngineError = StoreError::UnknownStation(4).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let io: EngineError = StoreError::Wal("WAL writer shut down".into()).into();
        assert_eq!(io.kind(), ErrorKind::Internal);
    }

    #[test]
    fn input_errors_are_validation() {
        assert_eq!(EngineError::MissingDate.kind(), ErrorKind::Validation);
        assert_eq!(EngineError::MissingDate.to_string(), "Date parameter is required");
        assert_eq!(EngineError::StationOffline(3).kind(), ErrorKind::Validation);
        assert_eq!(
            EngineError::InvalidNumber {
                field: "step_minutes",
                value: "0".into()
            }
            .to_string(),
            "step_minutes must be a positive integer, got \"0\""
        );
    }
}
