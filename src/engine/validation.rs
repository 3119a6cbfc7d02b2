use std::collections::HashSet;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Shape checks on a parsed booking that need no store access.
pub(super) fn validate_reservation(new: &NewReservation) -> Result<(), EngineError> {
    if new.stations.is_empty() {
        return Err(EngineError::NoStations);
    }
    if new.stations.len() > MAX_STATIONS_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many stations in one booking"));
    }
    let mut seen = HashSet::with_capacity(new.stations.len());
    if let Some(dup) = new.stations.iter().find(|id| !seen.insert(**id)) {
        return Err(EngineError::DuplicateStation(*dup));
    }
    if new.span.start >= new.span.end {
        return Err(EngineError::EmptySpan);
    }
    if new.span.duration_minutes() > MAX_BOOKING_MINUTES {
        return Err(EngineError::LimitExceeded("booking longer than a day"));
    }
    check_len(&new.comment, MAX_COMMENT_LEN, "comment too long")?;
    check_len(&new.client_name, MAX_CLIENT_NAME_LEN, "client name too long")?;
    check_len(&new.client_phone, MAX_CLIENT_PHONE_LEN, "client phone too long")?;
    Ok(())
}

pub(super) fn validate_station(new: &NewStation) -> Result<(), EngineError> {
    if new.name.trim().is_empty() {
        return Err(EngineError::EmptyName);
    }
    if new.name.chars().count() > MAX_STATION_NAME_LEN {
        return Err(EngineError::LimitExceeded("station name too long"));
    }
    check_len(&new.group_name, MAX_STATION_NAME_LEN, "group name too long")
}

fn check_len(value: &Option<String>, max: usize, what: &'static str) -> Result<(), EngineError> {
    match value {
        Some(v) if v.chars().count() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}
