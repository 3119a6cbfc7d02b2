use std::collections::{BTreeMap, HashSet};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type StationId = u32;
pub type GroupId = u32;
pub type ReservationId = u64;

/// Wall-clock "now" in the club's naive local time.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Half-open interval `[start, end)` in naive local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A single bookable rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub group_id: Option<GroupId>,
    pub group_name: Option<String>,
    pub online: bool,
}

/// Station as submitted by an administrator or a seed file; the id is
/// allocated by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    pub name: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

impl NewStation {
    pub fn into_station(self, id: StationId) -> Station {
        Station {
            id,
            name: self.name,
            group_id: self.group_id,
            group_name: self.group_name,
            online: self.online,
        }
    }
}

/// Per-hall capacity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hall {
    pub group_id: GroupId,
    pub group_name: Option<String>,
    pub capacity: u32,
    pub available: u32,
}

/// One representative station per distinct group id, in first-seen order.
/// Ungrouped stations are skipped.
pub fn group_representatives(stations: &[Station]) -> Vec<Station> {
    let mut seen = HashSet::new();
    stations
        .iter()
        .filter(|s| s.group_id.is_some_and(|g| seen.insert(g)))
        .cloned()
        .collect()
}

/// Capacity (all stations) and availability (online stations) per group.
pub fn halls(stations: &[Station]) -> Vec<Hall> {
    let mut by_group: BTreeMap<GroupId, Hall> = BTreeMap::new();
    for station in stations {
        let Some(group_id) = station.group_id else { continue };
        let hall = by_group.entry(group_id).or_insert_with(|| Hall {
            group_id,
            group_name: station.group_name.clone(),
            capacity: 0,
            available: 0,
        });
        hall.capacity += 1;
        if station.online {
            hall.available += 1;
        }
    }
    by_group.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
}

/// A committed booking. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    /// Ordered, non-empty, duplicate-free.
    pub stations: Vec<StationId>,
    pub span: Span,
    pub status: ReservationStatus,
    pub comment: Option<String>,
    pub client_phone: Option<String>,
    pub client_name: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A validated booking request, ready for the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub stations: Vec<StationId>,
    pub span: Span,
    pub comment: Option<String>,
    pub client_phone: Option<String>,
    pub client_name: Option<String>,
}

impl NewReservation {
    pub fn into_reservation(self, id: ReservationId, created_at: NaiveDateTime) -> Reservation {
        Reservation {
            id,
            stations: self.stations,
            span: self.span,
            status: ReservationStatus::Confirmed,
            comment: self.comment,
            client_phone: self.client_phone,
            client_name: self.client_name,
            created_at,
        }
    }
}

/// All reservations, sorted by `span.start`, plus the id counter.
#[derive(Debug, Clone, Default)]
pub struct ReservationBook {
    reservations: Vec<Reservation>,
    next_id: ReservationId,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self {
            reservations: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn allocate_id(&mut self) -> ReservationId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Insert maintaining sort order by span.start. Replayed reservations
    /// advance the id counter past their own id.
    pub fn insert(&mut self, reservation: Reservation) {
        self.next_id = self.next_id.max(reservation.id + 1);
        let pos = self
            .reservations
            .partition_point(|r| r.span.start <= reservation.span.start);
        self.reservations.insert(pos, reservation);
    }

    pub fn get(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter()
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    /// First `(station, reservation)` pair that already holds one of
    /// `stations` during `span`.
    pub fn first_conflict(
        &self,
        stations: &[StationId],
        span: &Span,
    ) -> Option<(StationId, ReservationId)> {
        self.overlapping(span).find_map(|r| {
            stations
                .iter()
                .find(|id| r.stations.contains(id))
                .map(|id| (*id, r.id))
        })
    }
}

/// A bookable window with its remaining free-station count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "slot_time")]
    pub start: NaiveDateTime,
    #[serde(with = "slot_time")]
    pub end: NaiveDateTime,
    pub available: u32,
}

/// `YYYY-MM-DD HH:MM:SS`, the format the kiosk renders slots in.
pub mod slot_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Club information shown on the kiosk home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub source: String,
    pub name: String,
    pub address: String,
    pub currency: String,
    pub services: Vec<String>,
}

/// The event types, flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StationAdded { station: Station },
    StationStatusChanged { id: StationId, online: bool },
    ReservationConfirmed { reservation: Reservation },
}
