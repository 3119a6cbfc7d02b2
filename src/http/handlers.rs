use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::engine::{
    BookingRequest, Engine, EngineError, SlotParams, parse_date, parse_timestamp,
};
use crate::model::*;

use super::error::{ApiError, BookingError};

type Shared = State<Arc<Engine>>;

#[derive(Debug, Serialize)]
pub struct Health {
    ok: bool,
}

pub async fn healthz() -> Json<Health> {
    Json(Health { ok: true })
}

pub async fn catalog(State(engine): Shared) -> Json<Catalog> {
    Json(engine.catalog().clone())
}

/// Flags are on only for the literal `true`.
#[derive(Debug, Default, Deserialize)]
pub struct HostsParams {
    include_offline: Option<String>,
    only_groups: Option<String>,
}

fn flag(raw: &Option<String>) -> bool {
    raw.as_deref() == Some("true")
}

pub async fn list_hosts(
    State(engine): Shared,
    params: Result<Query<HostsParams>, QueryRejection>,
) -> Result<Json<Vec<Station>>, ApiError> {
    let Query(params) = params?;
    let hosts = engine
        .list_hosts(flag(&params.include_offline), flag(&params.only_groups))
        .await?;
    Ok(Json(hosts))
}

pub async fn add_host(
    State(engine): Shared,
    body: Result<Json<NewStation>, JsonRejection>,
) -> Result<(StatusCode, Json<Station>), ApiError> {
    let Json(new) = body?;
    let station = engine.add_station(new).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

#[derive(Debug, Deserialize)]
pub struct HostStatus {
    online: bool,
}

pub async fn set_host_status(
    State(engine): Shared,
    id: Result<Path<StationId>, PathRejection>,
    body: Result<Json<HostStatus>, JsonRejection>,
) -> Result<Json<Station>, ApiError> {
    let Path(id) = id?;
    let Json(status) = body?;
    Ok(Json(engine.set_station_online(id, status.online).await?))
}

pub async fn halls(State(engine): Shared) -> Result<Json<Vec<Hall>>, ApiError> {
    Ok(Json(engine.halls().await?))
}

pub async fn slots(
    State(engine): Shared,
    params: Result<Query<SlotParams>, QueryRejection>,
) -> Result<Json<Vec<Slot>>, ApiError> {
    let Query(params) = params?;
    Ok(Json(engine.slots(params).await?))
}

// ── Bookings ─────────────────────────────────────────────

/// What the kiosk gets back after booking.
#[derive(Debug, Serialize)]
pub struct BookingSummary {
    id: ReservationId,
    hosts: Vec<StationId>,
    from: NaiveDateTime,
    to: NaiveDateTime,
    status: ReservationStatus,
}

impl From<Reservation> for BookingSummary {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            hosts: r.stations,
            from: r.span.start,
            to: r.span.end,
            status: r.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Booked {
    ok: bool,
    booking: BookingSummary,
}

pub async fn book(
    State(engine): Shared,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<Booked>, BookingError> {
    let Json(request) = body?;
    let reservation = engine.book(request).await?;
    Ok(Json(Booked {
        ok: true,
        booking: reservation.into(),
    }))
}

/// Full reservation record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    id: ReservationId,
    hosts: Vec<StationId>,
    from: NaiveDateTime,
    to: NaiveDateTime,
    status: ReservationStatus,
    comment: Option<String>,
    client_phone: Option<String>,
    client_name: Option<String>,
    created_at: NaiveDateTime,
}

impl From<Reservation> for BookingDetail {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            hosts: r.stations,
            from: r.span.start,
            to: r.span.end,
            status: r.status,
            comment: r.comment,
            client_phone: r.client_phone,
            client_name: r.client_name,
            created_at: r.created_at,
        }
    }
}

pub async fn get_booking(
    State(engine): Shared,
    id: Result<Path<ReservationId>, PathRejection>,
) -> Result<Json<BookingDetail>, ApiError> {
    let Path(id) = id?;
    Ok(Json(engine.get_reservation(id).await?.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingRange {
    from: Option<String>,
    to: Option<String>,
}

/// A bare date means the start of that day.
fn range_bound(raw: Option<&str>) -> Result<Option<NaiveDateTime>, EngineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match parse_timestamp(raw) {
        Ok(t) => Ok(Some(t)),
        Err(e) => match parse_date(raw) {
            Ok(d) => Ok(Some(d.and_time(chrono::NaiveTime::default()))),
            Err(_) => Err(e),
        },
    }
}

pub async fn list_bookings(
    State(engine): Shared,
    params: Result<Query<BookingRange>, QueryRejection>,
) -> Result<Json<Vec<BookingDetail>>, ApiError> {
    let Query(range) = params?;
    let from = range_bound(range.from.as_deref())?;
    let to = range_bound(range.to.as_deref())?;
    let reservations = engine.list_reservations(from, to).await?;
    Ok(Json(reservations.into_iter().map(Into::into).collect()))
}
