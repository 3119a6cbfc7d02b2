use std::collections::HashSet;

use crate::model::*;

use super::SlotQuery;

// ── Slot Algorithm ────────────────────────────────────────────────

/// Walk the query window in `step` increments and report every
/// `duration`-long candidate with at least `count` free stations.
///
/// Capacity: the online stations in scope (one hall when the query names a
/// group, the whole club otherwise). Offline stations never count and never
/// block.
/// Occupancy: distinct in-scope stations named by any reservation that
/// overlaps the candidate (half-open, so touching at the edge is free).
///
/// Candidates never run past the resolved window end; the output is in
/// ascending start order.
pub fn compute_slots(
    query: &SlotQuery,
    stations: &[Station],
    reservations: &[Reservation],
) -> Vec<Slot> {
    let scope: HashSet<StationId> = stations
        .iter()
        .filter(|s| s.online && query.group_id.is_none_or(|g| s.group_id == Some(g)))
        .map(|s| s.id)
        .collect();
    let total = scope.len() as u32;
    if total < query.count {
        return Vec::new();
    }

    let mut sorted: Vec<&Reservation> = reservations.iter().collect();
    sorted.sort_by_key(|r| r.span.start);

    let end_minute = query.effective_end_minute();
    let mut slots = Vec::new();
    let mut minute = query.start_minute;

    while minute < end_minute {
        if minute.saturating_add(query.duration_minutes) > end_minute {
            break;
        }
        let candidate = Span::new(
            query.instant(minute),
            query.instant(minute + query.duration_minutes),
        );
        let booked = booked_stations(&sorted, &candidate, &scope);
        let available = total.saturating_sub(booked);
        if available >= query.count {
            slots.push(Slot {
                start: candidate.start,
                end: candidate.end,
                available,
            });
        }
        minute = minute.saturating_add(query.step_minutes);
    }

    slots
}

/// Count distinct in-scope stations held during `candidate`. `sorted` must
/// be ordered by start; anything starting at or after the candidate's end is
/// skipped by binary search.
fn booked_stations(
    sorted: &[&Reservation],
    candidate: &Span,
    scope: &HashSet<StationId>,
) -> u32 {
    let right_bound = sorted.partition_point(|r| r.span.start < candidate.end);
    let held: HashSet<StationId> = sorted[..right_bound]
        .iter()
        .filter(|r| r.span.overlaps(candidate))
        .flat_map(|r| r.stations.iter().copied())
        .filter(|id| scope.contains(id))
        .collect();
    held.len() as u32
}
