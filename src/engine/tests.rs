use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;

use super::*;
use crate::model::*;
use crate::seed::{default_catalog, default_stations};
use crate::store::{MemoryStore, WalStore};

fn club() -> Engine {
    let store = Arc::new(MemoryStore::with_stations(default_stations()));
    Engine::from_store(store, default_catalog())
}

fn rigs(n: u32) -> Engine {
    let stations = (1..=n).map(|i| NewStation {
        name: format!("Rig {i}"),
        group_id: Some(1),
        group_name: Some("Main hall".into()),
        online: true,
    });
    Engine::from_store(Arc::new(MemoryStore::with_stations(stations)), default_catalog())
}

fn request(hosts: &[StationId], from: &str, to: &str) -> BookingRequest {
    BookingRequest {
        hosts: hosts.to_vec(),
        from: from.into(),
        to: to.into(),
        comment: None,
        client_phone: None,
        client_name: None,
    }
}

fn slot_params(date: &str, start: &str, end: &str) -> SlotParams {
    SlotParams {
        date: Some(date.into()),
        start: Some(start.into()),
        end: Some(end.into()),
        ..SlotParams::default()
    }
}

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("pitbox_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

// ── Queries ──────────────────────────────────────────────

#[tokio::test]
async fn hosts_listing_flags() {
    let engine = club();

    let online = engine.list_hosts(false, false).await.unwrap();
    assert_eq!(online.len(), 13);
    assert!(online.iter().all(|s| s.online));

    let all = engine.list_hosts(true, false).await.unwrap();
    assert_eq!(all.len(), 15);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let groups = engine.list_hosts(true, true).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].group_id, Some(1));
    assert_eq!(groups[1].group_id, Some(2));
    assert_eq!(groups[1].name, "VIP Rig 1");
}

#[tokio::test]
async fn halls_summary() {
    let halls = club().halls().await.unwrap();
    assert_eq!(halls.len(), 2);
    assert_eq!((halls[0].capacity, halls[0].available), (10, 9));
    assert_eq!((halls[1].capacity, halls[1].available), (5, 4));
    assert_eq!(halls[1].group_name.as_deref(), Some("VIP зал"));
}

#[tokio::test]
async fn default_day_over_ten_rigs() {
    let engine = rigs(10);
    let slots = engine
        .slots(SlotParams {
            date: Some("2024-06-01".into()),
            ..SlotParams::default()
        })
        .await
        .unwrap();
    assert_eq!(slots.len(), 23);
    assert_eq!(slots[0].available, 10);
    assert_eq!(slots[22].start.format("%H:%M").to_string(), "23:00");
}

#[tokio::test]
async fn slots_require_date() {
    let err = club().slots(SlotParams::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::MissingDate));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn seeded_club_counts_only_online() {
    let slots = club()
        .slots(slot_params("2024-06-01", "18:00", "19:00"))
        .await
        .unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].available, 13);
}

#[tokio::test]
async fn repeated_slot_queries_agree() {
    let engine = rigs(6);
    engine
        .book(request(&[1, 2], "2024-06-01 13:00:00", "2024-06-01 15:00:00"))
        .await
        .unwrap();
    engine
        .book(request(&[2, 5], "2024-06-01 20:30:00", "2024-06-01 22:00:00"))
        .await
        .unwrap();

    let query = SlotQuery::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 12 * 60, 0, 90, 15, 5)
        .unwrap();
    let first = engine.available_slots(&query).await.unwrap();
    let second = engine.available_slots(&query).await.unwrap();
    assert!(!first.is_empty());
    // Candidates touching either booking fall below the count and are left out.
    assert!(first.iter().all(|s| s.available == 6));
    assert_eq!(first, second);
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn booking_reduces_availability() {
    let engine = rigs(10);
    let booked = engine
        .book(request(&[1, 2], "2024-06-01 10:00:00", "2024-06-01 11:00:00"))
        .await
        .unwrap();
    assert_eq!(booked.id, 1);
    assert_eq!(booked.status, ReservationStatus::Confirmed);

    let slots = engine
        .slots(slot_params("2024-06-01", "09:00", "12:00"))
        .await
        .unwrap();
    let available: Vec<u32> = slots.iter().map(|s| s.available).collect();
    assert_eq!(available, vec![10, 8, 8, 8, 10]);

    assert_eq!(engine.get_reservation(1).await.unwrap(), booked);
}

#[tokio::test]
async fn overlapping_booking_conflicts() {
    let engine = rigs(4);
    engine
        .book(request(&[1, 2], "2024-06-01T18:00:00", "2024-06-01T20:00:00"))
        .await
        .unwrap();

    let err = engine
        .book(request(&[3, 2], "2024-06-01T19:00:00", "2024-06-01T21:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { station: 2, reservation: 1 }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Back to back is not an overlap.
    engine
        .book(request(&[1, 2], "2024-06-01T20:00:00", "2024-06-01T21:00:00"))
        .await
        .unwrap();
    assert_eq!(engine.list_reservations(None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn booking_rejects_unknown_and_offline_stations() {
    let engine = club();
    let err = engine
        .book(request(&[99], "2024-06-01 18:00:00", "2024-06-01 19:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownStation(99)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Rig 6 is out of service in the seed.
    let err = engine
        .book(request(&[5, 6], "2024-06-01 18:00:00", "2024-06-01 19:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StationOffline(6)));

    assert!(engine.list_reservations(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn booking_rejects_malformed_input() {
    let engine = rigs(2);
    let cases = [
        request(&[], "2024-06-01 18:00:00", "2024-06-01 19:00:00"),
        request(&[1, 1], "2024-06-01 18:00:00", "2024-06-01 19:00:00"),
        request(&[1], "2024-06-01 19:00:00", "2024-06-01 18:00:00"),
        request(&[1], "yesterday", "2024-06-01 18:00:00"),
        request(&[1], "2024-06-01 18:00:00", "2024-06-03 18:00:00"),
    ];
    for case in cases {
        let err = engine.book(case.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{case:?} gave {err}");
    }
}

#[tokio::test]
async fn concurrent_double_booking_has_one_winner() {
    let engine = Arc::new(rigs(3));
    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            // Different windows, all overlapping 18:30-19:00 on station 2.
            let from = format!("2024-06-01 18:{:02}:00", i);
            engine.book(request(&[2], &from, "2024-06-01 19:00:00")).await
        }));
    }

    let mut confirmed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(EngineError::Conflict { station: 2, .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test]
async fn booking_missing_reservation_is_not_found() {
    let err = club().get_reservation(7).await.unwrap_err();
    assert!(matches!(err, EngineError::ReservationNotFound(7)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reservation_listing_by_range() {
    let engine = rigs(3);
    for (from, to) in [
        ("2024-06-01 10:00", "2024-06-01 11:00"),
        ("2024-06-01 23:00", "2024-06-02 01:00"),
        ("2024-06-02 12:00", "2024-06-02 13:00"),
    ] {
        engine.book(request(&[1], from, to)).await.unwrap();
    }
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let from = day.and_hms_opt(0, 0, 0).unwrap();
    let to = day.and_hms_opt(23, 59, 59).unwrap();

    let on_day = engine.list_reservations(Some(from), Some(to)).await.unwrap();
    assert_eq!(on_day.len(), 1);
    let since = engine.list_reservations(Some(from), None).await.unwrap();
    assert_eq!(since.len(), 3);
}

// ── Inventory ────────────────────────────────────────────

#[tokio::test]
async fn station_going_offline_frees_nothing_and_counts_nothing() {
    let engine = rigs(3);
    engine
        .book(request(&[3], "2024-06-01 12:00:00", "2024-06-01 13:00:00"))
        .await
        .unwrap();
    let before = engine.slots(slot_params("2024-06-01", "12:00", "13:00")).await.unwrap();
    assert_eq!(before[0].available, 2);

    engine.set_station_online(3, false).await.unwrap();
    let after = engine.slots(slot_params("2024-06-01", "12:00", "13:00")).await.unwrap();
    assert_eq!(after[0].available, 2);

    engine.set_station_online(1, false).await.unwrap();
    let after = engine.slots(slot_params("2024-06-01", "12:00", "13:00")).await.unwrap();
    assert_eq!(after[0].available, 1);

    let err = engine.set_station_online(42, true).await.unwrap_err();
    assert!(matches!(err, EngineError::StationNotFound(42)));
}

#[tokio::test]
async fn added_station_is_bookable() {
    let engine = club();
    let station = engine
        .add_station(NewStation {
            name: "VIP Rig 6".into(),
            group_id: Some(2),
            group_name: Some("VIP зал".into()),
            online: true,
        })
        .await
        .unwrap();
    assert_eq!(station.id, 16);
    engine
        .book(request(&[16], "2024-06-01 18:00:00", "2024-06-01 19:00:00"))
        .await
        .unwrap();

    let err = engine
        .add_station(NewStation {
            name: String::new(),
            group_id: None,
            group_name: None,
            online: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyName));
}

// ── Durable backend ──────────────────────────────────────

#[tokio::test]
async fn wal_backed_engine_survives_restart() {
    let path = test_wal_path("restart.wal");
    {
        let store = Arc::new(WalStore::open(&path, 1000).await.unwrap());
        store.seed_if_empty(default_stations()).await.unwrap();
        let engine = Engine::from_store(store, default_catalog());
        engine
            .book(request(&[1, 2], "2024-06-01 18:00:00", "2024-06-01 20:00:00"))
            .await
            .unwrap();
        engine.set_station_online(6, true).await.unwrap();
    }

    let store = Arc::new(WalStore::open(&path, 1000).await.unwrap());
    assert_eq!(store.seed_if_empty(default_stations()).await.unwrap(), 0);
    let engine = Engine::from_store(store, default_catalog());

    let slots = engine
        .slots(slot_params("2024-06-01", "18:00", "20:00"))
        .await
        .unwrap();
    // 14 online after the status change, two held.
    assert!(slots.iter().all(|s| s.available == 12));

    let err = engine
        .book(request(&[2], "2024-06-01 19:00:00", "2024-06-01 21:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
}

#[tokio::test]
async fn compaction_on_open_keeps_state() {
    let path = test_wal_path("compact.wal");
    {
        let store = Arc::new(WalStore::open(&path, 1000).await.unwrap());
        store.seed_if_empty(default_stations()).await.unwrap();
        let engine = Engine::from_store(store, default_catalog());
        for _ in 0..5 {
            engine.set_station_online(1, false).await.unwrap();
            engine.set_station_online(1, true).await.unwrap();
        }
        engine
            .book(request(&[1], "2024-06-01 18:00:00", "2024-06-01 19:00:00"))
            .await
            .unwrap();
    }

    // 15 + 10 + 1 events on disk; a threshold of 20 compacts them on open.
    let store = Arc::new(WalStore::open(&path, 20).await.unwrap());
    drop(store);
    let store = Arc::new(WalStore::open(&path, 1000).await.unwrap());
    let engine = Engine::from_store(store, default_catalog());
    assert_eq!(engine.list_hosts(true, false).await.unwrap().len(), 15);
    assert!(engine.list_hosts(false, false).await.unwrap().iter().any(|s| s.id == 1));
    assert_eq!(engine.list_reservations(None, None).await.unwrap().len(), 1);
    assert_eq!(crate::wal::Wal::replay(&path).unwrap().len(), 16);
}
