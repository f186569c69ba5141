use chainpost_core::db::open_db_in_memory;
use chainpost_core::model::delivery::DEFAULT_PICKUP_TTL_MS;
use chainpost_core::model::geo::GeoPoint;
use chainpost_core::model::knot::KnotSubmission;
use chainpost_core::repo::knot_repo::KnotRepository;
use chainpost_core::repo::pickup_repo::PickupRepository;
use chainpost_core::service::display::SqliteDisplayService;
use chainpost_core::service::lifecycle::{KnotInsertOutcome, SqliteLifecycleService};
use rand::rngs::StdRng;
use rand::SeedableRng;

const NOW_MS: i64 = 1_700_000_000_000;

fn point(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng, 20.0)
}

#[test]
fn snapshot_joins_markers_to_their_knot_coordinates() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(51);

    let root = match lifecycle
        .submit_knot(
            &KnotSubmission::origin("root", point(-37.8, 144.9)),
            NOW_MS,
            &mut rng,
        )
        .unwrap()
    {
        KnotInsertOutcome::Inserted(knot) => knot,
        other => panic!("expected insert, got {other:?}"),
    };
    lifecycle
        .submit_knot(
            &KnotSubmission::link("hop", root.id, point(-37.81, 144.95)),
            NOW_MS,
            &mut rng,
        )
        .unwrap();

    let display = SqliteDisplayService::from_conn(&conn, DEFAULT_PICKUP_TTL_MS).unwrap();
    let state = display.snapshot(NOW_MS).unwrap();

    // One path of two points, one marker per knot.
    assert_eq!(state.paths.len(), 1);
    assert_eq!(state.paths[0].len(), 2);
    assert_eq!(state.pickups.len(), 2);

    let root_marker = state
        .pickups
        .iter()
        .find(|m| m.location.lat == -37.8)
        .expect("root marker present");
    assert!(!root_marker.title.is_empty());
}

#[test]
fn snapshot_sweeps_expired_markers_first() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(52);

    let root = match lifecycle
        .submit_knot(
            &KnotSubmission::origin("root", point(0.0, 0.0)),
            NOW_MS,
            &mut rng,
        )
        .unwrap()
    {
        KnotInsertOutcome::Inserted(knot) => knot,
        other => panic!("expected insert, got {other:?}"),
    };
    let marker = lifecycle.pickups().find_by_knot(root.id).unwrap().unwrap();
    lifecycle
        .pickups()
        .set_delivered_time(marker.id, NOW_MS)
        .unwrap();

    let display = SqliteDisplayService::from_conn(&conn, DEFAULT_PICKUP_TTL_MS).unwrap();

    let before = display.snapshot(NOW_MS + DEFAULT_PICKUP_TTL_MS - 1).unwrap();
    assert_eq!(before.pickups.len(), 1);

    let after = display.snapshot(NOW_MS + DEFAULT_PICKUP_TTL_MS).unwrap();
    assert!(after.pickups.is_empty());
    // The chain itself is permanent.
    assert_eq!(after.paths.len(), 1);
}

#[test]
fn unjoinable_markers_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(53);

    let root = match lifecycle
        .submit_knot(
            &KnotSubmission::origin("root", point(0.0, 0.0)),
            NOW_MS,
            &mut rng,
        )
        .unwrap()
    {
        KnotInsertOutcome::Inserted(knot) => knot,
        other => panic!("expected insert, got {other:?}"),
    };
    // Orphan the marker by removing its knot out from under it.
    lifecycle.knots().remove_knot(root.id).unwrap();

    let display = SqliteDisplayService::from_conn(&conn, DEFAULT_PICKUP_TTL_MS).unwrap();
    let state = display.snapshot(NOW_MS).unwrap();
    assert!(state.pickups.is_empty());
    assert!(state.paths.is_empty());
}

#[test]
fn snapshot_serializes_to_the_map_payload_shape() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(54);

    lifecycle
        .submit_knot(
            &KnotSubmission::origin("root", point(1.5, 2.5)),
            NOW_MS,
            &mut rng,
        )
        .unwrap();

    let display = SqliteDisplayService::from_conn(&conn, DEFAULT_PICKUP_TTL_MS).unwrap();
    let state = display.snapshot(NOW_MS).unwrap();

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["paths"][0][0]["lat"], 1.5);
    assert_eq!(json["pickups"][0]["location"]["lng"], 2.5);
    assert!(json["pickups"][0]["title"].is_string());
}
