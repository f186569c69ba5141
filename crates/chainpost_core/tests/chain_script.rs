use chainpost_core::chain::reconstruct;
use chainpost_core::db::open_db_in_memory;
use chainpost_core::import::chain::{bulk_add, run_chain_script, ImportError};
use chainpost_core::import::NullGeocoder;
use chainpost_core::model::geo::GeoPoint;
use chainpost_core::model::knot::KnotSubmission;
use chainpost_core::repo::knot_repo::KnotRepository;
use chainpost_core::service::lifecycle::{KnotInsertOutcome, SqliteLifecycleService};
use rand::rngs::StdRng;
use rand::SeedableRng;

const NOW_MS: i64 = 1_700_000_000_000;

#[test]
fn bulk_add_seeds_independent_artificial_origins() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(41);

    let inserted = bulk_add(
        &lifecycle,
        &NullGeocoder,
        "0.0, 0.0 / 1.0, 1.0",
        NOW_MS,
        &mut rng,
    )
    .unwrap();
    assert_eq!(inserted.len(), 2);

    let knots = lifecycle.knots().list_knots().unwrap();
    assert!(knots.iter().all(|k| k.is_origin && k.artificial));
    assert_eq!(reconstruct(&knots).branch_count(), 2);
}

#[test]
fn linear_script_builds_one_branch() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    run_chain_script(
        &lifecycle,
        &NullGeocoder,
        "(1) 0.0, 0.0 / (2) 0.0, 1.0 / (3) 0.0, 2.0",
        NOW_MS,
        &mut rng,
    )
    .unwrap();

    let forest = reconstruct(&lifecycle.knots().list_knots().unwrap());
    assert_eq!(forest.branch_count(), 1);
    let lngs: Vec<f64> = forest.branches[0].iter().map(|p| p.lng).collect();
    assert_eq!(lngs, vec![0.0, 1.0, 2.0]);
}

#[test]
fn dotted_labels_branch_off_their_major_entry() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(43);

    run_chain_script(
        &lifecycle,
        &NullGeocoder,
        "(1) 0.0, 0.0 / (2) 0.0, 1.0 / (3) 0.0, 2.0 / (2.1) 1.0, 1.0 / (2.2) 2.0, 1.0",
        NOW_MS,
        &mut rng,
    )
    .unwrap();

    let forest = reconstruct(&lifecycle.knots().list_knots().unwrap());
    assert_eq!(forest.branch_count(), 2);

    // The branch line replays (2)'s point, then its own two hops.
    let side: Vec<f64> = forest.branches[1].iter().map(|p| p.lat).collect();
    assert_eq!(side, vec![0.0, 1.0, 2.0]);
}

#[test]
fn bare_knot_ids_graft_the_script_onto_existing_chains() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(44);

    let existing = match lifecycle
        .submit_knot(
            &KnotSubmission::origin("old root", GeoPoint::new(0.0, 0.0, 10.0)),
            NOW_MS,
            &mut rng,
        )
        .unwrap()
    {
        KnotInsertOutcome::Inserted(knot) => knot,
        other => panic!("expected insert, got {other:?}"),
    };

    let script = format!("(1) {} / (2) 0.0, 1.0", existing.id);
    let inserted = run_chain_script(&lifecycle, &NullGeocoder, &script, NOW_MS, &mut rng).unwrap();

    // Only (2) creates a knot; (1) registered the existing one.
    assert_eq!(inserted.len(), 1);
    let grafted = lifecycle.knots().get_knot(inserted[0]).unwrap().unwrap();
    assert_eq!(grafted.source, Some(existing.id));
}

#[test]
fn unknown_predecessors_and_knots_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(45);

    let err = run_chain_script(
        &lifecycle,
        &NullGeocoder,
        "(3) 0.0, 0.0",
        NOW_MS,
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::UnknownChainRef(_)));

    let script = format!("(1) {}", uuid::Uuid::new_v4());
    let err = run_chain_script(&lifecycle, &NullGeocoder, &script, NOW_MS, &mut rng).unwrap_err();
    assert!(matches!(err, ImportError::UnknownKnot(_)));
}

#[test]
fn addresses_need_a_real_geocoder() {
    let conn = open_db_in_memory().unwrap();
    let lifecycle = SqliteLifecycleService::from_conn(&conn).unwrap();
    let mut rng = StdRng::seed_from_u64(46);

    let err = run_chain_script(
        &lifecycle,
        &NullGeocoder,
        "(1) Flinders Street Station",
        NOW_MS,
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::Geocode(_)));
}
