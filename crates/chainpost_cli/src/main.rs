//! CLI entry point for local seeding and inspection.
//!
//! # Responsibility
//! - Drive `chainpost_core` against a database file without any map client:
//!   seed scripts, chain scripts, state snapshots, TTL sweeps.
//! - Keep output deterministic (JSON for state) for quick local checks.

use chainpost_core::import::chain::{bulk_add, run_chain_script};
use chainpost_core::import::NullGeocoder;
use chainpost_core::model::delivery::DEFAULT_PICKUP_TTL_MS;
use chainpost_core::service::display::SqliteDisplayService;
use chainpost_core::service::lifecycle::SqliteLifecycleService;
use chainpost_core::{default_log_level, init_logging, open_db};
use std::time::{SystemTime, UNIX_EPOCH};

const USAGE: &str = "usage: chainpost <db-path> <command> [args]

commands:
  seed \"<entry> / <entry> / ...\"    insert unlinked origin knots
  chain \"(1) <entry> / (2) ...\"     insert a labelled chain of knots
  state                             print the map snapshot as JSON
  sweep                             expire delivered pickup points
  version                           print the core version";

fn main() {
    if let Err(message) = run() {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("version") {
        println!("chainpost_core version={}", chainpost_core::core_version());
        return Ok(());
    }

    let (db_path, command) = match (args.first(), args.get(1)) {
        (Some(db_path), Some(command)) => (db_path.clone(), command.clone()),
        _ => return Err(USAGE.to_string()),
    };

    if let Ok(log_dir) = std::env::var("CHAINPOST_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let conn = open_db(&db_path).map_err(|err| format!("failed to open `{db_path}`: {err}"))?;
    let now_ms = epoch_ms()?;
    let mut rng = rand::thread_rng();

    match command.as_str() {
        "seed" => {
            let script = args.get(2).ok_or("seed requires a script argument")?;
            let lifecycle =
                SqliteLifecycleService::from_conn(&conn).map_err(|err| err.to_string())?;
            let inserted = bulk_add(&lifecycle, &NullGeocoder, script, now_ms, &mut rng)
                .map_err(|err| err.to_string())?;
            println!("seeded {} origin knots", inserted.len());
        }
        "chain" => {
            let script = args.get(2).ok_or("chain requires a script argument")?;
            let lifecycle =
                SqliteLifecycleService::from_conn(&conn).map_err(|err| err.to_string())?;
            let inserted = run_chain_script(&lifecycle, &NullGeocoder, script, now_ms, &mut rng)
                .map_err(|err| err.to_string())?;
            println!("chained {} knots", inserted.len());
        }
        "state" => {
            let display = SqliteDisplayService::from_conn(&conn, DEFAULT_PICKUP_TTL_MS)
                .map_err(|err| err.to_string())?;
            let state = display.snapshot(now_ms).map_err(|err| err.to_string())?;
            let json = serde_json::to_string_pretty(&state).map_err(|err| err.to_string())?;
            println!("{json}");
        }
        "sweep" => {
            let lifecycle =
                SqliteLifecycleService::from_conn(&conn).map_err(|err| err.to_string())?;
            let removed = lifecycle.sweep_expired(now_ms).map_err(|err| err.to_string())?;
            println!("removed {removed} expired pickup points");
        }
        other => return Err(format!("unknown command `{other}`\n\n{USAGE}")),
    }

    Ok(())
}

fn epoch_ms() -> Result<i64, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| format!("system clock before unix epoch: {err}"))?;
    i64::try_from(elapsed.as_millis()).map_err(|_| "system clock out of range".to_string())
}
