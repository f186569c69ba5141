//! Core domain logic for ChainPost, an anonymous chain-delivery game.
//! This crate is the single source of truth for business invariants.

pub mod alias;
pub mod chain;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use chain::{reconstruct, ChainForest, OrphanedEdge};
pub use db::{open_db, open_db_in_memory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::delivery::{Delivery, PickupPoint, DEFAULT_PICKUP_TTL_MS};
pub use model::geo::{distance_m, within_range, GeoPoint, LatLng, MIN_RADIUS_M};
pub use model::knot::{Knot, KnotId, KnotSubmission, KnotValidationError};
pub use repo::{RepoError, RepoResult};
pub use service::display::{DisplayState, SqliteDisplayService};
pub use service::dropoff::SqliteDropoffService;
pub use service::lifecycle::{KnotInsertOutcome, SqliteLifecycleService};
pub use service::pickup::PickupService;
pub use service::session::{FsCodenameStore, MemoryCodenameStore, SessionContext};
pub use service::LocationProvider;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
