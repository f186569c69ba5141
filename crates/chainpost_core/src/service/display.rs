//! Map display projection: one consistent snapshot of pins and paths.
//!
//! # Responsibility
//! - Assemble the renderable state: active pickup markers joined to knot
//!   coordinates, plus the reconstructed chain polylines.
//!
//! # Invariants
//! - Expired pickups are swept before the snapshot is taken; a marker
//!   never outlives its TTL across a query.
//! - A pickup whose knot is missing or invalid is skipped, never rendered
//!   at a guessed location.

use crate::chain::{self, ChainForest};
use crate::model::geo::LatLng;
use crate::model::knot::{Knot, KnotId};
use crate::repo::knot_repo::{KnotRepository, SqliteKnotRepository};
use crate::repo::pickup_repo::{PickupRepository, SqlitePickupRepository};
use crate::repo::RepoResult;
use log::warn;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

/// One collectable pin on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupMarker {
    pub title: String,
    pub location: LatLng,
}

/// Everything a map client needs for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub pickups: Vec<PickupMarker>,
    pub paths: Vec<Vec<LatLng>>,
}

/// Read-only projection service over the knot and pickup collections.
pub struct DisplayService<K, P> {
    knots: K,
    pickups: P,
    ttl_ms: i64,
}

/// The all-SQLite instantiation used by the binaries.
pub type SqliteDisplayService<'conn> =
    DisplayService<SqliteKnotRepository<'conn>, SqlitePickupRepository<'conn>>;

impl<'conn> SqliteDisplayService<'conn> {
    pub fn from_conn(conn: &'conn Connection, ttl_ms: i64) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteKnotRepository::try_new(conn)?,
            SqlitePickupRepository::new(conn),
            ttl_ms,
        ))
    }
}

impl<K, P> DisplayService<K, P>
where
    K: KnotRepository,
    P: PickupRepository,
{
    pub fn new(knots: K, pickups: P, ttl_ms: i64) -> Self {
        Self {
            knots,
            pickups,
            ttl_ms,
        }
    }

    /// One consistent snapshot as of `now_ms`.
    pub fn snapshot(&self, now_ms: i64) -> RepoResult<DisplayState> {
        self.pickups.sweep_expired(now_ms, self.ttl_ms)?;

        let knots = self.knots.list_knots()?;
        let forest = self.reconstruct(&knots);

        let by_id: HashMap<KnotId, &Knot> = knots.iter().map(|k| (k.id, k)).collect();
        let mut markers = Vec::new();
        for pickup in self.pickups.list_pickups()? {
            match by_id.get(&pickup.knot) {
                Some(knot) => markers.push(PickupMarker {
                    title: pickup.title,
                    location: knot.destination.lat_lng(),
                }),
                None => {
                    warn!(
                        "event=pickup_unjoinable module=display pickup={} knot={}",
                        pickup.id, pickup.knot
                    );
                }
            }
        }

        Ok(DisplayState {
            pickups: markers,
            paths: forest.branches,
        })
    }

    fn reconstruct(&self, knots: &[Knot]) -> ChainForest {
        let forest = chain::reconstruct(knots);
        for orphan in &forest.orphans {
            warn!(
                "event=orphaned_edge module=display knot={} missing_source={}",
                orphan.knot, orphan.missing_source
            );
        }
        forest
    }
}
