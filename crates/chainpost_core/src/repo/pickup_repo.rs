//! Pickup-point repository: the display-only projection of collectable
//! package locations.
//!
//! # Responsibility
//! - Maintain the active pickup set alongside knot inserts.
//! - Provide the lazy TTL sweep run before every query against this
//!   collection.
//!
//! # Invariants
//! - `sweep_expired` only ever deletes rows with a `delivered_time`;
//!   undelivered points are immortal until their goods move on.

use crate::model::delivery::{PickupId, PickupPoint};
use crate::model::knot::KnotId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PICKUP_SELECT_SQL: &str = "SELECT uuid, title, knot_uuid, delivered_time
FROM pickup_locations";

/// Repository interface for the pickup locations collection.
pub trait PickupRepository {
    fn insert_pickup(&self, id: PickupId, title: &str, knot: KnotId) -> RepoResult<PickupId>;
    /// The pickup point referencing this knot, if any. At most one exists.
    fn find_by_knot(&self, knot: KnotId) -> RepoResult<Option<PickupPoint>>;
    fn set_delivered_time(&self, id: PickupId, delivered_ms: i64) -> RepoResult<()>;
    fn remove_pickup(&self, id: PickupId) -> RepoResult<()>;
    /// All pickup points in insertion order. Callers sweep first.
    fn list_pickups(&self) -> RepoResult<Vec<PickupPoint>>;
    /// Deletes every delivered point at or past the TTL; returns the count.
    fn sweep_expired(&self, now_ms: i64, ttl_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed pickup repository.
pub struct SqlitePickupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePickupRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PickupRepository for SqlitePickupRepository<'_> {
    fn insert_pickup(&self, id: PickupId, title: &str, knot: KnotId) -> RepoResult<PickupId> {
        self.conn.execute(
            "INSERT INTO pickup_locations (uuid, title, knot_uuid) VALUES (?1, ?2, ?3);",
            params![id.to_string(), title, knot.to_string()],
        )?;
        Ok(id)
    }

    fn find_by_knot(&self, knot: KnotId) -> RepoResult<Option<PickupPoint>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PICKUP_SELECT_SQL} WHERE knot_uuid = ?1;"))?;
        stmt.query_row([knot.to_string()], parse_pickup_row)
            .optional()
            .map_err(RepoError::from)
    }

    fn set_delivered_time(&self, id: PickupId, delivered_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pickup_locations SET delivered_time = ?2 WHERE uuid = ?1;",
            params![id.to_string(), delivered_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::PickupNotFound(id));
        }
        Ok(())
    }

    fn remove_pickup(&self, id: PickupId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM pickup_locations WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::PickupNotFound(id));
        }
        Ok(())
    }

    fn list_pickups(&self) -> RepoResult<Vec<PickupPoint>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PICKUP_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut pickups = Vec::new();
        while let Some(row) = rows.next()? {
            pickups.push(parse_pickup_row(row)?);
        }
        Ok(pickups)
    }

    fn sweep_expired(&self, now_ms: i64, ttl_ms: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM pickup_locations
             WHERE delivered_time IS NOT NULL
               AND ?1 - delivered_time >= ?2;",
            params![now_ms, ttl_ms],
        )?;
        Ok(removed)
    }
}

fn parse_pickup_row(row: &Row<'_>) -> rusqlite::Result<PickupPoint> {
    let uuid_text: String = row.get("uuid")?;
    let knot_text: String = row.get("knot_uuid")?;
    Ok(PickupPoint {
        id: parse_uuid_sql(&uuid_text)?,
        title: row.get("title")?,
        knot: parse_uuid_sql(&knot_text)?,
        delivered_time: row.get("delivered_time")?,
    })
}

fn parse_uuid_sql(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}
