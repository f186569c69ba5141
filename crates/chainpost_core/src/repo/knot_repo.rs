//! Knot repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist raw knot submissions and read back validated records.
//! - Return knots in insertion order so chain reconstruction sees every
//!   source before the links that reference it (for store-grown data).
//!
//! # Invariants
//! - `insert_submission` stores rows as given; validation and purge of
//!   incomplete rows is the lifecycle hook's job, not the repository's.
//! - `list_knots` silently skips rows that fail validation; `get_knot`
//!   surfaces them as errors.

use crate::db::migrations::latest_version;
use crate::model::geo::GeoPoint;
use crate::model::knot::{Knot, KnotId, KnotSubmission};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const KNOT_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    source_uuid,
    latitude,
    longitude,
    accuracy,
    is_origin,
    artificial
FROM knots";

/// Repository interface for the knots collection.
pub trait KnotRepository {
    /// Inserts a raw submission under a caller-chosen id.
    fn insert_submission(&self, id: KnotId, submission: &KnotSubmission) -> RepoResult<KnotId>;
    /// Reads back the raw row without validation.
    fn get_submission(&self, id: KnotId) -> RepoResult<Option<KnotSubmission>>;
    /// Reads one validated knot; a present-but-incomplete row is an error.
    fn get_knot(&self, id: KnotId) -> RepoResult<Option<Knot>>;
    /// All validated knots in insertion order; incomplete rows are skipped.
    fn list_knots(&self) -> RepoResult<Vec<Knot>>;
    fn remove_knot(&self, id: KnotId) -> RepoResult<()>;
}

/// SQLite-backed knot repository.
pub struct SqliteKnotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKnotRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl KnotRepository for SqliteKnotRepository<'_> {
    fn insert_submission(&self, id: KnotId, submission: &KnotSubmission) -> RepoResult<KnotId> {
        self.conn.execute(
            "INSERT INTO knots (
                uuid,
                title,
                source_uuid,
                latitude,
                longitude,
                accuracy,
                is_origin,
                artificial
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                submission.title.as_deref(),
                submission.source.map(|s| s.to_string()),
                submission.destination.map(|d| d.latitude),
                submission.destination.map(|d| d.longitude),
                submission.destination.map(|d| d.accuracy_m),
                submission.is_origin as i64,
                submission.artificial as i64,
            ],
        )?;
        Ok(id)
    }

    fn get_submission(&self, id: KnotId) -> RepoResult<Option<KnotSubmission>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{KNOT_SELECT_SQL} WHERE uuid = ?1;"))?;
        stmt.query_row([id.to_string()], parse_submission_row)
            .optional()
            .map_err(RepoError::from)
    }

    fn get_knot(&self, id: KnotId) -> RepoResult<Option<Knot>> {
        match self.get_submission(id)? {
            Some(submission) => {
                let knot = Knot::try_from_submission(id, submission)?;
                Ok(Some(knot))
            }
            None => Ok(None),
        }
    }

    fn list_knots(&self) -> RepoResult<Vec<Knot>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{KNOT_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut knots = Vec::new();

        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            let id = parse_uuid(&uuid_text, "knots.uuid")?;
            let submission = parse_submission_row(row)?;
            // Incomplete rows are awaiting purge and never rendered.
            if let Ok(knot) = Knot::try_from_submission(id, submission) {
                knots.push(knot);
            }
        }

        Ok(knots)
    }

    fn remove_knot(&self, id: KnotId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM knots WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::KnotNotFound(id));
        }
        Ok(())
    }
}

fn parse_submission_row(row: &Row<'_>) -> rusqlite::Result<KnotSubmission> {
    let source = match row.get::<_, Option<String>>("source_uuid")? {
        Some(text) => Some(Uuid::parse_str(&text).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?),
        None => None,
    };

    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let accuracy: Option<f64> = row.get("accuracy")?;
    let destination = match (latitude, longitude, accuracy) {
        (Some(lat), Some(lng), Some(acc)) => Some(GeoPoint::new(lat, lng, acc)),
        _ => None,
    };

    Ok(KnotSubmission {
        title: row.get("title")?,
        source,
        destination,
        is_origin: row.get::<_, i64>("is_origin")? != 0,
        artificial: row.get::<_, i64>("artificial")? != 0,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<KnotId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    for table in ["knots", "deliveries", "pickup_locations"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
