//! Delivery repository: in-progress pickups awaiting their dropoff.
//!
//! # Responsibility
//! - Create/find/remove deliveries keyed by codename.
//! - Map the store's uniqueness constraint to a semantic conflict error.
//!
//! # Invariants
//! - Codenames are stored lowercase; lookups are case-insensitive either way
//!   (the column collates NOCASE).
//! - At most one in-progress delivery per codename, enforced by the store,
//!   not by a racy pre-check. Failed rows sit outside the unique index, so
//!   marking a delivery failed always frees its codename.

use crate::model::delivery::{normalize_codename, Delivery, DeliveryId};
use crate::model::knot::KnotId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

/// Repository interface for the deliveries collection.
pub trait DeliveryRepository {
    /// Inserts a new in-progress delivery; `CodenameConflict` when the
    /// codename is already held.
    fn create_delivery(&self, id: DeliveryId, codename: &str, origin: KnotId)
        -> RepoResult<DeliveryId>;
    fn find_by_codename(&self, codename: &str) -> RepoResult<Option<Delivery>>;
    /// All codenames currently in progress, in stored (lowercase) form.
    fn list_codenames(&self) -> RepoResult<Vec<String>>;
    fn remove_delivery(&self, id: DeliveryId) -> RepoResult<()>;
    /// Flags a delivery as failed and frees its codename by suffixing it.
    fn mark_failed(&self, id: DeliveryId) -> RepoResult<()>;
}

/// SQLite-backed delivery repository.
pub struct SqliteDeliveryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDeliveryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DeliveryRepository for SqliteDeliveryRepository<'_> {
    fn create_delivery(
        &self,
        id: DeliveryId,
        codename: &str,
        origin: KnotId,
    ) -> RepoResult<DeliveryId> {
        let stored = normalize_codename(codename);
        let inserted = self.conn.execute(
            "INSERT INTO deliveries (uuid, codename, origin_uuid) VALUES (?1, ?2, ?3);",
            params![id.to_string(), stored, origin.to_string()],
        );

        match inserted {
            Ok(_) => Ok(id),
            Err(err) if is_constraint_violation(&err) => Err(RepoError::CodenameConflict(stored)),
            Err(err) => Err(err.into()),
        }
    }

    fn find_by_codename(&self, codename: &str) -> RepoResult<Option<Delivery>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, codename, origin_uuid, failed
             FROM deliveries
             WHERE codename = ?1;",
        )?;
        stmt.query_row([normalize_codename(codename)], parse_delivery_row)
            .optional()
            .map_err(RepoError::from)
    }

    fn list_codenames(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT codename FROM deliveries ORDER BY created_at ASC;")?;
        let mut rows = stmt.query([])?;
        let mut codenames = Vec::new();
        while let Some(row) = rows.next()? {
            codenames.push(row.get(0)?);
        }
        Ok(codenames)
    }

    fn remove_delivery(&self, id: DeliveryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM deliveries WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::DeliveryNotFound(id.to_string()));
        }
        Ok(())
    }

    fn mark_failed(&self, id: DeliveryId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE deliveries
             SET codename = codename || '[failed]',
                 failed = 1
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::DeliveryNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn parse_delivery_row(row: &Row<'_>) -> rusqlite::Result<Delivery> {
    let uuid_text: String = row.get("uuid")?;
    let origin_text: String = row.get("origin_uuid")?;
    let id = parse_uuid_sql(&uuid_text)?;
    let origin = parse_uuid_sql(&origin_text)?;
    Ok(Delivery {
        id,
        codename: row.get("codename")?,
        origin,
        failed: row.get::<_, i64>("failed")? != 0,
    })
}

fn parse_uuid_sql(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
    )
}
