//! Append-only diagnostic sinks: problem deliveries and store failures.
//!
//! # Responsibility
//! - Record dropoffs that could not complete, with whatever partial data
//!   survived.
//! - Record store-level failures from fire-and-forget reactive paths.
//!
//! # Invariants
//! - Both sinks are write-only from core's perspective; nothing in the
//!   user-facing flows reads them back.

use crate::model::delivery::DeliveryId;
use crate::model::geo::GeoPoint;
use crate::repo::RepoResult;
use rusqlite::{params, Connection};
use uuid::Uuid;

/// A dropoff that could not fully complete.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemReport {
    pub title: String,
    pub attempted_codename: String,
    /// Present when the codename resolved to a real delivery.
    pub delivery: Option<DeliveryId>,
    /// Present when the courier's location could be read.
    pub destination: Option<GeoPoint>,
    pub error: String,
}

/// Repository interface for the problem-deliveries sink.
pub trait ProblemRepository {
    fn append_problem(&self, id: Uuid, report: &ProblemReport) -> RepoResult<Uuid>;
}

/// Append-only log of failed store operations.
pub trait FailureLog {
    fn append_failure(&self, source: &str, error: &str, now_ms: i64) -> RepoResult<()>;
}

/// SQLite-backed diagnostics sinks.
pub struct SqliteProblemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProblemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProblemRepository for SqliteProblemRepository<'_> {
    fn append_problem(&self, id: Uuid, report: &ProblemReport) -> RepoResult<Uuid> {
        self.conn.execute(
            "INSERT INTO problem_deliveries (
                uuid,
                title,
                attempted_codename,
                delivery_uuid,
                latitude,
                longitude,
                accuracy,
                error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                report.title,
                report.attempted_codename,
                report.delivery.map(|d| d.to_string()),
                report.destination.map(|p| p.latitude),
                report.destination.map(|p| p.longitude),
                report.destination.map(|p| p.accuracy_m),
                report.error,
            ],
        )?;
        Ok(id)
    }
}

impl FailureLog for SqliteProblemRepository<'_> {
    fn append_failure(&self, source: &str, error: &str, now_ms: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO store_failures (source, error, logged_at) VALUES (?1, ?2, ?3);",
            params![source, error, now_ms],
        )?;
        Ok(())
    }
}
