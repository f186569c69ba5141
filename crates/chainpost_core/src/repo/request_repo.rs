//! Chain placement requests: visitors asking for a pickup point near them.

use crate::repo::RepoResult;
use log::info;
use rusqlite::{params, Connection};
use uuid::Uuid;

/// A request for a new chain near the given location.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    /// Free-form address or area description.
    pub location: String,
    /// Contact for when a chain reaches the area.
    pub email: String,
}

/// Repository interface for the requests collection.
pub trait RequestRepository {
    fn append_request(&self, id: Uuid, request: &ChainRequest) -> RepoResult<Uuid>;
}

/// SQLite-backed request sink.
pub struct SqliteRequestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRequestRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RequestRepository for SqliteRequestRepository<'_> {
    fn append_request(&self, id: Uuid, request: &ChainRequest) -> RepoResult<Uuid> {
        self.conn.execute(
            "INSERT INTO requests (uuid, location, email) VALUES (?1, ?2, ?3);",
            params![id.to_string(), request.location, request.email],
        )?;
        info!(
            "event=new_request module=requests request={id} location={}",
            request.location
        );
        Ok(id)
    }
}
