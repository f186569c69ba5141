//! Message repository: post-delivery narrative feedback.
//!
//! # Responsibility
//! - Insert new courier responses awaiting review.
//! - Serve one random approved message for the post-delivery screen.

use crate::model::delivery::{Message, MessageId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Repository interface for the messages collection.
pub trait MessageRepository {
    /// Inserts a new response; review/approval flags start cleared.
    fn insert_message(&self, id: MessageId, response: &str, shareable: bool)
        -> RepoResult<MessageId>;
    /// One uniformly random approved message, `None` when the pool is empty.
    fn random_approved(&self) -> RepoResult<Option<Message>>;
}

/// SQLite-backed message repository.
pub struct SqliteMessageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMessageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MessageRepository for SqliteMessageRepository<'_> {
    fn insert_message(
        &self,
        id: MessageId,
        response: &str,
        shareable: bool,
    ) -> RepoResult<MessageId> {
        self.conn.execute(
            "INSERT INTO messages (uuid, response, shareable, reviewed, approved)
             VALUES (?1, ?2, ?3, 0, 0);",
            params![id.to_string(), response, shareable as i64],
        )?;
        Ok(id)
    }

    fn random_approved(&self) -> RepoResult<Option<Message>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, response, shareable, reviewed, approved
             FROM messages
             WHERE approved = 1
             ORDER BY RANDOM()
             LIMIT 1;",
        )?;
        stmt.query_row([], parse_message_row)
            .optional()
            .map_err(RepoError::from)
    }
}

fn parse_message_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(Message {
        id,
        response: row.get("response")?,
        shareable: row.get::<_, i64>("shareable")? != 0,
        reviewed: row.get::<_, i64>("reviewed")? != 0,
        approved: row.get::<_, i64>("approved")? != 0,
    })
}
