//! Repository layer over the delivery-chain collections.
//!
//! # Responsibility
//! - Define narrow, use-case oriented data access contracts per collection.
//! - Keep SQL details out of service/business orchestration.
//!
//! # Invariants
//! - Write paths validate domain rules before SQL mutations.
//! - Read paths reject malformed persisted state instead of masking it,
//!   except where the contract explicitly skips incomplete rows.

use crate::db::DbError;
use crate::model::delivery::PickupId;
use crate::model::knot::{KnotId, KnotValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod delivery_repo;
pub mod knot_repo;
pub mod message_repo;
pub mod pickup_repo;
pub mod problem_repo;
pub mod request_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence and query error shared by the collection repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(KnotValidationError),
    KnotNotFound(KnotId),
    PickupNotFound(PickupId),
    /// No in-progress delivery under this codename.
    DeliveryNotFound(String),
    /// A delivery already holds this codename (case-insensitive).
    CodenameConflict(String),
    InvalidData(String),
    /// Connection has not been migrated to the expected schema version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::KnotNotFound(id) => write!(f, "knot not found: {id}"),
            Self::PickupNotFound(id) => write!(f, "pickup point not found: {id}"),
            Self::DeliveryNotFound(codename) => {
                write!(f, "no in-progress delivery for codename `{codename}`")
            }
            Self::CodenameConflict(codename) => {
                write!(f, "a delivery already exists under codename `{codename}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection not migrated: schema version {actual_version}, expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<KnotValidationError> for RepoError {
    fn from(value: KnotValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
