//! Knot domain model: one edge (or root) of a delivery chain.
//!
//! # Responsibility
//! - Define the raw submission shape the store accepts and the validated
//!   record the rest of core operates on.
//! - Enforce the forest invariant at the record level: exactly one of
//!   `source` / `is_origin` holds.
//!
//! # Invariants
//! - `id` is stable and never reused for another knot.
//! - A `Knot` always has a non-empty title and a destination; incomplete
//!   rows only ever exist as `KnotSubmission` and are purged by the
//!   lifecycle hook instead of being displayed.

use crate::model::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a knot record.
pub type KnotId = Uuid;

/// Why a submission failed validation and must be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnotValidationError {
    /// Title absent or blank.
    MissingTitle,
    /// No destination reading attached.
    MissingDestination,
    /// Neither a source reference nor the origin flag.
    MissingSource,
    /// Origin knots must not also reference a source.
    SourceOnOrigin,
}

impl Display for KnotValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "knot has no title"),
            Self::MissingDestination => write!(f, "knot has no destination"),
            Self::MissingSource => write!(f, "knot is neither an origin nor sourced"),
            Self::SourceOnOrigin => write!(f, "origin knot must not reference a source"),
        }
    }
}

impl Error for KnotValidationError {}

/// Raw insert shape as handed to the store. Field presence is unchecked;
/// the lifecycle hook validates after insert and deletes rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotSubmission {
    pub title: Option<String>,
    pub source: Option<KnotId>,
    pub destination: Option<GeoPoint>,
    pub is_origin: bool,
    /// Seed/test data, excluded from new-knot notifications.
    pub artificial: bool,
}

impl KnotSubmission {
    /// A chain root dropped at `destination`.
    pub fn origin(title: impl Into<String>, destination: GeoPoint) -> Self {
        Self {
            title: Some(title.into()),
            source: None,
            destination: Some(destination),
            is_origin: true,
            artificial: false,
        }
    }

    /// A chain link continuing from the knot `source`.
    pub fn link(title: impl Into<String>, source: KnotId, destination: GeoPoint) -> Self {
        Self {
            title: Some(title.into()),
            source: Some(source),
            destination: Some(destination),
            is_origin: false,
            artificial: false,
        }
    }

    /// Flags this submission as seed/test data.
    pub fn artificial(mut self) -> Self {
        self.artificial = true;
        self
    }

    pub fn validate(&self) -> Result<(), KnotValidationError> {
        if self.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(KnotValidationError::MissingTitle);
        }
        if self.destination.is_none() {
            return Err(KnotValidationError::MissingDestination);
        }
        match (self.source.is_some(), self.is_origin) {
            (false, false) => Err(KnotValidationError::MissingSource),
            (true, true) => Err(KnotValidationError::SourceOnOrigin),
            _ => Ok(()),
        }
    }
}

/// Validated knot record. The knot set forms a forest under `source`:
/// no cycles, one parent per non-origin knot, branching allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub id: KnotId,
    pub title: String,
    pub source: Option<KnotId>,
    pub destination: GeoPoint,
    pub is_origin: bool,
    pub artificial: bool,
}

impl Knot {
    /// Promotes a raw submission to a validated record.
    pub fn try_from_submission(
        id: KnotId,
        submission: KnotSubmission,
    ) -> Result<Self, KnotValidationError> {
        submission.validate()?;
        // validate() guarantees both fields are present.
        let title = submission.title.unwrap_or_default();
        let destination = match submission.destination {
            Some(point) => point,
            None => return Err(KnotValidationError::MissingDestination),
        };
        Ok(Self {
            id,
            title,
            source: submission.source,
            destination,
            is_origin: submission.is_origin,
            artificial: submission.artificial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Knot, KnotSubmission, KnotValidationError};
    use crate::model::geo::GeoPoint;
    use uuid::Uuid;

    fn point() -> GeoPoint {
        GeoPoint::new(-37.8, 144.9, 20.0)
    }

    #[test]
    fn origin_submission_validates_and_promotes() {
        let sub = KnotSubmission::origin("first drop", point());
        let knot = Knot::try_from_submission(Uuid::new_v4(), sub).unwrap();
        assert!(knot.is_origin);
        assert!(knot.source.is_none());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut sub = KnotSubmission::origin("  ", point());
        assert_eq!(sub.validate(), Err(KnotValidationError::MissingTitle));
        sub.title = None;
        assert_eq!(sub.validate(), Err(KnotValidationError::MissingTitle));
    }

    #[test]
    fn missing_destination_is_rejected() {
        let mut sub = KnotSubmission::origin("drop", point());
        sub.destination = None;
        assert_eq!(sub.validate(), Err(KnotValidationError::MissingDestination));
    }

    #[test]
    fn exactly_one_of_source_or_origin_must_hold() {
        let mut sub = KnotSubmission::link("hop", Uuid::new_v4(), point());
        assert!(sub.validate().is_ok());

        sub.is_origin = true;
        assert_eq!(sub.validate(), Err(KnotValidationError::SourceOnOrigin));

        sub.source = None;
        sub.is_origin = false;
        assert_eq!(sub.validate(), Err(KnotValidationError::MissingSource));
    }
}
