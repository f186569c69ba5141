//! Scripted chain imports.
//!
//! A chain script is a ` / `-separated list of labelled entries, e.g.
//! `(1) -37.8, 144.9 / (2) Flinders Street / (2.1) -37.9, 144.8`. Labels
//! determine linkage: `(n)` continues from `(n-1)`, `(n.m)` branches off
//! `(n)` when `m == 1` and continues from `(n.m-1)` otherwise. The first
//! entry of the main line has no predecessor and becomes an origin. An
//! entry body that is a bare knot id registers an existing knot under the
//! label instead of creating one.

use crate::import::{parse_point, split_entries, GeocodeError, Geocoder};
use crate::model::knot::{KnotId, KnotSubmission};
use crate::repo::knot_repo::KnotRepository;
use crate::repo::pickup_repo::PickupRepository;
use crate::repo::problem_repo::FailureLog;
use crate::repo::RepoError;
use crate::service::lifecycle::{KnotInsertOutcome, LifecycleService};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\((\d+)(?:\.(\d+))?\)\s*(.+)$").expect("label pattern compiles")
});

#[derive(Debug)]
pub enum ImportError {
    /// Entry without a `(n)` / `(n.m)` label, or with an empty body.
    MalformedEntry(String),
    /// A label's predecessor never appeared in the script.
    UnknownChainRef(String),
    /// A bare knot id that does not exist in the store.
    UnknownKnot(KnotId),
    /// A scripted submission failed validation.
    Rejected(String),
    Geocode(GeocodeError),
    Store(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedEntry(entry) => write!(f, "malformed script entry `{entry}`"),
            Self::UnknownChainRef(label) => write!(f, "no entry labelled `{label}`"),
            Self::UnknownKnot(id) => write!(f, "no knot with id {id}"),
            Self::Rejected(reason) => write!(f, "scripted knot rejected: {reason}"),
            Self::Geocode(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Geocode(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeocodeError> for ImportError {
    fn from(err: GeocodeError) -> Self {
        Self::Geocode(err)
    }
}

impl From<RepoError> for ImportError {
    fn from(err: RepoError) -> Self {
        Self::Store(err)
    }
}

/// A parsed script label, `(n)` or `(n.m)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainLabel {
    pub major: u32,
    pub minor: Option<u32>,
}

impl ChainLabel {
    /// The label this entry links from, `None` for the script's root.
    pub fn previous(&self) -> Option<ChainLabel> {
        match self.minor {
            None if self.major > 1 => Some(ChainLabel {
                major: self.major - 1,
                minor: None,
            }),
            None => None,
            Some(1) => Some(ChainLabel {
                major: self.major,
                minor: None,
            }),
            Some(minor) => Some(ChainLabel {
                major: self.major,
                minor: Some(minor - 1),
            }),
        }
    }
}

impl Display for ChainLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "({}.{})", self.major, minor),
            None => write!(f, "({})", self.major),
        }
    }
}

/// Splits a labelled entry into its label and body.
pub fn parse_entry(entry: &str) -> Result<(ChainLabel, &str), ImportError> {
    let captures = LABEL_RE
        .captures(entry)
        .ok_or_else(|| ImportError::MalformedEntry(entry.to_string()))?;
    let major: u32 = captures[1]
        .parse()
        .map_err(|_| ImportError::MalformedEntry(entry.to_string()))?;
    let minor = match captures.get(2) {
        Some(m) => Some(
            m.as_str()
                .parse()
                .map_err(|_| ImportError::MalformedEntry(entry.to_string()))?,
        ),
        None => None,
    };
    let body = match captures.get(3) {
        Some(m) => m.as_str().trim(),
        None => return Err(ImportError::MalformedEntry(entry.to_string())),
    };
    Ok((ChainLabel { major, minor }, body))
}

/// Seeds each entry of `script` as an independent artificial origin knot.
pub fn bulk_add<K, P, F, R>(
    lifecycle: &LifecycleService<K, P, F>,
    geocoder: &dyn Geocoder,
    script: &str,
    now_ms: i64,
    rng: &mut R,
) -> Result<Vec<KnotId>, ImportError>
where
    K: KnotRepository,
    P: PickupRepository,
    F: FailureLog,
    R: Rng + ?Sized,
{
    let mut inserted = Vec::new();
    for entry in split_entries(script) {
        let point = parse_point(entry, geocoder)?;
        let submission = KnotSubmission::origin(entry, point).artificial();
        inserted.push(submit(lifecycle, &submission, now_ms, rng)?);
    }
    Ok(inserted)
}

/// Runs a labelled chain script, creating linked artificial knots.
pub fn run_chain_script<K, P, F, R>(
    lifecycle: &LifecycleService<K, P, F>,
    geocoder: &dyn Geocoder,
    script: &str,
    now_ms: i64,
    rng: &mut R,
) -> Result<Vec<KnotId>, ImportError>
where
    K: KnotRepository,
    P: PickupRepository,
    F: FailureLog,
    R: Rng + ?Sized,
{
    let mut labelled: HashMap<ChainLabel, KnotId> = HashMap::new();
    let mut inserted = Vec::new();

    for entry in split_entries(script) {
        let (label, body) = parse_entry(entry)?;

        // A bare knot id grafts the script onto an existing chain.
        if let Ok(existing) = Uuid::parse_str(body) {
            lifecycle
                .knots()
                .get_knot(existing)?
                .ok_or(ImportError::UnknownKnot(existing))?;
            labelled.insert(label, existing);
            continue;
        }

        let point = parse_point(body, geocoder)?;
        let submission = match label.previous() {
            None => KnotSubmission::origin(body, point).artificial(),
            Some(previous) => {
                let source = *labelled
                    .get(&previous)
                    .ok_or_else(|| ImportError::UnknownChainRef(previous.to_string()))?;
                KnotSubmission::link(body, source, point).artificial()
            }
        };

        let id = submit(lifecycle, &submission, now_ms, rng)?;
        labelled.insert(label, id);
        inserted.push(id);
    }
    Ok(inserted)
}

fn submit<K, P, F, R>(
    lifecycle: &LifecycleService<K, P, F>,
    submission: &KnotSubmission,
    now_ms: i64,
    rng: &mut R,
) -> Result<KnotId, ImportError>
where
    K: KnotRepository,
    P: PickupRepository,
    F: FailureLog,
    R: Rng + ?Sized,
{
    match lifecycle.submit_knot(submission, now_ms, rng)? {
        KnotInsertOutcome::Inserted(knot) => Ok(knot.id),
        KnotInsertOutcome::Purged { reason, .. } => Err(ImportError::Rejected(reason.to_string())),
    }
}
