//! Pickup lifecycle manager: the reactive hook behind every knot insert.
//!
//! # Responsibility
//! - Provision an active pickup point for each newly dropped knot.
//! - Mark the superseded pickup point at the knot's source end as
//!   delivered, and expire delivered points past their TTL.
//! - Purge invalid knot submissions instead of letting them render.
//!
//! # Invariants
//! - Pickup-side store failures inside the hook are fire-and-forget:
//!   logged and appended to the failure sink, never surfaced.
//! - A pickup point transitions `ACTIVE -> DELIVERED -> EXPIRED` in that
//!   order only; `delivered_time` is stamped at most once.

use crate::alias;
use crate::model::delivery::DEFAULT_PICKUP_TTL_MS;
use crate::model::knot::{Knot, KnotId, KnotSubmission, KnotValidationError};
use crate::repo::knot_repo::{KnotRepository, SqliteKnotRepository};
use crate::repo::pickup_repo::{PickupRepository, SqlitePickupRepository};
use crate::repo::problem_repo::{FailureLog, SqliteProblemRepository};
use crate::repo::{RepoError, RepoResult};
use log::{error, info, warn};
use rand::Rng;
use rusqlite::Connection;
use uuid::Uuid;

/// What became of a submitted knot.
#[derive(Debug, Clone, PartialEq)]
pub enum KnotInsertOutcome {
    Inserted(Knot),
    /// The submission failed validation and its row was deleted.
    Purged {
        knot: KnotId,
        reason: KnotValidationError,
    },
}

/// Reactive lifecycle component bound to the knot and pickup collections.
pub struct LifecycleService<K, P, F> {
    knots: K,
    pickups: P,
    failures: F,
    ttl_ms: i64,
}

/// The all-SQLite instantiation used by the binaries.
pub type SqliteLifecycleService<'conn> = LifecycleService<
    SqliteKnotRepository<'conn>,
    SqlitePickupRepository<'conn>,
    SqliteProblemRepository<'conn>,
>;

impl<'conn> SqliteLifecycleService<'conn> {
    /// Builds the service over a migrated connection.
    pub fn from_conn(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteKnotRepository::try_new(conn)?,
            SqlitePickupRepository::new(conn),
            SqliteProblemRepository::new(conn),
        ))
    }
}

impl<K, P, F> LifecycleService<K, P, F>
where
    K: KnotRepository,
    P: PickupRepository,
    F: FailureLog,
{
    pub fn new(knots: K, pickups: P, failures: F) -> Self {
        Self {
            knots,
            pickups,
            failures,
            ttl_ms: DEFAULT_PICKUP_TTL_MS,
        }
    }

    /// Overrides the pickup TTL (tests, tuning).
    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    pub fn knots(&self) -> &K {
        &self.knots
    }

    pub fn pickups(&self) -> &P {
        &self.pickups
    }

    /// Inserts a raw submission and runs the after-insert hook on it.
    pub fn submit_knot<R: Rng + ?Sized>(
        &self,
        submission: &KnotSubmission,
        now_ms: i64,
        rng: &mut R,
    ) -> RepoResult<KnotInsertOutcome> {
        let id = self.knots.insert_submission(Uuid::new_v4(), submission)?;
        self.after_knot_insert(id, now_ms, rng)
    }

    /// The after-insert hook. Validates the freshly stored row, purging it
    /// when incomplete; otherwise provisions a pickup point and settles the
    /// point at the source end of the new edge.
    pub fn after_knot_insert<R: Rng + ?Sized>(
        &self,
        id: KnotId,
        now_ms: i64,
        rng: &mut R,
    ) -> RepoResult<KnotInsertOutcome> {
        let submission = self
            .knots
            .get_submission(id)?
            .ok_or(RepoError::KnotNotFound(id))?;

        let knot = match Knot::try_from_submission(id, submission) {
            Ok(knot) => knot,
            Err(reason) => {
                self.knots.remove_knot(id)?;
                warn!("event=knot_purged module=lifecycle knot={id} reason={reason}");
                return Ok(KnotInsertOutcome::Purged { knot: id, reason });
            }
        };

        // Seed data stays out of the notification stream.
        if !knot.artificial {
            info!(
                "event=new_knot module=lifecycle knot={} title={}",
                knot.id, knot.title
            );
        }

        let ref_code = alias::simple_ref_code(rng);
        if let Err(err) = self.pickups.insert_pickup(Uuid::new_v4(), &ref_code, knot.id) {
            self.log_store_failure("pickups", &err, now_ms);
        }

        if let Some(source) = knot.source {
            self.settle_source_pickup(source, now_ms);
        }

        Ok(KnotInsertOutcome::Inserted(knot))
    }

    /// Lazy expiry pass; run before every query against the pickup store.
    pub fn sweep_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let removed = self.pickups.sweep_expired(now_ms, self.ttl_ms)?;
        if removed > 0 {
            info!("event=pickups_expired module=lifecycle removed={removed}");
        }
        Ok(removed)
    }

    fn settle_source_pickup(&self, source: KnotId, now_ms: i64) {
        let pickup = match self.pickups.find_by_knot(source) {
            Ok(Some(pickup)) => pickup,
            Ok(None) => return,
            Err(err) => {
                self.log_store_failure("pickups", &err, now_ms);
                return;
            }
        };

        if !pickup.is_delivered() {
            if let Err(err) = self.pickups.set_delivered_time(pickup.id, now_ms) {
                self.log_store_failure("pickups", &err, now_ms);
            }
        } else if pickup.is_expired(now_ms, self.ttl_ms) {
            if let Err(err) = self.pickups.remove_pickup(pickup.id) {
                self.log_store_failure("pickups", &err, now_ms);
            }
        }
    }

    fn log_store_failure(&self, source: &str, err: &RepoError, now_ms: i64) {
        error!("event=store_failure module=lifecycle source={source} error={err}");
        if let Err(sink_err) = self.failures.append_failure(source, &err.to_string(), now_ms) {
            // Both the operation and its diagnostic sink failed; the file
            // log above is the last resort.
            error!("event=failure_sink_unavailable module=lifecycle error={sink_err}");
        }
    }
}
