//! Dropoff flow: recalling a delivery by codename and completing it.
//!
//! # Responsibility
//! - Resolve a remembered codename back to its in-progress delivery.
//! - Extend the chain with the dropoff knot and retire the delivery.
//! - Capture problem reports and post-delivery messages.
//!
//! # Invariants
//! - Completing a delivery is knot-first: the chain gains its new edge
//!   before the delivery row is removed, so a crash between the two leaves
//!   a recoverable (removable) delivery rather than a lost knot.
//! - Every retry loop is bounded; nothing in this module polls forever.

use crate::alias;
use crate::model::delivery::{Delivery, Message};
use crate::model::geo::GeoPoint;
use crate::model::knot::{Knot, KnotSubmission};
use crate::repo::delivery_repo::{DeliveryRepository, SqliteDeliveryRepository};
use crate::repo::knot_repo::KnotRepository;
use crate::repo::message_repo::{MessageRepository, SqliteMessageRepository};
use crate::repo::pickup_repo::PickupRepository;
use crate::repo::problem_repo::{
    FailureLog, ProblemReport, ProblemRepository, SqliteProblemRepository,
};
use crate::repo::RepoError;
use crate::service::lifecycle::{KnotInsertOutcome, LifecycleService, SqliteLifecycleService};
use crate::service::session::SessionContext;
use crate::service::LocationProvider;
use log::{info, warn};
use rand::Rng;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

/// Codename recorded on problem reports when the courier had none.
const UNKNOWN_CODENAME: &str = "[unknown]";

#[derive(Debug, Clone)]
pub struct DropoffConfig {
    /// Pause before retrying a failed knot or message insert.
    pub retry_backoff: Duration,
    /// Total attempts for a message submission.
    pub message_attempts: u32,
}

impl Default for DropoffConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(3),
            message_attempts: 3,
        }
    }
}

#[derive(Debug)]
pub enum DropoffError {
    /// No in-progress delivery under this codename.
    DeliveryNotFound(String),
    /// The courier's location could not be read; nothing was written.
    LocationUnavailable,
    /// The dropoff knot was rejected by validation.
    InvalidDropoff(String),
    Store(RepoError),
}

impl Display for DropoffError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeliveryNotFound(codename) => {
                write!(f, "no delivery in progress under `{codename}`")
            }
            Self::LocationUnavailable => write!(f, "courier location unavailable"),
            Self::InvalidDropoff(reason) => write!(f, "dropoff rejected: {reason}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DropoffError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DropoffError {
    fn from(err: RepoError) -> Self {
        Self::Store(err)
    }
}

/// Dropoff flow service, layered over the lifecycle hook.
pub struct DropoffService<K, P, F, D, M, Pr> {
    lifecycle: LifecycleService<K, P, F>,
    deliveries: D,
    messages: M,
    problems: Pr,
    config: DropoffConfig,
}

/// The all-SQLite instantiation used by the binaries.
pub type SqliteDropoffService<'conn> = DropoffService<
    crate::repo::knot_repo::SqliteKnotRepository<'conn>,
    crate::repo::pickup_repo::SqlitePickupRepository<'conn>,
    SqliteProblemRepository<'conn>,
    SqliteDeliveryRepository<'conn>,
    SqliteMessageRepository<'conn>,
    SqliteProblemRepository<'conn>,
>;

impl<'conn> SqliteDropoffService<'conn> {
    /// Builds the service over a migrated connection.
    pub fn from_conn(conn: &'conn Connection) -> Result<Self, RepoError> {
        Ok(Self::new(
            SqliteLifecycleService::from_conn(conn)?,
            SqliteDeliveryRepository::new(conn),
            SqliteMessageRepository::new(conn),
            SqliteProblemRepository::new(conn),
        ))
    }
}

impl<K, P, F, D, M, Pr> DropoffService<K, P, F, D, M, Pr>
where
    K: KnotRepository,
    P: PickupRepository,
    F: FailureLog,
    D: DeliveryRepository,
    M: MessageRepository,
    Pr: ProblemRepository,
{
    pub fn new(
        lifecycle: LifecycleService<K, P, F>,
        deliveries: D,
        messages: M,
        problems: Pr,
    ) -> Self {
        Self {
            lifecycle,
            deliveries,
            messages,
            problems,
            config: DropoffConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DropoffConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lifecycle(&self) -> &LifecycleService<K, P, F> {
        &self.lifecycle
    }

    /// Resolves the session's codename to its delivery, caching it on the
    /// session for the completion step.
    pub fn retrieve_delivery(
        &self,
        session: &mut SessionContext,
        codename: &str,
    ) -> Result<Delivery, DropoffError> {
        let delivery = self
            .deliveries
            .find_by_codename(codename)?
            .ok_or_else(|| DropoffError::DeliveryNotFound(codename.to_string()))?;
        session.codename = Some(delivery.codename.clone());
        session.delivery = Some(delivery.clone());
        Ok(delivery)
    }

    /// Completes the session's delivery at `location`: drops the new chain
    /// knot, then retires the delivery row.
    pub fn complete_delivery<R: Rng + ?Sized>(
        &self,
        session: &mut SessionContext,
        location: Option<GeoPoint>,
        now_ms: i64,
        rng: &mut R,
    ) -> Result<Knot, DropoffError> {
        let delivery = session
            .delivery
            .clone()
            .ok_or_else(|| DropoffError::DeliveryNotFound(UNKNOWN_CODENAME.to_string()))?;

        let destination = match location {
            Some(point) => point,
            None => {
                session.failed_location = true;
                return Err(DropoffError::LocationUnavailable);
            }
        };
        session.failed_location = false;

        let title = alias::delivery_title(&delivery.codename, rng);
        let submission = KnotSubmission::link(title, delivery.origin, destination);

        let outcome = match self.lifecycle.submit_knot(&submission, now_ms, rng) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "event=dropoff_retry module=dropoff codename={} error={err}",
                    delivery.codename
                );
                std::thread::sleep(self.config.retry_backoff);
                self.lifecycle.submit_knot(&submission, now_ms, rng)?
            }
        };

        let knot = match outcome {
            KnotInsertOutcome::Inserted(knot) => knot,
            KnotInsertOutcome::Purged { reason, .. } => {
                return Err(DropoffError::InvalidDropoff(reason.to_string()));
            }
        };

        // The chain already has its knot; a stuck delivery row is only
        // cosmetic, so log instead of failing the dropoff.
        if let Err(err) = self.deliveries.remove_delivery(delivery.id) {
            warn!(
                "event=delivery_remove_failed module=dropoff delivery={} error={err}",
                delivery.id
            );
        }

        info!(
            "event=delivery_completed module=dropoff codename={} knot={}",
            delivery.codename, knot.id
        );
        session.delivery = None;
        Ok(knot)
    }

    /// [`complete_delivery`](Self::complete_delivery) with the location read
    /// from `provider`.
    pub fn complete_delivery_via<R: Rng + ?Sized>(
        &self,
        session: &mut SessionContext,
        provider: &dyn LocationProvider,
        now_ms: i64,
        rng: &mut R,
    ) -> Result<Knot, DropoffError> {
        self.complete_delivery(session, provider.current_location(), now_ms, rng)
    }

    /// Records a dropoff that could not complete, with whatever partial
    /// data survived: the session's codename and delivery if resolved, and
    /// the courier's location if it could be read. Frees the codename.
    pub fn record_problem_delivery(
        &self,
        session: &SessionContext,
        title: &str,
        location: Option<GeoPoint>,
        error: &str,
    ) -> Result<Uuid, DropoffError> {
        let attempted = session
            .codename
            .clone()
            .unwrap_or_else(|| UNKNOWN_CODENAME.to_string());
        let delivery = session.delivery.as_ref();

        if let Some(delivery) = delivery {
            if let Err(err) = self.deliveries.mark_failed(delivery.id) {
                warn!(
                    "event=mark_failed_failed module=dropoff delivery={} error={err}",
                    delivery.id
                );
            }
        }

        let report = ProblemReport {
            title: title.to_string(),
            attempted_codename: attempted,
            delivery: delivery.map(|d| d.id),
            destination: location,
            error: error.to_string(),
        };
        let id = self.problems.append_problem(Uuid::new_v4(), &report)?;
        info!("event=problem_recorded module=dropoff report={id}");
        Ok(id)
    }

    /// One random approved message for the post-delivery screen.
    pub fn random_message(&self) -> Result<Option<Message>, DropoffError> {
        Ok(self.messages.random_approved()?)
    }

    /// Submits a courier response, retrying transient failures up to the
    /// configured attempt budget.
    pub fn submit_message(
        &self,
        response: &str,
        shareable: bool,
    ) -> Result<Uuid, DropoffError> {
        let id = Uuid::new_v4();
        let mut last_err = None;
        for attempt in 1..=self.config.message_attempts {
            match self.messages.insert_message(id, response, shareable) {
                Ok(id) => return Ok(id),
                Err(err) => {
                    warn!(
                        "event=message_submit_retry module=dropoff attempt={attempt} error={err}"
                    );
                    last_err = Some(err);
                    if attempt < self.config.message_attempts {
                        std::thread::sleep(self.config.retry_backoff);
                    }
                }
            }
        }
        // message_attempts >= 1, so last_err is set on this path.
        Err(DropoffError::Store(last_err.unwrap_or_else(|| {
            RepoError::InvalidData("message submission never attempted".to_string())
        })))
    }
}
