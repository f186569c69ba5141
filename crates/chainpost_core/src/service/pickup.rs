//! Pickup flow: target resolution, proximity gating, claiming a delivery.
//!
//! # Responsibility
//! - Resolve what the courier tapped (pickup ref code or knot id) to a
//!   target knot.
//! - Start an in-progress delivery under a unique codename.
//!
//! # Invariants
//! - Codename uniqueness is the store's unique index, not a pre-check;
//!   conflicts come back as a typed error carrying a fresh suggestion.
//! - A transient store failure gets exactly one retry after a fixed
//!   backoff before surfacing.

use crate::alias;
use crate::model::delivery::{normalize_codename, Delivery, DEFAULT_PICKUP_TTL_MS};
use crate::model::geo::{within_range, GeoPoint};
use crate::model::knot::{Knot, KnotId};
use crate::repo::delivery_repo::{DeliveryRepository, SqliteDeliveryRepository};
use crate::repo::knot_repo::{KnotRepository, SqliteKnotRepository};
use crate::repo::pickup_repo::{PickupRepository, SqlitePickupRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::session::{CodenameStore, SessionContext};
use log::warn;
use rand::Rng;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

/// Knobs for the pickup flow; defaults mirror production behavior.
#[derive(Debug, Clone)]
pub struct PickupConfig {
    /// Pause before the single retry of a failed delivery insert.
    pub retry_backoff: Duration,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(3),
        }
    }
}

#[derive(Debug)]
pub enum PickupError {
    /// Another in-progress delivery holds this codename. `suggestion` is a
    /// free candidate when one could be generated within budget.
    CodenameTaken {
        codename: String,
        suggestion: Option<String>,
    },
    /// Store failure that survived the retry.
    Store(RepoError),
}

impl Display for PickupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CodenameTaken { codename, .. } => {
                write!(f, "codename `{codename}` is already in use")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PickupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::CodenameTaken { .. } => None,
        }
    }
}

/// Pickup flow service.
pub struct PickupService<K, P, D, S> {
    knots: K,
    pickups: P,
    deliveries: D,
    codename_store: S,
    config: PickupConfig,
    ttl_ms: i64,
}

impl<'conn, S: CodenameStore>
    PickupService<
        SqliteKnotRepository<'conn>,
        SqlitePickupRepository<'conn>,
        SqliteDeliveryRepository<'conn>,
        S,
    >
{
    /// Builds the service over a migrated connection.
    pub fn from_conn(conn: &'conn Connection, codename_store: S) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteKnotRepository::try_new(conn)?,
            SqlitePickupRepository::new(conn),
            SqliteDeliveryRepository::new(conn),
            codename_store,
        ))
    }
}

impl<K, P, D, S> PickupService<K, P, D, S>
where
    K: KnotRepository,
    P: PickupRepository,
    D: DeliveryRepository,
    S: CodenameStore,
{
    pub fn new(knots: K, pickups: P, deliveries: D, codename_store: S) -> Self {
        Self {
            knots,
            pickups,
            deliveries,
            codename_store,
            config: PickupConfig::default(),
            ttl_ms: DEFAULT_PICKUP_TTL_MS,
        }
    }

    pub fn with_config(mut self, config: PickupConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the pickup TTL (tests, tuning).
    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn codename_store(&self) -> &S {
        &self.codename_store
    }

    /// Resolves a marker identifier: pickup ref code first, then a literal
    /// knot id. Expired pickup points are swept first, so a stale ref code
    /// stops resolving the moment its TTL passes.
    pub fn find_target(&self, identifier: &str, now_ms: i64) -> RepoResult<Option<Knot>> {
        self.pickups.sweep_expired(now_ms, self.ttl_ms)?;

        let by_ref_code = self
            .pickups
            .list_pickups()?
            .into_iter()
            .find(|pickup| pickup.title == identifier);
        if let Some(pickup) = by_ref_code {
            return self.knots.get_knot(pickup.knot);
        }

        match Uuid::parse_str(identifier) {
            Ok(id) => self.knots.get_knot(id),
            Err(_) => Ok(None),
        }
    }

    /// Whether the courier's reading is close enough to claim the target.
    pub fn can_pick_up(&self, user: &GeoPoint, target: &Knot) -> bool {
        within_range(user, &target.destination)
    }

    /// Claims `origin` under `codename`, creating the in-progress delivery
    /// and persisting the codename for the later dropoff.
    pub fn begin_delivery<R: Rng + ?Sized>(
        &self,
        session: &mut SessionContext,
        codename: &str,
        origin: KnotId,
        rng: &mut R,
    ) -> Result<Delivery, PickupError> {
        let normalized = normalize_codename(codename);
        let id = Uuid::new_v4();

        match self.deliveries.create_delivery(id, &normalized, origin) {
            Ok(_) => {}
            Err(RepoError::CodenameConflict(taken)) => {
                return Err(self.codename_conflict(session, taken, rng));
            }
            Err(err) => {
                warn!(
                    "event=delivery_insert_retry module=pickup codename={normalized} error={err}"
                );
                std::thread::sleep(self.config.retry_backoff);
                match self.deliveries.create_delivery(id, &normalized, origin) {
                    Ok(_) => {}
                    Err(RepoError::CodenameConflict(taken)) => {
                        return Err(self.codename_conflict(session, taken, rng));
                    }
                    Err(retry_err) => return Err(PickupError::Store(retry_err)),
                }
            }
        }

        session.codename = Some(normalized.clone());
        session.failed_codename = false;
        if let Err(err) = self.codename_store.store(&normalized) {
            warn!("event=codename_persist_failed module=pickup error={err}");
        }

        Ok(Delivery {
            id,
            codename: normalized,
            origin,
            failed: false,
        })
    }

    fn codename_conflict<R: Rng + ?Sized>(
        &self,
        session: &mut SessionContext,
        taken: String,
        rng: &mut R,
    ) -> PickupError {
        session.failed_codename = true;
        let suggestion = match self.deliveries.list_codenames() {
            Ok(existing) => alias::suggest_unique(&existing, rng),
            Err(err) => {
                warn!("event=codename_suggestion_failed module=pickup error={err}");
                None
            }
        };
        PickupError::CodenameTaken {
            codename: taken,
            suggestion,
        }
    }
}
