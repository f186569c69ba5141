//! In-progress deliveries, active pickup points, and feedback messages.
//!
//! # Responsibility
//! - Define the records that bridge a pickup to its later dropoff.
//! - Own the pickup-point TTL arithmetic.
//!
//! # Invariants
//! - Codenames are compared and persisted lowercase.
//! - `delivered_time` is set at most once per pickup point; expiry is
//!   measured against it, never against creation time.

use crate::model::knot::KnotId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DeliveryId = Uuid;
pub type PickupId = Uuid;
pub type MessageId = Uuid;

/// How long a pickup point stays visible after its goods have moved on.
pub const DEFAULT_PICKUP_TTL_MS: i64 = 12 * 60 * 60 * 1000;

/// Lowercases and trims a user-supplied codename into its stored form.
pub fn normalize_codename(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A claimed pickup waiting for its dropoff. Created at pickup time,
/// deleted on successful dropoff, or flagged `failed` and kept for the
/// problems log when the dropoff cannot complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    /// Unique per in-progress delivery, case-insensitive, stored lowercase.
    pub codename: String,
    /// The knot whose endpoint was picked up.
    pub origin: KnotId,
    pub failed: bool,
}

/// Display-only projection of a collectable package location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: PickupId,
    /// Short human-memorable ref code shown on the map.
    pub title: String,
    pub knot: KnotId,
    /// Set once the referenced knot's source has been collected.
    pub delivered_time: Option<i64>,
}

impl PickupPoint {
    pub fn is_delivered(&self) -> bool {
        self.delivered_time.is_some()
    }

    /// Whether this point has outlived its display window.
    pub fn is_expired(&self, now_ms: i64, ttl_ms: i64) -> bool {
        match self.delivered_time {
            Some(delivered) => now_ms - delivered >= ttl_ms,
            None => false,
        }
    }
}

/// Narrative text fed back to a courier after completing a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub response: String,
    /// Courier consented to the text being shared publicly.
    pub shareable: bool,
    pub reviewed: bool,
    pub approved: bool,
}
