//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into pickup/dropoff/display flows.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - Per-session state lives in an explicit [`session::SessionContext`]
//!   threaded through calls; services hold no mutable session state.

pub mod display;
pub mod dropoff;
pub mod lifecycle;
pub mod pickup;
pub mod session;

use crate::model::geo::GeoPoint;

/// Source of the courier's current reading. `None` when permission is
/// denied or no fix is available; flows degrade rather than block on it.
pub trait LocationProvider {
    fn current_location(&self) -> Option<GeoPoint>;
}
