//! Domain model for the delivery-chain game.
//!
//! # Responsibility
//! - Define the canonical records shared by repositories and services.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - The knot set forms a forest under the `source` relation.

pub mod delivery;
pub mod geo;
pub mod knot;
