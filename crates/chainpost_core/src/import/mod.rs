//! Bulk seeding: address resolution and scripted imports.
//!
//! # Responsibility
//! - Turn free-form location entries into coordinates, via a literal
//!   `lat, lng` parse or a pluggable geocoding backend.
//! - Split multi-entry seed scripts into individual entries.
//!
//! # Invariants
//! - Literal coordinates never hit the geocoder.
//! - Seeded points carry a fixed nominal accuracy; proximity checks clamp
//!   to the minimum radius anyway.

pub mod chain;

use crate::model::geo::{GeoPoint, LatLng};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Accuracy stamped on seeded knots. Nominal; see `MIN_RADIUS_M`.
pub const SEED_ACCURACY_M: f64 = 1.0;

/// Separator between entries in a seed script.
pub const ENTRY_SEPARATOR: &str = " / ";

static COORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$")
        .expect("coordinate pattern compiles")
});

#[derive(Debug)]
pub enum GeocodeError {
    /// The backend had no match for this address.
    NotFound(String),
    /// The backend itself failed.
    Backend(String),
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(address) => write!(f, "no geocoding result for `{address}`"),
            Self::Backend(message) => write!(f, "geocoding backend failed: {message}"),
        }
    }
}

impl Error for GeocodeError {}

/// Address-to-coordinate resolution backend.
pub trait Geocoder {
    fn resolve_address(&self, address: &str) -> Result<LatLng, GeocodeError>;
}

/// Backend for offline runs; every address misses.
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    fn resolve_address(&self, address: &str) -> Result<LatLng, GeocodeError> {
        Err(GeocodeError::NotFound(address.to_string()))
    }
}

/// Parses a literal `lat, lng` pair, `None` when the entry is not one.
pub fn parse_coords(entry: &str) -> Option<LatLng> {
    let captures = COORDS_RE.captures(entry)?;
    let lat: f64 = captures[1].parse().ok()?;
    let lng: f64 = captures[2].parse().ok()?;
    Some(LatLng { lat, lng })
}

/// Resolves one location entry: literal coordinates first, then the
/// geocoder.
pub fn parse_point(entry: &str, geocoder: &dyn Geocoder) -> Result<GeoPoint, GeocodeError> {
    let location = match parse_coords(entry) {
        Some(coords) => coords,
        None => geocoder.resolve_address(entry)?,
    };
    Ok(GeoPoint::new(location.lat, location.lng, SEED_ACCURACY_M))
}

/// Splits a seed script into its entries, dropping blanks.
pub fn split_entries(script: &str) -> Vec<&str> {
    script
        .split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_coords, parse_point, split_entries, GeocodeError, NullGeocoder};

    #[test]
    fn literal_coordinates_parse_with_signs_and_whitespace() {
        let coords = parse_coords(" -37.8136 , 144.9631 ").unwrap();
        assert_eq!(coords.lat, -37.8136);
        assert_eq!(coords.lng, 144.9631);

        assert_eq!(parse_coords("12, -7").map(|c| c.lng), Some(-7.0));
    }

    #[test]
    fn non_coordinate_entries_are_rejected() {
        assert!(parse_coords("Flinders Street Station").is_none());
        assert!(parse_coords("1.0, 2.0, 3.0").is_none());
        assert!(parse_coords("").is_none());
    }

    #[test]
    fn parse_point_falls_back_to_the_geocoder() {
        let point = parse_point("10.5, -20.25", &NullGeocoder).unwrap();
        assert_eq!(point.latitude, 10.5);
        assert_eq!(point.longitude, -20.25);

        let err = parse_point("some address", &NullGeocoder).unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound(_)));
    }

    #[test]
    fn scripts_split_on_the_entry_separator() {
        let entries = split_entries("1, 2 / Flinders Street /  / 3, 4");
        assert_eq!(entries, vec!["1, 2", "Flinders Street", "3, 4"]);
        assert!(split_entries("").is_empty());
    }
}
