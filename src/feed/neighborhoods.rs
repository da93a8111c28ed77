//! Neighborhood feed reader.
//!
//! The feed is a JSON object keyed by neighborhood name:
//! ```json
//! {
//!   "SoHo": { "lat_min": 40.72, "lat_max": 40.73, "lon_min": -74.01, "lon_max": -73.99, "rent": 150.0 }
//! }
//! ```
//! Document order is kept because the first containing region wins.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{ParseError, PlanError};
use crate::feed::types::NeighborhoodRegion;

#[derive(Deserialize)]
struct RegionEntry {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    rent: f64,
}

/// Parses the neighborhood JSON into regions, in document order.
///
/// # Errors
///
/// Returns an error if the document is not a JSON object or any entry lacks
/// a numeric bound or rent.
pub fn parse_neighborhoods(json: &str) -> Result<Vec<NeighborhoodRegion>, PlanError> {
    let entries: Map<String, Value> = serde_json::from_str(json)?;
    let mut regions = Vec::with_capacity(entries.len());

    for (name, value) in entries {
        let entry: RegionEntry =
            serde_json::from_value(value).map_err(|e| ParseError::Neighborhood {
                name: name.clone(),
                message: e.to_string(),
            })?;

        // An inverted box contains no point.
        if entry.lat_min > entry.lat_max || entry.lon_min > entry.lon_max {
            warn!(neighborhood = %name, "Skipping neighborhood with inverted bounding box");
            continue;
        }

        regions.push(NeighborhoodRegion::new(
            name,
            (entry.lat_min, entry.lat_max),
            (entry.lon_min, entry.lon_max),
            entry.rent,
        ));
    }

    info!(regions = regions.len(), "Neighborhood feed parsed");
    Ok(regions)
}
