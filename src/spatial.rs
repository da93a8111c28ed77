//! Rent attribution for traffic observations.
//!
//! Each observation's point is matched against the neighborhood bounding
//! boxes in feed order; the first box containing the point supplies the rent.

use geo::Point;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::feed::{EnrichedObservation, NeighborhoodRegion, Observation};

/// Parses a `POINT (lon lat)` geometry into `(lat, lon)`, each rounded to
/// three decimals.
///
/// # Errors
///
/// Returns [`ParseError::Geometry`] unless the text is the `POINT` keyword
/// followed by exactly two numbers in parentheses.
pub fn parse_point(geometry: &str) -> Result<(f64, f64), ParseError> {
    let malformed = || ParseError::Geometry(geometry.to_string());

    let inner = geometry
        .trim()
        .strip_prefix("POINT")
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(malformed)?;

    let mut parts = inner.split_whitespace();
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let lon: f64 = lon.parse().map_err(|_| malformed())?;
    let lat: f64 = lat.parse().map_err(|_| malformed())?;
    if !lat.is_finite() || !lon.is_finite() {
        return Err(malformed());
    }

    Ok((round3(lat), round3(lon)))
}

/// Rounds to three decimals through decimal formatting, so near-ties resolve
/// on the exact binary value rather than on `x * 1000.0`.
pub fn round3(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}

/// Ordered collection of neighborhood regions.
pub struct NeighborhoodIndex {
    regions: Vec<NeighborhoodRegion>,
}

impl NeighborhoodIndex {
    pub fn new(regions: Vec<NeighborhoodRegion>) -> Self {
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The first region whose bounding box contains the point.
    ///
    /// Regions are assumed disjoint; if two overlap, the earlier one wins.
    #[must_use]
    pub fn region_at(&self, lat: f64, lon: f64) -> Option<&NeighborhoodRegion> {
        self.region_containing(&Point::new(lon, lat))
    }

    fn region_containing(&self, point: &Point<f64>) -> Option<&NeighborhoodRegion> {
        self.regions.iter().find(|r| r.contains(point))
    }

    #[must_use]
    pub fn rent_at(&self, lat: f64, lon: f64) -> Option<f64> {
        self.region_at(lat, lon).map(|r| r.rent)
    }

    /// Attaches a rent to every observation. Unmatched points get `None`.
    #[tracing::instrument(skip_all, fields(observations = observations.len(), regions = self.regions.len()))]
    pub fn assign(&self, observations: Vec<Observation>) -> Vec<EnrichedObservation> {
        let mut unassigned = 0usize;

        let enriched: Vec<_> = observations
            .into_iter()
            .map(|observation| {
                let rent = self.region_containing(&observation.location()).map(|r| r.rent);
                if rent.is_none() {
                    unassigned += 1;
                    debug!(
                        site_id = %observation.site_id,
                        lat = observation.latitude,
                        lon = observation.longitude,
                        "No neighborhood contains observation"
                    );
                }
                EnrichedObservation {
                    observation,
                    rent_per_unit_area: rent,
                }
            })
            .collect();

        info!(
            assigned = enriched.len() - unassigned,
            unassigned, "Rent assignment complete"
        );

        enriched
    }
}
