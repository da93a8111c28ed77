//! Data types shared by the feed readers and the pipeline stages.

use geo::{Intersects, Point, Rect, coord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One of the three daily time blocks traffic is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Period {
    Am,
    Md,
    Pm,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Am, Period::Md, Period::Pm];

    /// The column suffix used in the traffic feed.
    pub fn label(self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Md => "MD",
            Period::Pm => "PM",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "AM" => Some(Period::Am),
            "MD" => Some(Period::Md),
            "PM" => Some(Period::Pm),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifier of a candidate site.
///
/// Plain integer ids sort first, numerically, so `"9" < "10"`. All other ids
/// follow in string order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (bool, u64, &str) {
        match self.0.parse::<u64>() {
            Ok(n) => (false, n, &self.0),
            Err(_) => (true, 0, &self.0),
        }
    }
}

impl Ord for SiteId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for SiteId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Traffic counts for the three periods of one day. `None` is an empty cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodCounts {
    pub am: Option<f64>,
    pub md: Option<f64>,
    pub pm: Option<f64>,
}

impl PeriodCounts {
    pub fn new(am: f64, md: f64, pm: f64) -> Self {
        Self {
            am: Some(am),
            md: Some(md),
            pm: Some(pm),
        }
    }

    pub fn get(&self, period: Period) -> Option<f64> {
        match period {
            Period::Am => self.am,
            Period::Md => self.md,
            Period::Pm => self.pm,
        }
    }

    pub fn set(&mut self, period: Period, value: Option<f64>) {
        match period {
            Period::Am => self.am = value,
            Period::Md => self.md = value,
            Period::Pm => self.pm = value,
        }
    }

    /// All three counts, or `None` if any period is missing.
    pub fn complete(&self) -> Option<[f64; 3]> {
        Some([self.am?, self.md?, self.pm?])
    }

    /// AM + MD + PM, or `None` for an incomplete day.
    pub fn daily_total(&self) -> Option<f64> {
        self.complete().map(|c| c.iter().sum())
    }
}

/// Counts recorded for one day label (e.g. `May07`).
#[derive(Debug, Clone, PartialEq)]
pub struct DayCounts {
    pub day: String,
    pub counts: PeriodCounts,
}

/// One parsed row of the traffic feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub site_id: SiteId,
    pub latitude: f64,
    pub longitude: f64,
    /// In feed column order.
    pub days: Vec<DayCounts>,
}

impl Observation {
    /// The observation's point, `x` = longitude, `y` = latitude.
    pub fn location(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    pub fn day(&self, label: &str) -> Option<&PeriodCounts> {
        self.days.iter().find(|d| d.day == label).map(|d| &d.counts)
    }
}

/// A named area with a bounding box and a rent per unit area.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodRegion {
    pub name: String,
    /// `x` is longitude, `y` latitude.
    pub bounds: Rect<f64>,
    pub rent: f64,
}

impl NeighborhoodRegion {
    pub fn new(name: impl Into<String>, lat: (f64, f64), lon: (f64, f64), rent: f64) -> Self {
        Self {
            name: name.into(),
            bounds: Rect::new(coord! { x: lon.0, y: lat.0 }, coord! { x: lon.1, y: lat.1 }),
            rent,
        }
    }

    /// Bounding-box containment, edges included.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        point.intersects(&self.bounds)
    }
}

/// An observation with the rent of the region it falls in, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedObservation {
    pub observation: Observation,
    pub rent_per_unit_area: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_id_numeric_order() {
        let mut ids = vec![SiteId::new("10"), SiteId::new("9"), SiteId::new("100")];
        ids.sort();
        let ordered: Vec<_> = ids.iter().map(SiteId::as_str).collect();
        assert_eq!(ordered, vec!["9", "10", "100"]);
    }

    #[test]
    fn test_site_id_falls_back_to_string_order() {
        assert!(SiteId::new("A2") < SiteId::new("B1"));
        assert!(SiteId::new("12") < SiteId::new("A"));
    }

    #[test]
    fn test_site_id_order_is_total_for_mixed_ids() {
        let nine = SiteId::new("9");
        let ten = SiteId::new("10");
        let mixed = SiteId::new("1A");

        assert!(nine < ten);
        assert!(ten < mixed);
        assert!(nine < mixed);

        let mut ids: Vec<_> = ["1A", "10", "B", "9", "007", "7"].into_iter().map(SiteId::new).collect();
        ids.sort();
        let ordered: Vec<_> = ids.iter().map(SiteId::as_str).collect();
        assert_eq!(ordered, vec!["007", "7", "9", "10", "1A", "B"]);

        for a in &ids {
            for b in &ids {
                for c in &ids {
                    if a < b && b < c {
                        assert!(a < c, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_daily_total_requires_all_periods() {
        let full = PeriodCounts::new(1.0, 2.0, 3.0);
        assert_eq!(full.daily_total(), Some(6.0));

        let mut partial = full;
        partial.set(Period::Md, None);
        assert_eq!(partial.daily_total(), None);
        assert_eq!(partial.get(Period::Am), Some(1.0));
    }

    #[test]
    fn test_region_contains_is_inclusive() {
        let region = NeighborhoodRegion::new("Midtown", (40.75, 40.76), (-73.99, -73.98), 120.0);

        assert!(region.contains(&Point::new(-73.99, 40.75)));
        assert!(region.contains(&Point::new(-73.98, 40.76)));
        assert!(region.contains(&Point::new(-73.985, 40.755)));
        assert!(!region.contains(&Point::new(-73.985, 40.761)));
        assert!(!region.contains(&Point::new(-73.979, 40.755)));
    }

    #[test]
    fn test_period_labels() {
        for period in Period::ALL {
            assert_eq!(Period::from_label(period.label()), Some(period));
        }
        assert_eq!(Period::from_label("EV"), None);
    }
}
