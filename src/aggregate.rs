//! Traffic aggregation.
//!
//! Raw per-period counts are reduced to one daily average per site: each
//! complete day contributes AM + MD + PM, incomplete days contribute nothing,
//! and the site's average is the mean over its complete days. Sites whose
//! average falls outside the configured percentile band are then dropped.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::feed::{EnrichedObservation, Observation, Period, SiteId};
use crate::stats::{mean, percentile};

/// A site with rent and at least one complete day of counts.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTraffic {
    pub site_id: SiteId,
    pub latitude: f64,
    pub longitude: f64,
    pub rent_per_unit_area: f64,
    pub daily_average: f64,
    pub complete_days: usize,
    observations: Vec<Observation>,
}

/// Inclusive band of accepted daily averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// Percentile band of the sites' daily averages. `None` without sites.
    pub fn from_sites(sites: &[SiteTraffic], lower_q: f64, upper_q: f64) -> Option<Self> {
        let mut averages: Vec<f64> = sites.iter().map(|s| s.daily_average).collect();
        averages.sort_by(f64::total_cmp);

        Some(Self {
            lower: percentile(&averages, lower_q)?,
            upper: percentile(&averages, upper_q)?,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Keeps the sites whose daily average lies within the band.
    pub fn retain(&self, sites: Vec<SiteTraffic>) -> Vec<SiteTraffic> {
        sites
            .into_iter()
            .filter(|s| self.contains(s.daily_average))
            .collect()
    }
}

/// Output of [`aggregate`]: the retained sites and the band used.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub sites: Vec<SiteTraffic>,
    pub bounds: Option<OutlierBounds>,
    pub outliers: usize,
}

/// Traffic-only summary for one set of observations, ignoring rent.
pub fn daily_average<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Option<(f64, usize)> {
    let totals: Vec<f64> = observations
        .into_iter()
        .flat_map(|o| o.days.iter())
        .filter_map(|d| d.counts.daily_total())
        .collect();

    if totals.is_empty() {
        None
    } else {
        Some((mean(&totals), totals.len()))
    }
}

/// Groups observations by site, ordered by site id.
pub fn group_by_site<'a>(
    observations: impl IntoIterator<Item = &'a EnrichedObservation>,
) -> BTreeMap<SiteId, Vec<&'a EnrichedObservation>> {
    let mut by_site: BTreeMap<SiteId, Vec<&EnrichedObservation>> = BTreeMap::new();
    for enriched in observations {
        by_site
            .entry(enriched.observation.site_id.clone())
            .or_default()
            .push(enriched);
    }
    by_site
}

/// Builds per-site daily averages from rent-enriched observations.
///
/// Observations without a rent are skipped. All observations of one site are
/// pooled; the site's location and rent come from its first rented row.
pub fn site_traffic(enriched: &[EnrichedObservation]) -> Vec<SiteTraffic> {
    let rented = enriched.iter().filter(|e| e.rent_per_unit_area.is_some());

    group_by_site(rented)
        .into_iter()
        .filter_map(|(site_id, rows)| {
            let first = rows.first()?;
            let rent = first.rent_per_unit_area?;

            let Some((daily_average, complete_days)) = daily_average(rows.iter().map(|e| &e.observation))
            else {
                debug!(%site_id, "Site has no complete day of counts");
                return None;
            };

            Some(SiteTraffic {
                site_id,
                latitude: first.observation.latitude,
                longitude: first.observation.longitude,
                rent_per_unit_area: rent,
                daily_average,
                complete_days,
                observations: rows.iter().map(|e| e.observation.clone()).collect(),
            })
        })
        .collect()
}

/// Daily averages followed by the percentile outlier cut.
#[tracing::instrument(skip(enriched), fields(observations = enriched.len()))]
pub fn aggregate(enriched: &[EnrichedObservation], lower_q: f64, upper_q: f64) -> Aggregation {
    let sites = site_traffic(enriched);
    let before = sites.len();

    let Some(bounds) = OutlierBounds::from_sites(&sites, lower_q, upper_q) else {
        info!("No site has rent and a complete day of counts");
        return Aggregation {
            sites,
            bounds: None,
            outliers: 0,
        };
    };

    let sites = bounds.retain(sites);
    let outliers = before - sites.len();

    info!(
        sites = sites.len(),
        outliers,
        lower = bounds.lower,
        upper = bounds.upper,
        "Traffic aggregated"
    );

    Aggregation {
        sites,
        bounds: Some(bounds),
        outliers,
    }
}

/// Traffic and rent of one site on the candidate day.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDailyProfile {
    pub site_id: SiteId,
    /// Indexed by [`Period::index`].
    pub traffic: [f64; 3],
    /// Rent per unit area per day.
    pub daily_rent: f64,
}

impl SiteDailyProfile {
    pub fn traffic(&self, period: Period) -> f64 {
        self.traffic[period.index()]
    }

    pub fn total_traffic(&self) -> f64 {
        self.traffic.iter().sum()
    }
}

/// Profiles every site for `day`.
///
/// A site's period traffic is the mean over its observations that have all
/// three periods on that day; sites with none are left out. Rent is divided
/// by `amortization_days` to get a daily figure.
pub fn profiles_for_day(sites: &[SiteTraffic], day: &str, amortization_days: f64) -> Vec<SiteDailyProfile> {
    let mut profiles = Vec::with_capacity(sites.len());

    for site in sites {
        let days: Vec<[f64; 3]> = site
            .observations
            .iter()
            .filter_map(|o| o.day(day).and_then(|c| c.complete()))
            .collect();

        if days.is_empty() {
            debug!(site_id = %site.site_id, day, "Site has no complete counts for candidate day");
            continue;
        }

        let mut traffic = [0.0; 3];
        for (i, slot) in traffic.iter_mut().enumerate() {
            let values: Vec<f64> = days.iter().map(|d| d[i]).collect();
            *slot = mean(&values);
        }

        profiles.push(SiteDailyProfile {
            site_id: site.site_id.clone(),
            traffic,
            daily_rent: site.rent_per_unit_area / amortization_days,
        });
    }

    info!(
        day,
        profiles = profiles.len(),
        dropped = sites.len() - profiles.len(),
        "Candidate day profiled"
    );

    profiles
}
