//! End-to-end planning run.
//!
//! Rent assignment, traffic aggregation, candidate-day profiling and
//! optimization, in that order. Each stage consumes the previous one's output
//! in full.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::aggregate::{self, Aggregation, OutlierBounds, daily_average, group_by_site, profiles_for_day};
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::feed::{EnrichedObservation, NeighborhoodRegion, SiteId, TrafficFeed, parse_neighborhoods, read_traffic};
use crate::optimizer::{OptimizationOutcome, SiteOptimizer, Solver};
use crate::spatial::NeighborhoodIndex;

/// Display record for every parsed site, selected or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSite {
    pub site_id: SiteId,
    pub latitude: f64,
    pub longitude: f64,
    /// `None` when the site has no complete day of counts.
    pub daily_avg_traffic: Option<f64>,
    /// `None` when no neighborhood contains the site.
    pub rent_per_unit_area: Option<f64>,
    /// Survived rent, completeness and outlier filtering.
    pub in_candidate_set: bool,
}

/// Everything up to, but not including, optimization.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub days: Vec<String>,
    pub aggregation: Aggregation,
    pub sites: Vec<CandidateSite>,
}

/// Output of a full run, handed to the report writers.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub generated_at: DateTime<Utc>,
    pub outlier_bounds: Option<OutlierBounds>,
    pub optimization: OptimizationOutcome,
    pub sites: Vec<CandidateSite>,
}

/// Picks the configured day, or the first day of the feed.
///
/// # Errors
///
/// Returns [`PlanError::UnknownDay`] if the requested day is not in the feed.
pub fn resolve_day(days: &[String], requested: Option<&str>) -> Result<String, PlanError> {
    match requested {
        Some(day) if days.iter().any(|d| d == day) => Ok(day.to_string()),
        Some(day) => Err(PlanError::UnknownDay(day.to_string())),
        None => days.first().cloned().ok_or(PlanError::UnknownDay(String::new())),
    }
}

/// Assigns rent and aggregates traffic.
#[tracing::instrument(skip_all)]
pub fn prepare(traffic: TrafficFeed, regions: Vec<NeighborhoodRegion>, config: &PlannerConfig) -> Result<Prepared, PlanError> {
    config.validate()?;

    let days = traffic.schema.days.clone();
    let index = NeighborhoodIndex::new(regions);
    let enriched = index.assign(traffic.observations);

    let aggregation = aggregate::aggregate(&enriched, config.outlier_lower, config.outlier_upper);
    let sites = candidate_sites(&enriched, &aggregation);

    Ok(Prepared {
        days,
        aggregation,
        sites,
    })
}

fn candidate_sites(enriched: &[EnrichedObservation], aggregation: &Aggregation) -> Vec<CandidateSite> {
    group_by_site(enriched)
        .into_iter()
        .filter_map(|(site_id, rows)| {
            let first = rows.first()?;
            let rented = rows.iter().find(|e| e.rent_per_unit_area.is_some()).unwrap_or(first);
            let in_candidate_set = aggregation.sites.iter().any(|s| s.site_id == site_id);

            Some(CandidateSite {
                latitude: rented.observation.latitude,
                longitude: rented.observation.longitude,
                daily_avg_traffic: daily_average(rows.iter().map(|e| &e.observation)).map(|(avg, _)| avg),
                rent_per_unit_area: rented.rent_per_unit_area,
                in_candidate_set,
                site_id,
            })
        })
        .collect()
}

/// Runs the full pipeline on already-parsed feeds.
///
/// # Errors
///
/// Fails only on caller errors: invalid configuration, an unknown candidate
/// day, or no site surviving to the optimizer.
#[tracing::instrument(skip_all)]
pub fn run<S: Solver>(
    traffic: TrafficFeed,
    regions: Vec<NeighborhoodRegion>,
    config: &PlannerConfig,
    solver: S,
) -> Result<PlanReport, PlanError> {
    config.validate()?;
    let day = resolve_day(traffic.days(), config.candidate_day.as_deref())?;
    let prepared = prepare(traffic, regions, config)?;

    let profiles = profiles_for_day(&prepared.aggregation.sites, &day, config.rent_amortization_days);

    let optimizer = SiteOptimizer::new(solver, config.economics.clone()).with_top_k(config.top_k);
    let optimization = optimizer.optimize(&day, &profiles)?;

    info!(
        day = %day,
        sites = prepared.sites.len(),
        candidates = prepared.aggregation.sites.len(),
        selected = optimization.results.len(),
        "Plan complete"
    );

    Ok(PlanReport {
        generated_at: Utc::now(),
        outlier_bounds: prepared.aggregation.bounds,
        optimization,
        sites: prepared.sites,
    })
}

/// Parses raw feed contents and runs the pipeline.
pub fn plan<S: Solver>(
    traffic_csv: &[u8],
    neighborhoods_json: &str,
    config: &PlannerConfig,
    solver: S,
) -> Result<PlanReport, PlanError> {
    let traffic = read_traffic(traffic_csv, &config.columns)?;
    let regions = parse_neighborhoods(neighborhoods_json)?;
    run(traffic, regions, config, solver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_day_defaults_to_first() {
        let days = vec!["May07".to_string(), "Oct07".to_string()];
        assert_eq!(resolve_day(&days, None).unwrap(), "May07");
        assert_eq!(resolve_day(&days, Some("Oct07")).unwrap(), "Oct07");
    }

    #[test]
    fn test_resolve_day_rejects_unknown() {
        let days = vec!["May07".to_string()];
        let err = resolve_day(&days, Some("Sept07")).unwrap_err();
        assert!(matches!(err, PlanError::UnknownDay(ref d) if d == "Sept07"));
    }

    #[test]
    fn test_candidate_sites_cover_unrented_sites() {
        let csv = "\
Loc,the_geom,May07_AM,May07_MD,May07_PM
1,POINT (-73.995 40.745),100,100,100
2,POINT (-73.5 41.5),100,100,100
";
        let json = r#"{"Chelsea": {"lat_min": 40.74, "lat_max": 40.75, "lon_min": -74.01, "lon_max": -73.99, "rent": 110}}"#;
        let config = PlannerConfig::default();

        let traffic = read_traffic(csv.as_bytes(), &config.columns).unwrap();
        let prepared = prepare(traffic, parse_neighborhoods(json).unwrap(), &config).unwrap();

        assert_eq!(prepared.sites.len(), 2);
        assert!(prepared.sites[0].in_candidate_set);
        assert_eq!(prepared.sites[1].rent_per_unit_area, None);
        assert_eq!(prepared.sites[1].daily_avg_traffic, Some(300.0));
        assert!(!prepared.sites[1].in_candidate_set);
    }
}
