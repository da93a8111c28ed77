//! Output formatting and persistence for planning results.
//!
//! Supports pretty-printing, JSON reports, and flat CSV tables for the
//! selected sites and for every parsed site.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::optimizer::SiteResult;
use crate::pipeline::{CandidateSite, PlanReport};

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &PlanReport) {
    debug!("{:#?}", report);
}

/// Logs a report as pretty-printed JSON.
pub fn print_json(report: &PlanReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Flat CSV row for one selected site.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    rank: usize,
    site_id: &'a str,
    daily_profit: f64,
    daily_revenue: f64,
    daily_customers: f64,
    daily_rent: f64,
    daily_staff_cost: f64,
    daily_utility_cost: f64,
    operating_periods: String,
    traffic_am: f64,
    traffic_md: f64,
    traffic_pm: f64,
}

impl<'a> ResultRow<'a> {
    fn new(rank: usize, site: &'a SiteResult) -> Self {
        let periods: Vec<&str> = site.operating_periods.iter().map(|p| p.label()).collect();
        Self {
            rank,
            site_id: site.site_id.as_str(),
            daily_profit: site.daily_profit,
            daily_revenue: site.daily_revenue,
            daily_customers: site.daily_customers,
            daily_rent: site.daily_rent,
            daily_staff_cost: site.daily_staff_cost,
            daily_utility_cost: site.daily_utility_cost,
            operating_periods: periods.join("|"),
            traffic_am: site.period_traffic.am,
            traffic_md: site.period_traffic.md,
            traffic_pm: site.period_traffic.pm,
        }
    }
}

/// Writes the ranked results as CSV, replacing any existing file.
///
/// The header is written even when there are no results.
pub fn write_results_csv(path: &str, results: &[SiteResult]) -> Result<()> {
    debug!(path, rows = results.len(), "Writing results CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record([
        "rank",
        "site_id",
        "daily_profit",
        "daily_revenue",
        "daily_customers",
        "daily_rent",
        "daily_staff_cost",
        "daily_utility_cost",
        "operating_periods",
        "traffic_am",
        "traffic_md",
        "traffic_pm",
    ])?;
    for (i, site) in results.iter().enumerate() {
        writer.serialize(ResultRow::new(i + 1, site))?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes every parsed site as CSV for the mapping layer.
pub fn write_sites_csv(path: &str, sites: &[CandidateSite]) -> Result<()> {
    debug!(path, rows = sites.len(), "Writing sites CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for site in sites {
        writer.serialize(site)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes the full report as pretty JSON.
pub fn write_report_json(path: &str, report: &PlanReport) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    info!(path, "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfitFloorMode;
    use crate::feed::{Period, SiteId};
    use crate::optimizer::{OptimizationOutcome, PeriodTraffic, SolveStatus};
    use chrono::Utc;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_report());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_report()).unwrap();
    }

    #[test]
    fn test_results_csv_has_flat_rows() {
        let path = temp_path("storefront_planner_test_results.csv");
        let _ = fs::remove_file(&path);

        let report = sample_report();
        write_results_csv(&path, &report.optimization.results).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("rank,site_id,daily_profit"));
        assert!(lines[1].starts_with("1,7,812.5,"));
        assert!(lines[1].contains("AM|PM"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_results_csv_header_without_results() {
        let path = temp_path("storefront_planner_test_empty.csv");
        let _ = fs::remove_file(&path);

        write_results_csv(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_sites_csv_leaves_missing_values_empty() {
        let path = temp_path("storefront_planner_test_sites.csv");
        let _ = fs::remove_file(&path);

        write_sites_csv(&path, &sample_report().sites).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "site_id,latitude,longitude,daily_avg_traffic,rent_per_unit_area,in_candidate_set"
        );
        assert_eq!(lines[2], "8,40.8,-73.9,,,false");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_report_json_round_trips_as_value() {
        let path = temp_path("storefront_planner_test_report.json");
        let _ = fs::remove_file(&path);

        write_report_json(&path, &sample_report()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["optimization"]["status"], "optimal");
        assert_eq!(value["optimization"]["profit_floor_mode"], "post_filter");
        assert_eq!(value["optimization"]["results"][0]["operating_periods"][1], "PM");

        fs::remove_file(&path).unwrap();
    }

    // Helper functions for tests
    fn sample_report() -> PlanReport {
        PlanReport {
            generated_at: Utc::now(),
            outlier_bounds: None,
            optimization: OptimizationOutcome {
                candidate_day: "May07".to_string(),
                status: SolveStatus::Optimal,
                profit_floor_mode: ProfitFloorMode::PostFilter,
                considered: 2,
                below_floor: 0,
                objective: Some(812.5),
                results: vec![SiteResult {
                    site_id: SiteId::new("7"),
                    daily_rent: 200.0,
                    daily_staff_cost: 160.0,
                    daily_utility_cost: 200.0,
                    operating_periods: vec![Period::Am, Period::Pm],
                    daily_customers: 274.5,
                    daily_revenue: 1372.5,
                    daily_profit: 812.5,
                    period_traffic: PeriodTraffic {
                        am: 1800.0,
                        md: 900.0,
                        pm: 1631.25,
                    },
                }],
            },
            sites: vec![
                CandidateSite {
                    site_id: SiteId::new("7"),
                    latitude: 40.75,
                    longitude: -73.99,
                    daily_avg_traffic: Some(4331.25),
                    rent_per_unit_area: Some(91.25),
                    in_candidate_set: true,
                },
                CandidateSite {
                    site_id: SiteId::new("8"),
                    latitude: 40.8,
                    longitude: -73.9,
                    daily_avg_traffic: None,
                    rent_per_unit_area: None,
                    in_candidate_set: false,
                },
            ],
        }
    }
}
