use storefront_planner::config::{PlannerConfig, ProfitFloorMode};
use storefront_planner::optimizer::{BranchAndBound, SolveStatus};
use storefront_planner::{PlanError, plan};

const NEIGHBORHOODS: &str = r#"{
    "Midtown": {"lat_min": 40.750, "lat_max": 40.765, "lon_min": -73.995, "lon_max": -73.975, "rent": 292.0},
    "Chelsea": {"lat_min": 40.735, "lat_max": 40.749, "lon_min": -74.010, "lon_max": -73.990, "rent": 146.0}
}"#;

const TRAFFIC: &str = "\
OBJECTID,the_geom,Loc,Borough,May07_AM,May07_MD,May07_PM,Oct07_AM,Oct07_MD,Oct07_PM
1,POINT (-73.985 40.755),1,Manhattan,3000,4000,3500,3100,3900,3600
2,POINT (-73.980 40.760),2,Manhattan,2000,2500,2200,2100,,2300
3,POINT (-74.000 40.740),3,Manhattan,1500,1800,1600,1400,1700,1500
4,POINT (-74.005 40.745),4,Manhattan,200,250,150,180,260,170
5,POINT (-73.900 40.800),5,Bronx,5000,5000,5000,5000,5000,5000
6,POINT (-73.990 40.752),6,Manhattan,900,1100,1000,950,1050,1000
7,POINT (broken),7,Manhattan,1,1,1,1,1,1
";

#[test]
fn test_full_pipeline() {
    let config = PlannerConfig {
        outlier_lower: 0.0,
        outlier_upper: 1.0,
        ..PlannerConfig::default()
    };

    let report = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default())
        .expect("pipeline should succeed");

    let optimization = &report.optimization;
    assert_eq!(optimization.candidate_day, "May07");
    assert_eq!(optimization.status, SolveStatus::Optimal);
    assert_eq!(optimization.considered, 5);

    // Row 7 fails to parse; site 5 has no rent but is still listed.
    assert_eq!(report.sites.len(), 6);
    let bronx = report.sites.iter().find(|s| s.site_id.as_str() == "5").unwrap();
    assert_eq!(bronx.rent_per_unit_area, None);
    assert!(!bronx.in_candidate_set);

    let ids: Vec<&str> = optimization.results.iter().map(|r| r.site_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    // Site 6 clears its Midtown rent by only $20/day and is dropped by the $500 floor.
    assert_eq!(optimization.below_floor, 1);
    assert_eq!(optimization.results[0].daily_profit, 3020.0);

    for pair in optimization.results.windows(2) {
        assert!(pair[0].daily_profit >= pair[1].daily_profit);
    }
    for site in &optimization.results {
        assert!(site.operating_periods.len() >= 2);
        assert!(site.daily_profit >= 500.0);
    }
}

#[test]
fn test_candidate_day_selects_counts() {
    let config = PlannerConfig {
        candidate_day: Some("Oct07".to_string()),
        outlier_lower: 0.0,
        outlier_upper: 1.0,
        ..PlannerConfig::default()
    };

    let report = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default()).unwrap();

    // Site 2 has no MD count on Oct07, so it cannot be profiled for that day.
    assert_eq!(report.optimization.considered, 4);
    assert!(report.optimization.results.iter().all(|r| r.site_id.as_str() != "2"));
}

#[test]
fn test_runs_are_deterministic() {
    let config = PlannerConfig::default();

    let first = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default()).unwrap();
    let second = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default()).unwrap();

    assert_eq!(first.optimization.results, second.optimization.results);
    assert_eq!(first.sites, second.sites);
}

#[test]
fn test_floor_constraint_can_make_the_model_infeasible() {
    let mut config = PlannerConfig {
        outlier_lower: 0.0,
        outlier_upper: 1.0,
        ..PlannerConfig::default()
    };
    config.economics.profit_floor.mode = ProfitFloorMode::Constraint;
    config.economics.profit_floor.threshold = 1_000_000.0;

    let report = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default()).unwrap();

    assert_eq!(report.optimization.status, SolveStatus::Infeasible);
    assert!(report.optimization.results.is_empty());
}

#[test]
fn test_no_rented_sites_is_a_caller_error() {
    let neighborhoods = r#"{"Nowhere": {"lat_min": 0.0, "lat_max": 0.1, "lon_min": 0.0, "lon_max": 0.1, "rent": 10.0}}"#;

    let err = plan(TRAFFIC.as_bytes(), neighborhoods, &PlannerConfig::default(), BranchAndBound::default())
        .unwrap_err();

    assert!(matches!(err, PlanError::NoCandidates));
}

#[test]
fn test_unknown_day_is_a_caller_error() {
    let config = PlannerConfig {
        candidate_day: Some("Jan01".to_string()),
        ..PlannerConfig::default()
    };

    let err = plan(TRAFFIC.as_bytes(), NEIGHBORHOODS, &config, BranchAndBound::default()).unwrap_err();
    assert!(matches!(err, PlanError::UnknownDay(_)));
}
