//! CLI entry point for the storefront planner.
//!
//! Provides subcommands for running the full site-selection pipeline and for
//! exporting the aggregated candidate set on its own.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use storefront_planner::config::{ConversionRates, PlannerConfig, ProfitFloorMode};
use storefront_planner::feed::{parse_neighborhoods, read_traffic};
use storefront_planner::fetch::{BasicClient, load_source};
use storefront_planner::optimizer::BranchAndBound;
use storefront_planner::output::{print_json, print_pretty, write_report_json, write_results_csv, write_sites_csv};
use storefront_planner::pipeline;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "storefront_planner")]
#[command(about = "Pick profitable store sites from foot traffic and rent data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the two input feeds come from.
#[derive(clap::Args)]
struct Sources {
    /// Traffic counts CSV (path or URL)
    #[arg(value_name = "TRAFFIC_CSV")]
    traffic: String,

    /// Neighborhood bounds and rents JSON (path or URL)
    #[arg(value_name = "NEIGHBORHOODS_JSON")]
    neighborhoods: String,

    /// JSON config file; falls back to $PLANNER_CONFIG
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the ranked sites
    Plan {
        #[command(flatten)]
        sources: Sources,

        /// Day to plan for (defaults to the first day in the feed)
        #[arg(short, long)]
        day: Option<String>,

        /// CSV file to write ranked results to
        #[arg(short, long, default_value = "results.csv")]
        output: String,

        /// Optional: CSV file for every parsed site (for mapping)
        #[arg(long)]
        sites: Option<String>,

        /// Optional: JSON file for the full report
        #[arg(long)]
        report: Option<String>,

        /// Only model the K busiest sites
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Model every candidate, ignoring any top-K setting
        #[arg(long, default_value_t = false)]
        all_sites: bool,

        /// How the daily profit floor is applied
        #[arg(long, value_parser = parse_floor_mode)]
        floor_mode: Option<ProfitFloorMode>,

        /// Minimum daily profit per opened site
        #[arg(long)]
        floor_threshold: Option<f64>,

        /// Store floor area (sq ft)
        #[arg(long)]
        floor_area: Option<f64>,

        /// Uniform conversion rate for all periods
        #[arg(long)]
        conversion_rate: Option<f64>,

        /// Also log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Aggregate traffic and write the candidate set without optimizing
    Candidates {
        #[command(flatten)]
        sources: Sources,

        /// CSV file to write sites to
        #[arg(short, long, default_value = "sites.csv")]
        output: String,
    },
}

fn parse_floor_mode(value: &str) -> Result<ProfitFloorMode, String> {
    match value {
        "constraint" => Ok(ProfitFloorMode::Constraint),
        "post-filter" | "post_filter" => Ok(ProfitFloorMode::PostFilter),
        "disabled" => Ok(ProfitFloorMode::Disabled),
        other => Err(format!(
            "unknown floor mode {other:?} (expected constraint, post-filter or disabled)"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/storefront_planner.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("storefront_planner.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            sources,
            day,
            output,
            sites,
            report,
            top_k,
            all_sites,
            floor_mode,
            floor_threshold,
            floor_area,
            conversion_rate,
            json,
        } => {
            let mut config = load_config(sources.config.as_deref())?;
            if day.is_some() {
                config.candidate_day = day;
            }
            if top_k.is_some() {
                config.top_k = top_k;
            }
            if all_sites {
                config.top_k = None;
            }
            if let Some(mode) = floor_mode {
                config.economics.profit_floor.mode = mode;
            }
            if let Some(threshold) = floor_threshold {
                config.economics.profit_floor.threshold = threshold;
            }
            if let Some(area) = floor_area {
                config.economics.floor_area = area;
            }
            if let Some(rate) = conversion_rate {
                config.economics.conversion_rates = ConversionRates::uniform(rate);
            }

            let (traffic_bytes, neighborhoods_json) = load_feeds(&sources).await?;
            let plan = pipeline::plan(&traffic_bytes, &neighborhoods_json, &config, BranchAndBound::default())?;
            if json {
                print_json(&plan)?;
            } else {
                print_pretty(&plan);
            }

            let results = &plan.optimization.results;
            if results.is_empty() {
                warn!(status = ?plan.optimization.status, "No profitable site found");
            }
            for (rank, site) in results.iter().enumerate() {
                info!(
                    rank = rank + 1,
                    site_id = %site.site_id,
                    daily_profit = site.daily_profit,
                    daily_customers = site.daily_customers,
                    periods = ?site.operating_periods,
                    "Selected site"
                );
            }

            write_results_csv(&output, results)?;
            info!(path = %output, rows = results.len(), "Results written");

            if let Some(path) = sites {
                write_sites_csv(&path, &plan.sites)?;
            }
            if let Some(path) = report {
                write_report_json(&path, &plan)?;
            }
        }
        Commands::Candidates { sources, output } => {
            let config = load_config(sources.config.as_deref())?;
            let (traffic_bytes, neighborhoods_json) = load_feeds(&sources).await?;

            let traffic = read_traffic(traffic_bytes.as_slice(), &config.columns)?;
            let regions = parse_neighborhoods(&neighborhoods_json)?;
            let prepared = pipeline::prepare(traffic, regions, &config)?;

            write_sites_csv(&output, &prepared.sites)?;
            info!(
                path = %output,
                sites = prepared.sites.len(),
                candidates = prepared.aggregation.sites.len(),
                outliers = prepared.aggregation.outliers,
                days = ?prepared.days,
                "Candidate set written"
            );
        }
    }

    Ok(())
}

/// Reads the config file given on the command line or in `$PLANNER_CONFIG`.
fn load_config(path: Option<&str>) -> Result<PlannerConfig> {
    let path = path
        .map(str::to_string)
        .or_else(|| std::env::var("PLANNER_CONFIG").ok());

    match path {
        Some(path) => {
            info!(path = %path, "Loading config");
            PlannerConfig::load(&path).with_context(|| format!("failed to load config {path}"))
        }
        None => Ok(PlannerConfig::default()),
    }
}

/// Loads both feeds; the neighborhood feed must be UTF-8 JSON.
async fn load_feeds(sources: &Sources) -> Result<(Vec<u8>, String)> {
    let client = BasicClient::new();
    let traffic = load_source(&client, &sources.traffic).await?;
    let neighborhoods = load_source(&client, &sources.neighborhoods).await?;
    let neighborhoods =
        String::from_utf8(neighborhoods).context("neighborhood feed is not valid UTF-8")?;
    Ok((traffic, neighborhoods))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_json_flag() {
        let cli = Cli::try_parse_from(["storefront_planner", "plan", "traffic.csv", "hoods.json", "--json"]).unwrap();
        let Commands::Plan { json, all_sites, .. } = cli.command else {
            panic!("expected plan subcommand");
        };
        assert!(json);
        assert!(!all_sites);
    }

    #[test]
    fn test_floor_mode_parsing() {
        assert_eq!(parse_floor_mode("post-filter").unwrap(), ProfitFloorMode::PostFilter);
        assert_eq!(parse_floor_mode("constraint").unwrap(), ProfitFloorMode::Constraint);
        assert!(parse_floor_mode("strict").is_err());
    }
}
