//! Planner configuration.
//!
//! Stored as a JSON object on disk; every field is optional and falls back to
//! the defaults below:
//! ```json
//! {
//!   "candidate_day": "May07",
//!   "economics": { "floor_area": 800.0, "profit_floor": { "mode": "constraint" } },
//!   "top_k": 20
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::feed::Period;

/// How the minimum daily profit per opened site is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitFloorMode {
    /// Added to the model as `profit(site) >= threshold * open[site]`.
    Constraint,
    /// Solved without the floor; opened sites below it are dropped afterwards.
    PostFilter,
    /// No floor at all.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfitFloor {
    pub mode: ProfitFloorMode,
    pub threshold: f64,
}

impl Default for ProfitFloor {
    fn default() -> Self {
        Self {
            mode: ProfitFloorMode::PostFilter,
            threshold: 500.0,
        }
    }
}

/// Fraction of each period's traffic that becomes a paying customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionRates {
    pub am: f64,
    pub md: f64,
    pub pm: f64,
}

impl ConversionRates {
    pub fn uniform(rate: f64) -> Self {
        Self {
            am: rate,
            md: rate,
            pm: rate,
        }
    }

    pub fn get(&self, period: Period) -> f64 {
        match period {
            Period::Am => self.am,
            Period::Md => self.md,
            Period::Pm => self.pm,
        }
    }
}

impl Default for ConversionRates {
    fn default() -> Self {
        Self::uniform(0.08)
    }
}

/// Economic assumptions for the store model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Economics {
    /// Store floor area in square feet.
    pub floor_area: f64,
    /// Profit earned per converting visitor.
    pub profit_per_customer: f64,
    /// Staffing cost of operating one period.
    pub staff_cost_per_shift: f64,
    /// Utility cost per square foot per operated period.
    pub utility_rate: f64,
    pub conversion_rates: ConversionRates,
    pub profit_floor: ProfitFloor,
}

impl Default for Economics {
    fn default() -> Self {
        Self {
            floor_area: 800.0,
            profit_per_customer: 5.0,
            staff_cost_per_shift: 80.0,
            utility_rate: 0.125,
            conversion_rates: ConversionRates::default(),
            profit_floor: ProfitFloor::default(),
        }
    }
}

impl Economics {
    /// Rejects values that make the model meaningless.
    pub fn validate(&self) -> Result<(), PlanError> {
        check(
            self.floor_area.is_finite() && self.floor_area > 0.0,
            "floor_area must be a positive number",
        )?;
        check(
            self.profit_per_customer.is_finite() && self.profit_per_customer >= 0.0,
            "profit_per_customer must be non-negative",
        )?;
        check(
            self.staff_cost_per_shift.is_finite() && self.staff_cost_per_shift >= 0.0,
            "staff_cost_per_shift must be non-negative",
        )?;
        check(
            self.utility_rate.is_finite() && self.utility_rate >= 0.0,
            "utility_rate must be non-negative",
        )?;
        for period in Period::ALL {
            let rate = self.conversion_rates.get(period);
            check(
                (0.0..=1.0).contains(&rate),
                &format!("conversion rate for {period} must be within [0, 1]"),
            )?;
        }
        check(
            self.profit_floor.threshold.is_finite(),
            "profit_floor.threshold must be finite",
        )?;
        Ok(())
    }
}

/// Column names and the optional explicit day list of the traffic feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedColumns {
    pub site_id: String,
    pub geometry: String,
    /// When set, exactly these days are read and every `{day}_{period}`
    /// column must be present. When unset, days are discovered from headers.
    pub days: Option<Vec<String>>,
}

impl Default for FeedColumns {
    fn default() -> Self {
        Self {
            site_id: "Loc".to_string(),
            geometry: "the_geom".to_string(),
            days: None,
        }
    }
}

/// Full configuration of a planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Day to build site profiles for; the first day in the feed if unset.
    pub candidate_day: Option<String>,
    pub economics: Economics,
    /// Only the K busiest candidates enter the model. `None` keeps all.
    pub top_k: Option<usize>,
    pub outlier_lower: f64,
    pub outlier_upper: f64,
    /// Rent figures are per unit area per this many days.
    pub rent_amortization_days: f64,
    pub columns: FeedColumns,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            candidate_day: None,
            economics: Economics::default(),
            top_k: Some(20),
            outlier_lower: 0.05,
            outlier_upper: 0.95,
            rent_amortization_days: 365.0,
            columns: FeedColumns::default(),
        }
    }
}

impl PlannerConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.economics.validate()?;
        check(
            (0.0..=1.0).contains(&self.outlier_lower)
                && (0.0..=1.0).contains(&self.outlier_upper)
                && self.outlier_lower <= self.outlier_upper,
            "outlier bounds must satisfy 0 <= lower <= upper <= 1",
        )?;
        check(self.top_k != Some(0), "top_k must be at least 1")?;
        check(
            self.rent_amortization_days.is_finite() && self.rent_amortization_days > 0.0,
            "rent_amortization_days must be positive",
        )?;
        if let Some(days) = &self.columns.days {
            check(!days.is_empty(), "columns.days must not be empty")?;
        }
        Ok(())
    }
}

fn check(ok: bool, message: &str) -> Result<(), PlanError> {
    if ok {
        Ok(())
    } else {
        Err(PlanError::Config(message.to_string()))
    }
}
