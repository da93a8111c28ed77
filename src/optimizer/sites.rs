//! Store-siting model: which sites to open and which periods to staff.

use serde::Serialize;
use tracing::{info, warn};

use super::model::{BinaryModel, Sense, SolveOutcome, SolveStatus, Solver, VarId};
use crate::aggregate::SiteDailyProfile;
use crate::config::{Economics, ProfitFloorMode};
use crate::error::PlanError;
use crate::feed::{Period, SiteId};
use crate::stats::round2;

/// Minimum number of periods an opened site must operate.
pub const MIN_OPERATING_PERIODS: usize = 2;

/// Candidate-day traffic of a site, per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodTraffic {
    pub am: f64,
    pub md: f64,
    pub pm: f64,
}

impl From<[f64; 3]> for PeriodTraffic {
    fn from(t: [f64; 3]) -> Self {
        Self {
            am: t[0],
            md: t[1],
            pm: t[2],
        }
    }
}

/// Realized daily economics of one opened site. Money is rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteResult {
    pub site_id: SiteId,
    /// Rent for the whole store per day.
    pub daily_rent: f64,
    pub daily_staff_cost: f64,
    pub daily_utility_cost: f64,
    pub operating_periods: Vec<Period>,
    pub daily_customers: f64,
    pub daily_revenue: f64,
    pub daily_profit: f64,
    pub period_traffic: PeriodTraffic,
}

impl SiteResult {
    /// Computes the breakdown for a site operated in `periods`.
    pub fn realize(profile: &SiteDailyProfile, periods: Vec<Period>, economics: &Economics) -> (Self, f64) {
        let shifts = periods.len() as f64;

        let customers: f64 = periods
            .iter()
            .map(|&p| economics.conversion_rates.get(p) * profile.traffic(p))
            .sum();
        let revenue = customers * economics.profit_per_customer;
        let rent = profile.daily_rent * economics.floor_area;
        let staff = economics.staff_cost_per_shift * shifts;
        let utility = economics.utility_rate * economics.floor_area * shifts;
        let profit = revenue - rent - staff - utility;

        let result = Self {
            site_id: profile.site_id.clone(),
            daily_rent: round2(rent),
            daily_staff_cost: round2(staff),
            daily_utility_cost: round2(utility),
            operating_periods: periods,
            daily_customers: round2(customers),
            daily_revenue: round2(revenue),
            daily_profit: round2(profit),
            period_traffic: profile.traffic.into(),
        };
        (result, profit)
    }
}

/// What one optimization run produced.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationOutcome {
    pub candidate_day: String,
    pub status: SolveStatus,
    pub profit_floor_mode: ProfitFloorMode,
    /// Sites that entered the model after top-K truncation.
    pub considered: usize,
    /// Opened sites discarded by the post-solve profit floor.
    pub below_floor: usize,
    /// Modeled objective, before any post-solve filtering.
    pub objective: Option<f64>,
    /// Ordered by descending daily profit, then ascending site id.
    pub results: Vec<SiteResult>,
}

/// Profit of operating `profile` in `period`, before rent.
pub fn period_margin(profile: &SiteDailyProfile, period: Period, economics: &Economics) -> f64 {
    economics.conversion_rates.get(period) * profile.traffic(period) * economics.profit_per_customer
        - economics.utility_rate * economics.floor_area
        - economics.staff_cost_per_shift
}

/// The K profiles with the most candidate-day traffic, ties by site id.
pub fn top_k_by_traffic(profiles: &[SiteDailyProfile], k: usize) -> Vec<SiteDailyProfile> {
    let mut ranked: Vec<SiteDailyProfile> = profiles.to_vec();
    ranked.sort_by(|a, b| {
        b.total_traffic()
            .total_cmp(&a.total_traffic())
            .then_with(|| a.site_id.cmp(&b.site_id))
    });
    ranked.truncate(k);
    ranked
}

/// Variables of a built siting model.
pub struct SiteModel {
    pub model: BinaryModel,
    pub open: Vec<VarId>,
    /// Indexed by [`Period::index`].
    pub operate: Vec<[VarId; 3]>,
}

/// Builds the siting model for `profiles`, in the given order.
pub fn build_model(profiles: &[SiteDailyProfile], economics: &Economics) -> SiteModel {
    let mut model = BinaryModel::new("store_siting");
    let mut open = Vec::with_capacity(profiles.len());
    let mut operate = Vec::with_capacity(profiles.len());

    let floor = &economics.profit_floor;

    for profile in profiles {
        let id = &profile.site_id;
        let site_open = model.add_var(format!("open[{id}]"));
        let rent_cost = profile.daily_rent * economics.floor_area;
        model.add_objective(site_open, -rent_cost);

        let vars = Period::ALL.map(|p| model.add_var(format!("operate[{id},{p}]")));
        let margins = Period::ALL.map(|p| period_margin(profile, p, economics));
        for (var, margin) in vars.iter().zip(margins) {
            model.add_objective(*var, margin);
        }

        for (period, var) in Period::ALL.iter().zip(vars) {
            model.add_constraint(
                format!("operate_requires_open[{id},{period}]"),
                vec![(var, 1.0), (site_open, -1.0)],
                Sense::Le,
                0.0,
            );
        }

        let mut shifts: Vec<(VarId, f64)> = vars.iter().map(|v| (*v, 1.0)).collect();
        shifts.push((site_open, -(MIN_OPERATING_PERIODS as f64)));
        model.add_constraint(format!("min_periods[{id}]"), shifts, Sense::Ge, 0.0);

        if floor.mode == ProfitFloorMode::Constraint {
            let mut profit: Vec<(VarId, f64)> = vars.iter().zip(margins).map(|(v, m)| (*v, m)).collect();
            profit.push((site_open, -rent_cost - floor.threshold));
            model.add_constraint(format!("profit_floor[{id}]"), profit, Sense::Ge, 0.0);
        }

        open.push(site_open);
        operate.push(vars);
    }

    model.add_constraint("open_at_least_one", open.iter().map(|v| (*v, 1.0)).collect(), Sense::Ge, 1.0);

    SiteModel { model, open, operate }
}

/// Chooses sites and operating periods with a pluggable [`Solver`].
pub struct SiteOptimizer<S> {
    solver: S,
    economics: Economics,
    top_k: Option<usize>,
}

impl<S: Solver> SiteOptimizer<S> {
    pub fn new(solver: S, economics: Economics) -> Self {
        Self {
            solver,
            economics,
            top_k: None,
        }
    }

    /// Only the `k` busiest sites enter the model. This bounds model size; it
    /// changes which sites are considered, not the optimum over them.
    pub fn with_top_k(mut self, k: Option<usize>) -> Self {
        self.top_k = k;
        self
    }

    pub fn economics(&self) -> &Economics {
        &self.economics
    }

    /// Builds, solves and decodes the model for one candidate day.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NoCandidates`] for an empty profile set and
    /// [`PlanError::Config`] for invalid economics. An infeasible model is not
    /// an error: it yields an outcome with no results.
    #[tracing::instrument(skip(self, profiles), fields(candidates = profiles.len(), top_k = ?self.top_k))]
    pub fn optimize(&self, candidate_day: &str, profiles: &[SiteDailyProfile]) -> Result<OptimizationOutcome, PlanError> {
        self.economics.validate()?;
        if self.top_k == Some(0) {
            return Err(PlanError::Config("top_k must be at least 1".to_string()));
        }
        if profiles.is_empty() {
            return Err(PlanError::NoCandidates);
        }

        let mut considered = match self.top_k {
            Some(k) => top_k_by_traffic(profiles, k),
            None => profiles.to_vec(),
        };
        considered.sort_by(|a, b| a.site_id.cmp(&b.site_id));

        let site_model = build_model(&considered, &self.economics);
        let outcome = self.solver.solve(&site_model.model);
        let status = outcome.status();
        let floor = &self.economics.profit_floor;

        let mut result = OptimizationOutcome {
            candidate_day: candidate_day.to_string(),
            status,
            profit_floor_mode: floor.mode,
            considered: considered.len(),
            below_floor: 0,
            objective: None,
            results: Vec::new(),
        };

        let SolveOutcome::Optimal(solution) = outcome else {
            warn!(?status, "No feasible solution");
            return Ok(result);
        };
        result.objective = Some(solution.objective);

        let mut ranked: Vec<(SiteResult, f64)> = Vec::new();
        for (i, profile) in considered.iter().enumerate() {
            if !solution.value(site_model.open[i]) {
                continue;
            }

            let periods: Vec<Period> = Period::ALL
                .into_iter()
                .filter(|p| solution.value(site_model.operate[i][p.index()]))
                .collect();

            let (site, profit) = SiteResult::realize(profile, periods, &self.economics);
            if floor.mode == ProfitFloorMode::PostFilter && profit < floor.threshold {
                result.below_floor += 1;
                continue;
            }
            ranked.push((site, profit));
        }

        ranked.sort_by(|(a, _), (b, _)| {
            b.daily_profit
                .total_cmp(&a.daily_profit)
                .then_with(|| a.site_id.cmp(&b.site_id))
        });
        result.results = ranked.into_iter().map(|(site, _)| site).collect();

        info!(
            objective = solution.objective,
            opened = result.results.len() + result.below_floor,
            selected = result.results.len(),
            below_floor = result.below_floor,
            "Optimization complete"
        );

        Ok(result)
    }
}
