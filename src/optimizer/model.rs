//! Solver-agnostic binary optimization model.
//!
//! A [`BinaryModel`] is a set of named 0/1 variables, a linear objective to
//! maximize, and linear constraints. Anything implementing [`Solver`] can
//! solve it; model construction never depends on a particular backend.

use serde::Serialize;
use std::fmt;

/// Slack allowed when checking a constraint against an assignment.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Handle to a variable of a [`BinaryModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        })
    }
}

/// `Σ coef·var  (sense)  rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn activity(&self, values: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|(var, _)| values[var.0])
            .map(|(_, coef)| coef)
            .sum()
    }

    pub fn is_satisfied_by(&self, values: &[bool]) -> bool {
        holds(self.activity(values), self.sense, self.rhs)
    }
}

/// Whether `lhs (sense) rhs` holds within [`FEASIBILITY_TOLERANCE`].
pub fn holds(lhs: f64, sense: Sense, rhs: f64) -> bool {
    match sense {
        Sense::Le => lhs <= rhs + FEASIBILITY_TOLERANCE,
        Sense::Ge => lhs >= rhs - FEASIBILITY_TOLERANCE,
        Sense::Eq => (lhs - rhs).abs() <= FEASIBILITY_TOLERANCE,
    }
}

/// A maximization problem over binary variables.
#[derive(Debug, Clone, Default)]
pub struct BinaryModel {
    pub name: String,
    names: Vec<String>,
    objective: Vec<f64>,
    constraints: Vec<Constraint>,
}

impl BinaryModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_var(&mut self, name: impl Into<String>) -> VarId {
        self.names.push(name.into());
        self.objective.push(0.0);
        VarId(self.names.len() - 1)
    }

    /// Adds `coef` to the objective coefficient of `var`.
    pub fn add_objective(&mut self, var: VarId, coef: f64) {
        self.objective[var.0] += coef;
    }

    /// Adds a constraint. Repeated variables in `terms` are merged.
    pub fn add_constraint(&mut self, name: impl Into<String>, terms: Vec<(VarId, f64)>, sense: Sense, rhs: f64) {
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(terms.len());
        for (var, coef) in terms {
            match merged.iter_mut().find(|(v, _)| *v == var) {
                Some((_, c)) => *c += coef,
                None => merged.push((var, coef)),
            }
        }

        self.constraints.push(Constraint {
            name: name.into(),
            terms: merged,
            sense,
            rhs,
        });
    }

    pub fn num_vars(&self) -> usize {
        self.names.len()
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    pub fn objective_coef(&self, var: VarId) -> f64 {
        self.objective[var.0]
    }

    pub fn objective_coefs(&self) -> &[f64] {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective value of a full assignment.
    pub fn evaluate(&self, values: &[bool]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .filter(|(_, on)| **on)
            .map(|(c, _)| c)
            .sum()
    }

    /// Names of the constraints a full assignment violates.
    pub fn violations(&self, values: &[bool]) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied_by(values))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Variable values of a solved model.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub values: Vec<bool>,
    pub objective: f64,
}

impl Solution {
    pub fn value(&self, var: VarId) -> bool {
        self.values[var.0]
    }
}

/// Terminal result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Solution),
    Infeasible,
    Unbounded,
}

/// Terminal status without the assignment, for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

impl SolveOutcome {
    pub fn status(&self) -> SolveStatus {
        match self {
            SolveOutcome::Optimal(_) => SolveStatus::Optimal,
            SolveOutcome::Infeasible => SolveStatus::Infeasible,
            SolveOutcome::Unbounded => SolveStatus::Unbounded,
        }
    }
}

/// Anything that can solve a [`BinaryModel`] to optimality.
///
/// The call blocks until the solver reaches one terminal outcome.
pub trait Solver {
    fn solve(&self, model: &BinaryModel) -> SolveOutcome;
}
