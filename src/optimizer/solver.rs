//! Built-in exact solver for [`BinaryModel`]s.
//!
//! Depth-first branch and bound. Variables are partitioned into small blocks
//! joined by the model's short constraints; any constraint that would merge
//! blocks past [`BranchAndBound::max_block_vars`] is kept aside as a linking
//! constraint. At every node each block is solved exactly by enumeration with
//! only its own constraints, and the sum of block optima bounds the node.
//! When the combined block optima also satisfy the linking constraints, the
//! node is solved and no branching is needed.

use tracing::debug;

use super::model::{BinaryModel, Sense, Solution, SolveOutcome, Solver, holds};

const BOUND_EPSILON: f64 = 1e-9;

/// Exhaustive branch-and-bound over binary variables.
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    /// Largest block solved by enumeration (2^n assignments).
    pub max_block_vars: usize,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self { max_block_vars: 12 }
    }
}

impl Solver for BranchAndBound {
    #[tracing::instrument(name = "branch_and_bound", skip_all, fields(model = %model.name, vars = model.num_vars()))]
    fn solve(&self, model: &BinaryModel) -> SolveOutcome {
        let search = Search::new(model, self.max_block_vars);
        debug!(
            blocks = search.blocks.len(),
            linking = search.linking.len(),
            "Model partitioned"
        );

        let mut assign = vec![None; model.num_vars()];
        let mut best: Option<Solution> = None;
        let mut nodes = 0u64;
        search.branch(0, &mut assign, &mut best, &mut nodes);

        debug!(nodes, found = best.is_some(), "Search finished");

        match best {
            Some(solution) => SolveOutcome::Optimal(solution),
            None => SolveOutcome::Infeasible,
        }
    }
}

struct Block {
    vars: Vec<usize>,
    constraints: Vec<usize>,
}

struct Node {
    bound: f64,
    /// Fixed values plus each block's best completion.
    guide: Vec<bool>,
}

struct Search<'m> {
    model: &'m BinaryModel,
    blocks: Vec<Block>,
    linking: Vec<usize>,
    order: Vec<usize>,
}

impl<'m> Search<'m> {
    fn new(model: &'m BinaryModel, max_block_vars: usize) -> Self {
        let n = model.num_vars();
        let constraints = model.constraints();

        let mut parent: Vec<usize> = (0..n).collect();
        let mut size = vec![1usize; n];
        let mut local = vec![false; constraints.len()];

        let mut by_support: Vec<usize> = (0..constraints.len()).collect();
        by_support.sort_by_key(|&c| constraints[c].terms.len());

        for c in by_support {
            let terms = &constraints[c].terms;
            if terms.is_empty() {
                continue;
            }

            let mut roots: Vec<usize> = terms.iter().map(|(v, _)| find(&mut parent, v.index())).collect();
            roots.sort_unstable();
            roots.dedup();

            let merged: usize = roots.iter().map(|&r| size[r]).sum();
            if roots.len() > 1 && merged > max_block_vars {
                continue;
            }

            let root = roots[0];
            for &other in &roots[1..] {
                parent[other] = root;
                size[root] += size[other];
            }
            local[c] = true;
        }

        // Blocks ordered by their lowest variable index.
        let mut block_of_root: Vec<Option<usize>> = vec![None; n];
        let mut blocks: Vec<Block> = Vec::new();
        for v in 0..n {
            let root = find(&mut parent, v);
            let b = *block_of_root[root].get_or_insert_with(|| {
                blocks.push(Block {
                    vars: Vec::new(),
                    constraints: Vec::new(),
                });
                blocks.len() - 1
            });
            blocks[b].vars.push(v);
        }

        let mut linking = Vec::new();
        for (c, constraint) in constraints.iter().enumerate() {
            if local[c] {
                let root = find(&mut parent, constraint.terms[0].0.index());
                if let Some(b) = block_of_root[root] {
                    blocks[b].constraints.push(c);
                }
            } else {
                linking.push(c);
            }
        }

        let order = blocks.iter().flat_map(|b| b.vars.iter().copied()).collect();

        Self {
            model,
            blocks,
            linking,
            order,
        }
    }

    fn branch(&self, depth: usize, assign: &mut Vec<Option<bool>>, best: &mut Option<Solution>, nodes: &mut u64) {
        *nodes += 1;

        let Some(node) = self.evaluate(assign) else {
            return;
        };

        let incumbent = best.as_ref().map(|s| s.objective);
        if incumbent.is_some_and(|obj| node.bound <= obj + BOUND_EPSILON) {
            return;
        }

        if self.satisfies_linking(&node.guide) {
            let objective = self.model.evaluate(&node.guide);
            if incumbent.is_none_or(|obj| objective > obj + BOUND_EPSILON) {
                *best = Some(Solution {
                    values: node.guide,
                    objective,
                });
            }
            return;
        }

        let Some(&var) = self.order.get(depth) else {
            return;
        };

        let preferred = node.guide[var];
        for value in [preferred, !preferred] {
            assign[var] = Some(value);
            self.branch(depth + 1, assign, best, nodes);
        }
        assign[var] = None;
    }

    /// Bound and guide for the subtree, or `None` if it cannot be feasible.
    fn evaluate(&self, assign: &[Option<bool>]) -> Option<Node> {
        let objective = self.model.objective_coefs();
        let mut guide: Vec<bool> = assign.iter().map(|a| a.unwrap_or(false)).collect();

        let mut bound: f64 = assign
            .iter()
            .zip(objective)
            .filter(|(a, _)| **a == Some(true))
            .map(|(_, c)| c)
            .sum();

        for block in &self.blocks {
            let free: Vec<usize> = block.vars.iter().copied().filter(|&v| assign[v].is_none()).collect();

            let mut best: Option<(f64, u64)> = None;
            for mask in 0..(1u64 << free.len()) {
                let mut value = 0.0;
                for (bit, &v) in free.iter().enumerate() {
                    let on = mask & (1 << bit) != 0;
                    guide[v] = on;
                    if on {
                        value += objective[v];
                    }
                }

                let feasible = block
                    .constraints
                    .iter()
                    .all(|&c| self.model.constraints()[c].is_satisfied_by(&guide));

                if feasible && best.is_none_or(|(b, _)| value > b) {
                    best = Some((value, mask));
                }
            }

            let (value, mask) = best?;
            for (bit, &v) in free.iter().enumerate() {
                guide[v] = mask & (1 << bit) != 0;
            }
            bound += value;
        }

        for &c in &self.linking {
            let constraint = &self.model.constraints()[c];
            let (mut lo, mut hi) = (0.0, 0.0);
            for (var, coef) in &constraint.terms {
                match assign[var.index()] {
                    Some(true) => {
                        lo += coef;
                        hi += coef;
                    }
                    Some(false) => {}
                    None => {
                        lo += coef.min(0.0);
                        hi += coef.max(0.0);
                    }
                }
            }

            let reachable = match constraint.sense {
                Sense::Le => holds(lo, Sense::Le, constraint.rhs),
                Sense::Ge => holds(hi, Sense::Ge, constraint.rhs),
                Sense::Eq => holds(lo, Sense::Le, constraint.rhs) && holds(hi, Sense::Ge, constraint.rhs),
            };
            if !reachable {
                return None;
            }
        }

        Some(Node { bound, guide })
    }

    fn satisfies_linking(&self, values: &[bool]) -> bool {
        self.linking
            .iter()
            .all(|&c| self.model.constraints()[c].is_satisfied_by(values))
    }
}

fn find(parent: &mut [usize], mut v: usize) -> usize {
    while parent[v] != v {
        parent[v] = parent[parent[v]];
        v = parent[v];
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::model::VarId;

    #[test]
    fn test_unconstrained_picks_positive_coefficients() {
        let mut model = BinaryModel::new("free");
        let vars: Vec<VarId> = (0..4).map(|i| model.add_var(format!("x{i}"))).collect();
        for (var, coef) in vars.iter().zip([3.0, -1.0, 0.5, -2.0]) {
            model.add_objective(*var, coef);
        }

        let SolveOutcome::Optimal(solution) = BranchAndBound::default().solve(&model) else {
            panic!("expected an optimal solution");
        };

        assert_eq!(solution.values, vec![true, false, true, false]);
        assert_eq!(solution.objective, 3.5);
    }

    #[test]
    fn test_knapsack_matches_brute_force() {
        let weights = [5.0, 4.0, 6.0, 3.0, 7.0, 2.0, 4.0, 5.0, 3.0, 6.0, 1.0, 8.0, 2.0, 5.0];
        let values = [10.0, 40.0, 30.0, 50.0, 35.0, 15.0, 25.0, 20.0, 45.0, 30.0, 5.0, 60.0, 12.0, 33.0];

        let mut model = BinaryModel::new("knapsack");
        let vars: Vec<VarId> = (0..weights.len()).map(|i| model.add_var(format!("x{i}"))).collect();
        for (var, value) in vars.iter().zip(values) {
            model.add_objective(*var, value);
        }
        model.add_constraint(
            "capacity",
            vars.iter().zip(weights).map(|(v, w)| (*v, w)).collect(),
            Sense::Le,
            20.0,
        );

        let SolveOutcome::Optimal(solution) = BranchAndBound::default().solve(&model) else {
            panic!("expected an optimal solution");
        };

        assert!(model.violations(&solution.values).is_empty());
        assert_eq!(solution.objective, brute_force(&model).unwrap());
    }

    #[test]
    fn test_linked_blocks_match_brute_force() {
        // Three "sites" of (open, a, b) with a, b <= open, plus at least two open.
        let mut model = BinaryModel::new("sites");
        let mut opens = Vec::new();
        for (i, (rent, a, b)) in [(10.0, 4.0, 3.0), (2.0, 1.0, 0.5), (6.0, 7.0, -1.0)].into_iter().enumerate() {
            let open = model.add_var(format!("open{i}"));
            let x = model.add_var(format!("a{i}"));
            let y = model.add_var(format!("b{i}"));
            model.add_objective(open, -rent);
            model.add_objective(x, a);
            model.add_objective(y, b);
            model.add_constraint(format!("a{i}"), vec![(x, 1.0), (open, -1.0)], Sense::Le, 0.0);
            model.add_constraint(format!("b{i}"), vec![(y, 1.0), (open, -1.0)], Sense::Le, 0.0);
            opens.push(open);
        }
        model.add_constraint("two_open", opens.iter().map(|o| (*o, 1.0)).collect(), Sense::Ge, 2.0);

        let solver = BranchAndBound { max_block_vars: 3 };
        let SolveOutcome::Optimal(solution) = solver.solve(&model) else {
            panic!("expected an optimal solution");
        };

        assert!(model.violations(&solution.values).is_empty());
        assert!((solution.objective - brute_force(&model).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_model() {
        let mut model = BinaryModel::new("infeasible");
        let x = model.add_var("x");
        let y = model.add_var("y");
        model.add_constraint("both", vec![(x, 1.0), (y, 1.0)], Sense::Ge, 2.0);
        model.add_constraint("at_most_one", vec![(x, 1.0), (y, 1.0)], Sense::Le, 1.0);

        assert_eq!(BranchAndBound::default().solve(&model), SolveOutcome::Infeasible);
    }

    #[test]
    fn test_empty_model_is_trivially_optimal() {
        let model = BinaryModel::new("empty");
        let outcome = BranchAndBound::default().solve(&model);
        assert_eq!(
            outcome,
            SolveOutcome::Optimal(Solution {
                values: vec![],
                objective: 0.0
            })
        );
    }

    // Helper functions for tests
    fn brute_force(model: &BinaryModel) -> Option<f64> {
        let n = model.num_vars();
        let mut best: Option<f64> = None;
        for mask in 0..(1u64 << n) {
            let values: Vec<bool> = (0..n).map(|i| mask & (1 << i) != 0).collect();
            if model.violations(&values).is_empty() {
                let value = model.evaluate(&values);
                if best.is_none_or(|b| value > b) {
                    best = Some(value);
                }
            }
        }
        best
    }
}
