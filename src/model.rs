// Chameleon: Taming the transient while reconfiguring BGP
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! The allocation problem's static data model: species, robots, tasks and the
//! robot-traits/desired-traits/linear-quality matrices derived from them.

use std::collections::HashSet;

use crate::error::ItagsError;
use crate::geometry::Configuration;
use crate::ids::{RobotId, SpeciesId, TaskId};

/// A vector over the global trait dimensions. Thin wrapper so mismatch and linear-quality math
/// is implemented and tested once instead of scattered across the heuristic and scheduler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraitVector(pub Vec<f64>);

impl TraitVector {
    /// Build a zero vector with `dims` dimensions.
    pub fn zero(dims: usize) -> Self {
        Self(vec![0.0; dims])
    }

    /// Number of trait dimensions.
    pub fn dims(&self) -> usize {
        self.0.len()
    }

    /// Elementwise sum.
    pub fn add(&self, other: &TraitVector) -> TraitVector {
        TraitVector(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a + b)
                .collect(),
        )
    }

    /// Elementwise difference, `self - other`.
    pub fn sub(&self, other: &TraitVector) -> TraitVector {
        TraitVector(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a - b)
                .collect(),
        )
    }

    /// Dot product with another vector of the same dimension.
    pub fn dot(&self, other: &TraitVector) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    /// Sum of the positive entries, i.e. `sum(max(x, 0))`.
    pub fn positive_sum(&self) -> f64 {
        self.0.iter().filter(|x| **x > 0.0).sum()
    }

    /// L1 norm.
    pub fn l1_norm(&self) -> f64 {
        self.0.iter().map(|x| x.abs()).sum()
    }
}

/// A homogeneous class of robot, carrying the trait vector, the bounding radius and speed used
/// by the motion planner, and a reference to the motion planner serving this species.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Species {
    /// Unique id within the problem.
    pub id: SpeciesId,
    /// Human-readable name, as it appears in problem inputs.
    pub name: String,
    /// Trait vector τ.
    pub traits: TraitVector,
    /// Bounding radius, used by motion planners that need clearance.
    pub radius: f64,
    /// Nominal speed; motion-plan path lengths are converted to durations via this.
    pub speed: f64,
    /// Index into the problem's motion-planner table.
    pub motion_planner: usize,
}

/// A single robot instance: an immutable id, name, initial configuration and species reference.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Robot {
    /// Unique id within the problem.
    pub id: RobotId,
    /// Human-readable name.
    pub name: String,
    /// Pose the robot starts in.
    pub initial_configuration: Configuration,
    /// The species this robot belongs to.
    pub species: SpeciesId,
}

/// A plan task: desired traits, linear-quality coefficients, initial/terminal configurations and
/// a static (coalition-independent) duration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    /// Unique id within the problem.
    pub id: TaskId,
    /// Human-readable name, matched against the PDDL/task-planner provenance.
    pub name: String,
    /// Desired traits y.
    pub desired_traits: TraitVector,
    /// Linear-quality coefficients c, used by NAQ.
    pub linear_quality_coefficients: TraitVector,
    /// Pose the task must be approached from.
    pub initial_configuration: Configuration,
    /// Pose the task leaves the coalition in.
    pub terminal_configuration: Configuration,
    /// Static, coalition-independent execution duration.
    pub static_duration: f64,
}

/// Row-major Q (robot traits), Y (desired traits) and C (linear-quality) matrices, derived once
/// from the robot and task tables.
#[derive(Debug, Clone)]
pub struct ProblemMatrices {
    /// Robot-traits matrix, one row per robot (`Q[r] = species(r).traits`).
    pub q: Vec<TraitVector>,
    /// Desired-traits matrix, one row per task.
    pub y: Vec<TraitVector>,
    /// Linear-quality coefficient matrix, one row per task.
    pub c: Vec<TraitVector>,
}

impl ProblemMatrices {
    fn build(robots: &[Robot], species: &[Species], tasks: &[Task]) -> Self {
        let q = robots
            .iter()
            .map(|r| species[r.species.index()].traits.clone())
            .collect();
        let y = tasks.iter().map(|t| t.desired_traits.clone()).collect();
        let c = tasks
            .iter()
            .map(|t| t.linear_quality_coefficients.clone())
            .collect();
        Self { q, y, c }
    }
}

/// Precedence requirement: `before` must complete before `after` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precedence {
    /// The task that must finish first.
    pub before: TaskId,
    /// The task that must start after.
    pub after: TaskId,
}

/// Parameters controlling the ITAGS search itself (wire key: `itags_parameters`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ItagsParameters {
    /// Overall wall-clock budget for the search.
    pub timeout_secs: f64,
    /// Whether `timeout_secs` is enforced at all.
    pub has_timeout: bool,
    /// TETAQ trade-off weight between APR and NSQ.
    pub alpha: f64,
    /// Run the reverse-mode search (start from the all-ones allocation, remove robots).
    pub use_reverse: bool,
    /// Retain closed nodes in the returned statistics (memory/debug trade-off).
    pub save_closed_nodes: bool,
    /// Retain pruned nodes in the returned statistics.
    pub save_pruned_nodes: bool,
    /// On timeout, return the best traits-feasible leaf seen so far instead of failing outright.
    pub return_feasible_on_timeout: bool,
}

impl Default for ItagsParameters {
    fn default() -> Self {
        Self {
            timeout_secs: 60.0,
            has_timeout: true,
            alpha: 0.5,
            use_reverse: false,
            save_closed_nodes: false,
            save_pruned_nodes: false,
            return_feasible_on_timeout: false,
        }
    }
}

/// Which MILP scheduler formulation to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MilpSchedulerType {
    /// No uncertainty modeling; transition durations taken at face value.
    DeterministicMilp,
    /// All Q scenarios solved jointly with an `alpha`-fraction slack.
    MonolithicStochasticMilp,
    /// Scenario-selector + SPRT heuristic approximation (SAA/HA).
    HeuristicApproximationStochastic,
    /// Same as above, but scenario selection is delegated to an (unimplemented) GNN model.
    GnnHeuristicApproximationStochastic,
}

/// Parameters controlling the MILP scheduler (wire key: `scheduler_parameters`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerParameters {
    /// Per-solve wall-clock budget.
    pub timeout_secs: f64,
    /// Relative MIP gap passed to the solver.
    pub mip_gap: f64,
    /// Number of solver threads to request.
    pub threads: usize,
    /// Which scheduler formulation to use.
    pub scheduler_type: MilpSchedulerType,
    /// Total number of sampled scenarios, Q (monolithic) or Q_f (HA).
    pub num_scenarios: usize,
    /// Number of scenarios HA actually solves against, β.
    pub beta: usize,
    /// Robustness target: fraction of scenarios allowed to exceed the makespan, γ.
    pub gamma: f64,
    /// Whether to run SPRT verification after HA's restricted solve.
    pub use_sprt: bool,
    /// Additive inflation step applied to μ when SPRT rejects.
    pub delta: f64,
    /// Multiplicative inflation step applied to μ when SPRT rejects, if `delta` is zero.
    pub delta_percentage: f64,
    /// Indifference-interval half width around `gamma` for SPRT.
    pub indifference_tolerance: f64,
    /// RNG seed for scenario selection and SPRT sampling order.
    pub seed: u64,
}

impl Default for SchedulerParameters {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            mip_gap: 1e-4,
            threads: 1,
            scheduler_type: MilpSchedulerType::DeterministicMilp,
            num_scenarios: 0,
            beta: 0,
            gamma: 0.1,
            use_sprt: false,
            delta: 0.0,
            delta_percentage: 0.1,
            indifference_tolerance: 0.05,
            seed: 0,
        }
    }
}

/// The fully validated, immutable description of one allocation-and-scheduling problem.
#[derive(Debug, Clone)]
pub struct ProblemInputs {
    /// Robot species.
    pub species: Vec<Species>,
    /// Robots available to the team.
    pub robots: Vec<Robot>,
    /// Tasks to allocate and schedule.
    pub tasks: Vec<Task>,
    /// Precedence constraints between tasks.
    pub precedence: Vec<Precedence>,
    /// The Q/Y/C matrices derived from `robots`/`species`/`tasks`.
    pub matrices: ProblemMatrices,
    /// ITAGS search parameters.
    pub itags_parameters: ItagsParameters,
    /// MILP scheduler parameters.
    pub scheduler_parameters: SchedulerParameters,
}

impl ProblemInputs {
    /// Assemble problem inputs from their parts, validating every invariant named in the data
    /// model: trait-dimension agreement, in-range species references, and precedence acyclicity.
    pub fn new(
        species: Vec<Species>,
        robots: Vec<Robot>,
        tasks: Vec<Task>,
        precedence: Vec<Precedence>,
        itags_parameters: ItagsParameters,
        scheduler_parameters: SchedulerParameters,
    ) -> Result<Self, ItagsError> {
        let dims = species.first().map(|s| s.traits.dims()).unwrap_or(0);
        for s in &species {
            if s.traits.dims() != dims {
                return Err(ItagsError::Validation(format!(
                    "species {} has {} trait dimensions, expected {dims}",
                    s.name,
                    s.traits.dims()
                )));
            }
        }
        for t in &tasks {
            if t.desired_traits.dims() != dims || t.linear_quality_coefficients.dims() != dims {
                return Err(ItagsError::Validation(format!(
                    "task {} has mismatched trait dimensions",
                    t.name
                )));
            }
        }
        for r in &robots {
            if species.get(r.species.index()).is_none() {
                return Err(ItagsError::Validation(format!(
                    "robot {} references unknown species {:?}",
                    r.name, r.species
                )));
            }
        }
        if has_cycle(&precedence, tasks.len()) {
            return Err(ItagsError::Validation(
                "precedence constraints contain a cycle".into(),
            ));
        }

        let matrices = ProblemMatrices::build(&robots, &species, &tasks);
        Ok(Self {
            species,
            robots,
            tasks,
            precedence,
            matrices,
            itags_parameters,
            scheduler_parameters,
        })
    }

    /// Number of tasks, M.
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Number of robots, N.
    pub fn num_robots(&self) -> usize {
        self.robots.len()
    }

    /// Transitive closure of the precedence relation, as a set of ordered pairs of task indices.
    pub fn precedence_closure(&self) -> HashSet<(usize, usize)> {
        let n = self.tasks.len();
        let mut reach = vec![vec![false; n]; n];
        for p in &self.precedence {
            reach[p.before.index()][p.after.index()] = true;
        }
        // Floyd-Warshall-style transitive closure; n is small (task counts, not robot counts).
        for k in 0..n {
            for i in 0..n {
                if reach[i][k] {
                    for j in 0..n {
                        if reach[k][j] {
                            reach[i][j] = true;
                        }
                    }
                }
            }
        }
        let mut out = HashSet::new();
        for i in 0..n {
            for j in 0..n {
                if reach[i][j] {
                    out.insert((i, j));
                }
            }
        }
        out
    }
}

fn has_cycle(precedence: &[Precedence], num_tasks: usize) -> bool {
    let mut adj = vec![Vec::new(); num_tasks];
    for p in precedence {
        adj[p.before.index()].push(p.after.index());
    }
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }
    let mut marks = vec![Mark::Unvisited; num_tasks];

    fn visit(node: usize, adj: &[Vec<usize>], marks: &mut [Mark]) -> bool {
        match marks[node] {
            Mark::Done => return false,
            Mark::InProgress => return true,
            Mark::Unvisited => {}
        }
        marks[node] = Mark::InProgress;
        for &next in &adj[node] {
            if visit(next, adj, marks) {
                return true;
            }
        }
        marks[node] = Mark::Done;
        false
    }

    (0..num_tasks).any(|n| visit(n, &adj, &mut marks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_vector_mismatch_math() {
        let y = TraitVector(vec![2.0, 1.0]);
        let yhat = TraitVector(vec![1.0, 1.0]);
        let e = y.sub(&yhat);
        assert_eq!(e.positive_sum(), 1.0);
    }

    #[test]
    fn detects_precedence_cycle() {
        let p = vec![
            Precedence {
                before: TaskId::from_index(0),
                after: TaskId::from_index(1),
            },
            Precedence {
                before: TaskId::from_index(1),
                after: TaskId::from_index(0),
            },
        ];
        assert!(has_cycle(&p, 2));
    }

    #[test]
    fn acyclic_precedence_is_accepted() {
        let p = vec![Precedence {
            before: TaskId::from_index(0),
            after: TaskId::from_index(1),
        }];
        assert!(!has_cycle(&p, 2));
    }
}
