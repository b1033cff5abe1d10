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

//! Stochastic MILP schedulers: robustness against sampled transition-duration
//! uncertainty, either by solving every scenario jointly with a bounded-violation slack
//! (monolithic) or by solving a selected subset and verifying robustness with SPRT (heuristic
//! approximation / SAA).

use std::collections::HashMap;
use std::time::Duration;

use good_lp::{
    constraint, solvers::coin_cbc::coin_cbc as create_solver, variable, Expression,
    ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::allocation::Allocation;
use crate::error::FailureReason;
use crate::model::ProblemInputs;
use crate::motion_planner::SampledMotionPlanner;

use super::mutex::MutexIndicatorRegistry;
use super::or_tools::c_disjunctive_order;
use super::scenario_selector::ScenarioSelector;
use super::sprt::SequentialProbabilityRatioTest;
use super::{Schedule, ScheduleSolver};

fn planner_index(inputs: &ProblemInputs, robot: usize) -> (usize, f64) {
    let species = &inputs.species[inputs.robots[robot].species.index()];
    (species.motion_planner, species.speed)
}

fn transition_lower_bound(
    planners: &[SampledMotionPlanner],
    scenario: usize,
    i: usize,
    j: usize,
    allocation: &Allocation,
    inputs: &ProblemInputs,
) -> Result<f64, FailureReason> {
    let shared: Vec<usize> = allocation
        .coalition(i)
        .into_iter()
        .filter(|r| allocation.coalition(j).contains(r))
        .collect();
    let mut max_duration = 0.0_f64;
    for r in shared {
        let (idx, speed) = planner_index(inputs, r);
        let d = planners[idx]
            .duration(
                scenario,
                inputs.tasks[i].terminal_configuration,
                inputs.tasks[j].initial_configuration,
                speed,
            )
            .ok_or(FailureReason::MotionPlanImpossible {
                task: inputs.tasks[j].id,
                robot: inputs.robots[r].id,
            })?;
        max_duration = max_duration.max(d);
    }
    Ok(max_duration)
}

fn task_lower_bound(
    planners: &[SampledMotionPlanner],
    scenario: usize,
    m: usize,
    allocation: &Allocation,
    inputs: &ProblemInputs,
) -> Result<f64, FailureReason> {
    let mut max_duration = 0.0_f64;
    for r in allocation.coalition(m) {
        let (idx, speed) = planner_index(inputs, r);
        let d = planners[idx]
            .duration(
                scenario,
                inputs.robots[r].initial_configuration,
                inputs.tasks[m].initial_configuration,
                speed,
            )
            .ok_or(FailureReason::MotionPlanImpossible {
                task: inputs.tasks[m].id,
                robot: inputs.robots[r].id,
            })?;
        max_duration = max_duration.max(d);
    }
    Ok(max_duration)
}

/// Per-scenario precomputed lower bounds, shared by the monolithic and HA formulations.
struct ScenarioBounds {
    alphas: Vec<f64>,
    deltas: HashMap<(usize, usize), (f64, f64)>,
}

fn precompute_bounds(
    planners: &[SampledMotionPlanner],
    scenario: usize,
    allocation: &Allocation,
    inputs: &ProblemInputs,
    mutex_pairs: &std::collections::HashSet<(usize, usize)>,
) -> Result<ScenarioBounds, FailureReason> {
    let mut alphas = Vec::with_capacity(inputs.num_tasks());
    for m in 0..inputs.num_tasks() {
        alphas.push(task_lower_bound(planners, scenario, m, allocation, inputs)?);
    }
    let mut deltas = HashMap::new();
    for &(i, j) in mutex_pairs {
        let d_ij = transition_lower_bound(planners, scenario, i, j, allocation, inputs)?;
        let d_ji = transition_lower_bound(planners, scenario, j, i, allocation, inputs)?;
        deltas.insert((i, j), (d_ij, d_ji));
    }
    Ok(ScenarioBounds { alphas, deltas })
}

/// Solves all `Q` sampled scenarios jointly, sharing the allocation's mutex orientation, and
/// permits at most `⌊gamma * Q⌋` of them to exceed the makespan via a per-scenario slack.
#[derive(Debug)]
pub struct MonolithicStochasticScheduler {
    /// One sampled motion planner per species, indexed by `Species::motion_planner`.
    pub planners: Vec<SampledMotionPlanner>,
}

impl ScheduleSolver for MonolithicStochasticScheduler {
    fn solve(&self, allocation: &Allocation, inputs: &ProblemInputs) -> Result<Schedule, FailureReason> {
        let q = inputs.scheduler_parameters.num_scenarios;
        if q == 0 {
            return Err(FailureReason::LogicError(
                "monolithic stochastic scheduler requires num_scenarios > 0".into(),
            ));
        }
        let allowed_exceed = (inputs.scheduler_parameters.gamma * q as f64).floor();
        let num_tasks = inputs.num_tasks();
        let static_sum: f64 = inputs.tasks.iter().map(|t| t.static_duration).sum();
        let mutex_pairs = allocation.mutex_set(inputs);

        let mut bounds = Vec::with_capacity(q);
        for s in 0..q {
            bounds.push(precompute_bounds(&self.planners, s, allocation, inputs, &mutex_pairs)?);
        }
        let max_delta = bounds
            .iter()
            .flat_map(|b| b.deltas.values())
            .flat_map(|&(a, b)| [a, b])
            .fold(0.0_f64, f64::max);
        let big_m = (static_sum + max_delta) * 2.0 + 1.0;

        let mut problem = ProblemVariables::new();
        let mu = problem.add(variable().min(0).max(big_m));
        let mutex = MutexIndicatorRegistry::new(&mut problem, mutex_pairs.iter().copied(), true);

        struct ScenarioVars {
            t: Vec<Variable>,
            mu_q: Variable,
            y: Variable,
        }
        let scenario_vars: Vec<ScenarioVars> = bounds
            .iter()
            .map(|b| ScenarioVars {
                t: (0..num_tasks)
                    .map(|m| problem.add(variable().min(b.alphas[m]).max(big_m)))
                    .collect(),
                mu_q: problem.add(variable().min(0).max(big_m)),
                y: problem.add(variable().binary()),
            })
            .collect();

        let mut model = create_solver(problem.minimise(mu));
        #[cfg(any(test, feature = "hide-cbc-output"))]
        model.set_parameter("logLevel", "0");
        if inputs.scheduler_parameters.threads > 1 {
            model.set_parameter("threads", &inputs.scheduler_parameters.threads.to_string());
        }
        model.set_parameter("seconds", &inputs.scheduler_parameters.timeout_secs.to_string());

        for (s, sv) in scenario_vars.iter().enumerate() {
            for p in &inputs.precedence {
                let before = p.before.index();
                let after = p.after.index();
                model.add_constraint(constraint!(
                    sv.t[before] + inputs.tasks[before].static_duration <= sv.t[after]
                ));
            }
            for &(i, j) in &mutex_pairs {
                let (d_ij, d_ji) = bounds[s].deltas[&(i, j)];
                let x = mutex.get(i, j);
                c_disjunctive_order(
                    &mut model,
                    x,
                    sv.t[i],
                    sv.t[j],
                    inputs.tasks[i].static_duration + d_ij,
                    inputs.tasks[j].static_duration + d_ji,
                    big_m,
                );
            }
            for m in 0..num_tasks {
                model.add_constraint(constraint!(sv.mu_q >= sv.t[m] + inputs.tasks[m].static_duration));
            }
            model.add_constraint(constraint!(sv.mu_q - mu - big_m * sv.y <= 0));
        }
        let sum_y: Expression = scenario_vars.iter().map(|sv| Expression::from(sv.y)).sum();
        model.add_constraint(constraint!(sum_y <= allowed_exceed));
        debug!("{} scenarios, allowing {allowed_exceed} violations", q);

        info!("solving monolithic stochastic schedule MILP ({q} scenarios)");
        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => FailureReason::MilpFailure,
            _ => FailureReason::SchedulerTimeout,
        })?;

        Ok(Schedule {
            makespan: solution.value(mu),
            timepoints: None,
            mutex_orientation: mutex.precedence_set(&solution),
        })
    }
}

/// Solves a scenario-selector-chosen subset of `beta` scenarios exactly (no slack), then
/// verifies robustness against the remaining `Q_f - beta` scenarios with SPRT, inflating the
/// makespan and retrying when SPRT rejects.
#[derive(Debug)]
pub struct HeuristicApproximationScheduler {
    /// One sampled motion planner per species.
    pub planners: Vec<SampledMotionPlanner>,
    /// The scenario selector; defaults to [`super::HeuristicScenarioSelector`].
    pub selector: Box<dyn ScenarioSelector + Send + Sync>,
}

impl HeuristicApproximationScheduler {
    fn solve_selected(
        &self,
        allocation: &Allocation,
        inputs: &ProblemInputs,
        selected: &[usize],
    ) -> Result<Schedule, FailureReason> {
        let num_tasks = inputs.num_tasks();
        let static_sum: f64 = inputs.tasks.iter().map(|t| t.static_duration).sum();
        let mutex_pairs = allocation.mutex_set(inputs);

        let mut bounds = Vec::with_capacity(selected.len());
        for &s in selected {
            bounds.push(precompute_bounds(&self.planners, s, allocation, inputs, &mutex_pairs)?);
        }
        let max_delta = bounds
            .iter()
            .flat_map(|b| b.deltas.values())
            .flat_map(|&(a, b)| [a, b])
            .fold(0.0_f64, f64::max);
        let big_m = (static_sum + max_delta) * 2.0 + 1.0;

        let mut problem = ProblemVariables::new();
        let mu = problem.add(variable().min(0).max(big_m));
        let mutex = MutexIndicatorRegistry::new(&mut problem, mutex_pairs.iter().copied(), true);

        let t_vars: Vec<Vec<Variable>> = bounds
            .iter()
            .map(|b| {
                (0..num_tasks)
                    .map(|m| problem.add(variable().min(b.alphas[m]).max(big_m)))
                    .collect()
            })
            .collect();

        let mut model = create_solver(problem.minimise(mu));
        #[cfg(any(test, feature = "hide-cbc-output"))]
        model.set_parameter("logLevel", "0");
        model.set_parameter("seconds", &inputs.scheduler_parameters.timeout_secs.to_string());

        for (s, t) in t_vars.iter().enumerate() {
            for p in &inputs.precedence {
                let before = p.before.index();
                let after = p.after.index();
                model.add_constraint(constraint!(
                    t[before] + inputs.tasks[before].static_duration <= t[after]
                ));
            }
            for &(i, j) in &mutex_pairs {
                let (d_ij, d_ji) = bounds[s].deltas[&(i, j)];
                let x = mutex.get(i, j);
                c_disjunctive_order(
                    &mut model,
                    x,
                    t[i],
                    t[j],
                    inputs.tasks[i].static_duration + d_ij,
                    inputs.tasks[j].static_duration + d_ji,
                    big_m,
                );
            }
            for m in 0..num_tasks {
                model.add_constraint(constraint!(mu >= t[m] + inputs.tasks[m].static_duration));
            }
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => FailureReason::MilpFailure,
            _ => FailureReason::SchedulerTimeout,
        })?;

        Ok(Schedule {
            makespan: solution.value(mu),
            timepoints: None,
            mutex_orientation: mutex.precedence_set(&solution),
        })
    }

    /// Re-derive the makespan under a single held-out scenario, given a fixed mutex ordering
    /// (precedence already committed to by the restricted solve), used as an SPRT sample.
    fn resolve_under_scenario(
        &self,
        allocation: &Allocation,
        inputs: &ProblemInputs,
        scenario: usize,
        mutex_orientation: &[(usize, usize)],
    ) -> Result<f64, FailureReason> {
        let num_tasks = inputs.num_tasks();
        let mutex_pairs: std::collections::HashSet<(usize, usize)> =
            mutex_orientation.iter().map(|&(i, j)| (i.min(j), i.max(j))).collect();
        let bounds = precompute_bounds(&self.planners, scenario, allocation, inputs, &mutex_pairs)?;
        let static_sum: f64 = inputs.tasks.iter().map(|t| t.static_duration).sum();
        let max_delta = bounds.deltas.values().flat_map(|&(a, b)| [a, b]).fold(0.0_f64, f64::max);
        let big_m = (static_sum + max_delta) * 2.0 + 1.0;

        let mut problem = ProblemVariables::new();
        let t: Vec<Variable> = (0..num_tasks)
            .map(|m| problem.add(variable().min(bounds.alphas[m]).max(big_m)))
            .collect();
        let mu = problem.add(variable().min(0).max(big_m));

        let mut model = create_solver(problem.minimise(mu));
        #[cfg(any(test, feature = "hide-cbc-output"))]
        model.set_parameter("logLevel", "0");

        for p in &inputs.precedence {
            let before = p.before.index();
            let after = p.after.index();
            model.add_constraint(constraint!(
                t[before] + inputs.tasks[before].static_duration <= t[after]
            ));
        }
        for &(i, j) in mutex_orientation {
            let (d_ij, _) = bounds.deltas[&(i.min(j), i.max(j))];
            model.add_constraint(constraint!(
                t[i] + inputs.tasks[i].static_duration + d_ij <= t[j]
            ));
        }
        for m in 0..num_tasks {
            model.add_constraint(constraint!(mu >= t[m] + inputs.tasks[m].static_duration));
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => FailureReason::MilpFailure,
            _ => FailureReason::SchedulerTimeout,
        })?;
        Ok(solution.value(mu))
    }
}

impl ScheduleSolver for HeuristicApproximationScheduler {
    fn solve(&self, allocation: &Allocation, inputs: &ProblemInputs) -> Result<Schedule, FailureReason> {
        let params = &inputs.scheduler_parameters;
        let q_f = params.num_scenarios;
        let beta = params.beta;
        if q_f == 0 || beta == 0 {
            return Err(FailureReason::LogicError(
                "heuristic-approximation scheduler requires num_scenarios > 0 and beta > 0".into(),
            ));
        }

        let mask = self
            .selector
            .create_mask(
                &self.planners,
                inputs,
                allocation,
                q_f,
                beta,
                params.gamma,
                Duration::from_secs_f64(params.timeout_secs),
                params.seed,
            )
            .ok_or(FailureReason::SchedulerTimeout)?;
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        let held_out: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| (!keep).then_some(i))
            .collect();

        let mut schedule = self.solve_selected(allocation, inputs, &selected)?;

        if !params.use_sprt || held_out.is_empty() {
            return Ok(schedule);
        }

        let sprt = SequentialProbabilityRatioTest::with_defaults(
            (params.gamma - params.indifference_tolerance).max(1e-6),
            (params.gamma + params.indifference_tolerance).min(1.0 - 1e-6),
        );

        let mut inflation_rounds = 0;
        loop {
            // Each held-out scenario re-solves an independent, much smaller LP (precedence order
            // already fixed), so they're dispatched across rayon's global pool rather than solved
            // one at a time.
            let samples: Vec<f64> = held_out
                .par_iter()
                .map(|&scenario| {
                    self.resolve_under_scenario(allocation, inputs, scenario, &schedule.mutex_orientation)
                        .unwrap_or(f64::INFINITY)
                })
                .collect();
            if sprt.run(schedule.makespan, held_out.len() as u32, samples) {
                return Ok(schedule);
            }
            inflation_rounds += 1;
            if inflation_rounds > 32 {
                warn!("SPRT did not converge after {inflation_rounds} inflation rounds");
                return Err(FailureReason::SchedulerTimeout);
            }
            schedule.makespan = if params.delta > 0.0 {
                schedule.makespan + params.delta
            } else {
                schedule.makespan * (1.0 + params.delta_percentage)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GraphEnvironment;
    use crate::ids::SpeciesId;
    use crate::model::SchedulerParameters;
    use crate::scheduler::HeuristicScenarioSelector;
    use crate::test::builder;

    fn sampled_planners(num_scenarios: usize) -> Vec<SampledMotionPlanner> {
        let scenarios = (0..num_scenarios)
            .map(|_| {
                GraphEnvironment::new(
                    vec![builder::vertex(0), builder::vertex(1)],
                    vec![(0, 1, 1.0)],
                )
            })
            .collect();
        vec![SampledMotionPlanner::new(SpeciesId::from_index(0), scenarios)]
    }

    fn stochastic_inputs(num_scenarios: usize, beta: usize, gamma: f64) -> ProblemInputs {
        builder::ProblemInputsBuilder::new()
            .robot(builder::vertex(0))
            .task(builder::vertex(0), builder::vertex(0), 2.0)
            .scheduler_parameters(SchedulerParameters {
                num_scenarios,
                beta,
                gamma,
                ..SchedulerParameters::default()
            })
            .build()
    }

    #[test]
    fn monolithic_scheduler_requires_at_least_one_scenario() {
        let inputs = stochastic_inputs(0, 0, 0.2);
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        let scheduler = MonolithicStochasticScheduler { planners: sampled_planners(1) };
        assert_eq!(
            scheduler.solve(&allocation, &inputs),
            Err(FailureReason::LogicError(
                "monolithic stochastic scheduler requires num_scenarios > 0".into()
            ))
        );
    }

    #[test]
    fn monolithic_scheduler_solves_single_task_single_robot() {
        let inputs = stochastic_inputs(4, 0, 0.25);
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        let scheduler = MonolithicStochasticScheduler { planners: sampled_planners(4) };
        let schedule = scheduler.solve(&allocation, &inputs).unwrap();
        assert_eq!(schedule.makespan, 2.0);
        assert!(schedule.timepoints.is_none());
    }

    #[test]
    fn heuristic_approximation_solves_without_sprt() {
        let inputs = stochastic_inputs(4, 2, 0.25);
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        let scheduler = HeuristicApproximationScheduler {
            planners: sampled_planners(4),
            selector: Box::new(HeuristicScenarioSelector),
        };
        let schedule = scheduler.solve(&allocation, &inputs).unwrap();
        assert_eq!(schedule.makespan, 2.0);
    }
}
