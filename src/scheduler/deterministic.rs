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

//! The deterministic MILP scheduler: given a fixed allocation, computes task start times
//! and a mutex ordering minimizing the makespan, using motion-plan durations taken at face value.

use std::collections::HashMap;

use good_lp::{
    constraint, solvers::coin_cbc::coin_cbc as create_solver, variable, ProblemVariables,
    ResolutionError, Solution, SolverModel, Variable,
};
use log::{debug, info};

use crate::allocation::Allocation;
use crate::error::FailureReason;
use crate::model::ProblemInputs;
use crate::motion_planner::MotionPlanner;

use super::mutex::MutexIndicatorRegistry;
use super::or_tools::c_disjunctive_order;
use super::{Schedule, ScheduleSolver};

/// Solves the deterministic scheduling formulation over a per-species table of motion planners.
#[derive(Debug)]
pub struct DeterministicScheduler {
    /// One motion planner per species, indexed by `Species::motion_planner`.
    pub planners: Vec<MotionPlanner>,
}

impl DeterministicScheduler {
    /// Build a scheduler over the given per-species motion planners.
    pub fn new(planners: Vec<MotionPlanner>) -> Self {
        Self { planners }
    }

    fn planner_for(&self, inputs: &ProblemInputs, robot: usize) -> (&MotionPlanner, f64) {
        let species = &inputs.species[inputs.robots[robot].species.index()];
        (&self.planners[species.motion_planner], species.speed)
    }

    /// δ(i, j): the slowest shared-robot transition duration from task `i`'s terminal
    /// configuration to task `j`'s initial configuration. Zero if the coalitions don't overlap.
    fn transition_lower_bound(
        &self,
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
            let (planner, speed) = self.planner_for(inputs, r);
            let d = planner
                .duration(
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

    /// α_m: the slowest coalition member's travel time from its own initial configuration to
    /// task `m`'s initial configuration.
    fn task_lower_bound(
        &self,
        m: usize,
        allocation: &Allocation,
        inputs: &ProblemInputs,
    ) -> Result<f64, FailureReason> {
        let mut max_duration = 0.0_f64;
        for r in allocation.coalition(m) {
            let (planner, speed) = self.planner_for(inputs, r);
            let d = planner
                .duration(
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
}

impl ScheduleSolver for DeterministicScheduler {
    fn solve(&self, allocation: &Allocation, inputs: &ProblemInputs) -> Result<Schedule, FailureReason> {
        info!("preparing deterministic schedule MILP");
        let num_tasks = inputs.num_tasks();

        let static_sum: f64 = inputs.tasks.iter().map(|t| t.static_duration).sum();
        let mutex_pairs = allocation.mutex_set(inputs);

        let mut alphas = Vec::with_capacity(num_tasks);
        for m in 0..num_tasks {
            alphas.push(self.task_lower_bound(m, allocation, inputs)?);
        }
        let mut deltas: HashMap<(usize, usize), (f64, f64)> = HashMap::new();
        for &(i, j) in &mutex_pairs {
            let d_ij = self.transition_lower_bound(i, j, allocation, inputs)?;
            let d_ji = self.transition_lower_bound(j, i, allocation, inputs)?;
            deltas.insert((i, j), (d_ij, d_ji));
        }

        // Generous but finite upper bound on any timepoint: every task run in series, plus the
        // largest observed transition, doubled for slack.
        let max_delta = deltas
            .values()
            .flat_map(|&(a, b)| [a, b])
            .fold(0.0_f64, f64::max);
        let big_m = (static_sum + max_delta) * 2.0 + 1.0;

        let mut problem = ProblemVariables::new();
        let t: Vec<Variable> = (0..num_tasks)
            .map(|m| problem.add(variable().min(alphas[m]).max(big_m)))
            .collect();
        let mutex = MutexIndicatorRegistry::new(&mut problem, mutex_pairs.iter().copied(), true);
        let mu = problem.add(variable().min(0).max(big_m));

        let mut model = create_solver(problem.minimise(mu));
        #[cfg(any(test, feature = "hide-cbc-output"))]
        model.set_parameter("logLevel", "0");
        if inputs.scheduler_parameters.threads > 1 {
            model.set_parameter("threads", &inputs.scheduler_parameters.threads.to_string());
        }
        model.set_parameter(
            "seconds",
            &inputs.scheduler_parameters.timeout_secs.to_string(),
        );

        let mut rows = model.as_inner().num_rows();
        for p in &inputs.precedence {
            let before = p.before.index();
            let after = p.after.index();
            model.add_constraint(constraint!(
                t[before] + inputs.tasks[before].static_duration <= t[after]
            ));
        }
        debug!(
            "{} equations for precedence constraints",
            model.as_inner().num_rows() - rows
        );
        rows = model.as_inner().num_rows();

        for &(i, j) in &mutex_pairs {
            let (d_ij, d_ji) = deltas[&(i, j)];
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
        debug!(
            "{} equations for mutex constraints",
            model.as_inner().num_rows() - rows
        );
        rows = model.as_inner().num_rows();

        for m in 0..num_tasks {
            model.add_constraint(constraint!(mu >= t[m] + inputs.tasks[m].static_duration));
        }
        debug!(
            "{} equations for makespan constraints",
            model.as_inner().num_rows() - rows
        );
        let _ = rows;

        info!("solving deterministic schedule MILP");
        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible | ResolutionError::Unbounded => FailureReason::MilpFailure,
            _ => FailureReason::SchedulerTimeout,
        })?;

        let timepoints: Vec<(f64, f64)> = (0..num_tasks)
            .map(|m| {
                let start = solution.value(t[m]);
                (start, start + inputs.tasks[m].static_duration)
            })
            .collect();

        Ok(Schedule {
            makespan: solution.value(mu),
            timepoints: Some(timepoints),
            mutex_orientation: mutex.precedence_set(&solution),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GraphEnvironment;
    use crate::ids::SpeciesId;
    use crate::test::builder;

    fn single_planner() -> Vec<MotionPlanner> {
        vec![MotionPlanner::new(
            SpeciesId::from_index(0),
            GraphEnvironment::new(vec![builder::vertex(0), builder::vertex(1)], vec![(0, 1, 1.0)]),
        )]
    }

    #[test]
    fn two_parallel_tasks_run_concurrently() {
        let inputs = builder::two_parallel_tasks_two_robots();
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        allocation.set(1, 1, true);
        let scheduler = DeterministicScheduler::new(single_planner());
        let schedule = scheduler.solve(&allocation, &inputs).unwrap();
        assert_eq!(schedule.makespan, 5.0);
        assert!(schedule.mutex_orientation.is_empty());
    }

    #[test]
    fn two_serial_tasks_respect_precedence() {
        let inputs = builder::two_serial_tasks_one_robot();
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        allocation.set(1, 0, true);
        let scheduler = DeterministicScheduler::new(single_planner());
        let schedule = scheduler.solve(&allocation, &inputs).unwrap();
        assert_eq!(schedule.makespan, 5.0);
        let timepoints = schedule.timepoints.unwrap();
        assert!(timepoints[0].1 <= timepoints[1].0 + 1e-6);
    }

    #[test]
    fn mutex_pair_is_serialized_one_way_or_the_other() {
        let inputs = builder::two_tasks_sharing_one_robot();
        let mut allocation = Allocation::zero(inputs.num_tasks(), inputs.num_robots());
        allocation.set(0, 0, true);
        allocation.set(1, 0, true);
        let scheduler = DeterministicScheduler::new(single_planner());
        let schedule = scheduler.solve(&allocation, &inputs).unwrap();
        assert_eq!(schedule.makespan, 5.0);
        assert_eq!(schedule.mutex_orientation.len(), 1);
    }
}
