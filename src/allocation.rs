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

//! The allocation matrix A and the quantities derived from it: the trait mismatch E(A), the
//! allocated-traits reduction, and the mutex set M(A).

use std::collections::HashSet;

use crate::model::{ProblemInputs, TraitVector};

/// A task-to-robot allocation, A ∈ {0,1}^{M×N}, stored dense and row-major (one `Vec<bool>` of
/// length N per task).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allocation {
    rows: Vec<Vec<bool>>,
}

impl Allocation {
    /// The all-zero allocation of the given dimensions (forward search's root).
    pub fn zero(num_tasks: usize, num_robots: usize) -> Self {
        Self {
            rows: vec![vec![false; num_robots]; num_tasks],
        }
    }

    /// The all-one allocation of the given dimensions (reverse search's root).
    pub fn ones(num_tasks: usize, num_robots: usize) -> Self {
        Self {
            rows: vec![vec![true; num_robots]; num_tasks],
        }
    }

    /// Whether robot `r` is assigned to task `m`.
    pub fn get(&self, task: usize, robot: usize) -> bool {
        self.rows[task][robot]
    }

    /// Set the (task, robot) cell.
    pub fn set(&mut self, task: usize, robot: usize, value: bool) {
        self.rows[task][robot] = value;
    }

    /// Number of tasks (rows).
    pub fn num_tasks(&self) -> usize {
        self.rows.len()
    }

    /// Number of robots (columns).
    pub fn num_robots(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Robots assigned to a task, as indices.
    pub fn coalition(&self, task: usize) -> Vec<usize> {
        self.rows[task]
            .iter()
            .enumerate()
            .filter_map(|(r, &assigned)| assigned.then_some(r))
            .collect()
    }

    /// Reduce the robot-traits matrix Q through this allocation: Ŷ(A) = A·Q, row-wise sum of the
    /// traits of every robot assigned to each task.
    pub fn reduce_traits(&self, q: &[TraitVector]) -> Vec<TraitVector> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, &assigned)| assigned)
                    .fold(TraitVector::zero(q.first().map_or(0, TraitVector::dims)), |acc, (r, _)| {
                        acc.add(&q[r])
                    })
            })
            .collect()
    }

    /// Mismatch matrix E(A) = Y − Ŷ(A), one row per task.
    pub fn mismatch(&self, inputs: &ProblemInputs) -> Vec<TraitVector> {
        let allocated = self.reduce_traits(&inputs.matrices.q);
        inputs
            .matrices
            .y
            .iter()
            .zip(allocated.iter())
            .map(|(y, yhat)| y.sub(yhat))
            .collect()
    }

    /// Scalar mismatch error ε(A) = Σ max(E(A), 0).
    pub fn mismatch_error(&self, inputs: &ProblemInputs) -> f64 {
        self.mismatch(inputs).iter().map(TraitVector::positive_sum).sum()
    }

    /// Whether ε(A) = 0, i.e. every task's trait demand is met by its coalition.
    pub fn is_traits_feasible(&self, inputs: &ProblemInputs) -> bool {
        self.mismatch_error(inputs) == 0.0
    }

    /// The mutex set M(A): unordered pairs of tasks sharing at least one robot, excluding pairs
    /// already ordered by the (transitive closure of the) precedence relation.
    pub fn mutex_set(&self, inputs: &ProblemInputs) -> HashSet<(usize, usize)> {
        let ordered = inputs.precedence_closure();
        let mut out = HashSet::new();
        for i in 0..self.num_tasks() {
            for j in (i + 1)..self.num_tasks() {
                if ordered.contains(&(i, j)) || ordered.contains(&(j, i)) {
                    continue;
                }
                let shares_robot = (0..self.num_robots()).any(|r| self.get(i, r) && self.get(j, r));
                if shares_robot {
                    out.insert((i, j));
                }
            }
        }
        out
    }

    /// Linear quality ⟨Ŷ(A), C⟩, used by NAQ.
    pub fn linear_quality(&self, inputs: &ProblemInputs) -> f64 {
        let allocated = self.reduce_traits(&inputs.matrices.q);
        allocated
            .iter()
            .zip(inputs.matrices.c.iter())
            .map(|(yhat, c)| yhat.dot(c))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RobotId, SpeciesId, TaskId};
    use crate::model::{ItagsParameters, Precedence, SchedulerParameters, Species, Robot, Task};
    use crate::geometry::Configuration;

    fn origin() -> Configuration {
        Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 }
    }

    fn two_robot_one_task_inputs() -> ProblemInputs {
        let species = vec![Species {
            id: SpeciesId::from_index(0),
            name: "drone".into(),
            traits: TraitVector(vec![1.0]),
            radius: 0.1,
            speed: 1.0,
            motion_planner: 0,
        }];
        let robots = vec![
            Robot {
                id: RobotId::from_index(0),
                name: "r0".into(),
                initial_configuration: origin(),
                species: SpeciesId::from_index(0),
            },
            Robot {
                id: RobotId::from_index(1),
                name: "r1".into(),
                initial_configuration: origin(),
                species: SpeciesId::from_index(0),
            },
        ];
        let tasks = vec![Task {
            id: TaskId::from_index(0),
            name: "t0".into(),
            desired_traits: TraitVector(vec![1.0]),
            linear_quality_coefficients: TraitVector(vec![1.0]),
            initial_configuration: origin(),
            terminal_configuration: origin(),
            static_duration: 1.0,
        }];
        ProblemInputs::new(
            species,
            robots,
            tasks,
            vec![],
            ItagsParameters::default(),
            SchedulerParameters::default(),
        )
        .unwrap()
    }

    #[test]
    fn mismatch_is_zero_when_one_robot_assigned() {
        let inputs = two_robot_one_task_inputs();
        let mut a = Allocation::zero(1, 2);
        a.set(0, 0, true);
        assert!(a.is_traits_feasible(&inputs));
    }

    #[test]
    fn mismatch_is_positive_when_unassigned() {
        let inputs = two_robot_one_task_inputs();
        let a = Allocation::zero(1, 2);
        assert!(!a.is_traits_feasible(&inputs));
        assert_eq!(a.mismatch_error(&inputs), 1.0);
    }

    #[test]
    fn mutex_pair_detected_for_shared_robot() {
        let species = vec![Species {
            id: SpeciesId::from_index(0),
            name: "drone".into(),
            traits: TraitVector(vec![1.0]),
            radius: 0.1,
            speed: 1.0,
            motion_planner: 0,
        }];
        let robots = vec![Robot {
            id: RobotId::from_index(0),
            name: "r0".into(),
            initial_configuration: origin(),
            species: SpeciesId::from_index(0),
        }];
        let tasks = vec![
            Task {
                id: TaskId::from_index(0),
                name: "t0".into(),
                desired_traits: TraitVector(vec![1.0]),
                linear_quality_coefficients: TraitVector(vec![1.0]),
                initial_configuration: origin(),
                terminal_configuration: origin(),
                static_duration: 1.0,
            },
            Task {
                id: TaskId::from_index(1),
                name: "t1".into(),
                desired_traits: TraitVector(vec![1.0]),
                linear_quality_coefficients: TraitVector(vec![1.0]),
                initial_configuration: origin(),
                terminal_configuration: origin(),
                static_duration: 1.0,
            },
        ];
        let inputs = ProblemInputs::new(
            species,
            robots,
            tasks,
            vec![],
            ItagsParameters::default(),
            SchedulerParameters::default(),
        )
        .unwrap();
        let mut a = Allocation::zero(2, 1);
        a.set(0, 0, true);
        a.set(1, 0, true);
        pretty_assertions_sorted::assert_eq!(a.mutex_set(&inputs), HashSet::from([(0, 1)]));
    }

    #[test]
    fn precedence_ordered_pair_is_not_mutex() {
        let species = vec![Species {
            id: SpeciesId::from_index(0),
            name: "drone".into(),
            traits: TraitVector(vec![1.0]),
            radius: 0.1,
            speed: 1.0,
            motion_planner: 0,
        }];
        let robots = vec![Robot {
            id: RobotId::from_index(0),
            name: "r0".into(),
            initial_configuration: origin(),
            species: SpeciesId::from_index(0),
        }];
        let tasks = vec![
            Task {
                id: TaskId::from_index(0),
                name: "t0".into(),
                desired_traits: TraitVector(vec![1.0]),
                linear_quality_coefficients: TraitVector(vec![1.0]),
                initial_configuration: origin(),
                terminal_configuration: origin(),
                static_duration: 1.0,
            },
            Task {
                id: TaskId::from_index(1),
                name: "t1".into(),
                desired_traits: TraitVector(vec![1.0]),
                linear_quality_coefficients: TraitVector(vec![1.0]),
                initial_configuration: origin(),
                terminal_configuration: origin(),
                static_duration: 1.0,
            },
        ];
        let inputs = ProblemInputs::new(
            species,
            robots,
            tasks,
            vec![Precedence {
                before: TaskId::from_index(0),
                after: TaskId::from_index(1),
            }],
            ItagsParameters::default(),
            SchedulerParameters::default(),
        )
        .unwrap();
        let mut a = Allocation::zero(2, 1);
        a.set(0, 0, true);
        a.set(1, 0, true);
        assert!(a.mutex_set(&inputs).is_empty());
    }
}
