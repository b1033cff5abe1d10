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

//! Fluent construction of small [`ProblemInputs`] fixtures, plus the six concrete scenarios used
//! across the library's inline unit tests.

use crate::geometry::Configuration;
use crate::ids::{RobotId, SpeciesId, TaskId};
use crate::model::{
    ItagsParameters, Precedence, ProblemInputs, Robot, SchedulerParameters, Species, Task,
    TraitVector,
};

/// A vertex-indexed pose, used by every fixture (no motion planner is exercised; transition
/// lower bounds default to zero since the deterministic/stochastic schedulers only query a
/// motion planner, never a bare [`Configuration`]).
pub fn vertex(index: usize) -> Configuration {
    Configuration::GraphVertex {
        vertex: index,
        x: index as f64,
        y: 0.0,
    }
}

/// Incrementally assembles a [`ProblemInputs`] fixture: one species by default, named robots and
/// tasks added in order, ids assigned by position.
#[derive(Debug, Default)]
pub struct ProblemInputsBuilder {
    species: Vec<Species>,
    robots: Vec<Robot>,
    tasks: Vec<Task>,
    precedence: Vec<Precedence>,
    itags_parameters: ItagsParameters,
    scheduler_parameters: SchedulerParameters,
}

impl ProblemInputsBuilder {
    /// Start a builder with a single one-dimensional-trait species, speed 1.
    pub fn new() -> Self {
        let mut b = Self::default();
        b.species.push(Species {
            id: SpeciesId::from_index(0),
            name: "default".into(),
            traits: TraitVector(vec![1.0]),
            radius: 0.1,
            speed: 1.0,
            motion_planner: 0,
        });
        b
    }

    /// Add a robot of species 0 at `configuration`.
    pub fn robot(mut self, configuration: Configuration) -> Self {
        let id = RobotId::from_index(self.robots.len());
        self.robots.push(Robot {
            id,
            name: format!("r{}", id.index()),
            initial_configuration: configuration,
            species: SpeciesId::from_index(0),
        });
        self
    }

    /// Add a task demanding a one-robot coalition, with the given initial/terminal configuration
    /// and static duration.
    pub fn task(mut self, initial: Configuration, terminal: Configuration, duration: f64) -> Self {
        let id = TaskId::from_index(self.tasks.len());
        self.tasks.push(Task {
            id,
            name: format!("t{}", id.index()),
            desired_traits: TraitVector(vec![1.0]),
            linear_quality_coefficients: TraitVector(vec![1.0]),
            initial_configuration: initial,
            terminal_configuration: terminal,
            static_duration: duration,
        });
        self
    }

    /// Add a task whose trait demand exceeds what a single robot of the default species carries.
    pub fn infeasible_task(mut self, demand: f64) -> Self {
        let id = TaskId::from_index(self.tasks.len());
        self.tasks.push(Task {
            id,
            name: format!("t{}", id.index()),
            desired_traits: TraitVector(vec![demand]),
            linear_quality_coefficients: TraitVector(vec![1.0]),
            initial_configuration: vertex(0),
            terminal_configuration: vertex(0),
            static_duration: 1.0,
        });
        self
    }

    /// Require `before` to finish before `after` starts (by task index).
    pub fn precedes(mut self, before: usize, after: usize) -> Self {
        self.precedence.push(Precedence {
            before: TaskId::from_index(before),
            after: TaskId::from_index(after),
        });
        self
    }

    /// Override the scheduler parameters (e.g. to configure a stochastic scheduler's Q/β/γ).
    pub fn scheduler_parameters(mut self, params: SchedulerParameters) -> Self {
        self.scheduler_parameters = params;
        self
    }

    /// Finish, validating every invariant `ProblemInputs::new` enforces.
    pub fn build(self) -> ProblemInputs {
        ProblemInputs::new(
            self.species,
            self.robots,
            self.tasks,
            self.precedence,
            self.itags_parameters,
            self.scheduler_parameters,
        )
        .expect("fixture violates a problem-inputs invariant")
    }
}

/// Scenario: one task, two identical robots, one-robot trait demand.
pub fn single_task_two_identical_robots() -> ProblemInputs {
    ProblemInputsBuilder::new()
        .robot(vertex(0))
        .robot(vertex(0))
        .task(vertex(0), vertex(0), 3.0)
        .build()
}

/// Scenario: two serial tasks, one robot, precedence 0≺1, zero transition.
pub fn two_serial_tasks_one_robot() -> ProblemInputs {
    ProblemInputsBuilder::new()
        .robot(vertex(0))
        .task(vertex(0), vertex(0), 2.0)
        .task(vertex(0), vertex(0), 3.0)
        .precedes(0, 1)
        .build()
}

/// Scenario: two parallel tasks, two robots, no shared robot.
pub fn two_parallel_tasks_two_robots() -> ProblemInputs {
    ProblemInputsBuilder::new()
        .robot(vertex(0))
        .robot(vertex(1))
        .task(vertex(0), vertex(0), 2.0)
        .task(vertex(1), vertex(1), 5.0)
        .build()
}

/// Scenario: two tasks sharing one robot, no precedence (a mutex pair).
pub fn two_tasks_sharing_one_robot() -> ProblemInputs {
    ProblemInputsBuilder::new()
        .robot(vertex(0))
        .task(vertex(0), vertex(0), 2.0)
        .task(vertex(0), vertex(0), 3.0)
        .build()
}

/// Scenario: trait demand exceeds aggregate team capacity for some trait.
pub fn traits_infeasible() -> ProblemInputs {
    ProblemInputsBuilder::new()
        .robot(vertex(0))
        .infeasible_task(5.0)
        .build()
}
