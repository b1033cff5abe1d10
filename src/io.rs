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

//! JSON (de)serialization of problem inputs and solutions, gated behind the `serde` feature.
//! Plain `serde`-derived wire structs, converted into the library's internal types rather than
//! used directly by the search or the scheduler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::allocation::Allocation;
use crate::error::ItagsError;
use crate::geometry::{Configuration, GraphEnvironment};
use crate::ids::{RobotId, SpeciesId, TaskId};
use crate::model::{
    ItagsParameters, Precedence, ProblemInputs, Robot, SchedulerParameters, Species, Task,
    TraitVector,
};
use crate::motion_planner::{MotionPlanner, SampledMotionPlanner};
use crate::scheduler::Schedule;
use crate::search::ItagsStatistics;

/// Opaque PDDL provenance: paths to the domain/problem files the task planner used to name the
/// tasks this run allocates. Parsed only far enough to carry the strings through; full PDDL/SAS+
/// parsing is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PddlProvenance {
    /// Path to the PDDL domain file.
    pub domain_filepath: String,
    /// Path to the PDDL problem file.
    pub problem_filepath: String,
}

/// One vertex of a Euclidean graph environment, as it appears in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVertex {
    /// Vertex index.
    pub vertex: usize,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// An environment specification: a shared vertex set, plus either one edge-weight list
/// (deterministic) or several (sampled scenarios, each scenario an independent weight draw over
/// the same vertex set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentParameters {
    /// Graph vertices.
    pub vertices: Vec<RawVertex>,
    /// Deterministic edge list `(from, to, weight)`, used when `scenarios` is absent.
    #[serde(default)]
    pub edges: Vec<(usize, usize, f64)>,
    /// Per-scenario edge lists, used by the sampled/masked motion-planner config types.
    #[serde(default)]
    pub scenarios: Vec<Vec<(usize, usize, f64)>>,
}

impl EnvironmentParameters {
    fn vertices(&self) -> Vec<Configuration> {
        let mut out = vec![
            Configuration::GraphVertex {
                vertex: 0,
                x: 0.0,
                y: 0.0
            };
            self.vertices.len()
        ];
        for v in &self.vertices {
            out[v.vertex] = Configuration::GraphVertex {
                vertex: v.vertex,
                x: v.x,
                y: v.y,
            };
        }
        out
    }
}

/// Which motion-planner backend a `motion_planners[i]` entry configures. Only the Euclidean-graph
/// family is implemented; `OmplMotionPlanner` is recognized but rejected, since this build has no
/// sampling-based planning library to back it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionPlannerConfigType {
    /// Single deterministic Euclidean graph, exhaustively cached.
    CompleteEuclideanGraphMotionPlanner,
    /// Several sampled Euclidean graphs, each exhaustively cached.
    CompleteSampledEuclideanGraphMotionPlanner,
    /// Several sampled Euclidean graphs, restricted to a selector-chosen mask.
    MaskedCompleteSampledEuclideanGraphMotionPlanner,
    /// Single deterministic Euclidean graph, lazily cached.
    EuclideanGraphMotionPlanner,
    /// Several sampled Euclidean graphs, lazily cached.
    SampledEuclideanGraphMotionPlanner,
    /// Sampling-based planner over a continuous configuration space. Not supported in this build.
    OmplMotionPlanner,
}

/// One entry of the `motion_planners` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMotionPlannerSpec {
    /// Which backend this spec configures.
    pub config_type: MotionPlannerConfigType,
    /// Backend-specific tuning knobs, passed through opaquely (unused by the graph backends).
    #[serde(default)]
    pub algorithm_parameters: serde_json::Value,
    /// The graph(s) this planner serves queries over.
    pub environment_parameters: EnvironmentParameters,
}

/// A built motion planner, either a single deterministic environment or several sampled ones.
/// `Species::motion_planner` indexes into a `Vec<MotionPlannerHandle>` built from
/// `motion_planners`.
#[derive(Debug)]
pub enum MotionPlannerHandle {
    /// `CompleteEuclideanGraphMotionPlanner` / `EuclideanGraphMotionPlanner`.
    Deterministic(MotionPlanner),
    /// `CompleteSampledEuclideanGraphMotionPlanner` / `SampledEuclideanGraphMotionPlanner` /
    /// `MaskedCompleteSampledEuclideanGraphMotionPlanner`.
    Sampled(SampledMotionPlanner),
}

/// One entry of the `species` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSpecies {
    /// Species name, referenced by `robots[i].species`.
    pub name: String,
    /// Trait vector τ.
    pub traits: Vec<f64>,
    /// Bounding radius.
    #[serde(default)]
    pub radius: f64,
    /// Nominal speed.
    pub speed: f64,
    /// Index into `motion_planners` this species queries.
    pub motion_planner: usize,
}

/// One entry of the `robots` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRobot {
    /// Robot name.
    pub name: String,
    /// Starting pose.
    pub initial_configuration: Configuration,
    /// Species name, resolved against `species[i].name`.
    pub species: String,
}

/// One value of the `task_associations` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTaskAssociation {
    /// Desired traits y.
    pub desired_traits: Vec<f64>,
    /// Linear-quality coefficients c.
    pub linear_quality_coefficients: Vec<f64>,
    /// Approach pose.
    pub initial_configuration: Configuration,
    /// Departure pose.
    pub terminal_configuration: Configuration,
    /// Static execution duration.
    #[serde(default)]
    pub static_duration: f64,
}

/// A `{before, after}` precedence edge by task name. Not part of the distilled schema; supplements
/// it the way `task_associations` would be paired with PDDL ordering facts in the original system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPrecedence {
    /// The task that must finish first.
    pub before: String,
    /// The task that must start after.
    pub after: String,
}

/// Top-level problem-inputs document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemInputsDocument {
    /// PDDL provenance, carried through opaquely.
    pub pddl: PddlProvenance,
    /// Motion-planner specs, indexed by `species[i].motion_planner`.
    pub motion_planners: Vec<RawMotionPlannerSpec>,
    /// Robot species.
    pub species: Vec<RawSpecies>,
    /// Robot instances.
    pub robots: Vec<RawRobot>,
    /// Task definitions, keyed by task name.
    pub task_associations: HashMap<String, RawTaskAssociation>,
    /// Precedence edges by task name.
    #[serde(default)]
    pub precedence: Vec<RawPrecedence>,
    /// FCPOP (task-planner) parameters; carried through opaquely, not consumed by ITAGS itself.
    #[serde(default)]
    pub fcpop_parameters: serde_json::Value,
    /// ITAGS search parameters.
    #[serde(default)]
    pub itags_parameters: ItagsParameters,
    /// MILP scheduler parameters.
    #[serde(default)]
    pub scheduler_parameters: SchedulerParameters,
    /// Optional precomputed robot-traits-matrix reduction; unused (recomputed from `species`).
    #[serde(default)]
    pub robot_traits_matrix_reduction: serde_json::Value,
}

/// Build the motion planners, problem inputs (sorted deterministically by task/robot/species
/// name), and the name-to-id maps from a parsed [`ProblemInputsDocument`].
pub fn build_problem(
    doc: &ProblemInputsDocument,
) -> Result<(ProblemInputs, Vec<MotionPlannerHandle>), ItagsError> {
    let motion_planners = doc
        .motion_planners
        .iter()
        .map(build_motion_planner)
        .collect::<Result<Vec<_>, _>>()?;

    let species_index: HashMap<&str, usize> = doc
        .species
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    let species: Vec<Species> = doc
        .species
        .iter()
        .enumerate()
        .map(|(i, s)| Species {
            id: SpeciesId::from_index(i),
            name: s.name.clone(),
            traits: TraitVector(s.traits.clone()),
            radius: s.radius,
            speed: s.speed,
            motion_planner: s.motion_planner,
        })
        .collect();

    let robots = doc
        .robots
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let species_idx = species_index.get(r.species.as_str()).copied().ok_or_else(|| {
                ItagsError::Validation(format!("robot {} references unknown species {}", r.name, r.species))
            })?;
            Ok(Robot {
                id: RobotId::from_index(i),
                name: r.name.clone(),
                initial_configuration: r.initial_configuration,
                species: SpeciesId::from_index(species_idx),
            })
        })
        .collect::<Result<Vec<_>, ItagsError>>()?;

    let mut task_names: Vec<&String> = doc.task_associations.keys().collect();
    task_names.sort();
    let task_index: HashMap<&str, usize> = task_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let tasks = task_names
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let t = &doc.task_associations[name];
            Task {
                id: TaskId::from_index(i),
                name: name.clone(),
                desired_traits: TraitVector(t.desired_traits.clone()),
                linear_quality_coefficients: TraitVector(t.linear_quality_coefficients.clone()),
                initial_configuration: t.initial_configuration,
                terminal_configuration: t.terminal_configuration,
                static_duration: t.static_duration,
            }
        })
        .collect();

    let precedence = doc
        .precedence
        .iter()
        .map(|p| {
            let before = *task_index
                .get(p.before.as_str())
                .ok_or_else(|| ItagsError::Validation(format!("unknown task {}", p.before)))?;
            let after = *task_index
                .get(p.after.as_str())
                .ok_or_else(|| ItagsError::Validation(format!("unknown task {}", p.after)))?;
            Ok(Precedence {
                before: TaskId::from_index(before),
                after: TaskId::from_index(after),
            })
        })
        .collect::<Result<Vec<_>, ItagsError>>()?;

    let inputs = ProblemInputs::new(
        species,
        robots,
        tasks,
        precedence,
        doc.itags_parameters.clone(),
        doc.scheduler_parameters.clone(),
    )?;
    Ok((inputs, motion_planners))
}

fn build_motion_planner(spec: &RawMotionPlannerSpec) -> Result<MotionPlannerHandle, ItagsError> {
    use MotionPlannerConfigType::*;
    match spec.config_type {
        CompleteEuclideanGraphMotionPlanner | EuclideanGraphMotionPlanner => {
            let env = GraphEnvironment::new(
                spec.environment_parameters.vertices(),
                spec.environment_parameters.edges.clone(),
            );
            Ok(MotionPlannerHandle::Deterministic(MotionPlanner::new(
                SpeciesId::from_index(0),
                env,
            )))
        }
        CompleteSampledEuclideanGraphMotionPlanner
        | SampledEuclideanGraphMotionPlanner
        | MaskedCompleteSampledEuclideanGraphMotionPlanner => {
            let vertices = spec.environment_parameters.vertices();
            let scenarios = spec
                .environment_parameters
                .scenarios
                .iter()
                .map(|edges| GraphEnvironment::new(vertices.clone(), edges.clone()))
                .collect();
            Ok(MotionPlannerHandle::Sampled(SampledMotionPlanner::new(
                SpeciesId::from_index(0),
                scenarios,
            )))
        }
        OmplMotionPlanner => Err(ItagsError::Validation(
            "OmplMotionPlanner is not supported in this build".into(),
        )),
    }
}

/// Per-task result row of a [`SolutionDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSolution {
    /// Task name.
    pub name: String,
    /// Task id (index).
    pub id: usize,
    /// Assigned robot ids (indices).
    pub coalition: Vec<usize>,
}

/// Per-robot result row of a [`SolutionDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotSolution {
    /// Robot name.
    pub name: String,
    /// Robot id (index).
    pub id: usize,
    /// Ordered list of task ids this robot is assigned to, in schedule order.
    pub individual_plan: Vec<usize>,
}

/// Search statistics as reported in a [`SolutionDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsDocument {
    /// Nodes generated (successors produced, whether expanded or not).
    pub nodes_generated: u64,
    /// Nodes popped off the open list and evaluated.
    pub nodes_expanded: u64,
    /// Nodes given to the heuristic and scheduler.
    pub nodes_evaluated: u64,
    /// Nodes discarded by pre/post pruning.
    pub nodes_pruned: u64,
    /// Nodes recognized as dead ends (scheduler or motion-plan failure).
    pub nodes_deadend: u64,
    /// Nodes re-opened after already being closed (never happens in this admissible-heap search;
    /// kept for schema parity with the reference statistics bundle).
    pub nodes_reopened: u64,
    /// Total wall-clock search time, seconds.
    pub search_time: f64,
}

impl From<ItagsStatistics> for StatisticsDocument {
    fn from(s: ItagsStatistics) -> Self {
        Self {
            nodes_generated: s.nodes_generated,
            nodes_expanded: s.nodes_expanded,
            nodes_evaluated: s.nodes_evaluated,
            nodes_pruned: s.nodes_pruned,
            nodes_deadend: s.nodes_deadend,
            nodes_reopened: s.nodes_reopened,
            search_time: s.search_time.as_secs_f64(),
        }
    }
}

/// The full solution document written to `<solution-output-path>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionDocument {
    /// Allocation matrix, row-major, one row per task.
    pub allocation: Vec<Vec<bool>>,
    /// Committed makespan.
    pub makespan: f64,
    /// Input precedence constraints, `(before, after)` task ids.
    pub precedence_constraints: Vec<(usize, usize)>,
    /// Chosen orientation of every mutex pair, `(first, second)` task ids.
    pub precedence_set_mutex_constraints: Vec<(usize, usize)>,
    /// Per-task coalition.
    pub tasks: Vec<TaskSolution>,
    /// Per-robot plan.
    pub robots: Vec<RobotSolution>,
    /// Search statistics.
    pub statistics: StatisticsDocument,
}

impl SolutionDocument {
    /// Assemble a solution document from a committed allocation, its schedule, the original
    /// problem inputs and the search statistics.
    pub fn build(
        allocation: &Allocation,
        schedule: &Schedule,
        inputs: &ProblemInputs,
        statistics: ItagsStatistics,
    ) -> Self {
        let tasks = inputs
            .tasks
            .iter()
            .enumerate()
            .map(|(m, t)| TaskSolution {
                name: t.name.clone(),
                id: m,
                coalition: allocation.coalition(m),
            })
            .collect();

        let mut plans: Vec<Vec<usize>> = vec![Vec::new(); inputs.num_robots()];
        let mut order: Vec<usize> = (0..inputs.num_tasks()).collect();
        if let Some(ref timepoints) = schedule.timepoints {
            order.sort_by(|&a, &b| timepoints[a].0.partial_cmp(&timepoints[b].0).unwrap());
        }
        for m in order {
            for r in allocation.coalition(m) {
                plans[r].push(m);
            }
        }
        let robots = inputs
            .robots
            .iter()
            .enumerate()
            .map(|(r, robot)| RobotSolution {
                name: robot.name.clone(),
                id: r,
                individual_plan: plans[r].clone(),
            })
            .collect();

        Self {
            allocation: allocation_rows(allocation),
            makespan: schedule.makespan,
            precedence_constraints: inputs
                .precedence
                .iter()
                .map(|p| (p.before.index(), p.after.index()))
                .collect(),
            precedence_set_mutex_constraints: schedule.mutex_orientation.clone(),
            tasks,
            robots,
            statistics: statistics.into(),
        }
    }
}

fn allocation_rows(allocation: &Allocation) -> Vec<Vec<bool>> {
    (0..allocation.num_tasks())
        .map(|m| (0..allocation.num_robots()).map(|r| allocation.get(m, r)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_inputs_document_round_trips() {
        let json = serde_json::json!({
            "pddl": {"domain_filepath": "d.pddl", "problem_filepath": "p.pddl"},
            "motion_planners": [{
                "config_type": "CompleteEuclideanGraphMotionPlanner",
                "environment_parameters": {
                    "vertices": [{"vertex": 0, "x": 0.0, "y": 0.0}, {"vertex": 1, "x": 1.0, "y": 0.0}],
                    "edges": [[0, 1, 1.0]]
                }
            }],
            "species": [{"name": "drone", "traits": [1.0], "speed": 1.0, "motion_planner": 0}],
            "robots": [{"name": "r0", "initial_configuration": {"type": "GraphVertex", "vertex": 0, "x": 0.0, "y": 0.0}, "species": "drone"}],
            "task_associations": {
                "t0": {
                    "desired_traits": [1.0],
                    "linear_quality_coefficients": [1.0],
                    "initial_configuration": {"type": "GraphVertex", "vertex": 0, "x": 0.0, "y": 0.0},
                    "terminal_configuration": {"type": "GraphVertex", "vertex": 1, "x": 1.0, "y": 0.0},
                    "static_duration": 2.0
                }
            }
        });
        let doc: ProblemInputsDocument = serde_json::from_value(json).unwrap();
        let (inputs, planners) = build_problem(&doc).unwrap();
        assert_eq!(inputs.num_tasks(), 1);
        assert_eq!(inputs.num_robots(), 1);
        assert_eq!(planners.len(), 1);
    }
}
