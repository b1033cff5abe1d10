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

//! Pruning predicates applied before a successor is enqueued (pre-pruning) or before a popped
//! node is expanded (post-pruning).

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use crate::model::ProblemInputs;

use super::heuristic::Apr;
use super::node::SearchNode;

/// A predicate that decides whether a node should be discarded instead of enqueued/expanded.
pub trait PruningMethod: fmt::Debug {
    /// Returns `true` if `node` should be pruned.
    fn should_prune(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool;
}

/// Never prunes. The default post-pruning method for the forward search.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPruningMethod;

impl PruningMethod for NullPruningMethod {
    fn should_prune(&self, _node: &SearchNode, _inputs: &ProblemInputs) -> bool {
        false
    }
}

/// Prunes a successor whose APR did not strictly improve over its parent's: adding a robot that
/// does not reduce unmet trait demand cannot improve any descendant's APR either.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraitsImprovementPruning;

impl PruningMethod for TraitsImprovementPruning {
    fn should_prune(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        let node_apr = Apr::value(&node.allocation(), inputs);
        let parent_apr = Apr::value(&parent.allocation(), inputs);
        node_apr >= parent_apr
    }
}

/// A partial allocation proven infeasible by a prior scheduler call: every (task, robot) cell
/// that was set when the failure was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailedPartialAllocation {
    cells: Vec<(usize, usize)>,
}

impl FailedPartialAllocation {
    /// Record the (task, robot) cells currently set on `node`'s allocation as infeasible.
    pub fn from_node(node: &SearchNode, inputs: &ProblemInputs) -> Self {
        let allocation = node.allocation();
        let mut cells = Vec::new();
        for t in 0..inputs.num_tasks() {
            for r in 0..inputs.num_robots() {
                if allocation.get(t, r) {
                    cells.push((t, r));
                }
            }
        }
        Self { cells }
    }

    fn is_subset_of(&self, node: &SearchNode) -> bool {
        let allocation = node.allocation();
        self.cells.iter().all(|&(t, r)| allocation.get(t, r))
    }
}

/// Learns which partial allocations are infeasible from scheduler failures, and prunes any node
/// whose allocation is a superset of a previously-failed one.
#[derive(Debug, Default)]
pub struct PreviousFailurePruning {
    failures: Mutex<HashSet<FailedPartialAllocation>>,
}

impl PreviousFailurePruning {
    /// Build an empty pruner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node`'s allocation (or any superset of it) is infeasible.
    pub fn record_failure(&self, node: &SearchNode, inputs: &ProblemInputs) {
        self.failures
            .lock()
            .unwrap()
            .insert(FailedPartialAllocation::from_node(node, inputs));
    }
}

impl PruningMethod for PreviousFailurePruning {
    fn should_prune(&self, node: &SearchNode, _inputs: &ProblemInputs) -> bool {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .any(|failed| failed.is_subset_of(node))
    }
}

/// Prunes iff every sub-predicate prunes.
#[derive(Debug)]
pub struct Conjunction(pub Vec<Box<dyn PruningMethod + Send + Sync>>);

impl PruningMethod for Conjunction {
    fn should_prune(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool {
        !self.0.is_empty() && self.0.iter().all(|p| p.should_prune(node, inputs))
    }
}

/// Prunes iff any sub-predicate prunes.
#[derive(Debug)]
pub struct Disjunction(pub Vec<Box<dyn PruningMethod + Send + Sync>>);

impl PruningMethod for Disjunction {
    fn should_prune(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool {
        self.0.iter().any(|p| p.should_prune(node, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Configuration;
    use crate::ids::{RobotId, SpeciesId, TaskId};
    use crate::model::{ItagsParameters, SchedulerParameters, Species, Robot, Task, TraitVector};
    use crate::search::node::{Increment, SearchNode};

    fn origin() -> Configuration {
        Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 }
    }

    fn inputs() -> ProblemInputs {
        let species = vec![Species {
            id: SpeciesId::from_index(0),
            name: "s".into(),
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
    fn prunes_non_improving_successor() {
        let inputs = inputs();
        let root = SearchNode::root(1, 1, false);
        // root has APR=1 (no robot assigned); any successor either improves or stays equal.
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        assert!(!TraitsImprovementPruning.should_prune(&n1, &inputs));
    }

    #[test]
    fn previous_failure_prunes_supersets() {
        let inputs = inputs();
        let root = SearchNode::root(1, 1, false);
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        let pruner = PreviousFailurePruning::new();
        pruner.record_failure(&n1, &inputs);
        assert!(pruner.should_prune(&n1, &inputs));
    }
}
