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

//! The ITAGS driver: greedy best-first search over the incremental allocation graph.

use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::FailureReason;
use crate::model::ProblemInputs;
use crate::scheduler::ScheduleSolver;
use crate::timer::TimerRunner;

use super::goal::GoalCheck;
use super::heuristic::Heuristic;
use super::node::{OpenEntry, SearchNode};
use super::pruning::{PreviousFailurePruning, PruningMethod};
use super::successor::IncrementalAllocationGenerator;

/// Search-wide statistics, mirroring the reference implementation's `ItagsStatistics`.
#[derive(Debug, Clone, Default)]
pub struct ItagsStatistics {
    /// Nodes created (enqueued or not).
    pub nodes_generated: u64,
    /// Nodes popped off open and expanded.
    pub nodes_expanded: u64,
    /// Nodes whose heuristic was evaluated.
    pub nodes_evaluated: u64,
    /// Nodes discarded by pre- or post-pruning.
    pub nodes_pruned: u64,
    /// Nodes whose heuristic evaluation failed (scheduler infeasible).
    pub nodes_deadend: u64,
    /// Nodes found already memoized with an equal-or-better value.
    pub nodes_reopened: u64,
    /// Total wall-clock time spent in the search.
    pub search_time: Duration,
}

/// The search's outcome: a goal node, or a typed failure reason.
pub type ItagsResult = Result<Arc<SearchNode>, FailureReason>;

/// Wires together the heuristic, goal check, pruning methods and memoization strategy, and runs
/// the greedy best-first search.
pub struct Itags<'a> {
    heuristic: &'a dyn Heuristic,
    goal_check: &'a dyn GoalCheck,
    generator: IncrementalAllocationGenerator,
    pre_pruning: &'a dyn PruningMethod,
    post_pruning: &'a dyn PruningMethod,
    scheduler: &'a dyn ScheduleSolver,
    failure_memory: PreviousFailurePruning,
}

impl<'a> Itags<'a> {
    /// Wire up a search instance. `pre_pruning`/`post_pruning` are applied in addition to the
    /// internal previous-failure memory, which is always consulted.
    pub fn new(
        heuristic: &'a dyn Heuristic,
        goal_check: &'a dyn GoalCheck,
        pre_pruning: &'a dyn PruningMethod,
        post_pruning: &'a dyn PruningMethod,
        scheduler: &'a dyn ScheduleSolver,
    ) -> Self {
        Self {
            heuristic,
            goal_check,
            generator: IncrementalAllocationGenerator,
            pre_pruning,
            post_pruning,
            scheduler,
            failure_memory: PreviousFailurePruning::new(),
        }
    }

    /// Whether the all-ones (forward) or all-zero (reverse) matrix can satisfy trait demand at
    /// all; checked once before search starts in forward mode.
    fn is_allocatable(&self, inputs: &ProblemInputs) -> bool {
        let full_team = crate::allocation::Allocation::ones(inputs.num_tasks(), inputs.num_robots());
        full_team.is_traits_feasible(inputs)
    }

    /// Run the search. `reverse` selects the root allocation and successor direction.
    pub fn search(
        &self,
        inputs: &ProblemInputs,
        reverse: bool,
    ) -> (ItagsResult, ItagsStatistics) {
        let _timer = TimerRunner::start("itags.search");
        let start = Instant::now();
        let budget = inputs.itags_parameters.has_timeout.then(|| {
            Duration::from_secs_f64(inputs.itags_parameters.timeout_secs)
        });

        let mut stats = ItagsStatistics::default();

        if !reverse && !self.is_allocatable(inputs) {
            stats.search_time = start.elapsed();
            return (Err(FailureReason::TraitsInfeasible), stats);
        }

        let root = SearchNode::root(inputs.num_tasks(), inputs.num_robots(), reverse);
        stats.nodes_generated += 1;

        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();
        let mut sequence: u64 = 0;
        let mut closed: HashSet<crate::allocation::Allocation> = HashSet::new();
        let mut best_feasible: Option<Arc<SearchNode>> = None;

        match self.evaluate(&root, inputs, &mut stats) {
            Ok(root) => {
                open.push(OpenEntry {
                    h: root.heuristic.unwrap_or(f64::INFINITY),
                    node: root,
                    sequence,
                });
                sequence += 1;
            }
            Err(reason) => {
                stats.nodes_deadend += 1;
                stats.search_time = start.elapsed();
                return (Err(reason), stats);
            }
        }

        while let Some(entry) = open.pop() {
            if let Some(budget) = budget {
                if start.elapsed() >= budget {
                    stats.search_time = start.elapsed();
                    if inputs.itags_parameters.return_feasible_on_timeout {
                        if let Some(leaf) = best_feasible {
                            return (Ok(leaf), stats);
                        }
                    }
                    return (Err(FailureReason::TimeoutFailure), stats);
                }
            }

            let node = entry.node;
            stats.nodes_expanded += 1;

            if self.post_pruning.should_prune(&node, inputs)
                || self.failure_memory.should_prune(&node, inputs)
            {
                stats.nodes_pruned += 1;
                continue;
            }

            if node.allocation().is_traits_feasible(inputs) && best_feasible.is_none() {
                best_feasible = Some(Arc::clone(&node));
            }

            if self.goal_check.is_goal(&node, inputs) {
                stats.search_time = start.elapsed();
                return (Ok(node), stats);
            }

            for successor in self.generator.successors(&node) {
                stats.nodes_generated += 1;

                if self.pre_pruning.should_prune(&successor, inputs) {
                    stats.nodes_pruned += 1;
                    continue;
                }

                let evaluated = match self.evaluate(&successor, inputs, &mut stats) {
                    Ok(n) => n,
                    Err(_) => {
                        self.failure_memory.record_failure(&successor, inputs);
                        stats.nodes_deadend += 1;
                        continue;
                    }
                };

                let allocation = evaluated.allocation();
                if closed.contains(&allocation) {
                    stats.nodes_reopened += 1;
                    continue;
                }
                closed.insert(allocation);

                open.push(OpenEntry {
                    h: evaluated.heuristic.unwrap_or(f64::INFINITY),
                    node: evaluated,
                    sequence,
                });
                sequence += 1;
            }
        }

        stats.search_time = start.elapsed();
        if inputs.itags_parameters.return_feasible_on_timeout {
            if let Some(leaf) = best_feasible {
                return (Ok(leaf), stats);
            }
        }
        (Err(FailureReason::TraitsInfeasible), stats)
    }

    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        stats: &mut ItagsStatistics,
    ) -> Result<Arc<SearchNode>, FailureReason> {
        stats.nodes_evaluated += 1;
        let outcome = self.heuristic.evaluate(node, inputs, self.scheduler);
        if let Some(reason) = outcome.failure {
            return Err(reason);
        }
        // SearchNode fields are private-mutable only through Arc::get_mut, which is safe here
        // because this node has not yet been shared (no successors generated from it yet).
        let mut owned = (**node).clone();
        owned.heuristic = Some(outcome.value);
        owned.schedule = outcome.schedule;
        Ok(Arc::new(owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GraphEnvironment;
    use crate::ids::SpeciesId;
    use crate::motion_planner::MotionPlanner;
    use crate::scheduler::DeterministicScheduler;
    use crate::search::goal::ZeroAprCheck;
    use crate::search::heuristic::{Apr, MakespanBounds, Tetaq};
    use crate::search::pruning::NullPruningMethod;
    use crate::test::builder;

    fn scheduler() -> DeterministicScheduler {
        DeterministicScheduler::new(vec![MotionPlanner::new(
            SpeciesId::from_index(0),
            GraphEnvironment::new(vec![builder::vertex(0), builder::vertex(1)], vec![(0, 1, 1.0)]),
        )])
    }

    #[test]
    fn finds_a_minimal_traits_feasible_allocation() {
        let inputs = builder::single_task_two_identical_robots();
        let scheduler = scheduler();
        let search = Itags::new(&Apr, &ZeroAprCheck, &NullPruningMethod, &NullPruningMethod, &scheduler);
        let (result, stats) = search.search(&inputs, false);
        let node = result.expect("a one-robot coalition already satisfies demand");
        assert!(node.allocation().is_traits_feasible(&inputs));
        assert!(stats.nodes_expanded > 0);
    }

    #[test]
    fn reports_traits_infeasible_when_the_full_team_cannot_satisfy_demand() {
        let inputs = builder::traits_infeasible();
        let scheduler = scheduler();
        let search = Itags::new(&Apr, &ZeroAprCheck, &NullPruningMethod, &NullPruningMethod, &scheduler);
        let (result, _stats) = search.search(&inputs, false);
        assert_eq!(result.unwrap_err(), FailureReason::TraitsInfeasible);
    }

    #[test]
    fn tetaq_search_schedules_the_goal_node() {
        let inputs = builder::two_parallel_tasks_two_robots();
        let bounds = MakespanBounds::estimate(&inputs);
        let tetaq = Tetaq::new(0.5, bounds);
        let scheduler = scheduler();
        let search = Itags::new(&tetaq, &ZeroAprCheck, &NullPruningMethod, &NullPruningMethod, &scheduler);
        let (result, _stats) = search.search(&inputs, false);
        let node = result.expect("two robots, two independent single-robot tasks, is feasible");
        assert!(node.schedule.is_some());
    }
}
