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

//! Heuristics scoring a partial allocation node: APR, NAQ, POS, NSQ, and the schedule-aware
//! TETAQ combination used by the default forward search.

use std::fmt;
use std::sync::Arc;

use crate::allocation::Allocation;
use crate::error::FailureReason;
use crate::model::ProblemInputs;
use crate::scheduler::{Schedule, ScheduleSolver};

use super::node::SearchNode;

/// The outcome of evaluating a heuristic on a node: either a finite value (with an optional
/// schedule to cache on the node for reuse), or a failure reason that marks the node a dead end.
pub struct HeuristicOutcome {
    /// The heuristic value. `f64::INFINITY` when the underlying scheduler call failed.
    pub value: f64,
    /// The schedule computed while evaluating this node, if the heuristic invoked a scheduler.
    pub schedule: Option<Schedule>,
    /// The failure reason, if the scheduler call failed.
    pub failure: Option<FailureReason>,
}

impl HeuristicOutcome {
    fn finite(value: f64) -> Self {
        Self {
            value,
            schedule: None,
            failure: None,
        }
    }

    fn failed(reason: FailureReason) -> Self {
        Self {
            value: f64::INFINITY,
            schedule: None,
            failure: Some(reason),
        }
    }
}

/// A node-scoring function. Implementations that need schedule information invoke `scheduler`.
pub trait Heuristic: fmt::Debug {
    /// Score `node`. `scheduler` is consulted by schedule-aware heuristics (NSQ, POS, TETAQ).
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome;
}

/// Allocation Percentage Remaining: the fraction of unmet trait demand, zero once traits are
/// fully satisfied.
#[derive(Debug, Default, Clone, Copy)]
pub struct Apr;

impl Apr {
    /// APR(A) = ε(A) / ‖Y‖₁.
    pub fn value(allocation: &Allocation, inputs: &ProblemInputs) -> f64 {
        let denom: f64 = inputs.matrices.y.iter().map(|y| y.l1_norm()).sum();
        if denom == 0.0 {
            return 0.0;
        }
        allocation.mismatch_error(inputs) / denom
    }
}

impl Heuristic for Apr {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        _scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        HeuristicOutcome::finite(Apr::value(&node.allocation(), inputs))
    }
}

/// Normalized Allocation Quality: how close the allocated linear-quality is to the best possible
/// over the full team.
#[derive(Debug, Clone, Copy)]
pub struct Naq {
    q_max: f64,
}

impl Naq {
    /// Precompute Q_max = ⟨Q·1, C⟩ once per problem instance.
    pub fn new(inputs: &ProblemInputs) -> Self {
        let full_team = Allocation::ones(inputs.num_tasks(), inputs.num_robots());
        Self {
            q_max: full_team.linear_quality(inputs),
        }
    }
}

impl Heuristic for Naq {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        _scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        if self.q_max == 0.0 {
            return HeuristicOutcome::finite(0.0);
        }
        let q = node.allocation().linear_quality(inputs);
        HeuristicOutcome::finite((self.q_max - q) / self.q_max)
    }
}

/// Lower and upper bounds on achievable makespan, used to normalize NSQ and POS.
#[derive(Debug, Clone, Copy)]
pub struct MakespanBounds {
    /// μ_best / μ_max: the longest fixed (precedence-only) chain of static durations.
    pub best: f64,
    /// μ_worst: every task executed fully in series, a valid upper bound regardless of
    /// allocation or motion durations.
    pub worst: f64,
}

impl MakespanBounds {
    /// Estimate bounds from the static duration and precedence structure alone.
    pub fn estimate(inputs: &ProblemInputs) -> Self {
        let n = inputs.num_tasks();
        let mut longest = vec![0.0_f64; n];
        let closure = inputs.precedence_closure();
        // process tasks in an order consistent with the DAG: since `closure` is transitive,
        // a task with no incoming ordered pair can be processed first.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&t| closure.iter().filter(|(_, after)| *after == t).count());
        for &t in &order {
            let pred_max = closure
                .iter()
                .filter(|(_, after)| *after == t)
                .map(|(before, _)| longest[*before])
                .fold(0.0, f64::max);
            longest[t] = pred_max + inputs.tasks[t].static_duration;
        }
        let best = longest.iter().cloned().fold(0.0, f64::max);
        let worst: f64 = inputs.tasks.iter().map(|t| t.static_duration).sum();
        Self {
            best,
            worst: worst.max(best),
        }
    }

    fn normalize(&self, mu: f64) -> f64 {
        let span = self.worst - self.best;
        if span <= 0.0 {
            0.0
        } else {
            ((mu - self.best) / span).clamp(0.0, 1.0)
        }
    }
}

/// Normalized Schedule Quality: the scheduler's makespan for this node's allocation, normalized
/// against [`MakespanBounds`]. `+inf` (via the failure path) if the scheduler cannot find a
/// feasible schedule.
#[derive(Debug, Clone, Copy)]
pub struct Nsq {
    bounds: MakespanBounds,
}

impl Nsq {
    /// Build from precomputed bounds.
    pub fn new(bounds: MakespanBounds) -> Self {
        Self { bounds }
    }
}

impl Heuristic for Nsq {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        let allocation = node.allocation();
        match scheduler.solve(&allocation, inputs) {
            Ok(schedule) => {
                let value = self.bounds.normalize(schedule.makespan);
                HeuristicOutcome {
                    value,
                    schedule: Some(schedule),
                    failure: None,
                }
            }
            Err(reason) => HeuristicOutcome::failed(reason),
        }
    }
}

/// Percentage Of Schedule (the reverse-search makespan heuristic): zero until μ exceeds μ_max,
/// then grows linearly to 1 at μ_worst.
#[derive(Debug, Clone, Copy)]
pub struct Pos {
    bounds: MakespanBounds,
}

impl Pos {
    /// Build from precomputed bounds.
    pub fn new(bounds: MakespanBounds) -> Self {
        Self { bounds }
    }
}

impl Heuristic for Pos {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        let allocation = node.allocation();
        match scheduler.solve(&allocation, inputs) {
            Ok(schedule) => {
                let span = self.bounds.worst - self.bounds.best;
                let value = if span <= 0.0 {
                    0.0
                } else {
                    ((schedule.makespan - self.bounds.best) / span).max(0.0)
                };
                HeuristicOutcome {
                    value,
                    schedule: Some(schedule),
                    failure: None,
                }
            }
            Err(reason) => HeuristicOutcome::failed(reason),
        }
    }
}

/// Time-Extended Task Allocation Quality: α·APR + (1−α)·NSQ, the default forward-search
/// heuristic.
#[derive(Debug)]
pub struct Tetaq {
    alpha: f64,
    nsq: Nsq,
}

impl Tetaq {
    /// Build from the problem's `alpha` parameter and precomputed makespan bounds.
    pub fn new(alpha: f64, bounds: MakespanBounds) -> Self {
        Self {
            alpha,
            nsq: Nsq::new(bounds),
        }
    }
}

impl Heuristic for Tetaq {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        let apr = Apr::value(&node.allocation(), inputs);
        let nsq_outcome = self.nsq.evaluate(node, inputs, scheduler);
        if nsq_outcome.failure.is_some() {
            return nsq_outcome;
        }
        HeuristicOutcome {
            value: self.alpha * apr + (1.0 - self.alpha) * nsq_outcome.value,
            schedule: nsq_outcome.schedule,
            failure: None,
        }
    }
}

/// Time-Extended Task Allocation Metric: the reverse-search counterpart of TETAQ, pairing APR
/// with POS instead of NSQ.
#[derive(Debug)]
pub struct Tetam {
    alpha: f64,
    pos: Pos,
}

impl Tetam {
    /// Build from the problem's `alpha` parameter and precomputed makespan bounds.
    pub fn new(alpha: f64, bounds: MakespanBounds) -> Self {
        Self {
            alpha,
            pos: Pos::new(bounds),
        }
    }
}

impl Heuristic for Tetam {
    fn evaluate(
        &self,
        node: &Arc<SearchNode>,
        inputs: &ProblemInputs,
        scheduler: &dyn ScheduleSolver,
    ) -> HeuristicOutcome {
        let apr = Apr::value(&node.allocation(), inputs);
        let pos_outcome = self.pos.evaluate(node, inputs, scheduler);
        if pos_outcome.failure.is_some() {
            return pos_outcome;
        }
        HeuristicOutcome {
            value: self.alpha * apr + (1.0 - self.alpha) * pos_outcome.value,
            schedule: pos_outcome.schedule,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GraphEnvironment;
    use crate::ids::SpeciesId;
    use crate::motion_planner::MotionPlanner;
    use crate::scheduler::DeterministicScheduler;
    use crate::search::node::{Increment, SearchNode};
    use crate::test::builder;

    fn scheduler() -> DeterministicScheduler {
        DeterministicScheduler::new(vec![MotionPlanner::new(
            SpeciesId::from_index(0),
            GraphEnvironment::new(vec![builder::vertex(0), builder::vertex(1)], vec![(0, 1, 1.0)]),
        )])
    }

    #[test]
    fn apr_is_zero_once_fully_allocated() {
        let inputs = builder::single_task_two_identical_robots();
        let root = SearchNode::root(1, 2, false);
        assert_eq!(Apr::value(&root.allocation(), &inputs), 1.0);
        let full = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        assert_eq!(Apr::value(&full.allocation(), &inputs), 0.0);
    }

    #[test]
    fn naq_prefers_the_full_team() {
        let inputs = builder::single_task_two_identical_robots();
        let naq = Naq::new(&inputs);
        let root = SearchNode::root(1, 2, false);
        let outcome = naq.evaluate(&root, &inputs, &scheduler());
        assert_eq!(outcome.value, 1.0);
        let full = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        let outcome = naq.evaluate(&full, &inputs, &scheduler());
        assert_eq!(outcome.value, 0.0);
    }

    #[test]
    fn tetaq_blends_apr_and_nsq() {
        let inputs = builder::two_parallel_tasks_two_robots();
        let bounds = MakespanBounds::estimate(&inputs);
        let tetaq = Tetaq::new(0.5, bounds);
        let root = SearchNode::root(2, 2, false);
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        let n2 = SearchNode::successor(&n1, Increment { task: 1, robot: 1 });
        let outcome = tetaq.evaluate(&n2, &inputs, &scheduler());
        assert!(outcome.failure.is_none());
        assert!(outcome.schedule.is_some());
        assert!((0.0..=1.0).contains(&outcome.value));
    }
}
