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

//! Termination predicates for the search.

use std::fmt;

use crate::model::ProblemInputs;

use super::heuristic::Apr;
use super::node::SearchNode;

/// Decides whether a node is a goal.
pub trait GoalCheck: fmt::Debug {
    /// Returns `true` if `node` should terminate the search.
    fn is_goal(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool;
}

/// Forward search's goal: traits fully satisfied (APR == 0).
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroAprCheck;

impl GoalCheck for ZeroAprCheck {
    fn is_goal(&self, node: &SearchNode, inputs: &ProblemInputs) -> bool {
        Apr::value(&node.allocation(), inputs) == 0.0
    }
}

/// Reverse search's goal: the node's heuristic (POS-based) has already been evaluated to zero,
/// meaning removing robots has not yet pushed the makespan above the best bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroPosCheck;

impl GoalCheck for ZeroPosCheck {
    fn is_goal(&self, node: &SearchNode, _inputs: &ProblemInputs) -> bool {
        node.heuristic == Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::node::Increment;
    use crate::test::builder;

    #[test]
    fn zero_apr_check_requires_full_trait_satisfaction() {
        let inputs = builder::single_task_two_identical_robots();
        let root = SearchNode::root(1, 2, false);
        assert!(!ZeroAprCheck.is_goal(&root, &inputs));
        let full = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        assert!(ZeroAprCheck.is_goal(&full, &inputs));
    }

    #[test]
    fn zero_pos_check_reads_the_cached_heuristic() {
        let inputs = builder::single_task_two_identical_robots();
        let mut root = (*SearchNode::root(1, 2, true)).clone();
        assert!(!ZeroPosCheck.is_goal(&root, &inputs));
        root.heuristic = Some(0.0);
        assert!(ZeroPosCheck.is_goal(&root, &inputs));
    }
}
