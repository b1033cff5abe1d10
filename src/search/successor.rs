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

//! Successor generation: enumerate every (task, robot) edge not yet present on a node's chain,
//! in deterministic (task-major, robot-minor) order.

use std::sync::Arc;

use super::node::{Increment, SearchNode};

/// Generates the successors of a node by toggling one unused (task, robot) cell at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncrementalAllocationGenerator;

impl IncrementalAllocationGenerator {
    /// Enumerate every valid successor of `node`: in forward mode, every zero cell not already
    /// toggled on the chain; in reverse mode, every one cell not already toggled.
    pub fn successors(&self, node: &Arc<SearchNode>) -> Vec<Arc<SearchNode>> {
        let allocation = node.allocation();
        let mut out = Vec::new();
        for task in 0..allocation.num_tasks() {
            for robot in 0..allocation.num_robots() {
                let increment = Increment { task, robot };
                if node.has_increment(increment) {
                    continue;
                }
                let currently_set = allocation.get(task, robot);
                // Forward mode adds a robot (0 -> 1); reverse mode removes one (1 -> 0).
                let is_candidate_edge = currently_set == node.is_reverse();
                if is_candidate_edge {
                    out.push(SearchNode::successor(node, increment));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::node::SearchNode;

    #[test]
    fn generates_one_successor_per_unset_cell() {
        let root = SearchNode::root(1, 2, false);
        let gen = IncrementalAllocationGenerator;
        let succs = gen.successors(&root);
        assert_eq!(succs.len(), 2);
    }

    #[test]
    fn excludes_cells_already_on_chain() {
        let root = SearchNode::root(1, 2, false);
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        let gen = IncrementalAllocationGenerator;
        let succs = gen.successors(&n1);
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].increment().unwrap().robot, 1);
    }
}
