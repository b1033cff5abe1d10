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

//! Incremental allocation nodes: a node carries only its last increment and a parent link; the
//! full allocation matrix is reconstructed by walking the chain back to the root.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::allocation::Allocation;
use crate::ids::{NodeIdHandle, SearchNodeId};
use crate::scheduler::Schedule;

/// A single (task, robot) toggle applied relative to a node's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    /// The task whose coalition changed.
    pub task: usize,
    /// The robot that was added (forward search) or removed (reverse search).
    pub robot: usize,
}

/// A node in the incremental task-allocation graph. The root has no increment and dimensions
/// set directly; every other node is defined relative to its parent by a single [`Increment`].
#[derive(Debug, Clone)]
pub struct SearchNode {
    _id_handle: Arc<NodeIdHandle>,
    id: SearchNodeId,
    parent: Option<Arc<SearchNode>>,
    increment: Option<Increment>,
    depth: usize,
    num_tasks: usize,
    num_robots: usize,
    reverse: bool,
    /// TETAQ/APR/NSQ/POS/NAQ value, filled in once the heuristic evaluates this node.
    pub heuristic: Option<f64>,
    /// Schedule computed while evaluating NSQ/POS, cached for reuse when the node becomes goal.
    pub schedule: Option<Schedule>,
}

impl SearchNode {
    /// Construct the root node: no increment, the zero (forward) or all-ones (reverse) matrix.
    pub fn root(num_tasks: usize, num_robots: usize, reverse: bool) -> Arc<Self> {
        let handle = NodeIdHandle::alloc();
        Arc::new(Self {
            id: handle.id(),
            _id_handle: Arc::new(handle),
            parent: None,
            increment: None,
            depth: 0,
            num_tasks,
            num_robots,
            reverse,
            heuristic: None,
            schedule: None,
        })
    }

    /// Construct a successor of `parent` applying `increment`.
    pub fn successor(parent: &Arc<SearchNode>, increment: Increment) -> Arc<Self> {
        let handle = NodeIdHandle::alloc();
        Arc::new(Self {
            id: handle.id(),
            _id_handle: Arc::new(handle),
            parent: Some(Arc::clone(parent)),
            increment: Some(increment),
            depth: parent.depth + 1,
            num_tasks: parent.num_tasks,
            num_robots: parent.num_robots,
            reverse: parent.reverse,
            heuristic: None,
            schedule: None,
        })
    }

    /// This node's id.
    pub fn id(&self) -> SearchNodeId {
        self.id
    }

    /// Depth from the root (number of increments applied).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The increment applied relative to the parent; `None` for the root.
    pub fn increment(&self) -> Option<Increment> {
        self.increment
    }

    /// The parent node, if any.
    pub fn parent(&self) -> Option<&Arc<SearchNode>> {
        self.parent.as_ref()
    }

    /// Whether this node belongs to a reverse-mode search (root = all-ones, successors remove
    /// robots) as opposed to forward mode (root = zero, successors add robots).
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    /// Reconstruct the full allocation matrix by walking the chain to the root and replaying
    /// every increment on top of the root's zero (forward) or ones (reverse) matrix.
    pub fn allocation(&self) -> Allocation {
        let mut chain = Vec::new();
        let mut cur = self;
        while let Some(inc) = cur.increment {
            chain.push(inc);
            cur = cur
                .parent
                .as_deref()
                .expect("node with an increment must have a parent");
        }
        let mut matrix = if self.reverse {
            Allocation::ones(cur.num_tasks, cur.num_robots)
        } else {
            Allocation::zero(cur.num_tasks, cur.num_robots)
        };
        let set_to = !self.reverse;
        for inc in chain.into_iter().rev() {
            matrix.set(inc.task, inc.robot, set_to);
        }
        matrix
    }

    /// Whether `increment` already appears on this node's ancestor chain (used by the edge
    /// applier to reject duplicate toggles).
    pub fn has_increment(&self, increment: Increment) -> bool {
        let mut cur = self;
        loop {
            if cur.increment == Some(increment) {
                return true;
            }
            match cur.parent.as_deref() {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for SearchNode {}

/// Open-list entry: orders by heuristic value ascending, breaking ties by insertion order (FIFO)
/// so the search remains deterministic.
#[derive(Debug, Clone)]
pub struct OpenEntry {
    /// The node.
    pub node: Arc<SearchNode>,
    /// Heuristic value used as the sort key.
    pub h: f64,
    /// Monotonic insertion sequence number, used to break ties FIFO.
    pub sequence: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.h == other.h && self.sequence == other.sequence
    }
}
impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest `h` (and, on ties, the smallest
        // sequence number) pops first.
        other
            .h
            .partial_cmp(&self.h)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_allocation_is_zero_matrix() {
        let root = SearchNode::root(2, 2, false);
        let a = root.allocation();
        assert!(!a.get(0, 0));
        assert!(!a.get(1, 1));
    }

    #[test]
    fn successor_chain_replays_increments() {
        let root = SearchNode::root(2, 2, false);
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 1 });
        let n2 = SearchNode::successor(&n1, Increment { task: 1, robot: 0 });
        let a = n2.allocation();
        assert!(a.get(0, 1));
        assert!(a.get(1, 0));
        assert!(!a.get(0, 0));
    }

    #[test]
    fn reverse_root_allocation_is_ones_matrix() {
        let root = SearchNode::root(1, 2, true);
        let a = root.allocation();
        assert!(a.get(0, 0) && a.get(0, 1));
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 0 });
        assert!(!n1.allocation().get(0, 0));
    }

    #[test]
    fn duplicate_increment_is_detected_on_chain() {
        let root = SearchNode::root(2, 2, false);
        let n1 = SearchNode::successor(&root, Increment { task: 0, robot: 1 });
        assert!(n1.has_increment(Increment { task: 0, robot: 1 }));
        assert!(!n1.has_increment(Increment { task: 1, robot: 0 }));
    }
}
