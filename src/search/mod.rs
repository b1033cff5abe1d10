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

//! The Incremental Task-Allocation Graph Search (ITAGS): allocation nodes, successor generation,
//! heuristics, pruning, goal checks, and the greedy best-first driver.

pub mod goal;
pub mod heuristic;
pub mod itags;
pub mod node;
pub mod pruning;
pub mod successor;

pub use goal::{GoalCheck, ZeroAprCheck, ZeroPosCheck};
pub use heuristic::{Apr, Heuristic, MakespanBounds, Naq, Nsq, Pos, Tetam, Tetaq};
pub use itags::{Itags, ItagsResult, ItagsStatistics};
pub use node::{Increment, SearchNode};
pub use pruning::{
    Conjunction, Disjunction, NullPruningMethod, PreviousFailurePruning, PruningMethod,
    TraitsImprovementPruning,
};
pub use successor::IncrementalAllocationGenerator;
