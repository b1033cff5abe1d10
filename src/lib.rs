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

//! # ITAGS: Simultaneous trait-based task allocation and scheduling
//!
//! This crate implements the Incremental Task-Allocation Graph Search (ITAGS) for heterogeneous
//! multi-robot teams: given a set of plan tasks each demanding a vector of robot traits, a
//! heterogeneous robot team, and precedence constraints between tasks, find a task-to-robot
//! allocation and a time schedule that jointly satisfy trait demand and minimize makespan.
//!
//! ## Structure
//! - [`model`] holds the static data model (species, robots, tasks, trait vectors, the derived
//!   Q/Y/C matrices) and the validated [`model::ProblemInputs`] container.
//! - [`allocation`] defines the allocation matrix and everything derived from it: the mismatch
//!   matrix, the mutex set, and linear quality.
//! - [`geometry`] and [`motion_planner`] provide robot/task poses and memoized travel-time
//!   queries over Euclidean graph environments.
//! - [`search`] is the ITAGS driver itself: incremental allocation nodes, successor generation,
//!   heuristics (APR, NAQ, NSQ, POS, TETAQ, TETAM), pruning, and goal checks.
//! - [`scheduler`] holds the MILP scheduler family (deterministic, monolithic-stochastic,
//!   heuristic-approximation) built on `good_lp`/CBC, plus the scenario selector and SPRT used by
//!   the stochastic formulations.
//! - [`io`] (feature `serde`) (de)serializes problem inputs and solutions to/from JSON.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::result_large_err)]

pub mod allocation;
pub mod error;
pub mod geometry;
pub mod ids;
#[cfg(feature = "serde")]
pub mod io;
pub mod model;
pub mod motion_planner;
pub mod scheduler;
pub mod search;
#[cfg(test)]
pub(crate) mod test;
pub mod timer;

pub use error::{FailureReason, ItagsError};
pub use model::ProblemInputs;
pub use search::{Itags, ItagsResult, ItagsStatistics};
