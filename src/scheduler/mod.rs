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

//! The MILP scheduler family: given a fixed allocation, compute a time-feasible, makespan-
//! minimizing schedule. Deterministic, monolithic-stochastic and heuristic-approximation
//! stochastic formulations share the variable/constraint helpers in [`or_tools`] and the mutex
//! bookkeeping in [`mutex`].

pub mod deterministic;
pub mod mutex;
pub mod or_tools;
pub mod scenario_selector;
pub mod sprt;
pub mod stochastic;

use std::fmt;

use crate::allocation::Allocation;
use crate::error::FailureReason;
use crate::model::ProblemInputs;

pub use deterministic::DeterministicScheduler;
pub use scenario_selector::{GnnScenarioSelector, HeuristicScenarioSelector, ScenarioSelector};
pub use sprt::SequentialProbabilityRatioTest;
pub use stochastic::{HeuristicApproximationScheduler, MonolithicStochasticScheduler};

/// A time-feasible schedule for a fixed allocation: the makespan, optional per-task timepoints
/// (present for the deterministic scheduler, absent when only an ordering was committed to), and
/// the chosen orientation of every mutex pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    /// The makespan, μ.
    pub makespan: f64,
    /// Per-task (start, end) timepoints, by task index, when known.
    pub timepoints: Option<Vec<(f64, f64)>>,
    /// Chosen orientation of every mutex pair: `(i, j)` means task `i` precedes task `j`.
    pub mutex_orientation: Vec<(usize, usize)>,
}

/// Anything that can turn a fixed allocation into a [`Schedule`], used by the heuristics (NSQ,
/// POS, TETAQ) and by the solution-serialization step once a goal node is found.
pub trait ScheduleSolver: fmt::Debug + Sync {
    /// Schedule `allocation`, or report why it could not be scheduled.
    fn solve(&self, allocation: &Allocation, inputs: &ProblemInputs) -> Result<Schedule, FailureReason>;
}
