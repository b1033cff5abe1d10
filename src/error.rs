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

//! Typed failure reasons produced by the search and the scheduler, plus the outer error types
//! that wrap I/O, parsing and solver failures at the crate's public boundaries.

use thiserror::Error;

use crate::ids::{RobotId, TaskId};

/// A reason a search node, a scheduler call, or a motion-plan query could not produce a result.
///
/// Unlike [`ItagsError`], these are not bugs: a `FailureReason` is an expected, recoverable
/// outcome that the search driver and the pruning methods consume (e.g. to mark a node as a
/// dead end, or to remember that a partial allocation is infeasible).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FailureReason {
    /// The MILP solver reported the model as infeasible or unbounded.
    #[error("MILP solver could not find a feasible solution")]
    MilpFailure,
    /// The scheduler exceeded its configured time budget.
    #[error("scheduler exceeded its time budget")]
    SchedulerTimeout,
    /// A required motion plan between two configurations does not exist.
    #[error("no motion plan exists for robot {robot:?} assigned to task {task:?}")]
    MotionPlanImpossible {
        /// The task that required the plan.
        task: TaskId,
        /// The robot that could not reach it.
        robot: RobotId,
    },
    /// The chosen precedence and mutex orientations induce a cycle.
    #[error("precedence and mutex orderings induce a cycle")]
    CycleDetected,
    /// No allocation of the full robot team can satisfy the trait demands.
    #[error("desired traits cannot be satisfied by any allocation of the team")]
    TraitsInfeasible,
    /// The overall search exceeded its wall-clock budget.
    #[error("search exceeded its time budget")]
    TimeoutFailure,
    /// A programmer-facing invariant was violated (bad input, not a search outcome).
    #[error("logic error: {0}")]
    LogicError(String),
}

/// Errors raised at the crate's outer boundaries: I/O, (de)serialization, and problem-inputs
/// validation. Distinct from [`FailureReason`], which describes in-search outcomes.
#[derive(Debug, Error)]
pub enum ItagsError {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse or serialize JSON.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The MILP solver's model was rejected before it could even be solved.
    #[error("MILP resolution error: {0}")]
    Resolution(#[from] good_lp::ResolutionError),
    /// Problem inputs failed validation.
    #[error("invalid problem inputs: {0}")]
    Validation(String),
    /// The search or scheduler returned a failure reason that the caller could not recover from.
    #[error(transparent)]
    Failure(#[from] FailureReason),
}
