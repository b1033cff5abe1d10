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

//! Scenario selection for the heuristic-approximation stochastic scheduler: choose β of
//! Q_f sampled scenarios to solve against exactly, biased toward the slower ones.

use std::fmt;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::allocation::Allocation;
use crate::model::ProblemInputs;
use crate::motion_planner::SampledMotionPlanner;

/// Picks which of the `Q_f` sampled scenarios the heuristic-approximation scheduler solves
/// against. Implementations may fail to produce a mask (timeout, external model unavailable).
pub trait ScenarioSelector: fmt::Debug {
    /// Build a boolean mask of length `q_f` selecting `beta` scenarios, or `None` if no mask
    /// could be produced within `timeout`.
    fn create_mask(
        &self,
        motion_planners: &[SampledMotionPlanner],
        inputs: &ProblemInputs,
        allocation: &Allocation,
        q_f: usize,
        beta: usize,
        gamma: f64,
        timeout: Duration,
        seed: u64,
    ) -> Option<Vec<bool>>;
}

/// Labels each scenario by the coalition-weighted execution+transition cost, keeps the fastest
/// `(1 - gamma)` fraction, and samples `beta` of those uniformly, always keeping the slowest
/// scenario of that kept prefix (the `(1 - gamma)`-quantile boundary).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScenarioSelector;

impl HeuristicScenarioSelector {
    fn label(
        &self,
        scenario: usize,
        motion_planners: &[SampledMotionPlanner],
        inputs: &ProblemInputs,
        allocation: &Allocation,
    ) -> f64 {
        let mut total = 0.0_f64;
        for (m, task) in inputs.tasks.iter().enumerate() {
            total += task.static_duration;
            let coalition = allocation.coalition(m);
            // Label by the slowest assigned robot, since it bounds how long the coalition takes
            // to regroup at the task's terminal configuration.
            let slowest = coalition
                .iter()
                .map(|&r| {
                    let species = &inputs.species[inputs.robots[r].species.index()];
                    (species.motion_planner, species.speed)
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            let Some((planner_idx, speed)) = slowest else {
                continue;
            };
            if let Some(d) = motion_planners[planner_idx].duration(
                scenario,
                task.initial_configuration,
                task.terminal_configuration,
                speed,
            ) {
                total += d;
            }
        }
        total
    }
}

impl ScenarioSelector for HeuristicScenarioSelector {
    fn create_mask(
        &self,
        motion_planners: &[SampledMotionPlanner],
        inputs: &ProblemInputs,
        allocation: &Allocation,
        q_f: usize,
        beta: usize,
        gamma: f64,
        _timeout: Duration,
        seed: u64,
    ) -> Option<Vec<bool>> {
        if beta == 0 || beta > q_f {
            return None;
        }
        let mut labeled: Vec<(usize, f64)> = (0..q_f)
            .map(|s| (s, self.label(s, motion_planners, inputs, allocation)))
            .collect();
        labeled.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let num_h = ((q_f as f64) * (1.0 - gamma)).floor() as usize;
        let kept: Vec<usize> = labeled[..num_h.min(labeled.len())]
            .iter()
            .map(|&(idx, _)| idx)
            .collect();
        if kept.is_empty() {
            return None;
        }

        let boundary = *kept.last().unwrap();
        let mut rest: Vec<usize> = kept[..kept.len() - 1].to_vec();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        rest.shuffle(&mut rng);
        let take = beta.saturating_sub(1).min(rest.len());
        let mut selected: Vec<usize> = rest.into_iter().take(take).collect();
        selected.push(boundary);

        let mut mask = vec![false; q_f];
        for idx in selected {
            mask[idx] = true;
        }
        Some(mask)
    }
}

/// Delegates scenario selection to an external GNN model. The reference architecture binds this
/// to a Python/pybind11 runtime; that runtime is not reproduced here, so this selector always
/// reports the mask as unavailable, matching the selector contract's `None` outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct GnnScenarioSelector;

impl ScenarioSelector for GnnScenarioSelector {
    fn create_mask(
        &self,
        _motion_planners: &[SampledMotionPlanner],
        _inputs: &ProblemInputs,
        _allocation: &Allocation,
        _q_f: usize,
        _beta: usize,
        _gamma: f64,
        _timeout: Duration,
        _seed: u64,
    ) -> Option<Vec<bool>> {
        log::warn!("GNN scenario selector is not available in this build");
        None
    }
}
