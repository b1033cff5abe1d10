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

//! Wald's Sequential Probability Ratio Test, used by the heuristic-approximation stochastic
//! scheduler to decide whether a candidate makespan is robust against the held-out scenarios.

use log::{info, warn};

/// A Sequential Probability Ratio Test between `H0: exceedance probability <= p0` and
/// `H1: exceedance probability >= p1`.
#[derive(Debug, Clone, Copy)]
pub struct SequentialProbabilityRatioTest {
    second_term: f64,
    acceptance_first_term: f64,
    rejection_first_term: f64,
    min_samples_acceptance: u32,
    min_samples_rejection: u32,
}

impl SequentialProbabilityRatioTest {
    /// Build a test over the indifference region `[p0, p1]` with the given type-I/II error
    /// rates. `p0 < p1` must hold.
    pub fn new(p0: f64, p1: f64, type1_error: f64, type2_error: f64) -> Self {
        let denominator = (p1 / p0).ln() - ((1.0 - p1) / (1.0 - p0)).ln();
        let second_term = ((1.0 - p0) / (1.0 - p1)).ln() / denominator;
        let acceptance_first_term = (type2_error / (1.0 - type1_error)).ln() / denominator;
        let rejection_first_term = ((1.0 - type2_error) / type1_error).ln() / denominator;
        let min_samples_acceptance = (-acceptance_first_term / second_term).ceil().max(0.0) as u32;
        let min_samples_rejection =
            (rejection_first_term / (1.0 - second_term)).ceil().max(0.0) as u32;
        Self {
            second_term,
            acceptance_first_term,
            rejection_first_term,
            min_samples_acceptance,
            min_samples_rejection,
        }
    }

    /// Build with the reference implementation's default 5% type-I/II error rates.
    pub fn with_defaults(p0: f64, p1: f64) -> Self {
        Self::new(p0, p1, 0.05, 0.05)
    }

    fn acceptance_number(&self, inspected_samples: f64) -> f64 {
        self.acceptance_first_term + inspected_samples * self.second_term
    }

    fn rejection_number(&self, inspected_samples: f64) -> f64 {
        self.rejection_first_term + inspected_samples * self.second_term
    }

    /// Run the test against `samples` (makespans observed under held-out scenarios), comparing
    /// each to `reference_value`. Returns `true` if the test accepts `H0` within
    /// `max_num_samples`; `false` if it rejects, or runs out of samples without deciding.
    pub fn run(
        &self,
        reference_value: f64,
        max_num_samples: u32,
        samples: impl IntoIterator<Item = f64>,
    ) -> bool {
        if max_num_samples < self.min_samples_acceptance && max_num_samples < self.min_samples_rejection {
            warn!(
                "SPRT sample pool ({max_num_samples}) is smaller than both the minimum for \
                 acceptance ({}) and for rejection ({})",
                self.min_samples_acceptance, self.min_samples_rejection
            );
            return false;
        }

        let mut bad_samples = 0.0_f64;
        let mut inspected = 0.0_f64;
        let max_samples_acceptance_number = self.acceptance_number(max_num_samples as f64);

        for value in samples {
            if value > reference_value {
                bad_samples += 1.0;
            }
            inspected += 1.0;

            if inspected < self.min_samples_acceptance as f64 && inspected < self.min_samples_rejection as f64 {
                continue;
            }

            if bad_samples >= self.rejection_number(inspected) || bad_samples >= max_samples_acceptance_number {
                warn!("SPRT rejected after {inspected} samples ({bad_samples} bad)");
                return false;
            }

            if bad_samples <= self.acceptance_number(inspected) {
                info!("SPRT accepted after {inspected} samples");
                return true;
            }
        }

        warn!("SPRT ran out of samples without a decision");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_when_no_sample_exceeds_reference() {
        let sprt = SequentialProbabilityRatioTest::with_defaults(0.05, 0.15);
        let samples = vec![1.0; 200];
        assert!(sprt.run(2.0, 200, samples));
    }

    #[test]
    fn rejects_when_every_sample_exceeds_reference() {
        let sprt = SequentialProbabilityRatioTest::with_defaults(0.05, 0.15);
        let samples = vec![3.0; 200];
        assert!(!sprt.run(2.0, 200, samples));
    }

    #[test]
    fn empty_pool_returns_false() {
        let sprt = SequentialProbabilityRatioTest::with_defaults(0.05, 0.15);
        assert!(!sprt.run(2.0, 0, Vec::new()));
    }
}
