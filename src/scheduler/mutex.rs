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

//! Mutex indicator registry: one decision variable per task pair that shares a robot and is not
//! already precedence-ordered. Binary in the master problem; continuous `[0,1]` in LP-relaxed
//! sub-problems (used by the stochastic schedulers' per-scenario re-solves).

use std::collections::HashMap;

use good_lp::{variable, ProblemVariables, Solution, Variable};

/// Registers and resolves the mutex-ordering decision variables for one allocation's mutex set.
#[derive(Debug)]
pub struct MutexIndicatorRegistry {
    variables: HashMap<(usize, usize), Variable>,
}

impl MutexIndicatorRegistry {
    /// Create one variable per pair in `mutex_pairs` (already filtered to exclude
    /// precedence-ordered pairs by [`crate::allocation::Allocation::mutex_set`]). `master`
    /// selects binary (true, the master/outer problem) or continuous `[0,1]` (false, an LP
    /// relaxation or per-scenario sub-problem) variables.
    pub fn new(
        problem: &mut ProblemVariables,
        mutex_pairs: impl IntoIterator<Item = (usize, usize)>,
        master: bool,
    ) -> Self {
        let variables = mutex_pairs
            .into_iter()
            .map(|(i, j)| {
                debug_assert!(i < j, "mutex pairs must be normalized (i < j)");
                let v = if master {
                    problem.add(variable().binary())
                } else {
                    problem.add(variable().min(0).max(1))
                };
                ((i, j), v)
            })
            .collect();
        Self { variables }
    }

    /// The decision variable for the (normalized) pair `(i, j)`. `x == 1` means `i` precedes `j`.
    ///
    /// # Panics
    /// Panics if `(min(i,j), max(i,j))` was not registered -- mirroring the reference
    /// implementation, which throws when asked for a pair it does not track.
    pub fn get(&self, i: usize, j: usize) -> Variable {
        let key = (i.min(j), i.max(j));
        *self
            .variables
            .get(&key)
            .unwrap_or_else(|| panic!("no mutex indicator registered for pair {key:?}"))
    }

    /// Every registered pair, normalized `(i, j)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.variables.keys().copied()
    }

    /// After solving, derive the chosen ordering: `(i, j)` if the indicator is `>= 0.5`, else
    /// `(j, i)`.
    pub fn precedence_set(&self, solution: &impl Solution) -> Vec<(usize, usize)> {
        self.variables
            .iter()
            .map(|(&(i, j), &v)| {
                if solution.value(v) >= 0.5 {
                    (i, j)
                } else {
                    (j, i)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn get_panics_on_unregistered_pair() {
        let mut p = ProblemVariables::new();
        let registry = MutexIndicatorRegistry::new(&mut p, [(0, 1)], true);
        registry.get(2, 3);
    }

    #[test]
    fn get_normalizes_pair_order() {
        let mut p = ProblemVariables::new();
        let registry = MutexIndicatorRegistry::new(&mut p, [(0, 1)], true);
        assert_eq!(registry.get(0, 1), registry.get(1, 0));
    }
}
