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

//! Motion-planner memoization: cache transition and task-execution durations keyed by
//! (species, initial configuration, terminal configuration), plus a masked variant over a
//! vector of sampled graphs used by the stochastic schedulers.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::geometry::{Configuration, GraphEnvironment};
use crate::ids::SpeciesId;

/// Bit-for-bit equality key for a `(species, from, to)` query. `Configuration` carries `f64`s,
/// so equality here is intentionally exact: repeated queries with the same caller-constructed
/// configurations hit the cache, but the cache is not expected to coalesce near-duplicate poses.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueryKey {
    species: SpeciesId,
    from: Configuration,
    to: Configuration,
}

fn configuration_bits(c: &Configuration) -> u64 {
    // Hash on the bit pattern of the coordinates; exact-match semantics only, no tolerance.
    match c {
        Configuration::GraphVertex { vertex, .. } => *vertex as u64,
        Configuration::Se2 { x, y, yaw } => {
            x.to_bits() ^ y.to_bits().rotate_left(21) ^ yaw.to_bits().rotate_left(42)
        }
        Configuration::Se3 { x, y, z, .. } => {
            x.to_bits() ^ y.to_bits().rotate_left(21) ^ z.to_bits().rotate_left(42)
        }
    }
}

impl std::hash::Hash for QueryKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.species.hash(state);
        configuration_bits(&self.from).hash(state);
        configuration_bits(&self.to).hash(state);
    }
}

impl Eq for QueryKey {}

/// A single-environment motion planner over a [`GraphEnvironment`], with memoized durations.
///
/// Failed queries (no path between the two configurations) increment [`Self::num_failures`] but
/// are deliberately *not* cached, so a later call -- after the environment changes, or simply to
/// retry -- is not permanently poisoned by one failure.
#[derive(Debug)]
pub struct MotionPlanner {
    environment: GraphEnvironment,
    species: SpeciesId,
    cache: Mutex<HashMap<QueryKey, f64>>,
    failures: Mutex<usize>,
}

impl MotionPlanner {
    /// Build a planner over `environment` serving robots of `species`.
    pub fn new(species: SpeciesId, environment: GraphEnvironment) -> Self {
        Self {
            environment,
            species,
            cache: Mutex::new(HashMap::new()),
            failures: Mutex::new(0),
        }
    }

    /// Duration (path length / speed) to travel from `from` to `to`, or `None` if unreachable.
    pub fn duration(&self, from: Configuration, to: Configuration, speed: f64) -> Option<f64> {
        let key = QueryKey {
            species: self.species,
            from,
            to,
        };
        if let Some(&cached) = self.cache.lock().unwrap().get(&key) {
            return Some(cached / speed);
        }
        let (Some(fv), Some(tv)) = (from.vertex(), to.vertex()) else {
            *self.failures.lock().unwrap() += 1;
            return None;
        };
        match self.environment.shortest_path(fv, tv) {
            Some(length) => {
                self.cache.lock().unwrap().insert(key, length);
                Some(length / speed)
            }
            None => {
                *self.failures.lock().unwrap() += 1;
                None
            }
        }
    }

    /// Number of queries that found no path, across the planner's lifetime.
    pub fn num_failures(&self) -> usize {
        *self.failures.lock().unwrap()
    }

    /// Drop the memoization cache, releasing any references it held.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

/// A motion planner backed by several sampled graph environments sharing the same vertex set but
/// differing edge weights, used by the stochastic schedulers. Each sampled environment gets its
/// own independent memoization cache.
#[derive(Debug)]
pub struct SampledMotionPlanner {
    species: SpeciesId,
    scenarios: Vec<GraphEnvironment>,
    caches: Vec<Mutex<HashMap<QueryKey, f64>>>,
}

impl SampledMotionPlanner {
    /// Build a sampled planner from one environment per scenario.
    pub fn new(species: SpeciesId, scenarios: Vec<GraphEnvironment>) -> Self {
        let caches = scenarios.iter().map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            species,
            scenarios,
            caches,
        }
    }

    /// Number of sampled scenarios, Q_f.
    pub fn num_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    /// Duration under scenario `scenario_index`.
    pub fn duration(
        &self,
        scenario_index: usize,
        from: Configuration,
        to: Configuration,
        speed: f64,
    ) -> Option<f64> {
        let key = QueryKey {
            species: self.species,
            from,
            to,
        };
        let cache = &self.caches[scenario_index];
        if let Some(&cached) = cache.lock().unwrap().get(&key) {
            return Some(cached / speed);
        }
        let (fv, tv) = (from.vertex()?, to.vertex()?);
        let length = self.scenarios[scenario_index].shortest_path(fv, tv)?;
        cache.lock().unwrap().insert(key, length);
        Some(length / speed)
    }

    /// Wrap `self` behind a boolean mask selecting a sub-set of scenarios, as used by the
    /// heuristic-approximation scheduler: index `i` in the masked view addresses the
    /// `i`-th `true` entry of `mask`.
    pub fn masked<'a>(&'a self, mask: &'a [bool]) -> MaskedMotionPlanner<'a> {
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        MaskedMotionPlanner {
            inner: self,
            selected,
        }
    }
}

/// A masked view over a [`SampledMotionPlanner`]'s scenarios, indexing only the scenarios the
/// current mask selected.
#[derive(Debug)]
pub struct MaskedMotionPlanner<'a> {
    inner: &'a SampledMotionPlanner,
    selected: Vec<usize>,
}

impl<'a> MaskedMotionPlanner<'a> {
    /// Number of scenarios visible through the mask, β.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether the mask selects no scenarios.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Duration under the `index`-th selected scenario.
    pub fn duration(
        &self,
        index: usize,
        from: Configuration,
        to: Configuration,
        speed: f64,
    ) -> Option<f64> {
        let real_index = self.selected[index];
        self.inner.duration(real_index, from, to, speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_environment() -> GraphEnvironment {
        GraphEnvironment::new(
            vec![
                Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 },
                Configuration::GraphVertex { vertex: 1, x: 1.0, y: 0.0 },
                Configuration::GraphVertex { vertex: 2, x: 2.0, y: 0.0 },
            ],
            vec![(0, 1, 1.0), (1, 2, 1.0)],
        )
    }

    #[test]
    fn duration_is_cached_and_consistent() {
        let planner = MotionPlanner::new(SpeciesId::from_index(0), line_environment());
        let from = Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 };
        let to = Configuration::GraphVertex { vertex: 2, x: 2.0, y: 0.0 };
        let first = planner.duration(from, to, 2.0).unwrap();
        let second = planner.duration(from, to, 2.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 1.0);
    }

    #[test]
    fn unreachable_vertex_is_not_cached_and_counts_as_failure() {
        let env = GraphEnvironment::new(
            vec![
                Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 },
                Configuration::GraphVertex { vertex: 1, x: 1.0, y: 0.0 },
            ],
            vec![],
        );
        let planner = MotionPlanner::new(SpeciesId::from_index(0), env);
        let from = Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 };
        let to = Configuration::GraphVertex { vertex: 1, x: 1.0, y: 0.0 };
        assert!(planner.duration(from, to, 1.0).is_none());
        assert_eq!(planner.num_failures(), 1);
    }

    #[test]
    fn masked_planner_reindexes_selected_scenarios() {
        let planner = SampledMotionPlanner::new(
            SpeciesId::from_index(0),
            vec![line_environment(), line_environment(), line_environment()],
        );
        let mask = vec![false, true, true];
        let masked = planner.masked(&mask);
        assert_eq!(masked.len(), 2);
        let from = Configuration::GraphVertex { vertex: 0, x: 0.0, y: 0.0 };
        let to = Configuration::GraphVertex { vertex: 2, x: 2.0, y: 0.0 };
        assert_eq!(masked.duration(0, from, to, 1.0), Some(2.0));
    }
}
