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

//! Process-wide named timer registry.
//!
//! Mirrors the way the rest of the crate keeps process-wide state behind a [`lazy_static`]: a
//! single [`Mutex`]-protected map from timer name to accumulated [`Duration`], with a scope guard
//! that starts a timer on construction and folds its elapsed time into the registry on [`Drop`] --
//! including on an early return or a panic unwinding through the guarded block.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

lazy_static! {
    static ref TIME_KEEPER: Mutex<HashMap<String, Duration>> = Mutex::new(HashMap::new());
}

/// Read the accumulated duration for a named timer, or [`Duration::ZERO`] if it was never
/// started.
pub fn elapsed(name: &str) -> Duration {
    TIME_KEEPER
        .lock()
        .unwrap()
        .get(name)
        .copied()
        .unwrap_or_default()
}

/// Reset every named timer. Intended for test isolation between scenarios.
pub fn reset_all() {
    TIME_KEEPER.lock().unwrap().clear();
}

/// RAII guard that accumulates wall-clock time into the named-timer registry for as long as it
/// is alive.
#[must_use = "TimerRunner stops timing when dropped; bind it to a variable"]
#[derive(Debug)]
pub struct TimerRunner {
    name: String,
    start: Instant,
}

impl TimerRunner {
    /// Start timing under `name`. Multiple concurrently-live guards with the same name
    /// accumulate independently; their elapsed times are summed into the registry.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for TimerRunner {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mut guard = TIME_KEEPER.lock().unwrap();
        *guard.entry(std::mem::take(&mut self.name)).or_default() += elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_guards() {
        reset_all();
        {
            let _t = TimerRunner::start("search");
        }
        {
            let _t = TimerRunner::start("search");
        }
        assert!(elapsed("search") >= Duration::ZERO);
        assert_eq!(elapsed("unused"), Duration::ZERO);
    }

    #[test]
    fn releases_on_early_return() {
        reset_all();
        fn guarded() -> bool {
            let _t = TimerRunner::start("guarded");
            return true;
        }
        guarded();
        assert!(elapsed("guarded") >= Duration::ZERO);
    }
}
