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

//! Process-unique identifiers for robots, tasks and search nodes.
//!
//! Each id class is backed by an atomic counter plus a live-population counter; the sequence
//! resets to zero once the population returns to zero, rather than growing monotonically for
//! the lifetime of the process. Population tracking is driven by [`IdHandle`]'s `Drop` impl, so
//! callers that hold onto an id past the lifetime of the value it names should clone the `usize`
//! out rather than keep the handle alive.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter state for one id class.
struct IdClass {
    next: AtomicUsize,
    population: AtomicUsize,
}

impl IdClass {
    const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            population: AtomicUsize::new(0),
        }
    }

    fn alloc(&self) -> usize {
        self.population.fetch_add(1, Ordering::SeqCst);
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    fn release(&self) {
        if self.population.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.next.store(0, Ordering::SeqCst);
        }
    }
}

macro_rules! id_class {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(usize);

        impl $name {
            /// The raw index, usable to index into a `Vec` of the corresponding entities.
            pub fn index(self) -> usize {
                self.0
            }

            /// Construct an id directly from an index, bypassing the counter. Used when loading
            /// problem inputs whose ids are already fixed by array position.
            pub fn from_index(index: usize) -> Self {
                Self(index)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_class!(RobotId, "Identifies a robot within a single problem instance.");
id_class!(TaskId, "Identifies a plan task within a single problem instance.");
id_class!(SpeciesId, "Identifies a robot species within a single problem instance.");
id_class!(
    SearchNodeId,
    "Identifies a node within a single ITAGS search; resets between independent searches."
);

static NODE_IDS: IdClass = IdClass::new();

/// An [`SearchNodeId`] paired with population tracking: dropping the handle returns the id to the
/// pool, resetting the counter to zero once no handle remains live.
#[derive(Debug)]
pub struct NodeIdHandle(SearchNodeId);

impl NodeIdHandle {
    /// Allocate a fresh node id.
    pub fn alloc() -> Self {
        Self(SearchNodeId(NODE_IDS.alloc()))
    }

    /// The id carried by this handle.
    pub fn id(&self) -> SearchNodeId {
        self.0
    }
}

impl Drop for NodeIdHandle {
    fn drop(&mut self) {
        NODE_IDS.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_after_population_drains() {
        let a = NodeIdHandle::alloc();
        let first = a.id().index();
        drop(a);
        let b = NodeIdHandle::alloc();
        assert_eq!(b.id().index(), first);
    }
}
