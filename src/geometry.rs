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

//! Robot and task configurations (poses), and the environments robots move through.

use petgraph::graph::{NodeIndex, UnGraph};

/// A pose a robot or task can occupy. Variants correspond to the supported motion-planning
/// substrates; distance is only defined between two configurations of the same variant.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum Configuration {
    /// A vertex of a Euclidean graph environment.
    GraphVertex {
        /// Vertex index within the environment's graph.
        vertex: usize,
        /// Cartesian coordinates, used for admissible-heuristic distance estimates.
        x: f64,
        /// Cartesian coordinates, used for admissible-heuristic distance estimates.
        y: f64,
    },
    /// A planar pose (SE(2)).
    Se2 {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Heading, radians.
        yaw: f64,
    },
    /// A spatial pose (SE(3)), orientation as a unit quaternion (w, x, y, z).
    Se3 {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
        /// Z coordinate.
        z: f64,
        /// Orientation quaternion, (w, x, y, z).
        quaternion: [f64; 4],
    },
}

impl Configuration {
    /// Euclidean distance to another configuration of the *same* variant, ignoring orientation.
    /// Returns `None` for mismatched variants, since distance between e.g. a graph vertex and an
    /// SE(3) pose is not well defined without a shared embedding.
    pub fn distance(&self, other: &Configuration) -> Option<f64> {
        match (self, other) {
            (
                Configuration::GraphVertex { x: x1, y: y1, .. },
                Configuration::GraphVertex { x: x2, y: y2, .. },
            ) => Some(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()),
            (Configuration::Se2 { x: x1, y: y1, .. }, Configuration::Se2 { x: x2, y: y2, .. }) => {
                Some(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt())
            }
            (
                Configuration::Se3 {
                    x: x1, y: y1, z: z1, ..
                },
                Configuration::Se3 {
                    x: x2, y: y2, z: z2, ..
                },
            ) => Some(((x1 - x2).powi(2) + (y1 - y2).powi(2) + (z1 - z2).powi(2)).sqrt()),
            _ => None,
        }
    }

    /// The vertex index, if this is a [`Configuration::GraphVertex`].
    pub fn vertex(&self) -> Option<usize> {
        match self {
            Configuration::GraphVertex { vertex, .. } => Some(*vertex),
            _ => None,
        }
    }
}

/// An undirected Euclidean-graph environment: vertices carry a [`Configuration`], edges carry a
/// traversal length. A species' environment may instead be a vector of these (sampled graphs
/// sharing the vertex set but differing edge weights), used by the stochastic schedulers.
#[derive(Debug, Clone)]
pub struct GraphEnvironment {
    graph: UnGraph<Configuration, f64>,
}

impl GraphEnvironment {
    /// Build an environment from an explicit vertex list (index == [`Configuration::vertex`])
    /// and weighted edges.
    pub fn new(vertices: Vec<Configuration>, edges: Vec<(usize, usize, f64)>) -> Self {
        let mut graph = UnGraph::new_undirected();
        let indices: Vec<NodeIndex> = vertices.into_iter().map(|c| graph.add_node(c)).collect();
        for (a, b, w) in edges {
            graph.add_edge(indices[a], indices[b], w);
        }
        Self { graph }
    }

    /// Shortest-path length between two vertex indices, or `None` if unreachable.
    pub fn shortest_path(&self, from: usize, to: usize) -> Option<f64> {
        use petgraph::algo::dijkstra;
        let from_idx = NodeIndex::new(from);
        let to_idx = NodeIndex::new(to);
        let costs = dijkstra(&self.graph, from_idx, Some(to_idx), |e| *e.weight());
        costs.get(&to_idx).copied()
    }

    /// The configuration stored at a vertex index.
    pub fn configuration(&self, vertex: usize) -> Configuration {
        self.graph[NodeIndex::new(vertex)]
    }

    /// Number of vertices in the graph.
    pub fn num_vertices(&self) -> usize {
        self.graph.node_count()
    }
}
