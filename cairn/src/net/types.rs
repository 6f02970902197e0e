// Cairn: Adaptive Greedy Routing in Vector Space
// Copyright (C) 2021  Tibor Schneider
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

//! Module containing all type definitions of the network layer.

use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use std::fmt;
use thiserror::Error;

pub(crate) type IndexType = u32;
/// Node identification (and index into the graph)
pub type NodeId = NodeIndex<IndexType>;
/// The neighbor graph. It is undirected, so edge symmetry holds by construction; failure of a
/// node never removes edges, it only blocks traversal.
pub type RoutingGraph = StableGraph<(), (), Undirected, IndexType>;

/// Semantic role of a node (its service section). Roles are drawn from an open set; the
/// well-known ones are listed in [`crate::grouping::SERVICE_ROLES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(String);

impl Role {
    /// Create a new role tag.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    /// The role tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network errors. These cover only programmer-class conditions (unknown ids and names) and
/// topology construction problems. Expected routing conditions never surface as errors; they
/// are reported on the route result itself.
#[derive(Debug, Error, PartialEq)]
pub enum NetError {
    /// Node was not found in the network
    #[error("Node was not found in the network: {0:?}")]
    NodeNotFound(NodeId),
    /// Node name was not found in the network
    #[error("Node name was not found in the network: {0}")]
    NodeNameNotFound(String),
    /// Topology construction error
    #[error("Topology Error: {0}")]
    Topology(#[from] TopologyError),
}

/// Errors raised while constructing the neighbor graph. A Delaunay error is recoverable: the
/// builder falls back to KNN and logs a warning.
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    /// The tessellation needs at least `D + 2` points
    #[error("Not enough points for a tessellation: got {have}, need at least {need}")]
    TooFewPoints {
        /// Number of points provided
        have: usize,
        /// Minimum number of points required
        need: usize,
    },
    /// The point configuration is degenerate (coincident or affinely dependent points)
    #[error("Degenerate point configuration: {0}")]
    Degenerate(&'static str),
}
