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

//! # The network layer
//!
//! Nodes in vector space plus the undirected neighbor graph between them, with construction,
//! local repair and the structural checks routing relies on. There is deliberately no global
//! state in here beyond the arena itself: every query a route executor makes is answered from
//! one node and its direct neighborhood.

pub(crate) mod delaunay;
pub mod network;
pub mod node;
pub mod topology;
pub(crate) mod types;

pub use network::{Network, NodeMetrics};
pub use node::{Node, NodeSnapshot};
pub use topology::{
    build_network, greedy_guarantee_check, GuaranteeReport, TopologyMode, TopologyReport,
    DEFAULT_CAPACITY,
};
pub use types::{NetError, NodeId, Role, RoutingGraph, TopologyError};
