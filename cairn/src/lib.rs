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

#![deny(missing_docs)]

//! # Cairn: Adaptive Greedy Routing in Vector Space
//!
//! This is a library for decentralized geometric routing: services are points in a
//! fixed-dimensional vector space, requests carry a target vector, and each hop is chosen
//! *locally* by combining semantic direction, trust, load and latency. There is no global
//! routing table, no central controller, and no global path search: a node only ever looks
//! at its own state and that of its direct neighbors.
//!
//! ## Structure
//!
//! - **[`geometry`]**: The vector kernel every other module builds on.
//!
//! - **[`net`]**: Nodes, the [`Network`](net::Network) arena, and the topology builder (KNN,
//!   Delaunay, hybrid) with local repair. The Delaunay mode is what buys the greedy-progress
//!   guarantee: every node that is not the globally closest to a target has a neighbor that
//!   is strictly closer.
//!
//! - **[`routing`]**: The routing plane. The
//!   [`RouteExecutor`](routing::RouteExecutor) drives one request hop by hop, consulting the
//!   termination oracle, the scored selector, and the fallback ladder (non-improving
//!   candidate, then face routing around local minima).
//!
//! - **[`trust`]**: Bounded trust updates from observed hop outcomes.
//!
//! - **[`monitor`]**: The background health monitor behind the
//!   [`HealthProbe`](monitor::HealthProbe) boundary.
//!
//! - **[`observe`]**: The in-memory observability sink (ring buffers + rollups).
//!
//! - **[`grouping`]**: Keyword classification of free-text requests into service sections.
//!
//! - **[`simulation`]**: The concurrent driver: worker threads, monitor, failure injection.
//!
//! - **[`example_networks`]**: Prepared networks for tests, demos and the CLI.
//!
//! ## Example
//!
//! ```rust
//! use cairn::geometry::Vector;
//! use cairn::net::{Network, Role};
//! use cairn::routing::{Request, RouteExecutor, RoutingConfig};
//!
//! fn main() -> Result<(), cairn::Error> {
//!     let mut net = Network::new(2);
//!     let a = net.add_node("A", Vector::new(vec![0.0, 0.0]), Role::from("default"), 20.0);
//!     let b = net.add_node("B", Vector::new(vec![0.5, 0.5]), Role::from("default"), 20.0);
//!     let c = net.add_node("C", Vector::new(vec![1.0, 1.0]), Role::from("default"), 20.0);
//!     net.add_link(a, b);
//!     net.add_link(b, c);
//!
//!     let config = RoutingConfig::default();
//!     let request = Request::new(Vector::new(vec![1.0, 1.0]));
//!     let result = RouteExecutor::new(&net, &config).route(a, &request)?;
//!
//!     assert!(result.success());
//!     assert!(result.total_hops >= 1);
//!     Ok(())
//! }
//! ```

pub mod geometry;
pub mod grouping;
pub mod monitor;
pub mod net;
pub mod observe;
pub mod printer;
pub mod routing;
pub mod simulation;
pub mod trust;

pub mod example_networks;
mod error;
mod test;

pub use error::Error;
pub use net::build_network;

use net::{NetError, Network, NodeId};
use routing::{Request, RouteExecutor, RouteResult, RoutingConfig};
use std::sync::{Arc, RwLock};

/// Route a single request with a one-off executor. This is the short form of constructing a
/// [`RouteExecutor`](routing::RouteExecutor); attach an observability sink or a recent-hop
/// window through the executor when you need them.
pub fn route(
    net: &Network,
    start: NodeId,
    request: &Request,
    config: &RoutingConfig,
) -> Result<RouteResult, NetError> {
    RouteExecutor::new(net, config).route(start, request)
}

/// Stopper, to check when to stop, or to send the stop command. Cloning hands the same flag
/// to another thread.
#[derive(Clone, Debug)]
pub struct Stopper {
    flag: Arc<RwLock<bool>>,
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopper {
    /// Create a new stopper
    pub fn new() -> Self {
        Self { flag: Arc::new(RwLock::new(false)) }
    }

    /// Send the stop command. This function will block until the write lock can be acquired.
    pub fn send_stop(&self) {
        *self.flag.write().unwrap() = true;
    }

    /// Checks if the stop flag is set. This function will block until the read lock can be
    /// acquired.
    pub fn is_stop(&self) -> bool {
        *self.flag.read().unwrap()
    }
}
