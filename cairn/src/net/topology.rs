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

//! Neighbor graph construction and maintenance.
//!
//! Three modes build the edge set: `Knn` (each node mirrors edges to its k nearest others),
//! `Delaunay` (every pair inside any simplex of the tessellation), and `Hybrid` (the union of
//! both). Delaunay is the one carrying the greedy-progress guarantee: every node that is not
//! the closest to a target has a neighbor strictly closer. When the tessellation prerequisites
//! fail (too few points, degenerate configuration), construction falls back to KNN and logs a
//! warning.
//!
//! Mutations after construction are local: `insert_node` attaches to the nearest alive nodes,
//! `remove_node` only flips the liveness flag, and `heal_around` reconnects the surviving
//! neighborhood of a failed node without a global rebuild.

use crate::geometry::Vector;
use crate::net::delaunay::delaunay_edges;
use crate::net::network::Network;
use crate::net::types::{NetError, NodeId, Role, RoutingGraph, TopologyError};
use itertools::Itertools;
use log::*;
use rand::prelude::*;
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Default capacity assigned to nodes created by the batch constructors.
pub const DEFAULT_CAPACITY: f64 = 20.0;

/// How the neighbor graph is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    /// Connect every node to its k nearest others (mirrored).
    Knn,
    /// Edges of the Delaunay tessellation; carries the greedy-progress guarantee.
    Delaunay,
    /// Union of Delaunay and KNN edges.
    Hybrid,
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Knn => f.write_str("knn"),
            Self::Delaunay => f.write_str("delaunay"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

impl FromStr for TopologyMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "knn" => Ok(Self::Knn),
            "delaunay" => Ok(Self::Delaunay),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown topology mode: {}", other)),
        }
    }
}

/// Build a network from explicit positions and roles. Node `i` is named `N{i:03}` and gets the
/// default capacity. The actual mode may differ from the requested one when the Delaunay
/// prerequisites fail (query it with [`Network::mode`]).
pub fn build_network(
    positions: Vec<Vector>,
    roles: Vec<Role>,
    mode: TopologyMode,
    k: usize,
) -> Network {
    assert!(!positions.is_empty(), "cannot build a network without nodes");
    assert_eq!(positions.len(), roles.len(), "one role per position required");
    let mut net = Network::new(positions[0].dim());
    for (i, (position, role)) in positions.into_iter().zip(roles.into_iter()).enumerate() {
        net.add_node(format!("N{:03}", i), position, role, DEFAULT_CAPACITY);
    }
    let actual = net.connect(mode, k);
    net.set_mode(actual);
    debug!("{}", net.summary());
    net
}

impl Network {
    /// Generate a network of `n` nodes with uniformly random positions in `[-1, 1]^d`, all
    /// carrying the `default` role.
    pub fn generate(n: usize, dimensions: usize, seed: u64, mode: TopologyMode, k: usize) -> Self {
        Self::generate_with_roles(n, dimensions, seed, mode, k, &[Role::from("default")])
    }

    /// Generate a seeded random network, assigning roles round-robin from the given list.
    pub fn generate_with_roles(
        n: usize,
        dimensions: usize,
        seed: u64,
        mode: TopologyMode,
        k: usize,
        roles: &[Role],
    ) -> Self {
        assert!(n > 0, "cannot generate an empty network");
        assert!(!roles.is_empty(), "at least one role required");
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = Vec::with_capacity(n);
        let mut assigned = Vec::with_capacity(n);
        for i in 0..n {
            let coords: Vec<f64> = (0..dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect();
            positions.push(Vector::new(coords));
            assigned.push(roles[i % roles.len()].clone());
        }
        let net = build_network(positions, assigned, mode, k);
        info!(
            "Generated network: {} nodes, {} edges, mode {} (requested {})",
            net.num_nodes(),
            net.num_edges(),
            net.mode(),
            mode
        );
        net
    }

    /// Construct the edge set for the requested mode over the currently alive nodes, and
    /// return the mode actually used (KNN when the tessellation fails).
    pub(crate) fn connect(&mut self, mode: TopologyMode, k: usize) -> TopologyMode {
        match mode {
            TopologyMode::Knn => {
                self.connect_knn(k);
                TopologyMode::Knn
            }
            TopologyMode::Delaunay => match self.connect_delaunay() {
                Ok(()) => TopologyMode::Delaunay,
                Err(e) => {
                    warn!("Delaunay tessellation failed ({}); falling back to KNN", e);
                    self.connect_knn(k);
                    TopologyMode::Knn
                }
            },
            TopologyMode::Hybrid => match self.connect_delaunay() {
                Ok(()) => {
                    self.connect_knn(k);
                    TopologyMode::Hybrid
                }
                Err(e) => {
                    warn!("Delaunay tessellation failed ({}); hybrid degrades to KNN", e);
                    self.connect_knn(k);
                    TopologyMode::Knn
                }
            },
        }
    }

    /// Mirror an edge from every alive node to its k nearest alive others.
    fn connect_knn(&mut self, k: usize) {
        let ids = self.alive_ids();
        for &id in &ids {
            let here = self.get(id).unwrap().position().clone();
            let nearest: Vec<NodeId> = ids
                .iter()
                .filter(|&&other| other != id)
                .map(|&other| (self.get(other).unwrap().position().distance(&here), other))
                .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .take(k)
                .map(|(_, other)| other)
                .collect();
            for other in nearest {
                self.add_link(id, other);
            }
        }
    }

    /// Add every edge of the Delaunay tessellation over the alive nodes.
    fn connect_delaunay(&mut self) -> Result<(), TopologyError> {
        let ids = self.alive_ids();
        let positions: Vec<Vector> =
            ids.iter().map(|id| self.get(*id).unwrap().position().clone()).collect();
        let edges = delaunay_edges(&positions)?;
        for (a, b) in edges {
            self.add_link(ids[a], ids[b]);
        }
        Ok(())
    }

    /// Insert a new node into an existing network, attaching it to its `k` nearest alive
    /// nodes (edges mirrored).
    pub fn insert_node<S: Into<String>>(
        &mut self,
        name: S,
        position: Vector,
        role: Role,
        capacity: f64,
        k: usize,
    ) -> NodeId {
        let id = self.add_node(name, position, role, capacity);
        let here = self.get(id).unwrap().position().clone();
        let nearest: Vec<NodeId> = self
            .alive_ids()
            .into_iter()
            .filter(|&other| other != id)
            .map(|other| (self.get(other).unwrap().position().distance(&here), other))
            .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .take(k)
            .map(|(_, other)| other)
            .collect();
        let attached = nearest.len();
        for other in nearest {
            self.add_link(id, other);
        }
        info!("Inserted node {} with {} links", self.get(id).unwrap().name(), attached);
        id
    }

    /// Remove a node from routing. The node is only marked dead; its entry and its edges stay
    /// in place so that a later [`Network::recover`] restores the old neighborhood.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), NetError> {
        self.fail(id)
    }

    /// Repair the neighborhood of a failed node: every alive neighbor of the failed node gets
    /// edges to up to `k` of the nearest other alive neighbors of the failed node it was not
    /// yet connected to. Returns the number of edges created.
    pub fn heal_around(&mut self, failed: NodeId, k: usize) -> Result<usize, NetError> {
        let survivors: Vec<NodeId> = {
            let _ = self.get(failed)?;
            self.neighbors(failed)
                .into_iter()
                .filter(|n| self.get(*n).map(|node| node.is_alive()).unwrap_or(false))
                .collect()
        };
        let mut new_edges = 0;
        for &node in &survivors {
            let here = self.get(node).unwrap().position().clone();
            let candidates: Vec<NodeId> = survivors
                .iter()
                .filter(|&&other| other != node && !self.connected(node, other))
                .map(|&other| (self.get(other).unwrap().position().distance(&here), other))
                .sorted_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .take(k)
                .map(|(_, other)| other)
                .collect();
            for other in candidates {
                self.add_link(node, other);
                new_edges += 1;
            }
        }
        if new_edges > 0 {
            info!(
                "Healed around {}: {} new edges between {} survivors",
                self.node_name(failed)?,
                new_edges,
                survivors.len()
            );
        }
        Ok(new_edges)
    }

    /// Throw away the entire edge set and reconstruct it from scratch over the currently
    /// alive nodes. Returns the mode actually used.
    pub fn rebuild(&mut self, mode: TopologyMode, k: usize) -> TopologyMode {
        let ids = self.node_ids();
        let mut fresh = RoutingGraph::with_capacity(ids.len(), 0);
        for id in &ids {
            let new_id = fresh.add_node(());
            // the network never deletes graph nodes, so indices are dense and stable
            assert_eq!(new_id, *id, "node ids must survive a rebuild");
        }
        *self.graph_mut() = fresh;
        let actual = self.connect(mode, k);
        self.set_mode(actual);
        info!("Rebuilt topology: mode {}, {} edges", actual, self.num_edges());
        actual
    }

    /// Check the structural invariants of the alive subgraph and return a report.
    pub fn validate(&self) -> TopologyReport {
        let alive = self.alive_ids();
        let isolated: Vec<NodeId> =
            alive.iter().copied().filter(|id| self.alive_neighbors(*id).is_empty()).collect();

        // connectivity over the alive subgraph, by flooding from the first alive node
        let connected = match alive.first() {
            None => true,
            Some(&first) => {
                let mut seen: HashSet<NodeId> = HashSet::new();
                let mut queue: VecDeque<NodeId> = VecDeque::new();
                seen.insert(first);
                queue.push_back(first);
                while let Some(id) = queue.pop_front() {
                    for n in self.alive_neighbors(id) {
                        if seen.insert(n) {
                            queue.push_back(n);
                        }
                    }
                }
                seen.len() == alive.len()
            }
        };

        let degrees: Vec<usize> = alive.iter().map(|id| self.alive_neighbors(*id).len()).collect();
        let (min_degree, max_degree) =
            degrees.iter().copied().minmax().into_option().unwrap_or((0, 0));
        let avg_degree = if degrees.is_empty() {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
        };

        TopologyReport {
            alive_nodes: alive.len(),
            num_edges: self.num_edges(),
            connected,
            isolated,
            min_degree,
            max_degree,
            avg_degree,
        }
    }
}

/// Structural health of the alive subgraph.
#[derive(Debug, Clone)]
pub struct TopologyReport {
    /// Number of alive nodes considered
    pub alive_nodes: usize,
    /// Total number of undirected edges in the network
    pub num_edges: usize,
    /// Whether the alive subgraph is connected
    pub connected: bool,
    /// Alive nodes without any alive neighbor
    pub isolated: Vec<NodeId>,
    /// Smallest alive degree
    pub min_degree: usize,
    /// Largest alive degree
    pub max_degree: usize,
    /// Average alive degree
    pub avg_degree: f64,
}

/// Result of the greedy-guarantee check for one target.
#[derive(Debug, Clone)]
pub struct GuaranteeReport {
    /// Number of alive non-closest nodes that were checked
    pub total_checked: usize,
    /// Nodes with a strictly closer alive node somewhere, but no strictly closer alive
    /// neighbor: these are the local minima that would trap greedy routing
    pub violations: Vec<NodeId>,
}

impl GuaranteeReport {
    /// Whether the guarantee holds for this target.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Verify the greedy-progress guarantee for one target: every alive node that is not the
/// globally closest must have an alive neighbor strictly closer to the target. On a correct
/// Delaunay graph this holds for every target; on KNN or damaged graphs violations mark the
/// spots where greedy routing needs the face-routing fallback.
pub fn greedy_guarantee_check(net: &Network, target: &Vector) -> GuaranteeReport {
    let alive = net.alive_ids();
    let mut total_checked = 0;
    let mut violations = Vec::new();

    for &id in &alive {
        let dist = net.get(id).unwrap().position().distance(target);
        let any_closer = alive.iter().any(|&other| {
            other != id && net.get(other).unwrap().position().distance(target) < dist
        });
        if !any_closer {
            // globally closest (or tied for it), nothing to guarantee
            continue;
        }
        total_checked += 1;
        let neighbor_closer = net
            .alive_neighbors(id)
            .into_iter()
            .any(|n| net.get(n).unwrap().position().distance(target) < dist);
        if !neighbor_closer {
            violations.push(id);
        }
    }

    if !violations.is_empty() {
        warn!(
            "Greedy guarantee violated for target {}: {} of {} nodes have no closer neighbor",
            target,
            violations.len(),
            total_checked
        );
    }
    GuaranteeReport { total_checked, violations }
}
