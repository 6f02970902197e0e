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

//! # Top-level Network module
//!
//! The network owns the node arena and the undirected neighbor graph. There is no global
//! routing table in here; the graph only answers local adjacency queries, and everything a
//! route executor reads per hop comes from one node and its direct neighbors.
//!
//! ## Concurrency
//!
//! All per-node dynamics (`load`, `trust`, `latency`, `alive`, cache) go through atomic fields
//! on [`Node`], so the administrative operations on this type take `&self` and can run while
//! routes execute. Structural mutations (building, inserting, healing, rebuilding; see the
//! topology module) take `&mut self` and therefore serialize against all other access when the
//! network is shared behind an `RwLock`.

use crate::geometry::Vector;
use crate::net::node::Node;
use crate::net::topology::TopologyMode;
use crate::net::types::{NetError, NodeId, Role, RoutingGraph};
use log::*;
use std::collections::HashMap;

/// Externally visible metrics of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetrics {
    /// Node name
    pub name: String,
    /// Semantic role
    pub role: Role,
    /// Current workload counter
    pub load: f64,
    /// Capacity
    pub capacity: f64,
    /// Current trust score
    pub trust: f64,
    /// Current latency estimate
    pub latency_ms: f64,
    /// Liveness flag
    pub alive: bool,
    /// Number of neighbors, dead or alive
    pub neighbors: usize,
}

/// # Network struct
///
/// A collection of nodes in vector space, plus the undirected neighbor graph between them.
/// Nodes are created by topology construction and never deleted; failure and recovery only
/// toggle the `alive` flag, and a failed node keeps its edges (traversal is blocked by the
/// liveness filter instead).
#[derive(Debug)]
pub struct Network {
    graph: RoutingGraph,
    nodes: HashMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    dimensions: usize,
    mode: TopologyMode,
}

impl Network {
    /// Generate an empty network for positions of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            graph: RoutingGraph::with_capacity(0, 0),
            nodes: HashMap::new(),
            names: HashMap::new(),
            dimensions,
            mode: TopologyMode::Knn,
        }
    }

    /// Dimension of the vector space all nodes live in.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The topology mode the current edge set was built with.
    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: TopologyMode) {
        self.mode = mode;
    }

    /// Add a new node to the network and return its id. The name must be unique within the
    /// network, and the position must match the network dimension (a mismatch is a programmer
    /// error).
    pub fn add_node<S: Into<String>>(
        &mut self,
        name: S,
        position: Vector,
        role: Role,
        capacity: f64,
    ) -> NodeId {
        let name = name.into();
        assert_eq!(
            position.dim(),
            self.dimensions,
            "Node position dimension mismatch: {} vs {}",
            position.dim(),
            self.dimensions
        );
        assert!(!self.names.contains_key(&name), "Duplicate node name: {}", name);
        let id = self.graph.add_node(());
        let node = Node::new(name.clone(), id, position, role, capacity);
        self.nodes.insert(id, node);
        self.names.insert(name, id);
        id
    }

    /// Create an undirected link between two nodes. Self-loops and duplicate edges are
    /// silently ignored.
    pub fn add_link(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    pub(crate) fn graph(&self) -> &RoutingGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut RoutingGraph {
        &mut self.graph
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Result<&Node, NetError> {
        self.nodes.get(&id).ok_or(NetError::NodeNotFound(id))
    }

    /// Get a node by name.
    pub fn get_by_name(&self, name: &str) -> Result<&Node, NetError> {
        self.get(self.node_id(name)?)
    }

    /// Resolve a node name to its id.
    pub fn node_id(&self, name: &str) -> Result<NodeId, NetError> {
        self.names.get(name).copied().ok_or_else(|| NetError::NodeNameNotFound(name.to_string()))
    }

    /// Get the name of a node.
    pub fn node_name(&self, id: NodeId) -> Result<&str, NetError> {
        self.get(id).map(|n| n.name())
    }

    /// All node ids, sorted by index so that iteration order is deterministic.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Iterator over all nodes (arbitrary order).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes in the network.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges in the network.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// All neighbors of a node, dead or alive.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.neighbors(id).collect()
    }

    /// Neighbors of a node that are currently alive. This is the candidate set every routing
    /// decision starts from.
    pub fn alive_neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph
            .neighbors(id)
            .filter(|n| self.nodes.get(n).map(|node| node.is_alive()).unwrap_or(false))
            .collect()
    }

    /// Whether two nodes are directly connected.
    pub fn connected(&self, a: NodeId, b: NodeId) -> bool {
        self.graph.find_edge(a, b).is_some()
    }

    /// Find the alive node whose position is closest to the target, if any alive node exists.
    /// Ties resolve to the smallest node id.
    pub fn find_closest_alive(&self, target: &Vector) -> Option<NodeId> {
        let mut best: Option<(f64, NodeId)> = None;
        for id in self.node_ids() {
            let node = &self.nodes[&id];
            if !node.is_alive() {
                continue;
            }
            let d = node.position().distance(target);
            match best {
                Some((best_d, _)) if best_d <= d => {}
                _ => best = Some((d, id)),
            }
        }
        best.map(|(_, id)| id)
    }

    /// Whether at least one alive node carries the given role. When a request requires a role
    /// and this returns `false`, the executor reports a section failure without taking a hop.
    pub fn has_alive_in_role(&self, role: &Role) -> bool {
        self.nodes.values().any(|n| n.is_alive() && n.role() == role)
    }

    /// All alive node ids, sorted.
    pub fn alive_ids(&self) -> Vec<NodeId> {
        self.node_ids().into_iter().filter(|id| self.nodes[id].is_alive()).collect()
    }

    /// Mark a node as failed (operator command or monitor decision). The node keeps its
    /// edges; it simply stops being selectable.
    pub fn fail(&self, id: NodeId) -> Result<(), NetError> {
        let node = self.get(id)?;
        node.mark_failed();
        info!("Node {} marked as failed", node.name());
        Ok(())
    }

    /// Bring a failed node back (operator command or monitor decision).
    pub fn recover(&self, id: NodeId) -> Result<(), NetError> {
        let node = self.get(id)?;
        node.clear_probe_failures();
        node.mark_alive();
        info!("Node {} recovered", node.name());
        Ok(())
    }

    /// Set the trust of a node (operator command). The value is clamped to [0, 1].
    pub fn set_trust(&self, id: NodeId, value: f64) -> Result<(), NetError> {
        self.get(id)?.set_trust(value);
        Ok(())
    }

    /// Reset the load counter of every node (operator command).
    pub fn reset_loads(&self) {
        for node in self.nodes.values() {
            node.reset_load();
        }
    }

    /// A point-in-time view of one node's externally visible metrics, as a management
    /// surface would report them.
    pub fn node_metrics(&self, id: NodeId) -> Result<NodeMetrics, NetError> {
        let node = self.get(id)?;
        Ok(NodeMetrics {
            name: node.name().to_string(),
            role: node.role().clone(),
            load: node.load(),
            capacity: node.capacity(),
            trust: node.trust(),
            latency_ms: node.latency_ms(),
            alive: node.is_alive(),
            neighbors: self.neighbors(id).len(),
        })
    }

    /// Return a compact summary of the network, listing every node with its neighbors.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Network: {} nodes, {} edges (topology={}, dimensions={})",
            self.num_nodes(),
            self.num_edges(),
            self.mode,
            self.dimensions
        )];
        for id in self.node_ids() {
            let node = &self.nodes[&id];
            let mut neighbors: Vec<&str> =
                self.neighbors(id).iter().map(|n| self.nodes[n].name()).collect();
            neighbors.sort_unstable();
            lines.push(format!(
                "  {} [{}] -> {} neighbors: {:?}",
                node.name(),
                node.role(),
                neighbors.len(),
                neighbors
            ));
        }
        lines.join("\n")
    }
}
