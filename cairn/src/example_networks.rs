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

//! # Prepared networks
//!
//! A small collection of networks used by tests, demos and the CLI: handcrafted geometries
//! with known routing behavior, and seeded random networks for the end-to-end scenarios.

use crate::geometry::Vector;
use crate::grouping::SERVICE_ROLES;
use crate::net::{Network, NodeId, Role, TopologyMode};

/// A 3x3 grid in the unit square, connected along rows and columns. Every routing decision
/// on it is easy to verify by hand.
///
/// ```text
///   N006 - N007 - N008      y=1.0
///    |       |     |
///   N003 - N004 - N005      y=0.5
///    |       |     |
///   N000 - N001 - N002      y=0.0
/// ```
pub fn unit_grid() -> Network {
    let mut net = Network::new(2);
    let mut ids: Vec<NodeId> = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            let id = net.add_node(
                format!("N{:03}", row * 3 + col),
                Vector::new(vec![col as f64 * 0.5, row as f64 * 0.5]),
                Role::from("default"),
                20.0,
            );
            ids.push(id);
        }
    }
    for row in 0..3 {
        for col in 0..3 {
            let here = row * 3 + col;
            if col < 2 {
                net.add_link(ids[here], ids[here + 1]);
            }
            if row < 2 {
                net.add_link(ids[here], ids[here + 3]);
            }
        }
    }
    net
}

/// A seeded random Delaunay network with `n` nodes in `[-1, 1]^dims`, all in the `default`
/// role. With enough non-degenerate points this is the graph with the greedy-progress
/// guarantee; otherwise construction falls back to KNN (check [`Network::mode`]).
pub fn random_delaunay(n: usize, dims: usize, seed: u64) -> Network {
    Network::generate(n, dims, seed, TopologyMode::Delaunay, 4)
}

/// A seeded random network whose roles cycle through the well-known service sections, so
/// every section has roughly `n / 6` members.
pub fn random_sections(n: usize, dims: usize, seed: u64, mode: TopologyMode) -> Network {
    let roles: Vec<Role> = SERVICE_ROLES.iter().map(|r| Role::from(*r)).collect();
    Network::generate_with_roles(n, dims, seed, mode, 4, &roles)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unit_grid_shape() {
        let net = unit_grid();
        assert_eq!(net.num_nodes(), 9);
        assert_eq!(net.num_edges(), 12);
        // the center has degree 4, the corners degree 2
        let center = net.node_id("N004").unwrap();
        assert_eq!(net.neighbors(center).len(), 4);
        let corner = net.node_id("N000").unwrap();
        assert_eq!(net.neighbors(corner).len(), 2);
        let report = net.validate();
        assert!(report.connected);
        assert!(report.isolated.is_empty());
    }

    #[test]
    fn test_random_sections_cover_all_roles() {
        let net = random_sections(18, 4, 1, TopologyMode::Knn);
        for role in SERVICE_ROLES.iter() {
            assert!(net.has_alive_in_role(&Role::from(*role)), "missing role {}", role);
        }
    }
}
