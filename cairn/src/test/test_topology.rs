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

//! Structural tests of the topology builder: construction modes, fallback, mutations and
//! the greedy-progress guarantee.

use crate::geometry::Vector;
use crate::net::{build_network, greedy_guarantee_check, Network, Role, TopologyMode};
use rand::prelude::*;

fn random_positions(n: usize, dims: usize, seed: u64) -> Vec<Vector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Vector::new((0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect()))
        .collect()
}

fn default_roles(n: usize) -> Vec<Role> {
    (0..n).map(|_| Role::from("default")).collect()
}

/// Every edge of an undirected petgraph is symmetric by construction, but the adjacency the
/// router actually uses must agree in both directions too.
fn assert_symmetric(net: &Network) {
    for a in net.node_ids() {
        for b in net.neighbors(a) {
            assert!(
                net.neighbors(b).contains(&a),
                "edge {:?} -> {:?} is not mirrored",
                a,
                b
            );
        }
    }
}

#[test]
fn test_knn_construction() {
    let net = build_network(random_positions(20, 4, 1), default_roles(20), TopologyMode::Knn, 4);
    assert_eq!(net.mode(), TopologyMode::Knn);
    assert_eq!(net.num_nodes(), 20);
    assert_symmetric(&net);
    for id in net.node_ids() {
        // k plus whatever mirrored edges other nodes contributed
        assert!(net.neighbors(id).len() >= 4);
        assert!(!net.neighbors(id).contains(&id), "self loop at {:?}", id);
    }
    let report = net.validate();
    assert!(report.isolated.is_empty());
    assert!(report.avg_degree < net.num_nodes() as f64);
}

#[test]
fn test_delaunay_construction() {
    let net = build_network(
        random_positions(20, 4, 42),
        default_roles(20),
        TopologyMode::Delaunay,
        4,
    );
    assert_eq!(net.mode(), TopologyMode::Delaunay);
    assert_symmetric(&net);
    let report = net.validate();
    assert!(report.connected, "Delaunay graph must be connected");
    assert!(report.isolated.is_empty());
    assert!(report.avg_degree < net.num_nodes() as f64);
}

#[test]
fn test_hybrid_is_a_superset_of_delaunay() {
    let positions = random_positions(16, 3, 7);
    let delaunay = build_network(
        positions.clone(),
        default_roles(16),
        TopologyMode::Delaunay,
        3,
    );
    let hybrid = build_network(positions, default_roles(16), TopologyMode::Hybrid, 3);
    assert_eq!(hybrid.mode(), TopologyMode::Hybrid);
    for a in delaunay.node_ids() {
        for b in delaunay.neighbors(a) {
            assert!(hybrid.connected(a, b), "hybrid is missing delaunay edge {:?}-{:?}", a, b);
        }
    }
    assert!(hybrid.num_edges() >= delaunay.num_edges());
}

#[test]
fn test_delaunay_falls_back_to_knn() {
    // three points cannot be tessellated in 4-D space
    let net = build_network(random_positions(3, 4, 5), default_roles(3), TopologyMode::Delaunay, 2);
    assert_eq!(net.mode(), TopologyMode::Knn);
    assert!(net.num_edges() > 0);

    // duplicate positions are degenerate, and must degrade rather than fail
    let mut positions = random_positions(10, 4, 5);
    positions[7] = positions[2].clone();
    let net = build_network(positions, default_roles(10), TopologyMode::Delaunay, 3);
    assert_eq!(net.mode(), TopologyMode::Knn);
    assert_symmetric(&net);
}

#[test]
fn test_insert_node() {
    let mut net =
        build_network(random_positions(12, 4, 11), default_roles(12), TopologyMode::Knn, 3);
    let before = net.num_nodes();
    let id = net.insert_node(
        "X000",
        Vector::new(vec![0.1, 0.1, 0.1, 0.1]),
        Role::from("compute"),
        20.0,
        3,
    );
    assert_eq!(net.num_nodes(), before + 1);
    assert_eq!(net.neighbors(id).len(), 3);
    assert_symmetric(&net);
    assert_eq!(net.get_by_name("X000").unwrap().id(), id);
}

#[test]
fn test_node_metrics_surface() {
    let mut net =
        build_network(random_positions(10, 4, 3), default_roles(10), TopologyMode::Knn, 3);
    let id = net.insert_node(
        "X000",
        Vector::new(vec![0.0, 0.0, 0.0, 0.0]),
        Role::from("database"),
        15.0,
        3,
    );
    net.get(id).unwrap().add_load(2.0);
    net.set_trust(id, 0.8).unwrap();

    let metrics = net.node_metrics(id).unwrap();
    assert_eq!(metrics.name, "X000");
    assert_eq!(metrics.role, Role::from("database"));
    assert_eq!(metrics.neighbors, 3);
    assert!(metrics.alive);
    assert!((metrics.load - 2.0).abs() < 1e-12);
    assert!((metrics.capacity - 15.0).abs() < 1e-12);
    assert!((metrics.trust - 0.8).abs() < 1e-12);
}

#[test]
fn test_remove_keeps_edges_and_blocks_selection() {
    let mut net =
        build_network(random_positions(12, 4, 13), default_roles(12), TopologyMode::Knn, 3);
    let victim = net.node_id("N003").unwrap();
    let degree = net.neighbors(victim).len();
    net.remove_node(victim).unwrap();
    assert!(!net.get(victim).unwrap().is_alive());
    // edges survive the failure, traversal is blocked by the liveness filter instead
    assert_eq!(net.neighbors(victim).len(), degree);
    for id in net.node_ids() {
        assert!(!net.alive_neighbors(id).contains(&victim));
    }
}

#[test]
fn test_heal_around_reconnects_survivors() {
    // a hub-and-spoke graph: killing the hub isolates the spokes until healing
    let mut net = Network::new(2);
    let hub = net.add_node("HUB", Vector::new(vec![0.0, 0.0]), Role::from("default"), 20.0);
    let mut spokes = Vec::new();
    for i in 0..4 {
        let angle = i as f64 * std::f64::consts::FRAC_PI_2;
        let id = net.add_node(
            format!("S{:03}", i),
            Vector::new(vec![angle.cos(), angle.sin()]),
            Role::from("default"),
            20.0,
        );
        net.add_link(hub, id);
        spokes.push(id);
    }

    net.fail(hub).unwrap();
    let report = net.validate();
    assert!(!report.connected);
    assert_eq!(report.isolated.len(), 4);

    let new_edges = net.heal_around(hub, 2).unwrap();
    assert!(new_edges > 0);
    assert_symmetric(&net);
    let report = net.validate();
    assert!(report.connected, "healing must reconnect the survivors");
    assert!(report.isolated.is_empty());
}

#[test]
fn test_rebuild_over_alive_nodes() {
    let mut net =
        build_network(random_positions(14, 4, 17), default_roles(14), TopologyMode::Knn, 3);
    let dead = net.node_id("N002").unwrap();
    net.fail(dead).unwrap();
    let actual = net.rebuild(TopologyMode::Knn, 4);
    assert_eq!(actual, TopologyMode::Knn);
    assert_symmetric(&net);
    // the dead node takes no part in the new edge set
    assert!(net.neighbors(dead).is_empty());
    let report = net.validate();
    assert!(report.isolated.is_empty());
}

#[test]
fn test_rebuild_can_change_mode() {
    let mut net =
        build_network(random_positions(15, 3, 19), default_roles(15), TopologyMode::Knn, 3);
    let actual = net.rebuild(TopologyMode::Delaunay, 3);
    assert_eq!(actual, TopologyMode::Delaunay);
    assert_eq!(net.mode(), TopologyMode::Delaunay);
    assert!(net.validate().connected);
}

#[test]
fn test_greedy_guarantee_on_delaunay() {
    let net = build_network(
        random_positions(25, 3, 23),
        default_roles(25),
        TopologyMode::Delaunay,
        3,
    );
    assert_eq!(net.mode(), TopologyMode::Delaunay);
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..10 {
        let target = Vector::new((0..3).map(|_| rng.gen_range(-1.0..1.0)).collect());
        let report = greedy_guarantee_check(&net, &target);
        assert!(report.total_checked > 0);
        assert!(
            report.passed(),
            "guarantee violated for {}: {:?}",
            target,
            report.violations
        );
    }
}

#[test]
fn test_guarantee_check_reports_violations() {
    // a path graph A - B - C with the target beyond C: B can reach C, but A's only closer
    // node is unreachable once B is dead
    let mut net = Network::new(2);
    let a = net.add_node("A", Vector::new(vec![0.0, 0.0]), Role::from("default"), 20.0);
    let b = net.add_node("B", Vector::new(vec![1.0, 0.0]), Role::from("default"), 20.0);
    let c = net.add_node("C", Vector::new(vec![2.0, 0.0]), Role::from("default"), 20.0);
    net.add_link(a, b);
    net.add_link(b, c);

    let target = Vector::new(vec![2.0, 0.0]);
    assert!(greedy_guarantee_check(&net, &target).passed());

    net.fail(b).unwrap();
    let report = greedy_guarantee_check(&net, &target);
    assert!(!report.passed());
    assert_eq!(report.violations, vec![a]);
    let _ = c;
}
