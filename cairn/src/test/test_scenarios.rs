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

//! End-to-end routing scenarios on seeded networks: normal delivery, failure rerouting,
//! load spreading, trust avoidance, section failure, and the greedy-progress guarantee.

use crate::example_networks::random_delaunay;
use crate::geometry::Vector;
use crate::net::{greedy_guarantee_check, Network, NodeId, Role, TopologyMode};
use crate::routing::{termination, HopMethod, Request, RouteExecutor, RoutingConfig};
use lazy_static::lazy_static;
use rand::prelude::*;

lazy_static! {
    /// The shared target of the load-balance and trust scenarios.
    static ref CENTER_TARGET: Vector = Vector::new(vec![0.5, 0.5, 0.5, 0.5]);
}

fn pick_start(net: &Network, preferred: &str, target: &Vector, config: &RoutingConfig) -> NodeId {
    // the preferred node, unless the oracle already considers it terminal for this target
    let preferred = net.node_id(preferred).unwrap();
    if termination::check(net, preferred, target, config.cosine_threshold).is_none() {
        return preferred;
    }
    net.node_ids()
        .into_iter()
        .find(|id| termination::check(net, *id, target, config.cosine_threshold).is_none())
        .expect("every node is terminal for this target")
}

#[test]
fn test_scenario_normal_routing() {
    let net = random_delaunay(20, 4, 42);
    assert_eq!(net.mode(), TopologyMode::Delaunay);
    let config = RoutingConfig::default();
    let target = Vector::new(vec![0.8, 0.8, 0.8, 0.8]);
    let start = pick_start(&net, "N000", &target, &config);

    let result =
        RouteExecutor::new(&net, &config).route(start, &Request::new(target)).unwrap();
    assert!(result.success(), "normal routing failed: {:?}", result.outcome);
    assert!(result.total_hops >= 1);
    assert_eq!(result.path[0], start);
    for pair in result.hops.windows(2) {
        if pair[0].method == Some(HopMethod::Greedy) {
            assert!(pair[1].distance_to_target < pair[0].distance_to_target);
        }
    }

    // the rendered trace resolves every node name
    let rendered = crate::printer::route_result(&net, &result).unwrap();
    assert!(rendered.contains(net.node_name(start).unwrap()));
    assert!(rendered.contains("succeeded"));
}

#[test]
fn test_scenario_failure_rerouting() {
    let net = random_delaunay(20, 4, 42);
    let config = RoutingConfig::default();
    let target = Vector::new(vec![0.8, 0.8, 0.8, 0.8]);
    let start = pick_start(&net, "N000", &target, &config);

    let first =
        RouteExecutor::new(&net, &config).route(start, &Request::new(target.clone())).unwrap();
    assert!(first.success());
    assert!(first.total_hops >= 1);

    net.reset_loads();
    // kill a node in the middle of the recorded path (the terminal one when the path is
    // only two nodes long)
    let victim = first.path[first.path.len() / 2];
    assert_ne!(victim, start);
    net.fail(victim).unwrap();

    let second =
        RouteExecutor::new(&net, &config).route(start, &Request::new(target)).unwrap();
    assert!(!second.path.contains(&victim), "dead node reappeared in the new path");
    assert_ne!(second.path, first.path);
}

#[test]
fn test_scenario_load_balanced_divergence() {
    let net = random_delaunay(30, 4, 42);
    assert_eq!(net.mode(), TopologyMode::Delaunay);
    let mut config = RoutingConfig::default();
    // strictly geometric termination: every request descends all the way to the node
    // closest to the shared target
    config.cosine_threshold = 1.0;

    let target = CENTER_TARGET.clone();
    let starts = ["N001", "N003", "N005", "N007", "N009"];
    let mut paths = Vec::new();
    for name in starts.iter() {
        let start = net.node_id(name).unwrap();
        let result = RouteExecutor::new(&net, &config)
            .route(start, &Request::new(target.clone()))
            .unwrap();
        assert!(result.success(), "request from {} failed: {:?}", name, result.outcome);
        paths.push(result.path);
    }

    assert!(paths.windows(2).any(|p| p[0] != p[1]), "all five paths are identical");

    // with the direction-match condition disabled, every descent must bottom out at the one
    // node closest to the shared target
    let closest = net.find_closest_alive(&target).unwrap();
    for path in &paths {
        assert_eq!(*path.last().unwrap(), closest);
    }
    let max_load = net
        .node_ids()
        .into_iter()
        .map(|id| net.get(id).unwrap().load())
        .fold(0.0f64, f64::max);
    assert!(max_load >= 2.0, "no node carried more than one request (max {})", max_load);
}

#[test]
fn test_scenario_trust_avoidance() {
    let net = random_delaunay(30, 4, 42);
    let config = RoutingConfig::default();
    let target = CENTER_TARGET.clone();
    let start = pick_start(&net, "N000", &target, &config);

    let first =
        RouteExecutor::new(&net, &config).route(start, &Request::new(target.clone())).unwrap();
    assert!(first.success());

    // collapse trust on every intermediate node of the first path
    for id in &first.path[1..first.path.len().saturating_sub(1)] {
        net.set_trust(*id, 0.0).unwrap();
    }
    net.reset_loads();
    for id in net.node_ids() {
        net.get(id).unwrap().clear_cache();
    }

    let second =
        RouteExecutor::new(&net, &config).route(start, &Request::new(target)).unwrap();
    // the route still goes through (trust shuns, it never excludes); if it kept the exact
    // same path, the scoring margin simply had no better alternative
    assert!(second.success(), "trust collapse must not make routing fail: {:?}", second.outcome);
    for id in &second.path {
        assert!(net.get(*id).unwrap().is_alive());
    }
}

#[test]
fn test_scenario_section_failure() {
    let roles: Vec<Role> = ["auth", "database", "compute", "storage", "proxy"]
        .iter()
        .map(|r| Role::from(*r))
        .collect();
    let net = Network::generate_with_roles(30, 4, 42, TopologyMode::Delaunay, 4, &roles);
    let auth = Role::from("auth");
    assert!(net.has_alive_in_role(&auth));

    // take the whole auth section down
    for id in net.node_ids() {
        if net.get(id).unwrap().role() == &auth {
            net.fail(id).unwrap();
        }
    }
    assert!(!net.has_alive_in_role(&auth));

    let config = RoutingConfig::default();
    let start = net
        .alive_ids()
        .into_iter()
        .next()
        .expect("some node outside the auth section must be alive");
    let request =
        Request::new(Vector::new(vec![0.2, 0.2, 0.2, 0.2])).with_role(auth);
    let result = RouteExecutor::new(&net, &config).route(start, &request).unwrap();

    assert!(result.section_failed());
    assert_eq!(result.total_hops, 0);
    assert_eq!(result.final_node, start);
    assert_eq!(result.outcome.code(), "section_empty");
}

#[test]
fn test_scenario_greedy_guarantee() {
    let net = random_delaunay(30, 4, 42);
    assert_eq!(net.mode(), TopologyMode::Delaunay);

    let mut rng = StdRng::seed_from_u64(42);
    let mut total_violations = 0;
    for _ in 0..10 {
        let target = Vector::new((0..4).map(|_| rng.gen_range(-1.0..1.0)).collect());
        let report = greedy_guarantee_check(&net, &target);
        assert!(report.total_checked >= 25, "too few nodes were checked");
        if !report.passed() {
            // a violation here can only come from numerical degeneracy in the tessellation;
            // it must be visible, never silently swallowed
            println!(
                "greedy guarantee violated for {}: {:?}",
                target, report.violations
            );
            total_violations += report.violations.len();
        }
    }
    assert!(
        total_violations == 0,
        "the Delaunay graph leaked {} local minima",
        total_violations
    );
}

#[test]
fn test_scenario_guarantee_on_hybrid() {
    // the guarantee is proven for pure Delaunay; the hybrid graph only adds edges, so it
    // must hold there as well
    let roles: Vec<Role> = vec![Role::from("default")];
    let net = Network::generate_with_roles(30, 4, 42, TopologyMode::Hybrid, 4, &roles);
    assert_eq!(net.mode(), TopologyMode::Hybrid);
    let mut rng = StdRng::seed_from_u64(43);
    for _ in 0..10 {
        let target = Vector::new((0..4).map(|_| rng.gen_range(-1.0..1.0)).collect());
        let report = greedy_guarantee_check(&net, &target);
        assert!(report.passed(), "hybrid graph violated the guarantee for {}", target);
    }
}
