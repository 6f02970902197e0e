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

//! Tests of the concurrent simulation driver: aggregate consistency, failure injection, and
//! parallel execution against one shared network.

use crate::example_networks::{random_delaunay, random_sections};
use crate::net::TopologyMode;
use crate::routing::RoutingConfig;
use crate::simulation::{Simulation, SimulationConfig};

#[test]
fn test_every_request_is_accounted_for() {
    let sim = Simulation::new(random_delaunay(20, 4, 42), RoutingConfig::default());
    let config = SimulationConfig {
        requests: 40,
        workers: Some(4),
        seed: 42,
        ..SimulationConfig::default()
    };
    let report = sim.run(&config);

    assert_eq!(report.results.len(), 40);
    assert_eq!(report.snapshot.total_requests, 40);
    assert_eq!(sim.observability().summary().total_requests, 40);
    assert_eq!(
        report.snapshot.successes + report.snapshot.failed_routes,
        report.snapshot.total_requests
    );
    // aggregates agree with the individual results
    let successes = report.results.iter().filter(|r| r.success()).count();
    assert_eq!(report.snapshot.successes, successes);
    let hops: usize = report.results.iter().map(|r| r.total_hops).sum();
    assert!((report.snapshot.average_hops - hops as f64 / 40.0).abs() < 1e-9);
}

#[test]
fn test_requests_respect_the_hop_cap() {
    let sim = Simulation::new(random_delaunay(25, 4, 7), RoutingConfig::default());
    let config = SimulationConfig {
        requests: 30,
        workers: Some(3),
        seed: 7,
        use_roles: false,
        ..SimulationConfig::default()
    };
    let report = sim.run(&config);
    let routing = RoutingConfig::default();
    for result in &report.results {
        assert!(result.total_hops <= routing.max_hops);
        let mut seen = std::collections::HashSet::new();
        for id in &result.path {
            assert!(seen.insert(*id), "cycle in path {:?}", result.path);
        }
    }
}

#[test]
fn test_failure_injection_excludes_dead_nodes() {
    let sim = Simulation::new(random_delaunay(25, 4, 13), RoutingConfig::default());
    let config = SimulationConfig {
        requests: 30,
        workers: Some(2),
        seed: 13,
        fail_fraction: 0.2,
        ..SimulationConfig::default()
    };
    let report = sim.run(&config);

    assert!(!report.injected_failures.is_empty());
    let net = sim.network();
    let net = net.read().unwrap();
    for &id in &report.injected_failures {
        assert!(!net.get(id).unwrap().is_alive());
    }
    // the sink saw every route exactly once, failures included
    assert_eq!(report.snapshot.total_requests, 30);
}

#[test]
fn test_section_constrained_simulation() {
    let sim = Simulation::new(
        random_sections(30, 4, 19, TopologyMode::Hybrid),
        RoutingConfig::default(),
    );
    let config = SimulationConfig {
        requests: 24,
        workers: Some(4),
        seed: 19,
        use_roles: true,
        ..SimulationConfig::default()
    };
    let report = sim.run(&config);
    assert_eq!(report.snapshot.total_requests, 24);

    // section-constrained successes must terminate inside the right section
    let net = sim.network();
    let net = net.read().unwrap();
    for result in report.results.iter().filter(|r| r.success()) {
        let terminal = net.get(result.final_node).unwrap();
        assert!(terminal.is_alive());
    }
}

#[test]
fn test_monitored_simulation_completes() {
    let sim = Simulation::new(random_delaunay(15, 4, 29), RoutingConfig::default());
    let config = SimulationConfig {
        requests: 20,
        workers: Some(2),
        seed: 29,
        run_monitor: true,
        monitor: crate::monitor::MonitorConfig {
            poll_interval: std::time::Duration::from_millis(10),
            probe_timeout: std::time::Duration::from_millis(5),
            max_failures: 3,
        },
        ..SimulationConfig::default()
    };
    let report = sim.run(&config);
    assert_eq!(report.snapshot.total_requests, 20);
    // with a healthy probe the monitor must not have killed anything
    let net = sim.network();
    let net = net.read().unwrap();
    assert_eq!(net.alive_ids().len(), 15);
}
