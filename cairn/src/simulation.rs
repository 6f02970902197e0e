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

//! # Concurrent simulation driver
//!
//! Exercises the routing plane the way it is meant to run: several executor threads routing
//! seeded requests against one shared network, a health monitor sweeping in the background,
//! and optional failure injection halfway through. Request generation is deterministic per
//! request index, so two runs with the same seed produce the same request stream regardless
//! of worker count.

use crate::monitor::{HealthMonitor, MonitorConfig, SimulatedProbe};
use crate::net::{Network, NodeId};
use crate::observe::{MetricsSnapshot, Observability};
use crate::routing::{Request, RecentHops, RouteExecutor, RouteResult, RoutingConfig};
use crate::geometry::Vector;
use log::*;
use rand::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::Instant;

/// Request texts the driver attaches when section-constrained requests are enabled; each one
/// derives a different well-known role.
const ROLE_TEXTS: [&str; 6] = [
    "authenticate the session token",
    "query the sql database",
    "execute a compute task",
    "detect objects in the camera image",
    "upload a file to blob storage",
    "forward through the gateway proxy",
];

/// Size of the shared recent-hop window used for the load-balance tie-break.
const RECENT_WINDOW: usize = 8;

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of requests to route
    pub requests: usize,
    /// Worker threads; defaults to the machine's logical CPUs (capped at 8)
    pub workers: Option<usize>,
    /// Seed for request generation and failure injection
    pub seed: u64,
    /// Attach role-deriving request texts to every other request
    pub use_roles: bool,
    /// Fraction of nodes to fail halfway through the run
    pub fail_fraction: f64,
    /// `k` used when healing around injected failures
    pub heal_k: usize,
    /// Run the background health monitor during the simulation
    pub run_monitor: bool,
    /// Monitor timing (only used when `run_monitor` is set)
    pub monitor: MonitorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            workers: None,
            seed: 42,
            use_roles: false,
            fail_fraction: 0.0,
            heal_k: 3,
            run_monitor: false,
            monitor: MonitorConfig::default(),
        }
    }
}

/// Everything a finished run reports back.
#[derive(Debug)]
pub struct SimulationReport {
    /// Every route result, sorted by start node for a stable report
    pub results: Vec<RouteResult>,
    /// Aggregate metrics from the shared observability sink
    pub snapshot: MetricsSnapshot,
    /// Nodes failed by the injection step
    pub injected_failures: Vec<NodeId>,
}

/// Owns the shared state of a simulation: the network behind its lock, the observability
/// sink, and the recent-hop window the executors share.
#[derive(Debug)]
pub struct Simulation {
    net: Arc<RwLock<Network>>,
    routing: RoutingConfig,
    observability: Arc<Observability>,
    recent: Arc<RecentHops>,
}

impl Simulation {
    /// Wrap a network for simulation.
    pub fn new(net: Network, routing: RoutingConfig) -> Self {
        Self {
            net: Arc::new(RwLock::new(net)),
            routing,
            observability: Arc::new(Observability::new()),
            recent: Arc::new(RecentHops::new(RECENT_WINDOW)),
        }
    }

    /// The shared network handle.
    pub fn network(&self) -> Arc<RwLock<Network>> {
        self.net.clone()
    }

    /// The shared observability sink.
    pub fn observability(&self) -> Arc<Observability> {
        self.observability.clone()
    }

    /// Run a simulation: route `config.requests` requests across the worker threads, with
    /// optional failure injection halfway through.
    pub fn run(&self, config: &SimulationConfig) -> SimulationReport {
        let started = Instant::now();
        let probe = Arc::new(SimulatedProbe::default());
        let mut monitor = if config.run_monitor {
            let mut monitor = HealthMonitor::new(
                self.net.clone(),
                probe.clone(),
                config.monitor.clone(),
            );
            monitor.start();
            Some(monitor)
        } else {
            None
        };

        let midpoint =
            if config.fail_fraction > 0.0 { config.requests / 2 } else { config.requests };
        let mut results = Vec::with_capacity(config.requests);
        results.extend(self.run_phase(config, 0, midpoint));

        let injected_failures = if config.fail_fraction > 0.0 {
            self.inject_failures(config, probe.as_ref())
        } else {
            Vec::new()
        };

        results.extend(self.run_phase(config, midpoint, config.requests));

        if let Some(monitor) = monitor.as_mut() {
            monitor.stop();
        }

        let snapshot = self.observability.summary();
        info!(
            "Simulation finished: {} requests, {:.1}% success, {:.2} avg hops, {:?} wall time",
            snapshot.total_requests,
            snapshot.success_rate * 100.0,
            snapshot.average_hops,
            started.elapsed()
        );
        SimulationReport { results, snapshot, injected_failures }
    }

    /// Route the request indices `[from, to)` across the worker threads.
    fn run_phase(&self, config: &SimulationConfig, from: usize, to: usize) -> Vec<RouteResult> {
        if from >= to {
            return Vec::new();
        }
        let workers = config.workers.unwrap_or_else(|| num_cpus::get().min(8)).max(1);
        let next_index = Arc::new(AtomicUsize::new(from));
        let (tx, rx) = mpsc::channel::<RouteResult>();

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let net = self.net.clone();
                let observability = self.observability.clone();
                let recent = self.recent.clone();
                let routing = self.routing.clone();
                let next_index = next_index.clone();
                let tx = tx.clone();
                let config = config.clone();
                thread::spawn(move || loop {
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= to {
                        break;
                    }
                    let net = net.read().unwrap();
                    let (start, request) = match generate_request(&net, &config, index) {
                        Some(pair) => pair,
                        None => continue,
                    };
                    let executor = RouteExecutor::new(&net, &routing)
                        .with_observer(&observability)
                        .with_recent(&recent);
                    match executor.route(start, &request) {
                        Ok(result) => {
                            let _ = tx.send(result);
                        }
                        Err(e) => error!("Request {} failed to execute: {}", index, e),
                    }
                })
            })
            .collect();
        drop(tx);

        let mut results: Vec<RouteResult> = rx.iter().collect();
        for handle in handles {
            let _ = handle.join();
        }
        // completion order is nondeterministic across workers; keep the report stable
        results.sort_by_key(|r| (r.start, r.total_hops));
        results
    }

    /// Fail a seeded random subset of the alive nodes, take them out of the simulated probe,
    /// and heal the topology around them. Takes the exclusive network lock, blocking routing
    /// for the duration, as every structural mutation does.
    fn inject_failures(&self, config: &SimulationConfig, probe: &SimulatedProbe) -> Vec<NodeId> {
        let mut rng = StdRng::seed_from_u64(config.seed ^ 0xfa11);
        let mut net = self.net.write().unwrap();
        let mut alive = net.alive_ids();
        let count = ((alive.len() as f64) * config.fail_fraction).floor() as usize;
        let mut failed = Vec::with_capacity(count);
        for _ in 0..count.min(alive.len().saturating_sub(1)) {
            let victim = alive.remove(rng.gen_range(0..alive.len()));
            probe.set_down(net.node_name(victim).unwrap(), true);
            net.fail(victim).unwrap();
            failed.push(victim);
        }
        for &victim in &failed {
            let _ = net.heal_around(victim, config.heal_k);
        }
        warn!("Injected {} node failures", failed.len());
        failed
    }
}

/// Deterministically generate request `index`: a uniform target in `[-1, 1]^d` from a start
/// node chosen among the alive ones. Returns `None` when no node is alive.
fn generate_request(
    net: &Network,
    config: &SimulationConfig,
    index: usize,
) -> Option<(NodeId, Request)> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
    let alive = net.alive_ids();
    if alive.is_empty() {
        return None;
    }
    let start = alive[rng.gen_range(0..alive.len())];
    let coords: Vec<f64> = (0..net.dimensions()).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut request = Request::new(Vector::new(coords))
        .with_client(format!("sim-{}", index));
    if config.use_roles && index % 2 == 0 {
        request = request.with_text(ROLE_TEXTS[rng.gen_range(0..ROLE_TEXTS.len())]);
    }
    Some((start, request))
}
