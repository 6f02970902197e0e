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

//! Background liveness monitoring.
//!
//! A monitor thread sweeps the node set at a fixed period, probing each node through the
//! [`HealthProbe`] boundary. A node is marked dead after `max_failures` consecutive misses
//! and revived on the first success afterwards. The monitor never blocks the routing plane:
//! it only touches the per-node `alive` flag, the probe-failure counter and the latency
//! estimate, and it collects the probe targets up front so that no network lock is held
//! while a probe is in flight.

use crate::net::{Network, NodeId};
use crate::Stopper;
use log::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

/// Outcome of one health probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeResponse {
    /// The node answered within the timeout.
    Healthy {
        /// Measured round-trip time in milliseconds
        latency_ms: f64,
    },
    /// The node answered, but reported itself unhealthy.
    Unhealthy,
    /// No answer within the timeout.
    TimedOut,
}

/// The node-service boundary the monitor talks to. In production this is an HTTP health
/// endpoint; in tests and simulations it is scripted.
pub trait HealthProbe: Send + Sync {
    /// Probe one node, identified by name, within the given timeout.
    fn probe(&self, node_name: &str, timeout: Duration) -> ProbeResponse;
}

/// Outcome of delegating a request execution to a node service.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResponse {
    /// The node executed the request.
    Ok {
        /// Measured response time in milliseconds
        response_time_ms: f64,
    },
    /// The node answered with an error.
    Error(String),
}

/// The full node-service boundary: liveness probing plus request execution, for deployments
/// where the terminal hop is delegated to a remote service process.
pub trait NodeService: HealthProbe {
    /// Execute a request payload on the node, within the given timeout.
    fn execute(&self, node_name: &str, payload: &str, timeout: Duration) -> ExecuteResponse;
}

/// A scriptable probe for simulations: nodes are healthy with a fixed latency unless
/// explicitly taken down.
#[derive(Debug)]
pub struct SimulatedProbe {
    down: Mutex<HashSet<String>>,
    latency_ms: f64,
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl SimulatedProbe {
    /// Create a probe reporting the given latency for healthy nodes.
    pub fn new(latency_ms: f64) -> Self {
        Self { down: Mutex::new(HashSet::new()), latency_ms }
    }

    /// Script a node as down (unreachable for the probe) or back up.
    pub fn set_down(&self, node_name: &str, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(node_name.to_string());
        } else {
            set.remove(node_name);
        }
    }
}

impl HealthProbe for SimulatedProbe {
    fn probe(&self, node_name: &str, _timeout: Duration) -> ProbeResponse {
        if self.down.lock().unwrap().contains(node_name) {
            ProbeResponse::TimedOut
        } else {
            ProbeResponse::Healthy { latency_ms: self.latency_ms }
        }
    }
}

impl NodeService for SimulatedProbe {
    fn execute(&self, node_name: &str, _payload: &str, _timeout: Duration) -> ExecuteResponse {
        if self.down.lock().unwrap().contains(node_name) {
            ExecuteResponse::Error(format!("node {} is unreachable", node_name))
        } else {
            ExecuteResponse::Ok { response_time_ms: self.latency_ms }
        }
    }
}

/// Timing and thresholds of the monitor loop.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Period between two sweeps over the node set
    pub poll_interval: Duration,
    /// Timeout of a single probe
    pub probe_timeout: Duration,
    /// Consecutive misses before a node is marked dead
    pub max_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            max_failures: 3,
        }
    }
}

/// The background health monitor. Dropping it stops the thread.
pub struct HealthMonitor {
    net: Arc<RwLock<Network>>,
    probe: Arc<dyn HealthProbe>,
    config: MonitorConfig,
    stopper: Stopper,
    handle: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.config)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl HealthMonitor {
    /// Create a monitor for a shared network. Call [`HealthMonitor::start`] to launch it.
    pub fn new(
        net: Arc<RwLock<Network>>,
        probe: Arc<dyn HealthProbe>,
        config: MonitorConfig,
    ) -> Self {
        Self { net, probe, config, stopper: Stopper::new(), handle: None }
    }

    /// Launch the monitor thread. Does nothing when it is already running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let net = self.net.clone();
        let probe = self.probe.clone();
        let config = self.config.clone();
        let stopper = self.stopper.clone();
        self.handle = Some(thread::spawn(move || {
            info!("Health monitor started (period {:?})", config.poll_interval);
            while !stopper.is_stop() {
                Self::sweep(&net, probe.as_ref(), &config);
                // sleep in small slices so a stop request takes effect between ticks
                let mut remaining = config.poll_interval;
                let slice = Duration::from_millis(10);
                while remaining > Duration::from_millis(0) && !stopper.is_stop() {
                    let nap = remaining.min(slice);
                    thread::sleep(nap);
                    remaining = remaining.checked_sub(nap).unwrap_or_default();
                }
            }
            info!("Health monitor stopped");
        }));
    }

    /// Stop the monitor thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stopper.send_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// A stopper handle that cancels the monitor from elsewhere.
    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// Run one probe sweep over all nodes. Exposed so tests (and operators) can drive the
    /// monitor deterministically without waiting for the poll interval.
    pub fn sweep(net: &RwLock<Network>, probe: &dyn HealthProbe, config: &MonitorConfig) {
        // snapshot the targets first: no lock is held while probes run
        let targets: Vec<(NodeId, String)> = {
            let net = net.read().unwrap();
            net.node_ids()
                .into_iter()
                .filter_map(|id| net.get(id).ok().map(|n| (id, n.name().to_string())))
                .collect()
        };

        for (id, name) in targets {
            let response = probe.probe(&name, config.probe_timeout);
            let net = net.read().unwrap();
            let node = match net.get(id) {
                Ok(node) => node,
                Err(_) => continue,
            };
            match response {
                ProbeResponse::Healthy { latency_ms } => {
                    node.set_latency_ms(latency_ms);
                    let was_dead = !node.is_alive();
                    node.clear_probe_failures();
                    if was_dead {
                        node.mark_alive();
                        info!("Node {} recovered (probe healthy)", name);
                    }
                }
                ProbeResponse::Unhealthy | ProbeResponse::TimedOut => {
                    let misses = node.record_probe_failure();
                    debug!("Probe miss {}/{} for {}", misses, config.max_failures, name);
                    if misses >= config.max_failures && node.is_alive() {
                        node.mark_failed();
                        warn!("Node {} marked dead after {} probe misses", name, misses);
                    }
                }
            }
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
