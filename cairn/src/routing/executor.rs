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

//! The route executor: drives one request hop by hop through the network.
//!
//! Every step consults the termination oracle, then the selector, then the fallback ladder
//! (best non-improving candidate, then a face-routing excursion). The executor owns the
//! per-request bookkeeping (visited set, path, hop records) and is the only component that
//! increments node load and writes the per-node cache. Expected failures never raise: the
//! result carries an explicit outcome with a machine-readable code.

use crate::geometry::Vector;
use crate::grouping;
use crate::net::{NetError, Network, NodeId, Role};
use crate::observe::Observability;
use crate::routing::selector::{self, RecentHops};
use crate::routing::termination::{self, TerminalReason};
use crate::routing::{face, RoutingConfig};
use crate::trust::{HopOutcome, TrustController};
use crate::Stopper;
use log::*;
use std::collections::HashSet;
use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A routing request. Only `target` (and the role, explicit or derived from `request_text`)
/// influences routing; the payload and client fields ride along untouched.
#[derive(Debug, Clone)]
pub struct Request {
    /// The destination point in vector space
    pub target: Vector,
    /// Role the terminal node must carry, if any
    pub required_role: Option<Role>,
    /// Free-text description; used to derive the role when none is given
    pub request_text: Option<String>,
    /// Issuing client
    pub client_id: String,
    /// Creation time, milliseconds since the epoch
    pub timestamp_ms: u64,
    /// Replay-protection nonce (opaque to the routing plane)
    pub nonce: String,
    /// Payload; never inspected by routing
    pub payload: String,
}

impl Request {
    /// Create a request for a target vector.
    pub fn new(target: Vector) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            target,
            required_role: None,
            request_text: None,
            client_id: String::from("client"),
            timestamp_ms,
            nonce: format!("{:016x}", rand::random::<u64>()),
            payload: String::new(),
        }
    }

    /// Require the terminal node to carry this role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    /// Attach a free-text description (used for role derivation when no role is set).
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.request_text = Some(text.into());
        self
    }

    /// Set the issuing client.
    pub fn with_client<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Attach a payload.
    pub fn with_payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.payload = payload.into();
        self
    }
}

/// How a hop was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopMethod {
    /// Best-scored candidate that strictly decreases the distance to the target
    Greedy,
    /// Best-scored candidate even though it does not decrease the distance
    Fallback,
    /// Landing node of a face-routing excursion
    Face,
    /// Validated hit of the per-node route cache
    Cache,
    /// Replacement found while self-healing after a mid-route node failure
    Heal,
}

impl fmt::Display for HopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greedy => f.write_str("greedy"),
            Self::Fallback => f.write_str("fallback"),
            Self::Face => f.write_str("face"),
            Self::Cache => f.write_str("cache"),
            Self::Heal => f.write_str("heal"),
        }
    }
}

/// Why a route failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The selector and both fallbacks produced no candidate
    NoNextHop,
    /// Face routing ran out of steps without finding progress
    FaceBudgetExhausted,
    /// The current node died mid-route and no replacement existed
    NodeFailure,
    /// The wall-clock ceiling was reached
    Timeout,
    /// The route was cancelled from outside
    Cancelled,
}

impl FailureReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoNextHop => "no_next_hop",
            Self::FaceBudgetExhausted => "face_budget_exhausted",
            Self::NodeFailure => "node_failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Final state of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The request reached a terminal node (in the required section, if one was required)
    Succeeded(TerminalReason),
    /// The request could not be delivered
    Failed(FailureReason),
    /// The required section has no alive node; not a single hop was taken
    SectionFailed,
    /// The hop cap was reached before termination
    Exhausted,
}

impl RouteOutcome {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Succeeded(reason) => reason.code(),
            Self::Failed(reason) => reason.code(),
            Self::SectionFailed => "section_empty",
            Self::Exhausted => "max_hops_exceeded",
        }
    }
}

impl fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded(reason) => write!(f, "succeeded ({})", reason),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
            Self::SectionFailed => f.write_str("section failed (no alive node in section)"),
            Self::Exhausted => f.write_str("failed (max hops exceeded)"),
        }
    }
}

/// Record of a single routing step.
#[derive(Debug, Clone)]
pub struct HopRecord {
    /// Step index, starting at 0
    pub step: usize,
    /// Node holding the request at this step
    pub node: NodeId,
    /// Its distance to the target
    pub distance_to_target: f64,
    /// Scored candidates of this step (empty on cache hits and terminal steps)
    pub candidates: Vec<selector::CandidateScore>,
    /// Chosen next hop, if any
    pub chosen: Option<NodeId>,
    /// How the next hop was found
    pub method: Option<HopMethod>,
    /// Nodes traversed by the face-routing excursion of this step, if one ran
    pub face_path: Vec<NodeId>,
    /// Set when the oracle declared this node terminal
    pub terminal: Option<TerminalReason>,
}

/// Complete, immutable result of one routing request.
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// Node the route started at
    pub start: NodeId,
    /// Node the route ended at
    pub final_node: NodeId,
    /// Visited nodes in order; contains no repeats and no dead nodes
    pub path: Vec<NodeId>,
    /// Per-hop records in hop order
    pub hops: Vec<HopRecord>,
    /// Final state
    pub outcome: RouteOutcome,
    /// Number of hops taken (`path.len() - 1`)
    pub total_hops: usize,
    /// Reroute events (self-healing and face excursions)
    pub reroutes: usize,
    /// Accumulated per-hop response time
    pub total_latency_ms: f64,
}

impl RouteResult {
    /// Whether the request reached a valid terminal node.
    pub fn success(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Succeeded(_))
    }

    /// Whether the route failed because the required section is empty.
    pub fn section_failed(&self) -> bool {
        matches!(self.outcome, RouteOutcome::SectionFailed)
    }
}

/// Drives requests through a network. The executor borrows the network shared; everything it
/// mutates per hop (load, trust, caches) is atomic on the nodes themselves.
#[derive(Debug)]
pub struct RouteExecutor<'a> {
    net: &'a Network,
    config: &'a RoutingConfig,
    trust: TrustController,
    observer: Option<&'a Observability>,
    recent: Option<&'a RecentHops>,
}

impl<'a> RouteExecutor<'a> {
    /// Create an executor for a network and configuration.
    pub fn new(net: &'a Network, config: &'a RoutingConfig) -> Self {
        let trust = TrustController::new(config.trust.clone());
        Self { net, config, trust, observer: None, recent: None }
    }

    /// Attach an observability sink. All decisions, reroutes, failures and completed routes
    /// are recorded there.
    pub fn with_observer(mut self, observer: &'a Observability) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Attach a shared recent-hop window for the load-balance tie-break.
    pub fn with_recent(mut self, recent: &'a RecentHops) -> Self {
        self.recent = Some(recent);
        self
    }

    /// Route a request from `start`. Fails only for an unknown start id; every routing-level
    /// problem is reported inside the returned result.
    pub fn route(&self, start: NodeId, request: &Request) -> Result<RouteResult, NetError> {
        self.route_with_stopper(start, request, None)
    }

    /// Like [`RouteExecutor::route`], but checks the stopper before every hop and reports
    /// `Cancelled` once it fires.
    pub fn route_with_stopper(
        &self,
        start: NodeId,
        request: &Request,
        stopper: Option<&Stopper>,
    ) -> Result<RouteResult, NetError> {
        let target = &request.target;
        let start_node = self.net.get(start)?;
        assert_eq!(
            target.dim(),
            self.net.dimensions(),
            "Request target dimension mismatch: {} vs {}",
            target.dim(),
            self.net.dimensions()
        );

        let required_role = request
            .required_role
            .clone()
            .or_else(|| request.request_text.as_deref().and_then(grouping::derive_role));

        debug!(
            "Routing from {} toward {} (role: {:?})",
            start_node.name(),
            target,
            required_role.as_ref().map(|r| r.as_str())
        );

        // section-boundary rule: an empty required section fails the request before the
        // first hop is even attempted
        if let Some(role) = &required_role {
            if !self.net.has_alive_in_role(role) {
                warn!("Section '{}' has no alive nodes; failing without routing", role);
                if let Some(obs) = self.observer {
                    obs.record_failure(start, &format!("section '{}' empty", role));
                }
                let result = RouteResult {
                    start,
                    final_node: start,
                    path: vec![start],
                    hops: Vec::new(),
                    outcome: RouteOutcome::SectionFailed,
                    total_hops: 0,
                    reroutes: 0,
                    total_latency_ms: 0.0,
                };
                if let Some(obs) = self.observer {
                    obs.record_route(&result);
                }
                return Ok(result);
            }
        }

        let started = Instant::now();
        let mut current = start;
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut path: Vec<NodeId> = Vec::new();
        let mut hops: Vec<HopRecord> = Vec::new();
        let mut reroutes = 0usize;
        let mut total_latency_ms = 0.0;
        let mut outcome: Option<RouteOutcome> = None;

        for step in 0..self.config.max_hops {
            if stopper.map(|s| s.is_stop()).unwrap_or(false) {
                outcome = Some(RouteOutcome::Failed(FailureReason::Cancelled));
                break;
            }
            if started.elapsed() > self.config.route_timeout {
                warn!("Route exceeded its wall-clock ceiling after {} hops", path.len());
                outcome = Some(RouteOutcome::Failed(FailureReason::Timeout));
                break;
            }

            let node = self.net.get(current)?;

            if !node.is_alive() {
                // the node went down between hops; self-heal by rescoring its neighborhood.
                // it never enters the path, so completed paths stay free of dead nodes.
                visited.insert(current);
                reroutes += 1;
                self.trust.record(node, HopOutcome::Failure);
                if let Some(obs) = self.observer {
                    obs.record_failure(current, "node failed mid-route");
                }
                let recent = self.recent.map(|r| r.snapshot()).unwrap_or_default();
                let candidates = selector::rank_candidates(
                    self.net,
                    &self.config.weights,
                    current,
                    target,
                    required_role.as_ref(),
                    &visited,
                    &recent,
                );
                match candidates.first() {
                    Some(c) => {
                        info!(
                            "Self-healing around {}: continuing at {}",
                            node.name(),
                            self.net.node_name(c.node)?
                        );
                        if let Some(obs) = self.observer {
                            obs.record_reroute(current, Some(c.node), "node_failure");
                        }
                        current = c.node;
                        continue;
                    }
                    None => {
                        if let Some(obs) = self.observer {
                            obs.record_reroute(current, None, "node_failure");
                        }
                        outcome = Some(RouteOutcome::Failed(FailureReason::NodeFailure));
                        break;
                    }
                }
            }

            path.push(current);
            visited.insert(current);
            let distance = node.position().distance(target);
            let mut hop = HopRecord {
                step,
                node: current,
                distance_to_target: distance,
                candidates: Vec::new(),
                chosen: None,
                method: None,
                face_path: Vec::new(),
                terminal: None,
            };

            // termination oracle; a geometric endpoint outside the required section does not
            // terminate, the request keeps looking for the section
            if let Some(reason) =
                termination::check(self.net, current, target, self.config.cosine_threshold)
            {
                let role_ok =
                    required_role.as_ref().map(|r| node.role() == r).unwrap_or(true);
                if role_ok {
                    debug!("Route reached {} ({})", node.name(), reason);
                    hop.terminal = Some(reason);
                    hops.push(hop);
                    // the terminal node serves the request, so it carries the work too
                    node.add_load(1.0);
                    let response_ms = node.latency_ms();
                    total_latency_ms += response_ms;
                    self.trust.record_response(node, response_ms);
                    if let Some(obs) = self.observer {
                        obs.record_load_sample(current, node.load());
                    }
                    outcome = Some(RouteOutcome::Succeeded(reason));
                    break;
                }
                trace!(
                    "{} is a geometric endpoint but outside section {:?}",
                    node.name(),
                    required_role.as_ref().map(|r| r.as_str())
                );
            }

            let recent = self.recent.map(|r| r.snapshot()).unwrap_or_default();

            // cache fast-path, then the ranked candidates
            let mut chosen: Option<(NodeId, HopMethod)> = None;
            if self.config.cache.enabled {
                if let Some(id) = selector::cache_candidate(
                    self.net,
                    current,
                    target,
                    required_role.as_ref(),
                    &visited,
                    &recent,
                    self.config.cache.rounding_decimals,
                ) {
                    trace!("Cache hit at {} for {}", node.name(), target);
                    chosen = Some((id, HopMethod::Cache));
                }
            }

            if chosen.is_none() {
                let candidates = selector::rank_candidates(
                    self.net,
                    &self.config.weights,
                    current,
                    target,
                    required_role.as_ref(),
                    &visited,
                    &recent,
                );
                chosen = candidates
                    .iter()
                    .find(|c| c.improves)
                    .map(|c| (c.node, HopMethod::Greedy))
                    .or_else(|| candidates.first().map(|c| (c.node, HopMethod::Fallback)));
                hop.candidates = candidates;
            }

            if chosen.is_none() {
                // the greedy plane is stuck; try to escape along a face boundary
                let walk = face::face_route(self.net, current, target, self.config.face_step_budget);
                hop.face_path = walk.path.clone();
                match walk.landed {
                    Some(id) if !visited.contains(&id) => {
                        reroutes += 1;
                        if let Some(obs) = self.observer {
                            obs.record_reroute(current, Some(id), "face_routing");
                        }
                        chosen = Some((id, HopMethod::Face));
                    }
                    _ => {
                        let reason = if walk.budget_exhausted {
                            FailureReason::FaceBudgetExhausted
                        } else {
                            FailureReason::NoNextHop
                        };
                        debug!("Route stuck at {} ({})", node.name(), reason);
                        if let Some(obs) = self.observer {
                            obs.record_decision(
                                current,
                                None,
                                None,
                                hop.candidates.len(),
                                "no candidate after fallback and face routing",
                            );
                            obs.record_failure(current, reason.code());
                        }
                        hops.push(hop);
                        self.trust.record(node, HopOutcome::Failure);
                        outcome = Some(RouteOutcome::Failed(reason));
                        break;
                    }
                }
            }

            let (next, method) = chosen.unwrap();
            hop.chosen = Some(next);
            hop.method = Some(method);

            // leaving `current`: it carried the request for one hop
            node.add_load(1.0);
            if let Some(obs) = self.observer {
                obs.record_load_sample(current, node.load());
            }
            if self.config.cache.enabled {
                node.cache_next_hop(
                    target.key(self.config.cache.rounding_decimals),
                    next,
                    self.config.cache.max_entries,
                );
            }

            let next_node = self.net.get(next)?;
            let response_ms = next_node.latency_ms();
            total_latency_ms += response_ms;
            self.trust.record_response(next_node, response_ms);

            trace!(
                "Hop {}: {} -> {} ({}, {} candidates)",
                step,
                node.name(),
                next_node.name(),
                method,
                hop.candidates.len()
            );
            if let Some(obs) = self.observer {
                obs.record_decision(
                    current,
                    Some(next),
                    Some(method),
                    hop.candidates.len(),
                    method.to_string().as_str(),
                );
            }
            if let Some(recent) = self.recent {
                recent.push(next);
            }

            hops.push(hop);
            current = next;
        }

        let outcome = outcome.unwrap_or_else(|| {
            debug!("Route ran into the hop cap of {}", self.config.max_hops);
            if let Ok(node) = self.net.get(current) {
                self.trust.record(node, HopOutcome::Failure);
            }
            RouteOutcome::Exhausted
        });

        let final_node = *path.last().unwrap_or(&start);
        let result = RouteResult {
            start,
            final_node,
            total_hops: path.len().saturating_sub(1),
            path,
            hops,
            outcome,
            reroutes,
            total_latency_ms,
        };
        info!(
            "Route {} -> {}: {} after {} hops ({} reroutes)",
            self.net.node_name(start)?,
            self.net.node_name(final_node)?,
            result.outcome,
            result.total_hops,
            result.reroutes
        );
        if let Some(obs) = self.observer {
            obs.record_route(&result);
        }
        Ok(result)
    }
}
