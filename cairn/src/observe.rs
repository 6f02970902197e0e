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

//! In-memory observability sink for the routing plane.
//!
//! Bounded ring buffers keep the most recent routing decisions, reroutes, failures and
//! security blocks; rollup counters aggregate everything since start. Writes are O(1) and go
//! through one internal mutex, so concurrent executors share a single sink. Aggregates are
//! eventually consistent with route completions: a route shows up in the rollups once its
//! result is recorded, never partially.

use crate::net::NodeId;
use crate::routing::executor::{HopMethod, RouteOutcome, RouteResult};
use log::*;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default bound of every ring buffer.
const DEFAULT_HISTORY: usize = 1000;

/// Load samples kept per node.
const LOAD_SAMPLES: usize = 100;

/// A fixed-capacity FIFO buffer that evicts the oldest entry on overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self { buf: VecDeque::with_capacity(cap.min(1024)), cap }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, value: T) {
        if self.cap == 0 {
            return;
        }
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    fn clear(&mut self) {
        self.buf.clear();
    }
}

/// One recorded routing decision.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    /// Node that made the decision
    pub at: NodeId,
    /// Chosen next hop, `None` when the decision failed
    pub chosen: Option<NodeId>,
    /// How the hop was found
    pub method: Option<HopMethod>,
    /// Number of scored candidates
    pub candidates: usize,
    /// Human-readable reason
    pub reason: String,
}

/// One recorded reroute (self-healing or face-routing excursion).
#[derive(Debug, Clone)]
pub struct RerouteRecord {
    /// Node where the reroute happened
    pub from: NodeId,
    /// Replacement next hop, if one was found
    pub to: Option<NodeId>,
    /// Why the reroute happened
    pub reason: String,
}

/// One recorded failure event.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Node the failure is attributed to
    pub node: NodeId,
    /// Failure description
    pub reason: String,
}

/// One blocked request, as reported by an outer gateway.
#[derive(Debug, Clone)]
pub struct SecurityBlockRecord {
    /// Client that issued the blocked request
    pub client_id: String,
    /// Why the request was blocked
    pub reason: String,
}

/// Per-node rollup counters.
#[derive(Debug, Clone, Default)]
struct NodeCounters {
    requests: usize,
    successes: usize,
    failures: usize,
    load_samples: VecDeque<f64>,
}

#[derive(Debug)]
struct Inner {
    decisions: RingBuffer<DecisionRecord>,
    reroutes: RingBuffer<RerouteRecord>,
    failures: RingBuffer<FailureRecord>,
    security_blocks: RingBuffer<SecurityBlockRecord>,
    total_requests: usize,
    successes: usize,
    failed_routes: usize,
    total_hops: usize,
    total_reroutes: usize,
    total_latency_ms: f64,
    per_node: HashMap<NodeId, NodeCounters>,
}

impl Inner {
    fn new(history: usize) -> Self {
        Self {
            decisions: RingBuffer::new(history),
            reroutes: RingBuffer::new(history),
            failures: RingBuffer::new(history),
            security_blocks: RingBuffer::new(history),
            total_requests: 0,
            successes: 0,
            failed_routes: 0,
            total_hops: 0,
            total_reroutes: 0,
            total_latency_ms: 0.0,
            per_node: HashMap::new(),
        }
    }
}

/// The observability sink. All methods take `&self`; concurrent executors share one instance
/// behind an `Arc`.
#[derive(Debug)]
pub struct Observability {
    inner: Mutex<Inner>,
}

impl Default for Observability {
    fn default() -> Self {
        Self::new()
    }
}

impl Observability {
    /// Create a sink with the default history bound.
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Create a sink whose ring buffers keep at most `history` records each.
    pub fn with_history(history: usize) -> Self {
        Self { inner: Mutex::new(Inner::new(history)) }
    }

    /// Record one routing decision.
    pub fn record_decision(
        &self,
        at: NodeId,
        chosen: Option<NodeId>,
        method: Option<HopMethod>,
        candidates: usize,
        reason: &str,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.decisions.push(DecisionRecord {
            at,
            chosen,
            method,
            candidates,
            reason: reason.to_string(),
        });
    }

    /// Record a reroute event.
    pub fn record_reroute(&self, from: NodeId, to: Option<NodeId>, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_reroutes += 1;
        inner.reroutes.push(RerouteRecord { from, to, reason: reason.to_string() });
    }

    /// Record a failure event.
    pub fn record_failure(&self, node: NodeId, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.push(FailureRecord { node, reason: reason.to_string() });
        inner.per_node.entry(node).or_default().failures += 1;
    }

    /// Record a request blocked before it reached the routing plane.
    pub fn record_security_block(&self, client_id: &str, reason: &str) {
        warn!("Security block for client {}: {}", client_id, reason);
        let mut inner = self.inner.lock().unwrap();
        inner.security_blocks.push(SecurityBlockRecord {
            client_id: client_id.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Record a load sample for a node, keeping the most recent window.
    pub fn record_load_sample(&self, node: NodeId, load: f64) {
        let mut inner = self.inner.lock().unwrap();
        let counters = inner.per_node.entry(node).or_default();
        if counters.load_samples.len() == LOAD_SAMPLES {
            counters.load_samples.pop_front();
        }
        counters.load_samples.push_back(load);
    }

    /// Fold a completed route into the rollups.
    pub fn record_route(&self, result: &RouteResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_requests += 1;
        inner.total_hops += result.total_hops;
        inner.total_latency_ms += result.total_latency_ms;
        inner.per_node.entry(result.start).or_default().requests += 1;
        match result.outcome {
            RouteOutcome::Succeeded(_) => {
                inner.successes += 1;
                inner.per_node.entry(result.final_node).or_default().successes += 1;
            }
            _ => {
                inner.failed_routes += 1;
                inner.per_node.entry(result.final_node).or_default().failures += 1;
            }
        }
    }

    /// Aggregate snapshot of everything recorded so far.
    pub fn summary(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();
        let n = inner.total_requests;
        MetricsSnapshot {
            total_requests: n,
            successes: inner.successes,
            failed_routes: inner.failed_routes,
            success_rate: if n == 0 { 0.0 } else { inner.successes as f64 / n as f64 },
            average_hops: if n == 0 { 0.0 } else { inner.total_hops as f64 / n as f64 },
            average_latency_ms: if n == 0 {
                0.0
            } else {
                inner.total_latency_ms / n as f64
            },
            total_reroutes: inner.total_reroutes,
            per_node: inner
                .per_node
                .iter()
                .map(|(id, c)| {
                    let samples = c.load_samples.len();
                    let (avg, max) = if samples == 0 {
                        (0.0, 0.0)
                    } else {
                        (
                            c.load_samples.iter().sum::<f64>() / samples as f64,
                            c.load_samples.iter().cloned().fold(f64::MIN, f64::max),
                        )
                    };
                    (
                        *id,
                        NodeStats {
                            requests: c.requests,
                            successes: c.successes,
                            failures: c.failures,
                            load_avg: avg,
                            load_max: max,
                            load_samples: samples,
                        },
                    )
                })
                .collect(),
        }
    }

    /// The `n` most recent routing decisions, newest last.
    pub fn recent_decisions(&self, n: usize) -> Vec<DecisionRecord> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.decisions.len().saturating_sub(n);
        inner.decisions.iter().skip(skip).cloned().collect()
    }

    /// The `n` most recent reroutes, newest last.
    pub fn recent_reroutes(&self, n: usize) -> Vec<RerouteRecord> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.reroutes.len().saturating_sub(n);
        inner.reroutes.iter().skip(skip).cloned().collect()
    }

    /// The `n` most recent failures, newest last.
    pub fn recent_failures(&self, n: usize) -> Vec<FailureRecord> {
        let inner = self.inner.lock().unwrap();
        let skip = inner.failures.len().saturating_sub(n);
        inner.failures.iter().skip(skip).cloned().collect()
    }

    /// Number of recorded security blocks.
    pub fn security_block_count(&self) -> usize {
        self.inner.lock().unwrap().security_blocks.len()
    }

    /// Drop all records and counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.decisions.clear();
        inner.reroutes.clear();
        inner.failures.clear();
        inner.security_blocks.clear();
        inner.total_requests = 0;
        inner.successes = 0;
        inner.failed_routes = 0;
        inner.total_hops = 0;
        inner.total_reroutes = 0;
        inner.total_latency_ms = 0.0;
        inner.per_node.clear();
    }
}

/// Aggregated metrics of the sink.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Number of completed routes
    pub total_requests: usize,
    /// Number of successful routes
    pub successes: usize,
    /// Number of failed routes (including section failures)
    pub failed_routes: usize,
    /// successes / total_requests
    pub success_rate: f64,
    /// Mean hops per route
    pub average_hops: f64,
    /// Mean accumulated latency per route
    pub average_latency_ms: f64,
    /// Total reroute events
    pub total_reroutes: usize,
    /// Per-node counters
    pub per_node: HashMap<NodeId, NodeStats>,
}

/// Per-node aggregates.
#[derive(Debug, Clone)]
pub struct NodeStats {
    /// Routes started at this node
    pub requests: usize,
    /// Routes successfully terminated here
    pub successes: usize,
    /// Failures attributed to this node
    pub failures: usize,
    /// Mean of the retained load samples
    pub load_avg: f64,
    /// Largest retained load sample
    pub load_max: f64,
    /// Number of retained load samples
    pub load_samples: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_buffer_eviction() {
        let mut ring: RingBuffer<usize> = RingBuffer::new(3);
        assert!(ring.is_empty());
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_decision_history_is_bounded() {
        let sink = Observability::with_history(2);
        for i in 0..4u32 {
            sink.record_decision(i.into(), None, None, 0, "no candidates");
        }
        let recent = sink.recent_decisions(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].at, 2.into());
        assert_eq!(recent[1].at, 3.into());
    }

    #[test]
    fn test_load_sample_window() {
        let sink = Observability::new();
        let id: NodeId = 0.into();
        for i in 0..(LOAD_SAMPLES + 20) {
            sink.record_load_sample(id, i as f64);
        }
        let snap = sink.summary();
        let stats = &snap.per_node[&id];
        assert_eq!(stats.load_samples, LOAD_SAMPLES);
        assert_eq!(stats.load_max, (LOAD_SAMPLES + 19) as f64);
    }

    #[test]
    fn test_recent_failures_and_reroutes() {
        let sink = Observability::new();
        let id: NodeId = 3.into();
        sink.record_failure(id, "went down mid-route");
        sink.record_reroute(id, Some(4.into()), "node_failure");
        sink.record_reroute(id, None, "face_routing");
        let failures = sink.recent_failures(10);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].node, id);
        let reroutes = sink.recent_reroutes(1);
        assert_eq!(reroutes.len(), 1);
        assert_eq!(reroutes[0].reason, "face_routing");
        assert_eq!(sink.summary().total_reroutes, 2);
    }

    #[test]
    fn test_security_blocks_and_reset() {
        let sink = Observability::new();
        sink.record_security_block("client-7", "invalid signature");
        sink.record_security_block("client-7", "replayed nonce");
        assert_eq!(sink.security_block_count(), 2);
        sink.reset();
        assert_eq!(sink.security_block_count(), 0);
        assert_eq!(sink.summary().total_requests, 0);
    }
}
