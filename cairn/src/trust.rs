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

//! Dynamic trust updates from observed per-hop outcomes.
//!
//! Trust moves in small bounded steps and stays inside [0, 1]. A low-trust node is shunned
//! through the linear scoring penalty only; it is never hard-excluded, so a section whose
//! nodes all misbehaved stays reachable.

use crate::net::Node;
use log::*;

/// Trust deltas and the response-time thresholds that trigger them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustConfig {
    /// Added on a successful hop
    pub delta_success: f64,
    /// Added on top of the success delta when the response was fast
    pub delta_fast: f64,
    /// Subtracted when a node fails a request
    pub delta_failure: f64,
    /// Subtracted when a node returns an error
    pub delta_error: f64,
    /// Subtracted when a response was slow
    pub delta_slow: f64,
    /// Responses faster than this (milliseconds) earn the fast bonus
    pub fast_ms: f64,
    /// Responses slower than this (milliseconds) count as slow
    pub slow_ms: f64,
    /// Advisory threshold under which a node counts as untrusted
    pub block_threshold: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            delta_success: 0.05,
            delta_fast: 0.02,
            delta_failure: 0.3,
            delta_error: 0.2,
            delta_slow: 0.1,
            fast_ms: 50.0,
            slow_ms: 500.0,
            block_threshold: 0.3,
        }
    }
}

/// Observed outcome of a single hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HopOutcome {
    /// The node handled the request, with the given response time.
    Success {
        /// Response time in milliseconds
        response_time_ms: f64,
    },
    /// The node failed the request (down, unreachable, no next hop).
    Failure,
    /// The node answered with an error.
    Error,
    /// The node answered, but beyond the slow threshold.
    Slow {
        /// Response time in milliseconds
        response_time_ms: f64,
    },
}

/// Applies bounded trust deltas to nodes based on hop outcomes.
#[derive(Debug, Clone, Default)]
pub struct TrustController {
    config: TrustConfig,
}

impl TrustController {
    /// Create a controller with the given deltas.
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    /// The configured deltas and thresholds.
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Apply the delta for an observed outcome.
    pub fn record(&self, node: &Node, outcome: HopOutcome) {
        let delta = match outcome {
            HopOutcome::Success { response_time_ms } => {
                if response_time_ms < self.config.fast_ms {
                    self.config.delta_success + self.config.delta_fast
                } else {
                    self.config.delta_success
                }
            }
            HopOutcome::Failure => -self.config.delta_failure,
            HopOutcome::Error => -self.config.delta_error,
            HopOutcome::Slow { .. } => -self.config.delta_slow,
        };
        let (old, new) = node.adjust_trust(delta);
        if delta < 0.0 {
            warn!("Node {} trust {:.3} -> {:.3} ({:?})", node.name(), old, new, outcome);
        } else {
            trace!("Node {} trust {:.3} -> {:.3} ({:?})", node.name(), old, new, outcome);
        }
    }

    /// Classify a measured response time into success or slow, and apply the delta.
    pub fn record_response(&self, node: &Node, response_time_ms: f64) {
        if response_time_ms > self.config.slow_ms {
            self.record(node, HopOutcome::Slow { response_time_ms });
        } else {
            self.record(node, HopOutcome::Success { response_time_ms });
        }
    }

    /// Fold the outcome of a delegated node-service execution into the node's trust.
    pub fn record_execute(&self, node: &Node, response: &crate::monitor::ExecuteResponse) {
        match response {
            crate::monitor::ExecuteResponse::Ok { response_time_ms } => {
                self.record_response(node, *response_time_ms)
            }
            crate::monitor::ExecuteResponse::Error(_) => self.record(node, HopOutcome::Error),
        }
    }

    /// Whether the node's trust is above the advisory block threshold.
    pub fn is_trusted(&self, node: &Node) -> bool {
        node.trust() >= self.config.block_threshold
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vector;
    use crate::net::Role;
    use assert_approx_eq::assert_approx_eq;

    fn node() -> Node {
        Node::new(
            "N000".to_string(),
            0.into(),
            Vector::new(vec![0.0, 0.0]),
            Role::from("default"),
            20.0,
        )
    }

    #[test]
    fn test_success_and_fast_bonus() {
        let ctrl = TrustController::default();
        assert_approx_eq!(ctrl.config().fast_ms, 50.0);
        let n = node();
        n.set_trust(0.5);
        ctrl.record(&n, HopOutcome::Success { response_time_ms: 200.0 });
        assert_approx_eq!(n.trust(), 0.55);
        ctrl.record(&n, HopOutcome::Success { response_time_ms: 10.0 });
        assert_approx_eq!(n.trust(), 0.62);
    }

    #[test]
    fn test_failure_error_slow() {
        let ctrl = TrustController::default();
        let n = node();
        ctrl.record(&n, HopOutcome::Failure);
        assert_approx_eq!(n.trust(), 0.7);
        ctrl.record(&n, HopOutcome::Error);
        assert_approx_eq!(n.trust(), 0.5);
        ctrl.record(&n, HopOutcome::Slow { response_time_ms: 900.0 });
        assert_approx_eq!(n.trust(), 0.4);
    }

    #[test]
    fn test_clamped_to_unit_interval() {
        let ctrl = TrustController::default();
        let n = node();
        for _ in 0..10 {
            ctrl.record(&n, HopOutcome::Failure);
        }
        assert_approx_eq!(n.trust(), 0.0);
        for _ in 0..40 {
            ctrl.record(&n, HopOutcome::Success { response_time_ms: 1.0 });
        }
        assert_approx_eq!(n.trust(), 1.0);
    }

    #[test]
    fn test_response_classification() {
        let ctrl = TrustController::default();
        let n = node();
        n.set_trust(0.5);
        ctrl.record_response(&n, 600.0);
        assert_approx_eq!(n.trust(), 0.4);
        ctrl.record_response(&n, 100.0);
        assert_approx_eq!(n.trust(), 0.45);
    }

    #[test]
    fn test_execute_outcomes() {
        use crate::monitor::ExecuteResponse;
        let ctrl = TrustController::default();
        let n = node();
        n.set_trust(0.5);
        ctrl.record_execute(&n, &ExecuteResponse::Ok { response_time_ms: 20.0 });
        assert_approx_eq!(n.trust(), 0.57);
        ctrl.record_execute(&n, &ExecuteResponse::Error("boom".to_string()));
        assert_approx_eq!(n.trust(), 0.37);
    }

    #[test]
    fn test_block_threshold_is_advisory() {
        let ctrl = TrustController::default();
        let n = node();
        n.set_trust(0.1);
        assert!(!ctrl.is_trusted(&n));
        n.set_trust(0.3);
        assert!(ctrl.is_trusted(&n));
    }
}
