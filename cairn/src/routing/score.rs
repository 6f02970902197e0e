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

//! The published per-candidate scoring function.
//!
//! ```text
//! score = W_sem   * cos(neighbor.position, target)
//!       + W_trust * neighbor.trust
//!       - W_load  * clamp(neighbor.load / neighbor.capacity, 0, 1)
//!       - W_lat   * clamp(neighbor.latency / L_MAX, 0, 1)
//! ```
//!
//! The formula is the contract; the weights are configuration. Keeping it linear gives two
//! monotonicities the tests pin down: lowering a candidate's load strictly raises its score,
//! and lowering its trust strictly lowers it.

use crate::geometry::Vector;
use crate::net::NodeSnapshot;

/// Weights of the scoring function, together with the latency normalization ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    /// Weight of the semantic term (cosine between candidate position and target)
    pub semantic: f64,
    /// Weight of the trust term
    pub trust: f64,
    /// Weight of the load penalty
    pub load: f64,
    /// Weight of the latency penalty
    pub latency: f64,
    /// Latency above this ceiling (in milliseconds) saturates the latency penalty
    pub latency_ceiling_ms: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { semantic: 0.5, trust: 0.2, load: 0.2, latency: 0.1, latency_ceiling_ms: 1000.0 }
    }
}

impl ScoringWeights {
    /// Score one candidate neighbor for a fixed target. Higher is better. `snapshot` is the
    /// per-hop view of the candidate's dynamic scalars, `capacity` its static capacity.
    pub fn score(
        &self,
        position: &Vector,
        snapshot: &NodeSnapshot,
        capacity: f64,
        target: &Vector,
    ) -> f64 {
        let semantic = position.cosine_similarity(target);
        let load_penalty = clamp01(snapshot.load / capacity);
        let latency_penalty = clamp01(snapshot.latency_ms / self.latency_ceiling_ms);
        self.semantic * semantic + self.trust * snapshot.trust
            - self.load * load_penalty
            - self.latency * latency_penalty
    }
}

fn clamp01(x: f64) -> f64 {
    x.max(0.0).min(1.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn snapshot(load: f64, trust: f64, latency_ms: f64) -> NodeSnapshot {
        NodeSnapshot { alive: true, load, trust, latency_ms }
    }

    #[test]
    fn test_default_weights() {
        let w = ScoringWeights::default();
        let target = Vector::new(vec![1.0, 0.0]);
        let position = Vector::new(vec![2.0, 0.0]);
        // perfectly aligned, full trust, no load, no latency
        let s = w.score(&position, &snapshot(0.0, 1.0, 0.0), 20.0, &target);
        assert_approx_eq!(s, 0.5 + 0.2);
        // half load and saturated latency pull the score down
        let s = w.score(&position, &snapshot(10.0, 1.0, 2000.0), 20.0, &target);
        assert_approx_eq!(s, 0.5 + 0.2 - 0.1 - 0.1);
    }

    #[test]
    fn test_less_load_scores_strictly_higher() {
        let w = ScoringWeights::default();
        let target = Vector::new(vec![0.5, 0.5]);
        let position = Vector::new(vec![0.3, 0.4]);
        let busy = w.score(&position, &snapshot(10.0, 0.8, 100.0), 20.0, &target);
        let idle = w.score(&position, &snapshot(2.0, 0.8, 100.0), 20.0, &target);
        assert!(idle > busy);
    }

    #[test]
    fn test_less_trust_scores_strictly_lower() {
        let w = ScoringWeights::default();
        let target = Vector::new(vec![0.5, 0.5]);
        let position = Vector::new(vec![0.3, 0.4]);
        let trusted = w.score(&position, &snapshot(5.0, 0.9, 100.0), 20.0, &target);
        let shady = w.score(&position, &snapshot(5.0, 0.2, 100.0), 20.0, &target);
        assert!(shady < trusted);
        assert_approx_eq!(trusted - shady, 0.2 * 0.7);
    }

    #[test]
    fn test_penalties_saturate() {
        let w = ScoringWeights::default();
        let target = Vector::new(vec![1.0, 1.0]);
        let position = Vector::new(vec![1.0, 1.0]);
        // load far beyond capacity and latency far beyond the ceiling clamp to the same
        // penalty as exactly reaching them
        let at = w.score(&position, &snapshot(20.0, 0.5, 1000.0), 20.0, &target);
        let beyond = w.score(&position, &snapshot(500.0, 0.5, 60_000.0), 20.0, &target);
        assert_approx_eq!(at, beyond);
    }
}
