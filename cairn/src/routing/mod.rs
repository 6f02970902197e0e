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

//! # The routing plane
//!
//! Everything that happens between receiving a request at a start node and producing a
//! [`RouteResult`](executor::RouteResult): scoring, candidate selection, termination, the
//! face-routing fallback, and the executor that ties them together. Decisions are strictly
//! local: each step looks at one node and its direct neighbors, nothing else.

pub mod executor;
pub mod face;
pub mod score;
pub mod selector;
pub mod termination;

pub use executor::{
    FailureReason, HopMethod, HopRecord, Request, RouteExecutor, RouteOutcome, RouteResult,
};
pub use face::FaceWalk;
pub use score::ScoringWeights;
pub use selector::{CandidateScore, RecentHops};
pub use termination::TerminalReason;

use std::time::Duration;

/// Behavior of the per-node route cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether the cache fast-path is consulted (and written) at all. Every route must
    /// produce the same outcome with the cache disabled; it is purely an optimization.
    pub enabled: bool,
    /// Decimals the target vector is rounded to when forming the cache key
    pub rounding_decimals: u32,
    /// Bound on cached entries per node
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, rounding_decimals: 4, max_entries: 32 }
    }
}

/// All tunables of the routing plane. The defaults are the published contract.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Weights of the scoring function
    pub weights: ScoringWeights,
    /// Cosine threshold of the direction-match termination condition
    pub cosine_threshold: f64,
    /// Hard cap on hops per route
    pub max_hops: usize,
    /// Wall-clock ceiling per route
    pub route_timeout: Duration,
    /// Step budget of one face-routing excursion
    pub face_step_budget: usize,
    /// Route cache behavior
    pub cache: CacheConfig,
    /// Trust deltas applied from observed hop outcomes
    pub trust: crate::trust::TrustConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            cosine_threshold: 0.95,
            max_hops: 50,
            route_timeout: Duration::from_secs(5),
            face_step_budget: 30,
            cache: CacheConfig::default(),
            trust: crate::trust::TrustConfig::default(),
        }
    }
}
