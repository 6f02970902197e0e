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

//! Candidate filtering and ranking for one hop.
//!
//! The pipeline is fixed: alive neighbors, role filter (when the request requires a role),
//! mandatory capacity filter, visited-set exclusion, scoring, then a load-balance tie-break
//! that prefers a candidate outside the recent-hop window when several land within 5% of the
//! top score. The per-node cache is consulted before all of this, but a cached id is only a
//! hint: it goes through the very same validity checks before it is returned.

use crate::geometry::{Vector, DISTANCE_EPSILON};
use crate::net::{Network, NodeId, Role};
use crate::routing::score::ScoringWeights;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Candidates within this relative window below the top score count as ties for the
/// load-balance preference.
const TIE_WINDOW: f64 = 0.05;

/// One scored candidate of a hop, kept on the hop record for observability.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    /// The candidate node
    pub node: NodeId,
    /// Its score (higher is better)
    pub score: f64,
    /// Its distance to the target
    pub distance_to_target: f64,
    /// Whether hopping there strictly decreases the distance to the target
    pub improves: bool,
    /// Load at scoring time
    pub load: f64,
    /// Trust at scoring time
    pub trust: f64,
    /// Latency estimate at scoring time
    pub latency_ms: f64,
}

/// Rank all valid candidates for the next hop, best first. Returns an empty vector when the
/// filters leave nothing, which is the signal for the executor to try face routing.
pub fn rank_candidates(
    net: &Network,
    weights: &ScoringWeights,
    current: NodeId,
    target: &Vector,
    required_role: Option<&Role>,
    visited: &HashSet<NodeId>,
    recent: &[NodeId],
) -> Vec<CandidateScore> {
    let dist_current = match net.get(current) {
        Ok(node) => node.position().distance(target),
        Err(_) => return Vec::new(),
    };

    let mut candidates: Vec<CandidateScore> = Vec::new();
    for id in net.alive_neighbors(current) {
        if visited.contains(&id) {
            continue;
        }
        let node = match net.get(id) {
            Ok(n) => n,
            Err(_) => continue,
        };
        if let Some(role) = required_role {
            if node.role() != role {
                continue;
            }
        }
        let snapshot = node.snapshot();
        // mandatory capacity filter
        if snapshot.load >= node.capacity() {
            continue;
        }
        let distance = node.position().distance(target);
        candidates.push(CandidateScore {
            node: id,
            score: weights.score(node.position(), &snapshot, node.capacity(), target),
            distance_to_target: distance,
            improves: distance < dist_current - DISTANCE_EPSILON,
            load: snapshot.load,
            trust: snapshot.trust,
            latency_ms: snapshot.latency_ms,
        });
    }

    candidates
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    apply_tie_break(&mut candidates, recent);
    candidates
}

/// Among the candidates within [`TIE_WINDOW`] of the top score, move the first one outside the
/// recent-hop window to the front. When every near-tie is recent, the order stays as scored.
fn apply_tie_break(candidates: &mut [CandidateScore], recent: &[NodeId]) {
    if candidates.len() < 2 || recent.is_empty() {
        return;
    }
    let top = candidates[0].score;
    if recent.iter().all(|r| *r != candidates[0].node) {
        return;
    }
    let threshold = top - top.abs() * TIE_WINDOW;
    let window = candidates.iter().take_while(|c| c.score >= threshold).count();
    if let Some(pos) =
        candidates.iter().take(window).position(|c| recent.iter().all(|r| *r != c.node))
    {
        candidates[..=pos].rotate_right(1);
    }
}

/// Look up and validate the cached next hop for this target. Returns the cached neighbor only
/// if it is still a live, within-capacity, role-matching neighbor that the route has neither
/// visited nor recently used. Anything else falls through to the full ranking.
pub fn cache_candidate(
    net: &Network,
    current: NodeId,
    target: &Vector,
    required_role: Option<&Role>,
    visited: &HashSet<NodeId>,
    recent: &[NodeId],
    rounding_decimals: u32,
) -> Option<NodeId> {
    let node = net.get(current).ok()?;
    let id = node.cached_next_hop(&target.key(rounding_decimals))?;
    let cached = net.get(id).ok()?;
    if !net.connected(current, id)
        || !cached.is_alive()
        || cached.at_capacity()
        || visited.contains(&id)
        || recent.contains(&id)
    {
        return None;
    }
    if let Some(role) = required_role {
        if cached.role() != role {
            return None;
        }
    }
    Some(id)
}

/// A small shared ring of recently chosen next hops, used by the tie-break to spread
/// near-equivalent choices across neighbors instead of hammering one of them. Shared across
/// concurrent executors by the simulation driver.
#[derive(Debug)]
pub struct RecentHops {
    max: usize,
    inner: Mutex<VecDeque<NodeId>>,
}

impl RecentHops {
    /// Create a ring remembering the last `max` hops.
    pub fn new(max: usize) -> Self {
        Self { max, inner: Mutex::new(VecDeque::new()) }
    }

    /// Record a chosen hop, evicting the oldest entry when full.
    pub fn push(&self, id: NodeId) {
        let mut inner = self.inner.lock().unwrap();
        inner.push_back(id);
        while inner.len() > self.max {
            inner.pop_front();
        }
    }

    /// Snapshot of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<NodeId> {
        self.inner.lock().unwrap().iter().copied().collect()
    }
}
