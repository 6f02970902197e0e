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

//! The termination oracle: is the current node the routing endpoint?
//!
//! A route ends here when the current node is strictly closer to the target than every alive
//! neighbor (a tie does not terminate, since the tied neighbor might still make progress), when the
//! node's position points in the target's direction (cosine above the threshold), or when the
//! node has no neighbors at all (an isolated node is trivially its own endpoint).
//!
//! A node whose neighbors exist but are all dead is *not* an endpoint: it is stuck, and the
//! executor reports that as a failed route rather than a delivery. The local-minimum test is
//! therefore never evaluated against an empty neighbor set, where it would hold vacuously.

use crate::geometry::{Vector, DISTANCE_EPSILON};
use crate::net::{Network, NodeId};
use std::fmt;

/// Why the oracle declared the current node terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The current node is strictly closer to the target than every alive neighbor.
    LocalMinimum,
    /// The cosine between the node position and the target exceeds the threshold.
    DirectionMatch,
    /// The node has no neighbors at all, so it is trivially its own endpoint.
    NoAliveNeighbors,
}

impl TerminalReason {
    /// Stable machine-readable code for dashboards and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LocalMinimum => "local_minimum",
            Self::DirectionMatch => "direction_match",
            Self::NoAliveNeighbors => "no_alive_neighbors",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Decide whether `current` is the routing endpoint for `target`. Returns the reason, or
/// `None` when routing should continue.
pub fn check(
    net: &Network,
    current: NodeId,
    target: &Vector,
    cosine_threshold: f64,
) -> Option<TerminalReason> {
    let node = net.get(current).ok()?;
    if net.neighbors(current).is_empty() {
        return Some(TerminalReason::NoAliveNeighbors);
    }
    let neighbors = net.alive_neighbors(current);
    if neighbors.is_empty() {
        // stuck, not delivered: the selector will fail this route
        return None;
    }

    let dist = node.position().distance(target);
    let strictly_closest = neighbors.iter().all(|n| {
        net.get(*n)
            .map(|nb| nb.position().distance(target) > dist + DISTANCE_EPSILON)
            .unwrap_or(true)
    });
    if strictly_closest {
        return Some(TerminalReason::LocalMinimum);
    }

    if node.position().cosine_similarity(target) > cosine_threshold {
        return Some(TerminalReason::DirectionMatch);
    }

    None
}
