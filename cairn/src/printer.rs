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

//! # Helper (printer) functions for route results and metrics
//! Formatted, human-readable renderings with node names resolved against the network.

use crate::net::{NetError, Network};
use crate::observe::MetricsSnapshot;
use crate::routing::RouteResult;

/// Render a complete route result as a multi-line report, one block per hop, with the scored
/// candidates of every decision.
pub fn route_result(net: &Network, result: &RouteResult) -> Result<String, NetError> {
    let mut lines: Vec<String> = Vec::new();
    let path_names: Vec<&str> =
        result.path.iter().map(|id| net.node_name(*id)).collect::<Result<_, _>>()?;
    lines.push(format!(
        "route {} -> {}: {} ({} hops, {} reroutes, {:.1} ms)",
        net.node_name(result.start)?,
        net.node_name(result.final_node)?,
        result.outcome,
        result.total_hops,
        result.reroutes,
        result.total_latency_ms,
    ));
    lines.push(format!("  path: {}", path_names.join(" -> ")));

    for hop in &result.hops {
        lines.push(format!(
            "  step {}: {} (distance {:.4})",
            hop.step,
            net.node_name(hop.node)?,
            hop.distance_to_target
        ));
        for candidate in &hop.candidates {
            lines.push(format!(
                "      {:<8} score={:+.4} dist={:.4} load={:.1} trust={:.2}{}",
                net.node_name(candidate.node)?,
                candidate.score,
                candidate.distance_to_target,
                candidate.load,
                candidate.trust,
                if candidate.improves { "  (improves)" } else { "" },
            ));
        }
        if !hop.face_path.is_empty() {
            let face: Vec<&str> =
                hop.face_path.iter().map(|id| net.node_name(*id)).collect::<Result<_, _>>()?;
            lines.push(format!("      face walk: {}", face.join(" -> ")));
        }
        match (hop.terminal, hop.chosen) {
            (Some(reason), _) => lines.push(format!("      terminal: {}", reason)),
            (None, Some(next)) => lines.push(format!(
                "      -> {} ({})",
                net.node_name(next)?,
                hop.method.map(|m| m.to_string()).unwrap_or_default()
            )),
            (None, None) => lines.push("      no next hop".to_string()),
        }
    }
    Ok(lines.join("\n"))
}

/// Render an aggregate metrics snapshot, per-node counters resolved to names and sorted.
pub fn metrics(net: &Network, snapshot: &MetricsSnapshot) -> Result<String, NetError> {
    let mut lines = vec![
        format!(
            "requests: {} ({} ok, {} failed, success rate {:.1}%)",
            snapshot.total_requests,
            snapshot.successes,
            snapshot.failed_routes,
            snapshot.success_rate * 100.0
        ),
        format!(
            "hops: avg {:.2} | latency: avg {:.1} ms | reroutes: {}",
            snapshot.average_hops, snapshot.average_latency_ms, snapshot.total_reroutes
        ),
    ];
    let mut per_node: Vec<(&str, &crate::observe::NodeStats)> = snapshot
        .per_node
        .iter()
        .map(|(id, stats)| net.node_name(*id).map(|name| (name, stats)))
        .collect::<Result<_, _>>()?;
    per_node.sort_by_key(|(name, _)| *name);
    for (name, stats) in per_node {
        lines.push(format!(
            "  {:<8} requests={} ok={} failed={} load avg={:.2} max={:.1}",
            name, stats.requests, stats.successes, stats.failures, stats.load_avg, stats.load_max
        ));
    }
    Ok(lines.join("\n"))
}
