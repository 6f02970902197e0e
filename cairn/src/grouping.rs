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

//! Service grouping: mapping free-text requests onto service sections.
//!
//! When a request does not name its required role explicitly, a plain keyword count over the
//! request text decides the target section. This is intentionally dumb (the routing plane
//! must not depend on a model being available), and the table below is the published set of
//! well-known sections. Roles outside this set are perfectly legal; they just cannot be
//! derived from text.

use crate::net::{Network, NodeId, Role};
use std::collections::HashMap;

/// The well-known service sections.
pub const SERVICE_ROLES: [&str; 6] = ["auth", "database", "compute", "vision", "storage", "proxy"];

/// Keywords that vote for each well-known section.
fn keywords(role: &str) -> &'static [&'static str] {
    match role {
        "auth" => &["auth", "login", "authenticate", "token", "credential", "password"],
        "database" => &["database", "db", "query", "sql", "data", "store", "persist"],
        "compute" => &["compute", "calculate", "process", "execute", "run", "task"],
        "vision" => &["vision", "image", "visual", "detect", "recognize", "camera"],
        "storage" => &["storage", "file", "upload", "download", "blob", "object"],
        "proxy" => &["proxy", "forward", "route", "gateway", "redirect"],
        _ => &[],
    }
}

/// Derive the required role from a free-text request. Every keyword occurrence counts one
/// vote; the section with the most votes wins, earlier table entries winning ties. Returns
/// `None` when no keyword matches at all.
pub fn derive_role(request_text: &str) -> Option<Role> {
    let text = request_text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for role in SERVICE_ROLES.iter() {
        let votes = keywords(role).iter().filter(|kw| text.contains(*kw)).count();
        if votes > 0 && best.map(|(_, b)| votes > b).unwrap_or(true) {
            best = Some((role, votes));
        }
    }
    best.map(|(role, _)| Role::from(role))
}

/// Whether a role is one of the well-known service sections.
pub fn is_service_role(role: &Role) -> bool {
    SERVICE_ROLES.contains(&role.as_str())
}

/// Group all nodes of a network by their role.
pub fn nodes_by_role(net: &Network) -> HashMap<Role, Vec<NodeId>> {
    let mut groups: HashMap<Role, Vec<NodeId>> = HashMap::new();
    for id in net.node_ids() {
        let node = net.get(id).unwrap();
        groups.entry(node.role().clone()).or_insert_with(Vec::new).push(id);
    }
    groups
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vector;
    use crate::net::Network;

    #[test]
    fn test_keyword_classification() {
        assert_eq!(derive_role("please authenticate this user"), Some(Role::from("auth")));
        assert_eq!(derive_role("run a heavy task"), Some(Role::from("compute")));
        assert_eq!(derive_role("UPLOAD a file to BLOB storage"), Some(Role::from("storage")));
        assert_eq!(derive_role("detect objects in the camera image"), Some(Role::from("vision")));
        assert_eq!(derive_role("nothing relevant here"), None);
        assert_eq!(derive_role(""), None);
    }

    #[test]
    fn test_most_votes_wins() {
        // one storage keyword against three database keywords
        let role = derive_role("query the sql database for the file");
        assert_eq!(role, Some(Role::from("database")));
    }

    #[test]
    fn test_service_role_set() {
        assert!(is_service_role(&Role::from("auth")));
        assert!(!is_service_role(&Role::from("default")));
    }

    #[test]
    fn test_grouping() {
        let mut net = Network::new(2);
        let a = net.add_node("A", Vector::new(vec![0.0, 0.0]), Role::from("auth"), 20.0);
        let b = net.add_node("B", Vector::new(vec![1.0, 0.0]), Role::from("auth"), 20.0);
        let c = net.add_node("C", Vector::new(vec![0.0, 1.0]), Role::from("database"), 20.0);
        let groups = nodes_by_role(&net);
        assert_eq!(groups.len(), 2);
        let mut auth = groups[&Role::from("auth")].clone();
        auth.sort();
        assert_eq!(auth, vec![a, b]);
        assert_eq!(groups[&Role::from("database")], vec![c]);
    }
}
