//! Configuration validation

use super::{NatRuleConfig, NetworkConfig, NodeConfig};
use crate::dataplane::{NodeInterface, NULL_INTERFACE_NAME};
use crate::flow::{protocol, DEFAULT_VRF};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a network snapshot and return warnings/errors
pub fn validate(config: &NetworkConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.engine.max_hops == 0 {
        result.error("engine.max_hops: must be at least 1");
    }
    if config.engine.max_branches == 0 {
        result.error("engine.max_branches: must be at least 1");
    }

    for (name, node) in &config.nodes {
        validate_interfaces(name, node, &mut result);
        validate_acls(name, node, &mut result);
        validate_routes(name, node, &mut result);
    }
    validate_edges(config, &mut result);
    validate_forwarding(config, &mut result);

    result
}

fn validate_interfaces(name: &str, node: &NodeConfig, result: &mut ValidationResult) {
    for (iface_name, iface) in &node.interfaces {
        let path = format!("nodes.{}.interfaces.{}", name, iface_name);

        for filter in [&iface.incoming_filter, &iface.outgoing_filter]
            .into_iter()
            .flatten()
        {
            if !node.acls.contains_key(filter) {
                result.error(format!("{}: filter '{}' not defined", path, filter));
            }
        }

        for (kind, rules) in [
            ("source_nat", &iface.source_nat),
            ("destination_nat", &iface.destination_nat),
        ] {
            for (i, rule) in rules.iter().enumerate() {
                validate_nat_rule(&format!("{}.{}[{}]", path, kind, i), rule, node, result);
            }
        }

        if iface.addresses.is_empty() && iface_name.as_str() != NULL_INTERFACE_NAME {
            result.warn(format!("{}: no addresses, interface owns no IPs", path));
        }
    }
}

fn validate_nat_rule(
    path: &str,
    rule: &NatRuleConfig,
    node: &NodeConfig,
    result: &mut ValidationResult,
) {
    match rule.acl {
        None => result.warn(format!("{}: no guard ACL, rule never matches", path)),
        Some(ref acl) if !node.acls.contains_key(acl) => result.warn(format!(
            "{}: guard ACL '{}' not defined, rule never matches",
            path, acl
        )),
        Some(_) => {}
    }

    match (rule.pool_start, rule.pool_end) {
        (None, _) => result.warn(format!(
            "{}: no pool, tracing fails if this rule matches",
            path
        )),
        (Some(start), Some(end)) if start > end => result.error(format!(
            "{}: invalid pool - start ({}) > end ({})",
            path, start, end
        )),
        _ => {}
    }
}

fn validate_acls(name: &str, node: &NodeConfig, result: &mut ValidationResult) {
    for (acl_name, lines) in &node.acls {
        for (i, line) in lines.iter().enumerate() {
            let path = format!("nodes.{}.acls.{}[{}]", name, acl_name, i);

            if let Some(ref proto) = line.protocol {
                if protocol::parse(proto).is_none() {
                    result.error(format!("{}: unknown protocol '{}'", path, proto));
                }
            }

            for space in [&line.src_space, &line.dst_space].into_iter().flatten() {
                if !node.ip_spaces.contains_key(space) {
                    result.warn(format!(
                        "{}: IP space '{}' not defined, line never matches",
                        path, space
                    ));
                }
            }

            if let Some(ref iface) = line.in_interface {
                if !node.interfaces.contains_key(iface) {
                    result.warn(format!("{}: interface '{}' not defined", path, iface));
                }
            }
        }
    }
}

fn validate_routes(name: &str, node: &NodeConfig, result: &mut ValidationResult) {
    let vrfs: BTreeSet<&str> = node
        .interfaces
        .values()
        .map(|i| i.vrf.as_deref().unwrap_or(DEFAULT_VRF))
        .collect();

    for (i, route) in node.routes.iter().enumerate() {
        let path = format!("nodes.{}.routes[{}]", name, i);

        if let Some(ref iface) = route.interface {
            if !node.interfaces.contains_key(iface) && iface.as_str() != NULL_INTERFACE_NAME {
                result.error(format!("{}: interface '{}' not defined", path, iface));
            }
        }

        if route.interface.is_none() && route.next_hop.is_none() {
            result.error(format!("{}: needs a next_hop or an interface", path));
        }

        let vrf = route.vrf.as_deref().unwrap_or(DEFAULT_VRF);
        if !vrfs.contains(vrf) {
            result.warn(format!("{}: vrf '{}' has no interfaces", path, vrf));
        }

        if let Some(ref source) = route.source {
            if crate::dataplane::RouteSource::parse(source).is_none() {
                result.error(format!("{}: unknown source '{}'", path, source));
            }
        }
    }
}

/// Check a "node:interface" reference; returns a message when it dangles
fn check_endpoint(config: &NetworkConfig, endpoint: &str) -> Option<String> {
    let Some(ni) = NodeInterface::parse(endpoint) else {
        return Some(format!("'{}' is not node:interface", endpoint));
    };
    let Some(node) = config.nodes.get(&ni.node) else {
        return Some(format!("node '{}' not defined", ni.node));
    };
    if !node.interfaces.contains_key(&ni.interface) {
        return Some(format!("interface '{}' not defined on {}", ni.interface, ni.node));
    }
    None
}

fn validate_edges(config: &NetworkConfig, result: &mut ValidationResult) {
    for (i, edge) in config.edges.iter().enumerate() {
        for endpoint in [&edge.from, &edge.to] {
            if let Some(msg) = check_endpoint(config, endpoint) {
                result.error(format!("edges[{}]: {}", i, msg));
            }
        }
    }
}

fn validate_forwarding(config: &NetworkConfig, result: &mut ValidationResult) {
    for endpoint in config.forwarding.arp_replies.keys() {
        match NodeInterface::parse(endpoint) {
            None => result.error(format!(
                "forwarding.arp_replies: '{}' is not node:interface",
                endpoint
            )),
            Some(_) => {
                if let Some(msg) = check_endpoint(config, endpoint) {
                    result.warn(format!("forwarding.arp_replies: {}", msg));
                }
            }
        }
    }

    for (i, entry) in config.forwarding.neighbor_unreachable.iter().enumerate() {
        let endpoint = format!("{}:{}", entry.node, entry.interface);
        if let Some(msg) = check_endpoint(config, &endpoint) {
            result.warn(format!("forwarding.neighbor_unreachable[{}]: {}", i, msg));
        }
    }
}
