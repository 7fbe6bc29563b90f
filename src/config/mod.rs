//! Configuration management
//!
//! Handles network.toml (forwarding-state snapshot plus engine and log
//! settings) and flows.toml (the flows to trace).

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{
    Acl, AclLine, Configuration, Edge, Fib, Fibs, ForwardingAnalysis, ForwardingState, Interface,
    IpSpace, LineAction, NatRule, NodeInterface, Prefix, Route, RouteSource, Topology,
};
use crate::flow::{protocol, Flow, DEFAULT_VRF};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Load a network snapshot from a TOML file
pub fn load_network<P: AsRef<Path>>(path: P) -> Result<NetworkConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse_network(&content)
}

pub fn parse_network(content: &str) -> Result<NetworkConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Load a flow list from a TOML file
pub fn load_flows<P: AsRef<Path>>(path: P) -> Result<Vec<Flow>> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse_flows(&content)
}

pub fn parse_flows(content: &str) -> Result<Vec<Flow>> {
    let config: FlowsConfig = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    config.flows.iter().map(build_flow).collect()
}

fn build_flow(cfg: &FlowConfig) -> Result<Flow> {
    let protocol = match cfg.protocol {
        Some(ref p) => parse_protocol(p)?,
        None => protocol::TCP,
    };
    Ok(Flow {
        ingress_node: cfg.ingress_node.clone(),
        ingress_interface: cfg.ingress_interface.clone(),
        ingress_vrf: cfg.ingress_vrf.clone(),
        src_ip: cfg.src_ip,
        dst_ip: cfg.dst_ip,
        protocol,
        src_port: cfg.src_port,
        dst_port: cfg.dst_port,
    })
}

fn parse_protocol(s: &str) -> Result<u8> {
    protocol::parse(s).ok_or_else(|| Error::Parse(format!("unknown protocol: {}", s)))
}

fn parse_endpoint(s: &str) -> Result<NodeInterface> {
    NodeInterface::parse(s)
        .ok_or_else(|| Error::Parse(format!("expected node:interface, got '{}'", s)))
}

/// Validate a snapshot and turn it into forwarding state.
///
/// Validation warnings are logged; any validation error aborts.
pub fn build(config: &NetworkConfig) -> Result<ForwardingState> {
    let result = validate(config);
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    if result.has_errors() {
        return Err(Error::Config(result.errors.join("; ")));
    }

    let mut configurations = BTreeMap::new();
    let mut fibs = Fibs::new();
    for (name, node) in &config.nodes {
        let configuration = build_node(name, node)?;
        fibs.insert(name.clone(), build_fibs(&configuration, node)?);
        configurations.insert(name.clone(), configuration);
    }

    let topology = build_topology(config)?;
    let forwarding_analysis = build_forwarding_analysis(config, &configurations)?;

    debug!(
        "Built forwarding state: {} nodes, {} edges",
        configurations.len(),
        topology.len()
    );
    Ok(ForwardingState::new(
        configurations,
        fibs,
        forwarding_analysis,
        topology,
    ))
}

fn build_node(name: &str, node: &NodeConfig) -> Result<Configuration> {
    let mut config = Configuration::new(name);

    for (iface_name, iface_cfg) in &node.interfaces {
        let mut iface = Interface::new(iface_name.as_str());
        if let Some(ref vrf) = iface_cfg.vrf {
            iface = iface.with_vrf(vrf.as_str());
        }
        for addr in &iface_cfg.addresses {
            iface = iface.with_address(addr.ip, addr.prefix_len);
        }
        iface.incoming_filter = iface_cfg.incoming_filter.clone();
        iface.outgoing_filter = iface_cfg.outgoing_filter.clone();
        iface.source_nats = iface_cfg.source_nat.iter().map(build_nat_rule).collect();
        iface.destination_nats = iface_cfg.destination_nat.iter().map(build_nat_rule).collect();
        config.add_interface(iface);
    }

    for (acl_name, lines) in &node.acls {
        let lines = lines.iter().map(build_acl_line).collect::<Result<Vec<_>>>()?;
        config.add_acl(Acl::new(acl_name.as_str(), lines));
    }

    config.ip_spaces = node.ip_spaces.clone();
    Ok(config)
}

fn build_nat_rule(cfg: &NatRuleConfig) -> NatRule {
    NatRule {
        acl: cfg.acl.clone(),
        pool_start: cfg.pool_start,
        pool_end: cfg.pool_end.or(cfg.pool_start),
    }
}

fn build_acl_line(cfg: &AclLineConfig) -> Result<AclLine> {
    let action = match cfg.action {
        ActionConfig::Permit => LineAction::Permit,
        ActionConfig::Deny => LineAction::Deny,
    };
    let mut line = AclLine::new(action);
    line.protocol = cfg.protocol.as_deref().map(parse_protocol).transpose()?;
    line.src_ip = cfg.src;
    line.dst_ip = cfg.dst;
    line.src_space = cfg.src_space.clone();
    line.dst_space = cfg.dst_space.clone();
    line.src_port = cfg.src_port;
    line.dst_port = cfg.dst_port;
    line.in_interface = cfg.in_interface.clone();
    Ok(line)
}

/// One FIB per VRF: the configured routes plus a connected route for every
/// interface subnet
fn build_fibs(config: &Configuration, node: &NodeConfig) -> Result<BTreeMap<String, Fib>> {
    let mut routes: BTreeMap<String, Vec<Route>> = BTreeMap::new();

    for iface in config.interfaces.values() {
        let vrf_routes = routes.entry(iface.vrf.clone()).or_default();
        for addr in &iface.addresses {
            vrf_routes.push(Route::connected(addr.subnet(), iface.name.as_str()));
        }
    }

    for route in &node.routes {
        let source = match route.source {
            Some(ref s) => RouteSource::parse(s)
                .ok_or_else(|| Error::Parse(format!("unknown route source: {}", s)))?,
            None => RouteSource::Static,
        };
        let vrf = route.vrf.clone().unwrap_or_else(|| DEFAULT_VRF.to_string());
        routes.entry(vrf).or_default().push(Route {
            prefix: route.prefix,
            next_hop: route.next_hop,
            interface: route.interface.clone(),
            metric: route.metric,
            source,
        });
    }

    Ok(routes
        .into_iter()
        .map(|(vrf, routes)| (vrf, Fib::new(routes)))
        .collect())
}

fn build_topology(config: &NetworkConfig) -> Result<Topology> {
    let mut topology = Topology::new();
    for edge in &config.edges {
        let from = parse_endpoint(&edge.from)?;
        let to = parse_endpoint(&edge.to)?;
        if edge.bidirectional {
            topology.add_link(from, to);
        } else {
            topology.add_edge(Edge::new(from, to));
        }
    }
    Ok(topology)
}

fn build_forwarding_analysis(
    config: &NetworkConfig,
    configurations: &BTreeMap<String, Configuration>,
) -> Result<ForwardingAnalysis> {
    let mut arp: BTreeMap<NodeInterface, Vec<Prefix>> = BTreeMap::new();

    if config.forwarding.infer_arp_replies {
        for node in configurations.values() {
            for iface in node.interfaces.values() {
                arp.entry(NodeInterface::new(node.hostname.as_str(), iface.name.as_str()))
                    .or_default()
                    .extend(iface.addresses.iter().map(|a| Prefix::host(a.ip)));
            }
        }
    }

    for (endpoint, space) in &config.forwarding.arp_replies {
        arp.entry(parse_endpoint(endpoint)?)
            .or_default()
            .extend(space.prefixes().iter().copied());
    }

    let mut fa = ForwardingAnalysis::new();
    for (ni, prefixes) in arp {
        fa.set_arp_replies(&ni.node, &ni.interface, IpSpace::from_prefixes(prefixes));
    }
    for entry in &config.forwarding.neighbor_unreachable {
        let vrf = entry.vrf.as_deref().unwrap_or(DEFAULT_VRF);
        fa.set_neighbor_unreachable(&entry.node, vrf, &entry.interface, entry.space.clone());
    }
    Ok(fa)
}
