//! Configuration types
//!
//! Mirror of the network snapshot file. Names stay as written (strings for
//! references between sections) so validation can report dangling ones;
//! `build` turns a validated file into the dataplane model.

use crate::dataplane::{InterfaceAddress, IpSpace, PortRange, Prefix};
use crate::telemetry::LogConfig;
use crate::traceroute::EngineSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Network snapshot (network.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub log: Option<LogConfig>,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    /// ACL name -> ordered lines
    #[serde(default)]
    pub acls: BTreeMap<String, Vec<AclLineConfig>>,
    #[serde(default)]
    pub ip_spaces: BTreeMap<String, IpSpace>,
    /// Selected routes of every VRF, as the control plane left them
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub vrf: Option<String>,
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
    pub incoming_filter: Option<String>,
    pub outgoing_filter: Option<String>,
    #[serde(default)]
    pub source_nat: Vec<NatRuleConfig>,
    #[serde(default)]
    pub destination_nat: Vec<NatRuleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatRuleConfig {
    /// Guard ACL
    pub acl: Option<String>,
    pub pool_start: Option<Ipv4Addr>,
    pub pool_end: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionConfig {
    Permit,
    Deny,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AclLineConfig {
    pub action: ActionConfig,
    /// "tcp", "udp", "icmp" or a protocol number
    pub protocol: Option<String>,
    pub src: Option<Prefix>,
    pub dst: Option<Prefix>,
    /// Named IP space of the same node
    pub src_space: Option<String>,
    pub dst_space: Option<String>,
    pub src_port: Option<PortRange>,
    pub dst_port: Option<PortRange>,
    pub in_interface: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub vrf: Option<String>,
    pub prefix: Prefix,
    pub next_hop: Option<Ipv4Addr>,
    pub interface: Option<String>,
    #[serde(default)]
    pub metric: u32,
    /// connected, static, ospf, bgp, other
    #[serde(default)]
    pub source: Option<String>,
}

/// Link between two "node:interface" endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
    /// Also add the reverse edge
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardingConfig {
    /// Interfaces answer ARP for their own addresses in addition to the
    /// explicit `arp_replies`
    #[serde(default = "default_true")]
    pub infer_arp_replies: bool,
    /// "node:interface" -> addresses it answers ARP for
    #[serde(default)]
    pub arp_replies: BTreeMap<String, IpSpace>,
    #[serde(default)]
    pub neighbor_unreachable: Vec<NeighborUnreachableConfig>,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            infer_arp_replies: true,
            arp_replies: BTreeMap::new(),
            neighbor_unreachable: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborUnreachableConfig {
    pub node: String,
    #[serde(default)]
    pub vrf: Option<String>,
    pub interface: String,
    pub space: IpSpace,
}

fn default_true() -> bool {
    true
}

/// Flow list (flows.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowsConfig {
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    pub ingress_node: String,
    pub ingress_interface: Option<String>,
    pub ingress_vrf: Option<String>,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Option<Ipv4Addr>,
    /// Defaults to tcp
    pub protocol: Option<String>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}
