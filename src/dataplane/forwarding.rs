//! Forwarding analysis predicates and IP ownership
//!
//! ARP reply and neighbor-unreachable spaces are produced by a control-plane
//! analysis this crate does not perform; they are supplied as data.

use super::ip::IpSpace;
use super::node::Configuration;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Per-interface ARP and neighbor reachability predicates
#[derive(Debug, Clone, Default)]
pub struct ForwardingAnalysis {
    /// node -> interface -> addresses the interface answers ARP for
    arp_replies: BTreeMap<String, BTreeMap<String, IpSpace>>,
    /// node -> vrf -> interface -> next hops that would not answer
    neighbor_unreachable: BTreeMap<String, BTreeMap<String, BTreeMap<String, IpSpace>>>,
}

impl ForwardingAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_arp_replies(&mut self, node: &str, interface: &str, space: IpSpace) {
        self.arp_replies
            .entry(node.to_string())
            .or_default()
            .insert(interface.to_string(), space);
    }

    pub fn set_neighbor_unreachable(
        &mut self,
        node: &str,
        vrf: &str,
        interface: &str,
        space: IpSpace,
    ) {
        self.neighbor_unreachable
            .entry(node.to_string())
            .or_default()
            .entry(vrf.to_string())
            .or_default()
            .insert(interface.to_string(), space);
    }

    /// Would `interface` on `node` answer an ARP request for `ip`?
    ///
    /// Interfaces without an entry answer nothing.
    pub fn is_arp_successful(&self, node: &str, interface: &str, ip: Ipv4Addr) -> bool {
        self.arp_replies
            .get(node)
            .and_then(|ifaces| ifaces.get(interface))
            .map(|space| space.contains(ip))
            .unwrap_or(false)
    }

    /// Is `ip` unreachable as a neighbor out of `interface`?
    ///
    /// Interfaces without an entry have every neighbor reachable.
    pub fn is_neighbor_unreachable(
        &self,
        node: &str,
        vrf: &str,
        interface: &str,
        ip: Ipv4Addr,
    ) -> bool {
        self.neighbor_unreachable
            .get(node)
            .and_then(|vrfs| vrfs.get(vrf))
            .and_then(|ifaces| ifaces.get(interface))
            .map(|space| space.contains(ip))
            .unwrap_or(false)
    }
}

/// Which node/VRF owns which address
#[derive(Debug, Clone, Default)]
pub struct IpOwners {
    owners: BTreeMap<Ipv4Addr, BTreeMap<String, BTreeSet<String>>>,
}

impl IpOwners {
    /// Collect owners from the interface addresses of every node
    pub fn from_configurations<'a>(configs: impl IntoIterator<Item = &'a Configuration>) -> Self {
        let mut owners: BTreeMap<Ipv4Addr, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for config in configs {
            for iface in config.interfaces.values() {
                for addr in &iface.addresses {
                    owners
                        .entry(addr.ip)
                        .or_default()
                        .entry(config.hostname.clone())
                        .or_default()
                        .insert(iface.vrf.clone());
                }
            }
        }
        Self { owners }
    }

    /// Check if `ip` belongs to `vrf` on `node`
    pub fn is_owned_by(&self, ip: Ipv4Addr, node: &str, vrf: &str) -> bool {
        self.owners
            .get(&ip)
            .and_then(|nodes| nodes.get(node))
            .map(|vrfs| vrfs.contains(vrf))
            .unwrap_or(false)
    }

    /// Nodes owning `ip` in any VRF
    pub fn owners_of(&self, ip: Ipv4Addr) -> impl Iterator<Item = &str> {
        self.owners
            .get(&ip)
            .into_iter()
            .flat_map(|nodes| nodes.keys().map(String::as_str))
    }
}
