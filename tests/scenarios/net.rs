//! Network builder for scenario tests

use flowtrace::dataplane::{
    Configuration, Fib, Fibs, ForwardingAnalysis, ForwardingState, IpSpace, NodeInterface, Prefix,
    Route, Topology,
};
use flowtrace::traceroute::{EngineSettings, TracerouteEngine};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().expect("valid IPv4 address")
}

pub fn prefix(s: &str) -> Prefix {
    Prefix::parse(s).expect("valid prefix")
}

/// Builds a `ForwardingState` node by node.
///
/// Connected routes and ARP replies for interface addresses are added
/// automatically, like the network file loader does.
#[derive(Default)]
pub struct Net {
    configs: BTreeMap<String, Configuration>,
    routes: BTreeMap<(String, String), Vec<Route>>,
    arp: BTreeMap<(String, String), Vec<Prefix>>,
    fa: ForwardingAnalysis,
    topology: Topology,
}

impl Net {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, config: Configuration) -> Self {
        for iface in config.interfaces.values() {
            for addr in &iface.addresses {
                self.routes
                    .entry((config.hostname.clone(), iface.vrf.clone()))
                    .or_default()
                    .push(Route::connected(addr.subnet(), iface.name.as_str()));
                self.arp
                    .entry((config.hostname.clone(), iface.name.clone()))
                    .or_default()
                    .push(Prefix::host(addr.ip));
            }
        }
        self.configs.insert(config.hostname.clone(), config);
        self
    }

    /// Route in the default VRF
    pub fn route(self, node: &str, route: Route) -> Self {
        self.vrf_route(node, "default", route)
    }

    pub fn vrf_route(mut self, node: &str, vrf: &str, route: Route) -> Self {
        self.routes
            .entry((node.to_string(), vrf.to_string()))
            .or_default()
            .push(route);
        self
    }

    /// Make `node:iface` also answer ARP for `space`
    pub fn arp(mut self, endpoint: &str, space: &str) -> Self {
        let ni = NodeInterface::parse(endpoint).expect("node:interface");
        self.arp
            .entry((ni.node, ni.interface))
            .or_default()
            .push(prefix(space));
        self
    }

    pub fn unreachable(mut self, node: &str, iface: &str, space: &str) -> Self {
        self.fa.set_neighbor_unreachable(
            node,
            "default",
            iface,
            IpSpace::from_prefixes([prefix(space)]),
        );
        self
    }

    /// Bidirectional link between two "node:interface" endpoints
    pub fn link(mut self, a: &str, b: &str) -> Self {
        self.topology.add_link(
            NodeInterface::parse(a).expect("node:interface"),
            NodeInterface::parse(b).expect("node:interface"),
        );
        self
    }

    pub fn build(self) -> Arc<ForwardingState> {
        let mut fibs = Fibs::new();
        for ((node, vrf), routes) in self.routes {
            fibs.entry(node).or_default().insert(vrf, Fib::new(routes));
        }
        let mut fa = self.fa;
        for ((node, iface), prefixes) in self.arp {
            fa.set_arp_replies(&node, &iface, IpSpace::from_prefixes(prefixes));
        }
        Arc::new(ForwardingState::new(self.configs, fibs, fa, self.topology))
    }
}

pub fn engine(state: Arc<ForwardingState>, ignore_acls: bool) -> TracerouteEngine {
    TracerouteEngine::new(
        state,
        EngineSettings {
            ignore_acls,
            ..EngineSettings::default()
        },
    )
}
