//! Forwarding information base
//!
//! Built from the routes a control plane selected for one VRF. Lookups use
//! longest prefix match, and every route at the winning prefix length
//! contributes (ECMP). Routes that only name a next-hop IP are resolved
//! recursively against the same table when the FIB is built.

use super::ip::Prefix;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{trace, warn};

/// Maximum depth of recursive next-hop resolution
const MAX_RESOLUTION_DEPTH: usize = 8;

/// Source of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    /// Directly connected network
    Connected,
    /// Static route from config
    Static,
    Ospf,
    Bgp,
    /// Anything else a control plane produced
    Other,
}

impl RouteSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "connected" => Some(RouteSource::Connected),
            "static" => Some(RouteSource::Static),
            "ospf" => Some(RouteSource::Ospf),
            "bgp" => Some(RouteSource::Bgp),
            "other" => Some(RouteSource::Other),
            _ => None,
        }
    }
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteSource::Connected => "connected",
            RouteSource::Static => "static",
            RouteSource::Ospf => "ospf",
            RouteSource::Bgp => "bgp",
            RouteSource::Other => "other",
        };
        f.write_str(s)
    }
}

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    /// Destination network
    pub prefix: Prefix,
    /// Next hop (None for directly connected)
    pub next_hop: Option<Ipv4Addr>,
    /// Outgoing interface (None when resolved through the next hop)
    pub interface: Option<String>,
    pub metric: u32,
    pub source: RouteSource,
}

impl Route {
    /// Directly connected route out of an interface
    pub fn connected(prefix: Prefix, interface: impl Into<String>) -> Self {
        Self {
            prefix,
            next_hop: None,
            interface: Some(interface.into()),
            metric: 0,
            source: RouteSource::Connected,
        }
    }

    /// Static route via a next hop, optionally pinned to an interface
    pub fn via(prefix: Prefix, next_hop: Ipv4Addr, interface: Option<&str>) -> Self {
        Self {
            prefix,
            next_hop: Some(next_hop),
            interface: interface.map(str::to_string),
            metric: 0,
            source: RouteSource::Static,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.prefix)?;
        if let Some(nh) = self.next_hop {
            write!(f, " via {}", nh)?;
        }
        if let Some(ref iface) = self.interface {
            write!(f, " dev {}", iface)?;
        }
        write!(f, " metric {}", self.metric)
    }
}

/// Next-hop interface -> final next-hop IP -> routes that contributed it.
///
/// A `None` final next hop means the destination itself is ARPed for.
pub type NextHopResolution = BTreeMap<String, BTreeMap<Option<Ipv4Addr>, BTreeSet<Route>>>;

#[derive(Debug, Clone)]
struct FibEntry {
    route: Route,
    resolution: NextHopResolution,
}

/// FIB of one VRF
#[derive(Debug, Clone, Default)]
pub struct Fib {
    /// Sorted by prefix length, longest first
    entries: Vec<FibEntry>,
}

impl Fib {
    /// Build a FIB, resolving every route to its output interfaces.
    ///
    /// Routes that cannot be resolved to any interface are left out.
    pub fn new(routes: Vec<Route>) -> Self {
        let mut sorted = routes;
        sorted.sort_by(|a, b| b.prefix.prefix_len().cmp(&a.prefix.prefix_len()).then(a.cmp(b)));
        sorted.dedup();

        let entries = sorted
            .iter()
            .filter_map(|route| {
                let resolution = resolve(route, &sorted, 0);
                if resolution.is_empty() {
                    warn!("Unresolvable route left out of FIB: {}", route);
                    return None;
                }
                trace!("FIB entry {} -> {:?}", route, resolution.keys());
                Some(FibEntry {
                    route: route.clone(),
                    resolution,
                })
            })
            .collect();

        Self { entries }
    }

    /// Set of interfaces traffic to `dst` may leave through
    pub fn next_hop_interfaces(&self, dst: Ipv4Addr) -> BTreeSet<String> {
        longest_prefix_matches(&self.entries, dst, |e| &e.route)
            .into_iter()
            .flat_map(|e| e.resolution.keys().cloned())
            .collect()
    }

    /// Matching routes with their resolved next hops
    pub fn next_hop_interfaces_by_route(
        &self,
        dst: Ipv4Addr,
    ) -> BTreeMap<&Route, &NextHopResolution> {
        longest_prefix_matches(&self.entries, dst, |e| &e.route)
            .into_iter()
            .map(|e| (&e.route, &e.resolution))
            .collect()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.iter().map(|e| &e.route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All items whose route prefix is the longest one containing `addr`.
///
/// `items` must be sorted by prefix length, longest first.
fn longest_prefix_matches<T>(items: &[T], addr: Ipv4Addr, route: impl Fn(&T) -> &Route) -> Vec<&T> {
    let mut matches = Vec::new();
    let mut best_len = None;
    for item in items {
        let prefix = route(item).prefix;
        if let Some(len) = best_len {
            if prefix.prefix_len() < len {
                break;
            }
        }
        if prefix.contains(addr) {
            best_len = Some(prefix.prefix_len());
            matches.push(item);
        }
    }
    matches
}

fn resolve(route: &Route, table: &[Route], depth: usize) -> NextHopResolution {
    let mut resolution = NextHopResolution::new();

    if let Some(ref iface) = route.interface {
        resolution
            .entry(iface.clone())
            .or_default()
            .entry(route.next_hop)
            .or_default()
            .insert(route.clone());
        return resolution;
    }

    let Some(next_hop) = route.next_hop else {
        return resolution;
    };
    if depth >= MAX_RESOLUTION_DEPTH {
        return resolution;
    }

    for via in longest_prefix_matches(table, next_hop, |r| r) {
        if via == route {
            continue;
        }
        for (iface, finals) in resolve(via, table, depth + 1) {
            for (final_next_hop, contributors) in finals {
                // Resolving through a connected route ARPs for our next hop
                let final_next_hop = final_next_hop.or(Some(next_hop));
                resolution
                    .entry(iface.clone())
                    .or_default()
                    .entry(final_next_hop)
                    .or_default()
                    .extend(contributors);
            }
        }
    }

    resolution
}
