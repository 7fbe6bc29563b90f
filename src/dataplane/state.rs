//! Read-only forwarding state of a whole network

use super::fib::Fib;
use super::forwarding::{ForwardingAnalysis, IpOwners};
use super::node::Configuration;
use super::topology::Topology;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// node -> vrf -> FIB
pub type Fibs = BTreeMap<String, BTreeMap<String, Fib>>;

/// Everything the tracer reads, shared across workers without locking
#[derive(Debug, Clone, Default)]
pub struct ForwardingState {
    configurations: BTreeMap<String, Configuration>,
    fibs: Fibs,
    forwarding_analysis: ForwardingAnalysis,
    topology: Topology,
    ip_owners: IpOwners,
}

impl ForwardingState {
    pub fn new(
        configurations: BTreeMap<String, Configuration>,
        fibs: Fibs,
        forwarding_analysis: ForwardingAnalysis,
        topology: Topology,
    ) -> Self {
        let ip_owners = IpOwners::from_configurations(configurations.values());
        Self {
            configurations,
            fibs,
            forwarding_analysis,
            topology,
            ip_owners,
        }
    }

    /// Get a node's configuration, failing if the node is unknown
    pub fn configuration(&self, node: &str) -> Result<&Configuration> {
        self.configurations
            .get(node)
            .ok_or_else(|| Error::NodeNotFound {
                node: node.to_string(),
            })
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.configurations.contains_key(node)
    }

    pub fn configurations(&self) -> &BTreeMap<String, Configuration> {
        &self.configurations
    }

    /// FIB of a node's VRF, if one was computed
    pub fn fib(&self, node: &str, vrf: &str) -> Option<&Fib> {
        self.fibs.get(node).and_then(|vrfs| vrfs.get(vrf))
    }

    pub fn fibs(&self) -> &Fibs {
        &self.fibs
    }

    pub fn forwarding_analysis(&self) -> &ForwardingAnalysis {
        &self.forwarding_analysis
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn ip_owners(&self) -> &IpOwners {
        &self.ip_owners
    }
}
