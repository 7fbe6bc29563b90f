//! Vendor-neutral node configuration

use super::acl::{Acl, AclDefinitions, NamedIpSpaces};
use super::ip::InterfaceAddress;
use crate::flow::DEFAULT_VRF;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

/// Name of the discard interface routes point at to drop traffic
pub const NULL_INTERFACE_NAME: &str = "null_interface";

/// Address translation rule, guarded by an ACL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRule {
    /// Guard ACL; rules without one never match
    pub acl: Option<String>,
    /// First address of the translation pool
    pub pool_start: Option<Ipv4Addr>,
    /// Last address of the translation pool
    pub pool_end: Option<Ipv4Addr>,
}

impl NatRule {
    pub fn new(acl: impl Into<String>, pool_start: Ipv4Addr) -> Self {
        Self {
            acl: Some(acl.into()),
            pool_start: Some(pool_start),
            pool_end: Some(pool_start),
        }
    }
}

impl fmt::Display for NatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acl={}", self.acl.as_deref().unwrap_or("<none>"))?;
        match (self.pool_start, self.pool_end) {
            (Some(start), Some(end)) => write!(f, " pool={}-{}", start, end),
            (Some(start), None) => write!(f, " pool={}", start),
            _ => write!(f, " pool=<none>"),
        }
    }
}

/// Interface of a node
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub vrf: String,
    pub addresses: Vec<InterfaceAddress>,
    /// ACL applied to packets entering through this interface
    pub incoming_filter: Option<String>,
    /// ACL applied to packets leaving through this interface
    pub outgoing_filter: Option<String>,
    /// Ordered source NAT rules applied on egress
    pub source_nats: Vec<NatRule>,
    /// Ordered destination NAT rules applied on ingress
    pub destination_nats: Vec<NatRule>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vrf: DEFAULT_VRF.to_string(),
            addresses: Vec::new(),
            incoming_filter: None,
            outgoing_filter: None,
            source_nats: Vec::new(),
            destination_nats: Vec::new(),
        }
    }

    pub fn with_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.vrf = vrf.into();
        self
    }

    pub fn with_address(mut self, ip: Ipv4Addr, prefix_len: u8) -> Self {
        self.addresses.push(InterfaceAddress::new(ip, prefix_len));
        self
    }

    pub fn with_incoming_filter(mut self, acl: impl Into<String>) -> Self {
        self.incoming_filter = Some(acl.into());
        self
    }

    pub fn with_outgoing_filter(mut self, acl: impl Into<String>) -> Self {
        self.outgoing_filter = Some(acl.into());
        self
    }

    pub fn with_source_nat(mut self, rule: NatRule) -> Self {
        self.source_nats.push(rule);
        self
    }

    pub fn with_destination_nat(mut self, rule: NatRule) -> Self {
        self.destination_nats.push(rule);
        self
    }
}

/// Configuration of one node
#[derive(Debug, Clone)]
pub struct Configuration {
    pub hostname: String,
    pub interfaces: BTreeMap<String, Interface>,
    pub acls: AclDefinitions,
    pub ip_spaces: NamedIpSpaces,
}

impl Configuration {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            interfaces: BTreeMap::new(),
            acls: AclDefinitions::new(),
            ip_spaces: NamedIpSpaces::new(),
        }
    }

    pub fn add_interface(&mut self, iface: Interface) {
        self.interfaces.insert(iface.name.clone(), iface);
    }

    pub fn add_acl(&mut self, acl: Acl) {
        self.acls.insert(acl.name.clone(), acl);
    }

    /// Get an interface, failing if the node does not have it
    pub fn interface(&self, name: &str) -> Result<&Interface> {
        self.interfaces
            .get(name)
            .ok_or_else(|| Error::InterfaceNotFound {
                node: self.hostname.clone(),
                interface: name.to_string(),
            })
    }

    pub fn acl(&self, name: &str) -> Option<&Acl> {
        self.acls.get(name)
    }

    /// All VRFs that have at least one interface
    pub fn vrfs(&self) -> BTreeSet<&str> {
        self.interfaces.values().map(|i| i.vrf.as_str()).collect()
    }
}
