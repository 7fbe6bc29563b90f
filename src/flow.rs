//! Flow description
//!
//! A flow is an immutable packet header plus the point where it enters the
//! network. NAT produces new flows via the `with_*` copy constructors.

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// VRF used when a flow names neither an ingress interface nor a VRF.
pub const DEFAULT_VRF: &str = "default";

/// IP protocol numbers
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;

    /// Parses "icmp", "tcp", "udp" or a raw protocol number.
    pub fn parse(s: &str) -> Option<u8> {
        match s.to_lowercase().as_str() {
            "icmp" => Some(ICMP),
            "tcp" => Some(TCP),
            "udp" => Some(UDP),
            other => other.parse().ok(),
        }
    }
}

/// A packet to trace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Flow {
    /// Node where the flow enters the network
    pub ingress_node: String,
    /// Interface the flow arrives on (None when originated inside a VRF)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_interface: Option<String>,
    /// VRF the flow originates from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_vrf: Option<String>,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Option<Ipv4Addr>,
    pub protocol: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
}

impl Flow {
    pub fn new(ingress_node: impl Into<String>, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Self {
        Self {
            ingress_node: ingress_node.into(),
            ingress_interface: None,
            ingress_vrf: None,
            src_ip,
            dst_ip: Some(dst_ip),
            protocol: protocol::TCP,
            src_port: None,
            dst_port: None,
        }
    }

    pub fn with_ingress_interface(mut self, interface: impl Into<String>) -> Self {
        self.ingress_interface = Some(interface.into());
        self
    }

    pub fn with_ingress_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.ingress_vrf = Some(vrf.into());
        self
    }

    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    /// Copy of this flow with a rewritten source address
    pub fn with_src_ip(&self, src_ip: Ipv4Addr) -> Self {
        Self {
            src_ip,
            ..self.clone()
        }
    }

    /// Copy of this flow with a rewritten destination address
    pub fn with_dst_ip(&self, dst_ip: Ipv4Addr) -> Self {
        Self {
            dst_ip: Some(dst_ip),
            ..self.clone()
        }
    }

    /// VRF the flow starts in when it has no ingress interface
    pub fn origin_vrf(&self) -> &str {
        self.ingress_vrf.as_deref().unwrap_or(DEFAULT_VRF)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ingress_node)?;
        if let Some(ref iface) = self.ingress_interface {
            write!(f, "[{}]", iface)?;
        } else if let Some(ref vrf) = self.ingress_vrf {
            write!(f, "[vrf {}]", vrf)?;
        }
        write!(f, " {}", self.src_ip)?;
        if let Some(port) = self.src_port {
            write!(f, ":{}", port)?;
        }
        match self.dst_ip {
            Some(dst) => write!(f, " -> {}", dst)?,
            None => write!(f, " -> ?")?,
        }
        if let Some(port) = self.dst_port {
            write!(f, ":{}", port)?;
        }
        write!(f, " proto {}", self.protocol)
    }
}
