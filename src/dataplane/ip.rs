//! IPv4 prefixes, IP spaces and port ranges

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 CIDR prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Prefix {
    /// Create a new prefix, masking off host bits
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        Self {
            addr: Self::network_addr(addr, prefix_len),
            prefix_len,
        }
    }

    /// Single-host prefix
    pub fn host(addr: Ipv4Addr) -> Self {
        Self::new(addr, 32)
    }

    /// Parse from string like "192.168.1.0/24"; a bare address is a /32
    pub fn parse(s: &str) -> Option<Self> {
        let Some((addr, len)) = s.split_once('/') else {
            return s.trim().parse().ok().map(Self::host);
        };
        let addr: Ipv4Addr = addr.trim().parse().ok()?;
        let prefix_len: u8 = len.trim().parse().ok()?;
        if prefix_len > 32 {
            return None;
        }
        Some(Self::new(addr, prefix_len))
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check if an address is within this prefix
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = Self::prefix_to_mask(self.prefix_len);
        (u32::from(self.addr) & mask) == (u32::from(addr) & mask)
    }

    fn network_addr(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(addr) & Self::prefix_to_mask(prefix_len))
    }

    fn prefix_to_mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - prefix_len)
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid prefix: {}", s))
    }
}

impl TryFrom<String> for Prefix {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Prefix> for String {
    fn from(p: Prefix) -> Self {
        p.to_string()
    }
}

/// Interface address: host address plus the prefix of its subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceAddress {
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
}

impl InterfaceAddress {
    pub fn new(ip: Ipv4Addr, prefix_len: u8) -> Self {
        Self { ip, prefix_len }
    }

    /// Connected subnet of this address
    pub fn subnet(&self) -> Prefix {
        Prefix::new(self.ip, self.prefix_len)
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

impl TryFrom<String> for InterfaceAddress {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (ip, len) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid interface address: {}", s))?;
        let ip: Ipv4Addr = ip.parse().map_err(|_| format!("invalid IP: {}", ip))?;
        let prefix_len: u8 = len.parse().map_err(|_| format!("invalid prefix: {}", len))?;
        if prefix_len > 32 {
            return Err(format!("invalid prefix: {}", len));
        }
        Ok(Self { ip, prefix_len })
    }
}

impl From<InterfaceAddress> for String {
    fn from(a: InterfaceAddress) -> Self {
        a.to_string()
    }
}

/// A set of addresses expressed as a union of prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpSpace {
    prefixes: Vec<Prefix>,
}

impl IpSpace {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Space containing every address
    pub fn universe() -> Self {
        Self::from_prefixes([Prefix::new(Ipv4Addr::UNSPECIFIED, 0)])
    }

    pub fn from_prefixes(prefixes: impl IntoIterator<Item = Prefix>) -> Self {
        Self {
            prefixes: prefixes.into_iter().collect(),
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.prefixes.iter().any(|p| p.contains(addr))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn prefixes(&self) -> &[Prefix] {
        &self.prefixes
    }
}

/// Port range for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Parse from string like "80" or "1024-65535"
    pub fn parse(s: &str) -> Option<Self> {
        if let Some((start, end)) = s.split_once('-') {
            let start: u16 = start.trim().parse().ok()?;
            let end: u16 = end.trim().parse().ok()?;
            if start > end {
                return None;
            }
            Some(Self::new(start, end))
        } else {
            let port: u16 = s.trim().parse().ok()?;
            Some(Self::single(port))
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid port range: {}", s))
    }
}

impl From<PortRange> for String {
    fn from(r: PortRange) -> Self {
        r.to_string()
    }
}
