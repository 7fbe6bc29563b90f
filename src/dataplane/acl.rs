//! Access control lists
//!
//! Ordered lines, first match wins, implicit deny at the end. Lines match on
//! protocol, source/destination prefix or named IP space, port ranges and the
//! interface the flow arrived on.

use super::ip::{IpSpace, PortRange, Prefix};
use crate::flow::Flow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Named IP spaces of one node
pub type NamedIpSpaces = BTreeMap<String, IpSpace>;

/// ACL definitions of one node
pub type AclDefinitions = BTreeMap<String, Acl>;

/// Action of an ACL line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineAction {
    Permit,
    Deny,
}

/// Result of evaluating an ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterResult {
    pub action: LineAction,
    /// Index of the matching line, None when the implicit deny applied
    pub matched_line: Option<usize>,
}

impl FilterResult {
    pub fn is_denied(&self) -> bool {
        self.action == LineAction::Deny
    }
}

/// One ACL line
#[derive(Debug, Clone)]
pub struct AclLine {
    pub action: LineAction,
    /// Protocol number (1=ICMP, 6=TCP, 17=UDP)
    pub protocol: Option<u8>,
    pub src_ip: Option<Prefix>,
    pub dst_ip: Option<Prefix>,
    /// Named IP space the source must be in
    pub src_space: Option<String>,
    /// Named IP space the destination must be in
    pub dst_space: Option<String>,
    pub src_port: Option<PortRange>,
    pub dst_port: Option<PortRange>,
    /// Interface the flow must have arrived on
    pub in_interface: Option<String>,
}

impl AclLine {
    /// A line matching everything
    pub fn new(action: LineAction) -> Self {
        Self {
            action,
            protocol: None,
            src_ip: None,
            dst_ip: None,
            src_space: None,
            dst_space: None,
            src_port: None,
            dst_port: None,
            in_interface: None,
        }
    }

    /// Check if this line matches the flow
    pub fn matches(
        &self,
        flow: &Flow,
        src_interface: Option<&str>,
        named_ip_spaces: &NamedIpSpaces,
    ) -> bool {
        if let Some(proto) = self.protocol {
            if proto != flow.protocol {
                return false;
            }
        }

        if let Some(ref prefix) = self.src_ip {
            if !prefix.contains(flow.src_ip) {
                return false;
            }
        }

        if let Some(ref prefix) = self.dst_ip {
            match flow.dst_ip {
                Some(dst) if prefix.contains(dst) => {}
                _ => return false,
            }
        }

        // Undefined named spaces match nothing
        if let Some(ref name) = self.src_space {
            match named_ip_spaces.get(name) {
                Some(space) if space.contains(flow.src_ip) => {}
                _ => return false,
            }
        }

        if let Some(ref name) = self.dst_space {
            match (named_ip_spaces.get(name), flow.dst_ip) {
                (Some(space), Some(dst)) if space.contains(dst) => {}
                _ => return false,
            }
        }

        if let Some(ref range) = self.src_port {
            match flow.src_port {
                Some(port) if range.contains(port) => {}
                _ => return false,
            }
        }

        if let Some(ref range) = self.dst_port {
            match flow.dst_port {
                Some(port) if range.contains(port) => {}
                _ => return false,
            }
        }

        if let Some(ref iface) = self.in_interface {
            match src_interface {
                Some(in_if) if in_if == iface => {}
                _ => return false,
            }
        }

        true
    }
}

/// Named access list
#[derive(Debug, Clone)]
pub struct Acl {
    pub name: String,
    pub lines: Vec<AclLine>,
}

impl Acl {
    pub fn new(name: impl Into<String>, lines: Vec<AclLine>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    /// ACL with a single line permitting everything
    pub fn permit_all(name: impl Into<String>) -> Self {
        Self::new(name, vec![AclLine::new(LineAction::Permit)])
    }

    /// ACL with a single line denying everything
    pub fn deny_all(name: impl Into<String>) -> Self {
        Self::new(name, vec![AclLine::new(LineAction::Deny)])
    }

    /// Evaluate a flow against the lines in order
    pub fn filter(
        &self,
        flow: &Flow,
        src_interface: Option<&str>,
        named_ip_spaces: &NamedIpSpaces,
    ) -> FilterResult {
        self.lines
            .iter()
            .position(|line| line.matches(flow, src_interface, named_ip_spaces))
            .map(|idx| FilterResult {
                action: self.lines[idx].action,
                matched_line: Some(idx),
            })
            .unwrap_or(FilterResult {
                action: LineAction::Deny,
                matched_line: None,
            })
    }
}
