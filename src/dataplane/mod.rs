//! Forwarding state consumed by the tracer
//!
//! Node configurations, FIBs, forwarding-analysis predicates and topology.
//! All of it is computed elsewhere and read-only here.

mod acl;
mod fib;
mod forwarding;
mod ip;
mod node;
mod state;
mod topology;

pub use acl::{Acl, AclDefinitions, AclLine, FilterResult, LineAction, NamedIpSpaces};
pub use fib::{Fib, NextHopResolution, Route, RouteSource};
pub use forwarding::{ForwardingAnalysis, IpOwners};
pub use ip::{InterfaceAddress, IpSpace, PortRange, Prefix};
pub use node::{Configuration, Interface, NatRule, NULL_INTERFACE_NAME};
pub use state::{Fibs, ForwardingState};
pub use topology::{Edge, NodeInterface, Topology};
