//! flowtrace - virtual traceroute
//!
//! Simulates how packets flow through a network given the precomputed forwarding
//! state of every device (per-VRF FIBs, ACLs, NAT rules, adjacency and ARP
//! predicates) and reports every distinct path each flow can take.

pub mod config;
pub mod dataplane;
pub mod error;
pub mod flow;
pub mod telemetry;
pub mod traceroute;

pub use error::{Error, Result};
pub use flow::Flow;
pub use traceroute::{EngineSettings, FlowDisposition, Trace, TracerouteEngine};
