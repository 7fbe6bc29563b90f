use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("ingress node {node} of flow {flow} is not in the network")]
    IngressNodeNotFound { node: String, flow: String },

    #[error("flow {flow} has no destination IP")]
    MissingDestination { flow: String },

    #[error("node {node} is not in the network, cannot perform traceroute")]
    NodeNotFound { node: String },

    #[error("interface {interface} not found on node {node}")]
    InterfaceNotFound { node: String, interface: String },

    #[error("NAT rule {rule} on {node}[{interface}]: missing NAT address or pool")]
    InvalidNatRule {
        node: String,
        interface: String,
        rule: String,
    },

    #[error("exploration of flow {flow} exceeded {limit}")]
    ExplorationLimit { flow: String, limit: String },

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// Engine invariant broken; never caused by input
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
