//! Layer-3 adjacency between node interfaces

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A (node, interface) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeInterface {
    pub node: String,
    pub interface: String,
}

impl NodeInterface {
    pub fn new(node: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            interface: interface.into(),
        }
    }

    /// Parse "node:interface"
    pub fn parse(s: &str) -> Option<Self> {
        let (node, interface) = s.split_once(':')?;
        if node.is_empty() || interface.is_empty() {
            return None;
        }
        Some(Self::new(node, interface))
    }
}

impl fmt::Display for NodeInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.interface)
    }
}

/// Directed edge from `tail` to `head`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub tail: NodeInterface,
    pub head: NodeInterface,
}

impl Edge {
    pub fn new(tail: NodeInterface, head: NodeInterface) -> Self {
        Self { tail, head }
    }
}

/// Set of directed edges indexed by their tail interface
#[derive(Debug, Clone, Default)]
pub struct Topology {
    edges: BTreeMap<NodeInterface, BTreeSet<Edge>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.entry(edge.tail.clone()).or_default().insert(edge);
    }

    /// Add edges in both directions
    pub fn add_link(&mut self, a: NodeInterface, b: NodeInterface) {
        self.add_edge(Edge::new(a.clone(), b.clone()));
        self.add_edge(Edge::new(b, a));
    }

    /// Edges leaving `node`'s `interface`, empty when unconnected
    pub fn interface_edges(&self, node: &str, interface: &str) -> impl Iterator<Item = &Edge> {
        self.edges
            .get(&NodeInterface::new(node, interface))
            .into_iter()
            .flatten()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
