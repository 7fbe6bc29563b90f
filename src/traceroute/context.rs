//! Per-branch simulation state
//!
//! A `BranchContext` is a value: forking a branch is a `clone()`, and the hop
//! history and breadcrumbs are persistent lists whose shared prefixes are
//! never copied or mutated.

use super::trace::Hop;
use crate::dataplane::{AclDefinitions, Configuration, NamedIpSpaces};
use crate::flow::Flow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

static NO_ACLS: AclDefinitions = BTreeMap::new();
static NO_IP_SPACES: NamedIpSpaces = BTreeMap::new();

#[derive(Debug)]
struct Link<T> {
    value: T,
    prev: Option<Arc<Link<T>>>,
}

/// Immutable singly linked list, newest element first
#[derive(Debug)]
pub(crate) struct Chain<T> {
    head: Option<Arc<Link<T>>>,
    len: usize,
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { head: None, len: 0 }
    }
}

impl<T> Chain<T> {
    /// New chain with `value` appended; `self` is left untouched
    pub fn push(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Link {
                value,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Iterate newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut cur = self.head.as_deref();
        std::iter::from_fn(move || {
            let link = cur?;
            cur = link.prev.as_deref();
            Some(&link.value)
        })
    }
}

impl<T: Clone> Chain<T> {
    /// Elements oldest to newest
    pub fn to_vec(&self) -> Vec<T> {
        let mut items: Vec<T> = self.iter().cloned().collect();
        items.reverse();
        items
    }
}

/// Where a branch has been: entering the same node and VRF with the same
/// flow twice is a forwarding loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Breadcrumb {
    pub node: String,
    pub vrf: String,
    pub flow: Flow,
}

/// Scratch state of one in-progress branch
#[derive(Debug, Clone)]
pub(crate) struct BranchContext<'a> {
    current_node: String,
    /// The flow as injected, kept for NAT diffs
    original_flow: &'a Flow,
    /// The flow as transformed so far
    transformed_flow: Flow,
    hops: Chain<Hop>,
    breadcrumbs: Chain<Breadcrumb>,
    /// Configuration of the current node, None outside the network
    node_config: Option<&'a Configuration>,
    /// Diagnostic labels of the routes chosen for the current hop
    routes_considered: BTreeSet<String>,
}

impl<'a> BranchContext<'a> {
    /// Context positioned at `node` with an empty history
    pub fn new(node: impl Into<String>, original_flow: &'a Flow) -> Self {
        Self {
            current_node: node.into(),
            original_flow,
            transformed_flow: original_flow.clone(),
            hops: Chain::default(),
            breadcrumbs: Chain::default(),
            node_config: None,
            routes_considered: BTreeSet::new(),
        }
    }

    /// Fork positioned at `config`'s node, caching its ACLs and IP spaces
    pub fn enter_node(&self, config: &'a Configuration) -> Self {
        Self {
            current_node: config.hostname.clone(),
            node_config: Some(config),
            routes_considered: BTreeSet::new(),
            ..self.clone()
        }
    }

    /// Fork carrying a (possibly NAT-rewritten) flow
    pub fn with_flow(&self, flow: Flow) -> Self {
        Self {
            transformed_flow: flow,
            ..self.clone()
        }
    }

    /// Fork labelled with the routes of one candidate next hop
    pub fn with_routes(&self, routes: BTreeSet<String>) -> Self {
        Self {
            routes_considered: routes,
            ..self.clone()
        }
    }

    /// Fork with a completed hop appended to the history
    pub fn push_hop(&self, hop: Hop) -> Self {
        Self {
            hops: self.hops.push(hop),
            ..self.clone()
        }
    }

    /// Fork that remembers `crumb`
    pub fn visit(&self, crumb: Breadcrumb) -> Self {
        Self {
            breadcrumbs: self.breadcrumbs.push(crumb),
            ..self.clone()
        }
    }

    pub fn has_visited(&self, crumb: &Breadcrumb) -> bool {
        self.breadcrumbs.iter().any(|c| c == crumb)
    }

    /// Full history with `last` appended, oldest hop first
    pub fn close(&self, last: Hop) -> Vec<Hop> {
        self.hops.push(last).to_vec()
    }

    pub fn current_node(&self) -> &str {
        &self.current_node
    }

    pub fn original_flow(&self) -> &'a Flow {
        self.original_flow
    }

    pub fn transformed_flow(&self) -> &Flow {
        &self.transformed_flow
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn acls(&self) -> &'a AclDefinitions {
        self.node_config.map(|c| &c.acls).unwrap_or(&NO_ACLS)
    }

    pub fn ip_spaces(&self) -> &'a NamedIpSpaces {
        self.node_config.map(|c| &c.ip_spaces).unwrap_or(&NO_IP_SPACES)
    }

    pub fn routes_considered(&self) -> &BTreeSet<String> {
        &self.routes_considered
    }
}
