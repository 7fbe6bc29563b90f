//! Steps: the micro-events of one hop
//!
//! Each step kind carries its own detail record and its own action set, so a
//! consumer matching on a step handles exactly the outcomes that kind can have.

use super::trace::FlowDisposition;
use crate::dataplane::NodeInterface;
use crate::flow::Flow;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Outcome of entering a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnterAction {
    /// Delivered to the node itself
    Accepted,
    /// Dropped by the incoming filter
    DeniedIn,
    /// Node/VRF/flow already visited on this branch
    Loop,
    /// Admitted, continues to routing
    SentIn,
}

/// Outcome of the FIB lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingAction {
    NoRoute,
    /// An output interface was chosen
    Forwarded,
}

/// Outcome of leaving through an output interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitAction {
    NullRouted,
    /// Dropped by the outgoing filter
    DeniedOut,
    NeighborUnreachableOrExitsNetwork,
    /// Transmitted towards the next hop
    SentOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EnterSourceInterfaceDetail {
    /// Interface the packet arrived on, None when it originated in a VRF
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_interface: Option<NodeInterface>,
    /// Originating VRF when there is no input interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_vrf: Option<String>,
    /// Incoming filter that was evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_filter: Option<String>,
    /// Index of the incoming filter line that decided, None for the implicit deny
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_filter_line: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoutingDetail {
    /// Routes that led to the chosen next hop, with their final next-hop IP
    pub routes_considered: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ExitOutputInterfaceDetail {
    pub output_interface: NodeInterface,
    /// Outgoing filter that was evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filter_line: Option<usize>,
    /// The flow as it leaves, when NAT changed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed_flow: Option<Flow>,
}

impl ExitOutputInterfaceDetail {
    pub fn new(output_interface: NodeInterface) -> Self {
        Self {
            output_interface,
            output_filter: None,
            output_filter_line: None,
            transformed_flow: None,
        }
    }
}

/// One step of a hop
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type")]
pub enum Step {
    EnterSourceInterface {
        detail: EnterSourceInterfaceDetail,
        action: EnterAction,
    },
    SourceToOutputInterfaceRouting {
        detail: RoutingDetail,
        action: RoutingAction,
    },
    ExitOutputInterface {
        detail: ExitOutputInterfaceDetail,
        action: ExitAction,
    },
}

impl Step {
    /// Disposition if this step ends its trace
    pub fn disposition(&self) -> Option<FlowDisposition> {
        match self {
            Step::EnterSourceInterface { action, .. } => match action {
                EnterAction::Accepted => Some(FlowDisposition::Accepted),
                EnterAction::DeniedIn => Some(FlowDisposition::DeniedIn),
                EnterAction::Loop => Some(FlowDisposition::Loop),
                EnterAction::SentIn => None,
            },
            Step::SourceToOutputInterfaceRouting { action, .. } => match action {
                RoutingAction::NoRoute => Some(FlowDisposition::NoRoute),
                RoutingAction::Forwarded => None,
            },
            Step::ExitOutputInterface { action, .. } => match action {
                ExitAction::NullRouted => Some(FlowDisposition::NullRouted),
                ExitAction::DeniedOut => Some(FlowDisposition::DeniedOut),
                ExitAction::NeighborUnreachableOrExitsNetwork => {
                    Some(FlowDisposition::NeighborUnreachableOrExitsNetwork)
                }
                ExitAction::SentOut => None,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.disposition().is_some()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnterSourceInterface { detail, action } => {
                write!(f, "enter")?;
                if let Some(ref iface) = detail.input_interface {
                    write!(f, " {}", iface.interface)?;
                }
                if let Some(ref vrf) = detail.input_vrf {
                    write!(f, " vrf {}", vrf)?;
                }
                if let Some(ref acl) = detail.input_filter {
                    write_filter(f, acl, detail.input_filter_line)?;
                }
                write!(f, ": {:?}", action)
            }
            Step::SourceToOutputInterfaceRouting { detail, action } => {
                write!(f, "route")?;
                if !detail.routes_considered.is_empty() {
                    let routes: Vec<&str> =
                        detail.routes_considered.iter().map(String::as_str).collect();
                    write!(f, " [{}]", routes.join("; "))?;
                }
                write!(f, ": {:?}", action)
            }
            Step::ExitOutputInterface { detail, action } => {
                write!(f, "exit {}", detail.output_interface.interface)?;
                if let Some(ref acl) = detail.output_filter {
                    write_filter(f, acl, detail.output_filter_line)?;
                }
                if let Some(ref flow) = detail.transformed_flow {
                    write!(f, " as {}", flow)?;
                }
                write!(f, ": {:?}", action)
            }
        }
    }
}

fn write_filter(f: &mut fmt::Formatter<'_>, acl: &str, line: Option<usize>) -> fmt::Result {
    match line {
        Some(line) => write!(f, " filter {} line {}", acl, line),
        None => write!(f, " filter {} implicit deny", acl),
    }
}
