//! Hops and traces

use super::step::Step;
use serde::Serialize;
use std::fmt;

/// Terminal classification of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDisposition {
    Accepted,
    DeniedIn,
    DeniedOut,
    Loop,
    NeighborUnreachableOrExitsNetwork,
    NoRoute,
    NullRouted,
}

impl FlowDisposition {
    pub const ALL: [FlowDisposition; 7] = [
        FlowDisposition::Accepted,
        FlowDisposition::DeniedIn,
        FlowDisposition::DeniedOut,
        FlowDisposition::Loop,
        FlowDisposition::NeighborUnreachableOrExitsNetwork,
        FlowDisposition::NoRoute,
        FlowDisposition::NullRouted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowDisposition::Accepted => "accepted",
            FlowDisposition::DeniedIn => "denied_in",
            FlowDisposition::DeniedOut => "denied_out",
            FlowDisposition::Loop => "loop",
            FlowDisposition::NeighborUnreachableOrExitsNetwork => {
                "neighbor_unreachable_or_exits_network"
            }
            FlowDisposition::NoRoute => "no_route",
            FlowDisposition::NullRouted => "null_routed",
        }
    }

    /// Did the packet reach its destination?
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FlowDisposition::Accepted | FlowDisposition::NeighborUnreachableOrExitsNetwork
        )
    }
}

impl fmt::Display for FlowDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps executed on one node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Hop {
    pub node: String,
    pub steps: Vec<Step>,
}

impl Hop {
    pub fn new(node: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            node: node.into(),
            steps,
        }
    }
}

/// One complete path of a flow, ending in a terminal step
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Trace {
    disposition: FlowDisposition,
    hops: Vec<Hop>,
}

impl Trace {
    /// Build a trace, returning None unless the last step is terminal
    pub fn new(hops: Vec<Hop>) -> Option<Self> {
        let disposition = hops.last()?.steps.last()?.disposition()?;
        Some(Self { disposition, hops })
    }

    pub fn disposition(&self) -> FlowDisposition {
        self.disposition
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Last step of the trace
    pub fn final_step(&self) -> Option<&Step> {
        self.hops.last().and_then(|h| h.steps.last())
    }

    /// Node names along the path
    pub fn path(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.node.as_str()).collect()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.disposition)?;
        for (i, hop) in self.hops.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, hop.node)?;
            for step in &hop.steps {
                writeln!(f, "       {}", step)?;
            }
        }
        Ok(())
    }
}
