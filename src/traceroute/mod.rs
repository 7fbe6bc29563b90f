//! Flow tracing engine
//!
//! Given a `ForwardingState`, simulates every path a flow can take through
//! the network and reports each as a `Trace` of hops and steps.

mod adapters;
mod context;
mod engine;
mod hop;
mod step;
mod trace;

pub use adapters::{AclEvaluator, FilterEvaluator, FirstMatchNat, InvalidNatRule, NatApplier, NatField};
pub use engine::{
    EngineSettings, TraceResults, TracerouteEngine, DEFAULT_MAX_BRANCHES, DEFAULT_MAX_HOPS,
};
pub use hop::{DUMMY_NODE, DUMMY_OUT_INTERFACE};
pub use step::{
    EnterAction, EnterSourceInterfaceDetail, ExitAction, ExitOutputInterfaceDetail,
    RoutingAction, RoutingDetail, Step,
};
pub use trace::{FlowDisposition, Hop, Trace};
