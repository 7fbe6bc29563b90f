//! Flow driver
//!
//! Validates flows, fans them out over a rayon pool and collects each flow's
//! trace set. Exploration of one flow is sequential.

use super::adapters::{AclEvaluator, FilterEvaluator, FirstMatchNat, NatApplier};
use super::hop::HopProcessor;
use super::trace::Trace;
use crate::dataplane::ForwardingState;
use crate::flow::Flow;
use crate::telemetry::TraceMetrics;
use crate::{Error, Result};
use dashmap::DashMap;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Default bound on the length of one trace
pub const DEFAULT_MAX_HOPS: usize = 64;
/// Default bound on hops explored for one flow
pub const DEFAULT_MAX_BRANCHES: usize = 100_000;

/// Engine knobs, read from the `[engine]` section of the network file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    /// Skip incoming and outgoing filters entirely
    #[serde(default)]
    pub ignore_acls: bool,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_max_branches")]
    pub max_branches: usize,
    /// Worker threads; 0 uses the global rayon pool
    #[serde(default)]
    pub threads: usize,
}

fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_max_branches() -> usize {
    DEFAULT_MAX_BRANCHES
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ignore_acls: false,
            max_hops: DEFAULT_MAX_HOPS,
            max_branches: DEFAULT_MAX_BRANCHES,
            threads: 0,
        }
    }
}

/// Flow to its distinct traces, in flow order
pub type TraceResults = BTreeMap<Flow, BTreeSet<Trace>>;

/// Virtual traceroute over a fixed forwarding state
pub struct TracerouteEngine {
    state: Arc<ForwardingState>,
    settings: EngineSettings,
    filter: Arc<dyn FilterEvaluator>,
    nat: Arc<dyn NatApplier>,
    metrics: Arc<TraceMetrics>,
}

impl TracerouteEngine {
    pub fn new(state: Arc<ForwardingState>, settings: EngineSettings) -> Self {
        Self {
            state,
            settings,
            filter: Arc::new(AclEvaluator),
            nat: Arc::new(FirstMatchNat),
            metrics: Arc::new(TraceMetrics::new()),
        }
    }

    /// Replace the ACL evaluation strategy
    pub fn with_filter_evaluator(mut self, filter: Arc<dyn FilterEvaluator>) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the NAT strategy
    pub fn with_nat_applier(mut self, nat: Arc<dyn NatApplier>) -> Self {
        self.nat = nat;
        self
    }

    /// Record into a shared metrics registry
    pub fn with_metrics(mut self, metrics: Arc<TraceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> &ForwardingState {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<TraceMetrics> {
        &self.metrics
    }

    /// Check a flow can be traced: its ingress node exists and it has a
    /// destination.
    pub fn validate(&self, flow: &Flow) -> Result<()> {
        if !self.state.contains_node(&flow.ingress_node) {
            return Err(Error::IngressNodeNotFound {
                node: flow.ingress_node.clone(),
                flow: flow.to_string(),
            });
        }
        if flow.dst_ip.is_none() {
            return Err(Error::MissingDestination {
                flow: flow.to_string(),
            });
        }
        Ok(())
    }

    /// Trace a single flow
    pub fn trace_flow(&self, flow: &Flow) -> Result<BTreeSet<Trace>> {
        if let Err(e) = self.validate(flow) {
            self.metrics.flows_rejected.inc();
            return Err(e);
        }
        self.explore(flow)
    }

    /// Trace every flow, in parallel.
    ///
    /// All flows are validated before any is traced. Any fatal error fails
    /// the whole request.
    pub fn trace_flows(&self, flows: &[Flow]) -> Result<TraceResults> {
        for flow in flows {
            if let Err(e) = self.validate(flow) {
                self.metrics.flows_rejected.inc();
                return Err(e);
            }
        }

        let results: DashMap<Flow, BTreeSet<Trace>> = DashMap::new();
        let run = || {
            flows.par_iter().try_for_each(|flow| -> Result<()> {
                let traces = self.explore(flow)?;
                results.insert(flow.clone(), traces);
                Ok(())
            })
        };

        if self.settings.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.threads)
                .thread_name(|i| format!("flowtrace-{}", i))
                .build()
                .map_err(|e| Error::WorkerPool(e.to_string()))?;
            pool.install(run)?;
        } else {
            run()?;
        }

        let sorted: TraceResults = results.into_iter().collect();
        info!(
            "Traced {} flows into {} traces",
            sorted.len(),
            sorted.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(sorted)
    }

    fn explore(&self, flow: &Flow) -> Result<BTreeSet<Trace>> {
        debug!("Tracing flow {}", flow);
        let traces = HopProcessor::new(
            &self.state,
            &self.settings,
            self.filter.as_ref(),
            self.nat.as_ref(),
            &self.metrics,
            flow,
        )
        .run()?;
        self.metrics.flows_traced.inc();
        Ok(traces)
    }
}
