//! Metrics collection for trace statistics.
//!
//! Thread-safe counters shared by every flow worker of an engine.

use crate::traceroute::FlowDisposition;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-disposition trace counts.
#[derive(Debug, Default)]
pub struct DispositionStats {
    pub accepted: Counter,
    pub denied_in: Counter,
    pub denied_out: Counter,
    pub loop_detected: Counter,
    pub neighbor_unreachable_or_exits_network: Counter,
    pub no_route: Counter,
    pub null_routed: Counter,
}

impl DispositionStats {
    fn counter(&self, disposition: FlowDisposition) -> &Counter {
        match disposition {
            FlowDisposition::Accepted => &self.accepted,
            FlowDisposition::DeniedIn => &self.denied_in,
            FlowDisposition::DeniedOut => &self.denied_out,
            FlowDisposition::Loop => &self.loop_detected,
            FlowDisposition::NeighborUnreachableOrExitsNetwork => {
                &self.neighbor_unreachable_or_exits_network
            }
            FlowDisposition::NoRoute => &self.no_route,
            FlowDisposition::NullRouted => &self.null_routed,
        }
    }
}

/// Metrics registry for the tracer.
#[derive(Debug, Default)]
pub struct TraceMetrics {
    /// Number of flows whose exploration completed.
    pub flows_traced: Counter,
    /// Number of flows rejected by input validation.
    pub flows_rejected: Counter,
    /// Number of flows that never entered the network (ingress ARP failed).
    pub flows_not_admitted: Counter,
    /// Number of hops processed across all branches.
    pub hops_explored: Counter,
    /// Number of traces materialized (before de-duplication).
    pub traces_produced: Counter,
    /// Traces by disposition.
    pub dispositions: DispositionStats,
}

impl TraceMetrics {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a materialized trace.
    pub fn record_trace(&self, disposition: FlowDisposition) {
        self.traces_produced.inc();
        self.dispositions.counter(disposition).inc();
    }

    /// Count of traces with the given disposition.
    pub fn disposition_count(&self, disposition: FlowDisposition) -> u64 {
        self.dispositions.counter(disposition).get()
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("flows_traced".into(), self.flows_traced.get()),
            ("flows_rejected".into(), self.flows_rejected.get()),
            ("flows_not_admitted".into(), self.flows_not_admitted.get()),
            ("hops_explored".into(), self.hops_explored.get()),
            ("traces_produced".into(), self.traces_produced.get()),
        ];

        for disposition in FlowDisposition::ALL {
            result.push((
                format!("traces_{}", disposition.as_str()),
                self.disposition_count(disposition),
            ));
        }

        result
    }
}
