//! Engine scenarios over small hand-built networks
//!
//! Run with: cargo test --test scenarios

mod cli;
mod forwarding;
mod net;

use flowtrace::dataplane::{Configuration, Interface, Route};
use flowtrace::traceroute::{Step, Trace, TraceResults};
use flowtrace::Flow;
use net::{ip, prefix, Net};

/// r1 and r2 share 10.0.12.0/24; each has a stub LAN
///
/// ```text
/// 192.168.1.0/24 -- eth1 [r1] eth0 -- 10.0.12.0/24 -- eth0 [r2] eth1 -- 192.168.2.0/24
/// ```
pub fn r1() -> Configuration {
    let mut r1 = Configuration::new("r1");
    r1.add_interface(Interface::new("eth0").with_address(ip("10.0.12.1"), 24));
    r1.add_interface(Interface::new("eth1").with_address(ip("192.168.1.1"), 24));
    r1
}

pub fn r2() -> Configuration {
    let mut r2 = Configuration::new("r2");
    r2.add_interface(Interface::new("eth0").with_address(ip("10.0.12.2"), 24));
    r2.add_interface(Interface::new("eth1").with_address(ip("192.168.2.1"), 24));
    r2
}

pub fn two_routers(r1: Configuration, r2: Configuration) -> Net {
    Net::new().node(r1).node(r2).link("r1:eth0", "r2:eth0")
}

/// Flow originated in r1's default VRF
pub fn flow(src: &str, dst: &str) -> Flow {
    Flow::new("r1", ip(src), ip(dst))
}

/// The only trace of the only flow
pub fn single_trace(results: &TraceResults) -> &Trace {
    assert_eq!(results.len(), 1, "expected one flow");
    let traces = results.values().next().unwrap();
    assert_eq!(traces.len(), 1, "expected one trace, got {:?}", traces);
    traces.iter().next().unwrap()
}

/// Steps of the last hop of a trace
pub fn last_steps(trace: &Trace) -> &[Step] {
    &trace.hops().last().unwrap().steps
}

#[test]
fn test_every_trace_ends_on_terminal_step() {
    let state = two_routers(r1(), r2())
        .route("r1", Route::via(prefix("0.0.0.0/0"), ip("10.0.12.2"), None))
        .build();
    let engine = net::engine(state, false);
    let flows = vec![
        flow("192.168.1.10", "192.168.1.1"),
        flow("192.168.1.10", "192.168.2.1"),
        flow("192.168.1.10", "192.168.2.50"),
        flow("192.168.1.10", "8.8.8.8"),
    ];

    let results = engine.trace_flows(&flows).unwrap();
    assert_eq!(results.len(), flows.len());
    for traces in results.values() {
        assert!(!traces.is_empty());
        for trace in traces {
            assert!(!trace.hops().is_empty());
            let last = trace.final_step().unwrap();
            assert!(last.is_terminal());
            assert_eq!(last.disposition(), Some(trace.disposition()));
            for hop in trace.hops() {
                for step in &hop.steps[..hop.steps.len().saturating_sub(1)] {
                    assert!(!step.is_terminal());
                }
            }
        }
    }
}
