//! Forwarding dispositions, fan-out, loops and exploration bounds

use super::net::{engine, ip, prefix, Net};
use super::{flow, last_steps, r1, r2, single_trace, two_routers};
use flowtrace::dataplane::{
    Acl, AclLine, Configuration, Interface, LineAction, Route, RouteSource,
};
use flowtrace::traceroute::{
    EngineSettings, EnterAction, ExitAction, FlowDisposition, RoutingAction, Step,
    TracerouteEngine, DUMMY_NODE,
};
use flowtrace::{Error, Flow};

fn default_route_r1_to_r2(net: Net) -> Net {
    net.route("r1", Route::via(prefix("0.0.0.0/0"), ip("10.0.12.2"), None))
}

#[test]
fn test_accepted_at_ingress() {
    let state = two_routers(r1(), r2()).build();
    let results = engine(state, true)
        .trace_flows(&[flow("192.168.1.10", "10.0.12.1")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Accepted);
    assert_eq!(trace.path(), vec!["r1"]);
    assert_eq!(trace.hops()[0].steps.len(), 1);
    assert!(matches!(
        trace.hops()[0].steps[0],
        Step::EnterSourceInterface {
            action: EnterAction::Accepted,
            ref detail,
        } if detail.input_vrf.as_deref() == Some("default") && detail.input_interface.is_none()
    ));
}

#[test]
fn test_denied_in() {
    let mut r1 = r1();
    r1.add_acl(Acl::deny_all("BLOCK"));
    r1.add_interface(
        Interface::new("eth1")
            .with_address(ip("192.168.1.1"), 24)
            .with_incoming_filter("BLOCK"),
    );
    let state = two_routers(r1, r2()).arp("r1:eth1", "0.0.0.0/0").build();
    let flow = flow("192.168.1.10", "10.0.12.2").with_ingress_interface("eth1");

    let results = engine(state.clone(), false).trace_flows(&[flow.clone()]).unwrap();
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::DeniedIn);
    assert_eq!(trace.path(), vec![DUMMY_NODE, "r1"]);
    assert_eq!(last_steps(trace).len(), 1);
    assert!(matches!(
        last_steps(trace)[0],
        Step::EnterSourceInterface { ref detail, .. }
            if detail.input_filter.as_deref() == Some("BLOCK") && detail.input_filter_line == Some(0)
    ));

    // Same flow with filters off reaches r2, which owns the destination
    let results = engine(state, true).trace_flows(&[flow]).unwrap();
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Accepted);
    assert_eq!(trace.path(), vec![DUMMY_NODE, "r1", "r2"]);
}

#[test]
fn test_no_route() {
    let state = two_routers(r1(), r2()).build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "8.8.8.8")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::NoRoute);
    assert_eq!(trace.path(), vec!["r1"]);
    assert!(matches!(
        last_steps(trace),
        [
            Step::EnterSourceInterface {
                action: EnterAction::SentIn,
                ..
            },
            Step::SourceToOutputInterfaceRouting {
                action: RoutingAction::NoRoute,
                ..
            }
        ]
    ));
}

#[test]
fn test_missing_vrf_fib_is_no_route() {
    let state = two_routers(r1(), r2()).build();
    let flow = flow("192.168.1.10", "10.0.12.2").with_ingress_vrf("blue");
    let results = engine(state, false).trace_flows(&[flow]).unwrap();
    assert_eq!(single_trace(&results).disposition(), FlowDisposition::NoRoute);
}

#[test]
fn test_null_routed() {
    let state = two_routers(r1(), r2())
        .route("r1", Route::connected(prefix("198.51.100.0/24"), "null_interface"))
        .build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "198.51.100.7")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::NullRouted);
    assert!(matches!(
        last_steps(trace).last(),
        Some(Step::ExitOutputInterface { detail, .. })
            if detail.output_interface.interface == "null_interface"
    ));
}

#[test]
fn test_exits_network() {
    let mut r1 = r1();
    r1.add_acl(Acl::permit_all("OUT"));
    r1.add_interface(
        Interface::new("eth1")
            .with_address(ip("192.168.1.1"), 24)
            .with_outgoing_filter("OUT"),
    );
    let state = two_routers(r1, r2()).build();
    let results = engine(state, false)
        .trace_flows(&[flow("10.0.12.2", "192.168.1.50")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::NeighborUnreachableOrExitsNetwork);
    assert!(matches!(
        last_steps(trace).last(),
        Some(Step::ExitOutputInterface { detail, .. })
            if detail.output_filter.as_deref() == Some("OUT") && detail.transformed_flow.is_none()
    ));
}

#[test]
fn test_denied_out() {
    let mut r1 = r1();
    r1.add_acl(Acl::deny_all("OUT"));
    r1.add_interface(
        Interface::new("eth0")
            .with_address(ip("10.0.12.1"), 24)
            .with_outgoing_filter("OUT"),
    );
    let state = two_routers(r1, r2()).build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "10.0.12.2")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::DeniedOut);
    assert_eq!(trace.path(), vec!["r1"]);
    assert!(matches!(
        last_steps(trace).last(),
        Some(Step::ExitOutputInterface { detail, .. })
            if detail.output_filter.as_deref() == Some("OUT") && detail.output_filter_line == Some(0)
    ));
}

/// ACL permitting only packets that entered on eth1
fn from_lan(name: &str) -> Acl {
    let mut line = AclLine::new(LineAction::Permit);
    line.in_interface = Some("eth1".to_string());
    Acl::new(name, vec![line])
}

#[test]
fn test_outgoing_filter_sees_input_interface() {
    let mut r1 = r1();
    r1.add_acl(from_lan("FROM_LAN"));
    r1.add_interface(
        Interface::new("eth0")
            .with_address(ip("10.0.12.1"), 24)
            .with_outgoing_filter("FROM_LAN"),
    );
    let state = two_routers(r1, r2()).arp("r1:eth1", "0.0.0.0/0").build();

    // Entering on eth1 matches the line
    let from_eth1 = flow("192.168.1.10", "10.0.12.2").with_ingress_interface("eth1");
    let results = engine(state.clone(), false).trace_flows(&[from_eth1]).unwrap();
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Accepted);
    assert_eq!(trace.path(), vec![DUMMY_NODE, "r1", "r2"]);
    assert!(matches!(
        trace.hops()[1].steps.last(),
        Some(Step::ExitOutputInterface { detail, action: ExitAction::SentOut })
            if detail.output_filter_line == Some(0)
    ));

    // Originating in the VRF there is no input interface, so the implicit deny applies
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "10.0.12.2")])
        .unwrap();
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::DeniedOut);
    assert!(matches!(
        last_steps(trace).last(),
        Some(Step::ExitOutputInterface { detail, .. })
            if detail.output_filter.as_deref() == Some("FROM_LAN") && detail.output_filter_line.is_none()
    ));
}

#[test]
fn test_neighbor_unreachable() {
    let state = default_route_r1_to_r2(two_routers(r1(), r2()))
        .unreachable("r1", "eth0", "10.0.12.2/32")
        .build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "8.8.8.8")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::NeighborUnreachableOrExitsNetwork);
    assert_eq!(trace.path(), vec!["r1"]);
}

#[test]
fn test_forwarded_to_next_router() {
    let state = default_route_r1_to_r2(two_routers(r1(), r2())).build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "192.168.2.1")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Accepted);
    assert_eq!(trace.path(), vec!["r1", "r2"]);

    let first = &trace.hops()[0].steps;
    assert_eq!(first.len(), 3);
    assert!(matches!(
        first[1],
        Step::SourceToOutputInterfaceRouting { ref detail, action: RoutingAction::Forwarded }
            if detail.routes_considered.iter().any(|r| r.contains("0.0.0.0/0") && r.contains("fnh:10.0.12.2"))
    ));
    assert!(matches!(
        first[2],
        Step::ExitOutputInterface {
            action: ExitAction::SentOut,
            ..
        }
    ));
    assert!(matches!(
        trace.hops()[1].steps[0],
        Step::EnterSourceInterface { ref detail, action: EnterAction::Accepted }
            if detail.input_interface.as_ref().map(|ni| ni.interface.as_str()) == Some("eth0")
    ));
}

#[test]
fn test_equal_routes_to_same_next_hop_make_one_branch() {
    let mut ospf = Route::via(prefix("10.9.0.0/16"), ip("10.0.12.2"), None);
    ospf.source = RouteSource::Ospf;
    let state = two_routers(r1(), r2())
        .route("r1", Route::via(prefix("10.9.0.0/16"), ip("10.0.12.2"), None))
        .route("r1", ospf)
        .build();

    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "10.9.1.1")])
        .unwrap();

    // r2 has no route onwards, so the single branch ends there
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::NoRoute);
    assert_eq!(trace.path(), vec!["r1", "r2"]);
    match &trace.hops()[0].steps[1] {
        Step::SourceToOutputInterfaceRouting { detail, .. } => {
            assert_eq!(detail.routes_considered.len(), 2);
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[test]
fn test_ecmp_fans_out() {
    let mut r1 = r1();
    r1.add_interface(Interface::new("eth2").with_address(ip("10.0.13.1"), 24));
    let state = two_routers(r1, r2())
        .route("r1", Route::via(prefix("10.9.0.0/16"), ip("10.0.12.2"), None))
        .route("r1", Route::via(prefix("10.9.0.0/16"), ip("10.0.13.3"), None))
        .build();

    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "10.9.1.1")])
        .unwrap();
    let traces = results.values().next().unwrap();

    assert_eq!(traces.len(), 2);
    let dispositions: Vec<FlowDisposition> = traces.iter().map(|t| t.disposition()).collect();
    assert!(dispositions.contains(&FlowDisposition::NoRoute));
    assert!(dispositions.contains(&FlowDisposition::NeighborUnreachableOrExitsNetwork));
}

#[test]
fn test_forwarding_loop() {
    let state = default_route_r1_to_r2(two_routers(r1(), r2()))
        .route("r2", Route::via(prefix("0.0.0.0/0"), ip("10.0.12.1"), None))
        .build();
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "8.8.8.8")])
        .unwrap();

    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Loop);
    assert_eq!(trace.path(), vec!["r1", "r2", "r1"]);
}

#[test]
fn test_exploration_limits() {
    let state = default_route_r1_to_r2(two_routers(r1(), r2()))
        .route("r2", Route::via(prefix("0.0.0.0/0"), ip("10.0.12.1"), None))
        .build();
    let flows = [flow("192.168.1.10", "8.8.8.8")];

    let shallow = TracerouteEngine::new(
        state.clone(),
        EngineSettings {
            max_hops: 2,
            ..EngineSettings::default()
        },
    );
    assert!(matches!(
        shallow.trace_flows(&flows),
        Err(Error::ExplorationLimit { .. })
    ));

    let narrow = TracerouteEngine::new(
        state,
        EngineSettings {
            max_branches: 1,
            ..EngineSettings::default()
        },
    );
    assert!(matches!(
        narrow.trace_flows(&flows),
        Err(Error::ExplorationLimit { .. })
    ));
}

#[test]
fn test_ingress_arp_failure_admits_nothing() {
    let state = two_routers(r1(), r2()).build();
    let flow = flow("192.168.1.10", "10.0.12.2").with_ingress_interface("eth1");
    let engine = engine(state, false);

    let results = engine.trace_flows(&[flow.clone()]).unwrap();
    assert!(results[&flow].is_empty());
    assert_eq!(engine.metrics().flows_not_admitted.get(), 1);
}

#[test]
fn test_remote_arp_gate() {
    let mut r3 = Configuration::new("r3");
    r3.add_interface(
        Interface::new("eth0")
            .with_address(ip("10.0.12.3"), 24)
            .with_address(ip("10.0.12.99"), 24),
    );
    let state = two_routers(r1(), r2())
        .node(r3)
        .link("r1:eth0", "r3:eth0")
        .build();

    // r2 does not answer for .99, so only the edge to r3 is followed
    let results = engine(state, false)
        .trace_flows(&[flow("192.168.1.10", "10.0.12.99")])
        .unwrap();
    let trace = single_trace(&results);
    assert_eq!(trace.disposition(), FlowDisposition::Accepted);
    assert_eq!(trace.path(), vec!["r1", "r3"]);
}

#[test]
fn test_invalid_flows_fail_fast() {
    let state = two_routers(r1(), r2()).build();
    let engine = engine(state, false);

    let unknown = Flow::new("r9", ip("1.1.1.1"), ip("2.2.2.2"));
    assert!(matches!(
        engine.trace_flows(&[flow("192.168.1.10", "10.0.12.1"), unknown]),
        Err(Error::IngressNodeNotFound { .. })
    ));

    let mut no_dst = flow("192.168.1.10", "10.0.12.1");
    no_dst.dst_ip = None;
    assert!(matches!(
        engine.trace_flow(&no_dst),
        Err(Error::MissingDestination { .. })
    ));
    assert_eq!(engine.metrics().flows_traced.get(), 0);
}

#[test]
fn test_unknown_ingress_interface() {
    let state = two_routers(r1(), r2()).build();
    let flow = flow("192.168.1.10", "10.0.12.2").with_ingress_interface("eth7");
    assert!(matches!(
        engine(state, false).trace_flow(&flow),
        Err(Error::InterfaceNotFound { .. })
    ));
}

#[test]
fn test_neighbor_missing_from_configurations() {
    let state = two_routers(r1(), r2())
        .link("r1:eth1", "ghost:eth0")
        .arp("ghost:eth0", "0.0.0.0/0")
        .build();
    assert!(matches!(
        engine(state, false).trace_flow(&flow("10.0.12.2", "192.168.1.50")),
        Err(Error::NodeNotFound { ref node }) if node == "ghost"
    ));
}

#[test]
fn test_undefined_filter_is_an_error() {
    let mut r1 = r1();
    r1.add_interface(
        Interface::new("eth0")
            .with_address(ip("10.0.12.1"), 24)
            .with_outgoing_filter("NOT_THERE"),
    );
    let state = two_routers(r1, r2()).build();
    assert!(matches!(
        engine(state, false).trace_flow(&flow("192.168.1.10", "10.0.12.2")),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_deterministic_results() {
    let mut r1 = r1();
    r1.add_interface(Interface::new("eth2").with_address(ip("10.0.13.1"), 24));
    let state = default_route_r1_to_r2(two_routers(r1, r2()))
        .route("r1", Route::via(prefix("10.9.0.0/16"), ip("10.0.12.2"), None))
        .route("r1", Route::via(prefix("10.9.0.0/16"), ip("10.0.13.3"), None))
        .build();
    let flows: Vec<Flow> = (1..=20)
        .map(|i| flow(&format!("192.168.1.{}", i), &format!("10.9.0.{}", i)))
        .chain([flow("192.168.1.10", "8.8.8.8"), flow("192.168.1.10", "192.168.2.1")])
        .collect();

    let sequential = engine(state.clone(), false).trace_flows(&flows).unwrap();
    let again = engine(state.clone(), false).trace_flows(&flows).unwrap();
    let pooled = TracerouteEngine::new(
        state,
        EngineSettings {
            threads: 4,
            ..EngineSettings::default()
        },
    )
    .trace_flows(&flows)
    .unwrap();

    assert_eq!(sequential, again);
    assert_eq!(sequential, pooled);
    assert_eq!(sequential.len(), flows.len());
}
