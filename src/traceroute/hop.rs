//! Per-hop processing
//!
//! A `HopProcessor` explores every branch of a single flow. Pending hops
//! live on an explicit stack; each one runs the enter, route and exit phases
//! on one node and either closes a trace or pushes the hops it forwards to.

use super::adapters::{FilterEvaluator, NatApplier, NatField};
use super::context::{Breadcrumb, BranchContext};
use super::engine::EngineSettings;
use super::step::{
    EnterAction, EnterSourceInterfaceDetail, ExitAction, ExitOutputInterfaceDetail,
    RoutingAction, RoutingDetail, Step,
};
use super::trace::{Hop, Trace};
use crate::dataplane::{
    Configuration, FilterResult, ForwardingState, Interface, NatRule, NodeInterface,
    NULL_INTERFACE_NAME,
};
use crate::flow::Flow;
use crate::telemetry::TraceMetrics;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// Node standing in for the world outside an ingress interface
pub const DUMMY_NODE: &str = "traceroute_dummy_node";
/// Interface of `DUMMY_NODE` the packet leaves through
pub const DUMMY_OUT_INTERFACE: &str = "traceroute_dummy_out_interface";

/// A hop waiting to be processed
struct PendingHop<'a> {
    node: String,
    /// Physical interface the packet arrives on
    input_interface: Option<String>,
    /// Originating VRF, used when there is no input interface
    input_vrf: Option<String>,
    flow: Flow,
    ctx: BranchContext<'a>,
}

/// The candidate next hop of one route group
struct NextHop<'n> {
    /// Interface the packet entered the node on, seen by egress ACLs and NAT guards
    input_interface: Option<&'n str>,
    interface: &'n str,
    final_next_hop: Option<Ipv4Addr>,
}

/// Explores all branches of one flow
pub(crate) struct HopProcessor<'a> {
    state: &'a ForwardingState,
    settings: &'a EngineSettings,
    filter: &'a dyn FilterEvaluator,
    nat: &'a dyn NatApplier,
    metrics: &'a TraceMetrics,
    flow: &'a Flow,
    stack: Vec<PendingHop<'a>>,
    traces: BTreeSet<Trace>,
    explored: usize,
}

impl<'a> HopProcessor<'a> {
    pub fn new(
        state: &'a ForwardingState,
        settings: &'a EngineSettings,
        filter: &'a dyn FilterEvaluator,
        nat: &'a dyn NatApplier,
        metrics: &'a TraceMetrics,
        flow: &'a Flow,
    ) -> Self {
        Self {
            state,
            settings,
            filter,
            nat,
            metrics,
            flow,
            stack: Vec::new(),
            traces: BTreeSet::new(),
            explored: 0,
        }
    }

    /// Explore the flow from its ingress point and return its distinct traces.
    ///
    /// The flow must already be validated. A flow entering through an
    /// interface that would not answer ARP for its destination yields no
    /// traces.
    pub fn run(mut self) -> Result<BTreeSet<Trace>> {
        let flow = self.flow;
        let state = self.state;
        let ingress = state.configuration(&flow.ingress_node)?;
        let dst = destination(flow)?;
        let ctx = BranchContext::new(&flow.ingress_node, flow);

        match flow.ingress_interface {
            Some(ref iface) => {
                ingress.interface(iface)?;
                if !state.forwarding_analysis().is_arp_successful(
                    &flow.ingress_node,
                    iface,
                    dst,
                ) {
                    debug!(
                        "{}[{}] does not answer ARP for {}, flow {} not admitted",
                        flow.ingress_node, iface, dst, flow
                    );
                    self.metrics.flows_not_admitted.inc();
                    return Ok(self.traces);
                }

                let outside = Hop::new(
                    DUMMY_NODE,
                    vec![Step::ExitOutputInterface {
                        detail: ExitOutputInterfaceDetail::new(NodeInterface::new(
                            DUMMY_NODE,
                            DUMMY_OUT_INTERFACE,
                        )),
                        action: ExitAction::SentOut,
                    }],
                );
                self.stack.push(PendingHop {
                    node: flow.ingress_node.clone(),
                    input_interface: Some(iface.clone()),
                    input_vrf: None,
                    flow: flow.clone(),
                    ctx: ctx.push_hop(outside),
                });
            }
            None => {
                self.stack.push(PendingHop {
                    node: flow.ingress_node.clone(),
                    input_interface: None,
                    input_vrf: Some(flow.origin_vrf().to_string()),
                    flow: flow.clone(),
                    ctx,
                });
            }
        }

        while let Some(pending) = self.stack.pop() {
            self.explored += 1;
            if self.explored > self.settings.max_branches {
                return Err(Error::ExplorationLimit {
                    flow: flow.to_string(),
                    limit: format!("{} explored hops", self.settings.max_branches),
                });
            }
            if pending.ctx.hop_count() >= self.settings.max_hops {
                return Err(Error::ExplorationLimit {
                    flow: flow.to_string(),
                    limit: format!("{} hops per trace", self.settings.max_hops),
                });
            }
            self.metrics.hops_explored.inc();
            self.process_hop(pending)?;
        }

        debug!(
            "Flow {}: {} traces from {} hops",
            flow,
            self.traces.len(),
            self.explored
        );
        Ok(self.traces)
    }

    fn process_hop(&mut self, pending: PendingHop<'a>) -> Result<()> {
        let PendingHop {
            node,
            input_interface,
            input_vrf,
            flow,
            ctx,
        } = pending;

        let state = self.state;
        let config = state.configuration(&node)?;
        let ctx = ctx.enter_node(config).with_flow(flow);
        let input = match input_interface {
            Some(ref name) => Some(config.interface(name)?),
            None => None,
        };
        let vrf = input
            .map(|iface| iface.vrf.clone())
            .or(input_vrf)
            .unwrap_or_else(|| ctx.original_flow().origin_vrf().to_string());

        let mut enter = EnterSourceInterfaceDetail {
            input_interface: input.map(|iface| NodeInterface::new(&node, &iface.name)),
            input_vrf: input.is_none().then(|| vrf.clone()),
            input_filter: None,
            input_filter_line: None,
        };

        // incoming filter
        if let Some(iface) = input {
            if let Some(ref filter) = iface.incoming_filter {
                if !self.settings.ignore_acls {
                    let result =
                        self.evaluate_filter(config, filter, &ctx, Some(iface.name.as_str()))?;
                    enter.input_filter = Some(filter.clone());
                    enter.input_filter_line = result.matched_line;
                    if result.is_denied() {
                        debug!("{}: {} denied in by {}", node, ctx.transformed_flow(), filter);
                        return self.close(
                            &ctx,
                            vec![Step::EnterSourceInterface {
                                detail: enter,
                                action: EnterAction::DeniedIn,
                            }],
                        );
                    }
                }
            }
        }

        // destination NAT
        let ctx = match input {
            Some(iface) if !iface.destination_nats.is_empty() => {
                let natted = self.apply_nat(
                    &ctx,
                    iface,
                    Some(iface.name.as_str()),
                    &iface.destination_nats,
                    NatField::Destination,
                )?;
                ctx.with_flow(natted)
            }
            _ => ctx,
        };

        let crumb = Breadcrumb {
            node: node.clone(),
            vrf: vrf.clone(),
            flow: ctx.transformed_flow().clone(),
        };
        if ctx.has_visited(&crumb) {
            debug!("{}: loop detected in vrf {}", node, vrf);
            return self.close(
                &ctx,
                vec![Step::EnterSourceInterface {
                    detail: enter,
                    action: EnterAction::Loop,
                }],
            );
        }
        let ctx = ctx.visit(crumb);

        let dst = destination(ctx.transformed_flow())?;
        if state.ip_owners().is_owned_by(dst, &node, &vrf) {
            return self.close(
                &ctx,
                vec![Step::EnterSourceInterface {
                    detail: enter,
                    action: EnterAction::Accepted,
                }],
            );
        }

        let steps = vec![Step::EnterSourceInterface {
            detail: enter,
            action: EnterAction::SentIn,
        }];

        let groups = self.route_groups(&node, &vrf, dst);
        if groups.is_empty() {
            debug!("{}: no route to {} in vrf {}", node, dst, vrf);
            let mut steps = steps;
            steps.push(Step::SourceToOutputInterfaceRouting {
                detail: RoutingDetail::default(),
                action: RoutingAction::NoRoute,
            });
            return self.close(&ctx, steps);
        }

        // Exit phases push their next hops onto the stack; reversing keeps
        // the depth-first exploration in sorted group order.
        for ((interface, final_next_hop), routes) in groups.into_iter().rev() {
            let mut hop_steps = steps.clone();
            hop_steps.push(Step::SourceToOutputInterfaceRouting {
                detail: RoutingDetail {
                    routes_considered: routes.clone(),
                },
                action: RoutingAction::Forwarded,
            });
            let next_hop = NextHop {
                input_interface: input.map(|iface| iface.name.as_str()),
                interface: &interface,
                final_next_hop,
            };
            self.exit(config, &vrf, next_hop, hop_steps, ctx.with_routes(routes))?;
        }
        Ok(())
    }

    /// FIB matches grouped by (interface, final next hop), each labelled with
    /// the routes that contributed it
    fn route_groups(
        &self,
        node: &str,
        vrf: &str,
        dst: Ipv4Addr,
    ) -> BTreeMap<(String, Option<Ipv4Addr>), BTreeSet<String>> {
        let mut groups: BTreeMap<(String, Option<Ipv4Addr>), BTreeSet<String>> = BTreeMap::new();
        let Some(fib) = self.state.fib(node, vrf) else {
            debug!("{}: no FIB for vrf {}", node, vrf);
            return groups;
        };

        for (route, resolution) in fib.next_hop_interfaces_by_route(dst) {
            for (interface, by_next_hop) in resolution {
                for final_next_hop in by_next_hop.keys() {
                    let label = match final_next_hop {
                        Some(ip) => format!("{} fnh:{}", route, ip),
                        None => format!("{} fnh:none", route),
                    };
                    groups
                        .entry((interface.clone(), *final_next_hop))
                        .or_default()
                        .insert(label);
                }
            }
        }
        groups
    }

    fn exit(
        &mut self,
        config: &'a Configuration,
        vrf: &str,
        next_hop: NextHop<'_>,
        mut steps: Vec<Step>,
        ctx: BranchContext<'a>,
    ) -> Result<()> {
        let state = self.state;
        let node = config.hostname.as_str();
        trace!(
            "{}: exit {} via {:?} for {:?}",
            node,
            next_hop.interface,
            next_hop.final_next_hop,
            ctx.routes_considered()
        );
        let mut detail = ExitOutputInterfaceDetail::new(NodeInterface::new(node, next_hop.interface));

        if next_hop.interface == NULL_INTERFACE_NAME {
            steps.push(Step::ExitOutputInterface {
                detail,
                action: ExitAction::NullRouted,
            });
            return self.close(&ctx, steps);
        }

        let output = config.interface(next_hop.interface)?;
        if let Some(ref filter) = output.outgoing_filter {
            if !self.settings.ignore_acls {
                let result =
                    self.evaluate_filter(config, filter, &ctx, next_hop.input_interface)?;
                detail.output_filter = Some(filter.clone());
                detail.output_filter_line = result.matched_line;
                if result.is_denied() {
                    debug!("{}: {} denied out by {}", node, ctx.transformed_flow(), filter);
                    steps.push(Step::ExitOutputInterface {
                        detail,
                        action: ExitAction::DeniedOut,
                    });
                    return self.close(&ctx, steps);
                }
            }
        }

        let dst = destination(ctx.transformed_flow())?;
        let arp_ip = next_hop.final_next_hop.unwrap_or(dst);
        let fa = state.forwarding_analysis();
        if fa.is_neighbor_unreachable(node, vrf, next_hop.interface, arp_ip) {
            steps.push(Step::ExitOutputInterface {
                detail,
                action: ExitAction::NeighborUnreachableOrExitsNetwork,
            });
            return self.close(&ctx, steps);
        }

        let natted = if output.source_nats.is_empty() {
            ctx.transformed_flow().clone()
        } else {
            self.apply_nat(
                &ctx,
                output,
                next_hop.input_interface,
                &output.source_nats,
                NatField::Source,
            )?
        };
        if natted != *ctx.original_flow() {
            detail.transformed_flow = Some(natted.clone());
        }

        let edges: Vec<_> = state
            .topology()
            .interface_edges(node, next_hop.interface)
            .collect();

        if edges.is_empty() {
            // The outgoing filter already permitted this flow above.
            steps.push(Step::ExitOutputInterface {
                detail,
                action: ExitAction::NeighborUnreachableOrExitsNetwork,
            });
            return self.close(&ctx.with_flow(natted), steps);
        }

        let ctx = ctx.with_flow(natted);
        for edge in edges.into_iter().rev() {
            if !fa.is_arp_successful(&edge.head.node, &edge.head.interface, arp_ip) {
                debug!("{} does not answer ARP for {}, edge not followed", edge.head, arp_ip);
                continue;
            }
            let mut hop_steps = steps.clone();
            hop_steps.push(Step::ExitOutputInterface {
                detail: detail.clone(),
                action: ExitAction::SentOut,
            });
            self.stack.push(PendingHop {
                node: edge.head.node.clone(),
                input_interface: Some(edge.head.interface.clone()),
                input_vrf: None,
                flow: ctx.transformed_flow().clone(),
                ctx: ctx.push_hop(Hop::new(node, hop_steps)),
            });
        }
        Ok(())
    }

    /// Evaluate a named filter; an undefined filter is a configuration error
    fn evaluate_filter(
        &self,
        config: &Configuration,
        filter: &str,
        ctx: &BranchContext<'a>,
        src_interface: Option<&str>,
    ) -> Result<FilterResult> {
        let acl = config.acl(filter).ok_or_else(|| {
            Error::Config(format!(
                "filter {} referenced on {} is not defined",
                filter, config.hostname
            ))
        })?;
        Ok(self.filter.evaluate(
            acl,
            ctx.transformed_flow(),
            src_interface,
            ctx.acls(),
            ctx.ip_spaces(),
        ))
    }

    fn apply_nat(
        &self,
        ctx: &BranchContext<'a>,
        iface: &Interface,
        src_interface: Option<&str>,
        rules: &[NatRule],
        field: NatField,
    ) -> Result<Flow> {
        self.nat
            .apply_first_matching_rule(
                ctx.transformed_flow(),
                src_interface,
                ctx.acls(),
                ctx.ip_spaces(),
                rules,
                field,
            )
            .map_err(|invalid| Error::InvalidNatRule {
                node: ctx.current_node().to_string(),
                interface: iface.name.clone(),
                rule: invalid.to_string(),
            })
    }

    /// Finish the branch with a hop of `steps` on the current node
    fn close(&mut self, ctx: &BranchContext<'a>, steps: Vec<Step>) -> Result<()> {
        let hop = Hop::new(ctx.current_node(), steps);
        let trace = Trace::new(ctx.close(hop)).ok_or_else(|| {
            Error::Internal(format!(
                "branch of flow {} closed without a terminal step",
                ctx.original_flow()
            ))
        })?;
        trace!("Trace closed: {}", trace.disposition());
        self.metrics.record_trace(trace.disposition());
        self.traces.insert(trace);
        Ok(())
    }
}

fn destination(flow: &Flow) -> Result<Ipv4Addr> {
    flow.dst_ip.ok_or_else(|| Error::MissingDestination {
        flow: flow.to_string(),
    })
}
