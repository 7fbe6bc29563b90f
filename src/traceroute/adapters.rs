//! Filter and NAT strategies
//!
//! The hop processor never matches ACLs or picks NAT rules itself; it asks a
//! `FilterEvaluator` and a `NatApplier`. The defaults delegate to the
//! dataplane ACL model.

use crate::dataplane::{Acl, AclDefinitions, FilterResult, NamedIpSpaces, NatRule};
use crate::flow::Flow;
use std::fmt;
use tracing::{trace, warn};

/// Evaluates an ACL against a flow
pub trait FilterEvaluator: Send + Sync {
    /// Returns the action taken and the line that decided it
    fn evaluate(
        &self,
        acl: &Acl,
        flow: &Flow,
        src_interface: Option<&str>,
        acls: &AclDefinitions,
        ip_spaces: &NamedIpSpaces,
    ) -> FilterResult;
}

/// Which address a NAT rule rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatField {
    Source,
    Destination,
}

/// A rule matched but cannot be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNatRule(pub NatRule);

impl fmt::Display for InvalidNatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applies the first matching rule of an ordered NAT rule list
pub trait NatApplier: Send + Sync {
    /// Returns the rewritten flow, or a copy of `flow` when no rule matches
    fn apply_first_matching_rule(
        &self,
        flow: &Flow,
        src_interface: Option<&str>,
        acls: &AclDefinitions,
        ip_spaces: &NamedIpSpaces,
        rules: &[NatRule],
        field: NatField,
    ) -> std::result::Result<Flow, InvalidNatRule>;
}

/// First-match ACL evaluation
#[derive(Debug, Clone, Copy, Default)]
pub struct AclEvaluator;

impl FilterEvaluator for AclEvaluator {
    fn evaluate(
        &self,
        acl: &Acl,
        flow: &Flow,
        src_interface: Option<&str>,
        _acls: &AclDefinitions,
        ip_spaces: &NamedIpSpaces,
    ) -> FilterResult {
        let result = acl.filter(flow, src_interface, ip_spaces);
        trace!(
            "ACL {} -> {:?} (line {:?})",
            acl.name,
            result.action,
            result.matched_line
        );
        result
    }
}

/// Rewrites to the pool start of the first rule whose guard does not deny
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatchNat;

impl NatApplier for FirstMatchNat {
    fn apply_first_matching_rule(
        &self,
        flow: &Flow,
        src_interface: Option<&str>,
        acls: &AclDefinitions,
        ip_spaces: &NamedIpSpaces,
        rules: &[NatRule],
        field: NatField,
    ) -> std::result::Result<Flow, InvalidNatRule> {
        let matching = rules.iter().find(|rule| {
            let Some(ref guard) = rule.acl else {
                return false;
            };
            match acls.get(guard) {
                Some(acl) => !AclEvaluator
                    .evaluate(acl, flow, src_interface, acls, ip_spaces)
                    .is_denied(),
                None => {
                    warn!("NAT guard ACL {} is not defined, rule skipped", guard);
                    false
                }
            }
        });

        let Some(rule) = matching else {
            return Ok(flow.clone());
        };
        let pool_start = rule
            .pool_start
            .ok_or_else(|| InvalidNatRule(rule.clone()))?;

        Ok(match field {
            NatField::Source => flow.with_src_ip(pool_start),
            NatField::Destination => flow.with_dst_ip(pool_start),
        })
    }
}
