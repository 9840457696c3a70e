// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Rules for traffic the responder does not answer itself.

use super::FlowRule;
use crate::api::Direction;
use crate::api::MacAddr;
use crate::api::Priority;
use crate::api::TableId;
use arpd::engine::ether::ETHER_TYPE_IPV4;
use arpd::engine::field::Field;
use arpd::engine::predicate::EtherTypeMatch;
use arpd::engine::predicate::Predicate;
use arpd::engine::rule::Action;
use arpd::engine::rule::MINIMUM_PRIORITY;
use arpd::engine::rule::Rule;

/// Priority of the egress destination rewrite. It shares a tier with
/// the ARP drop rule, whose match is disjoint from it.
pub const EGRESS_REWRITE_PRIORITY: Priority = 1;

/// Priority of the pass-through rule.
pub const FALLBACK_PRIORITY: Priority = MINIMUM_PRIORITY;

/// Build the egress rewrite, setting the destination MAC of outgoing
/// IPv4 packets to `vmac`, and the unconditional pass-through to
/// `next_table`.
pub fn build_fallback_rules(
    table: TableId,
    next_table: TableId,
    vmac: MacAddr,
) -> Vec<FlowRule> {
    let mut egress = Rule::new(
        EGRESS_REWRITE_PRIORITY,
        vec![
            Action::set_mac(Field::EthDst, vmac),
            Action::Resubmit(next_table),
        ],
    );
    egress.add_predicates(vec![
        Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_IPV4)),
        Predicate::Direction(Direction::Out),
    ]);

    let fallback =
        Rule::match_any(FALLBACK_PRIORITY, vec![Action::Resubmit(next_table)]);

    vec![
        FlowRule::new(table, egress.finalize()),
        FlowRule::new(table, fallback),
    ]
}
