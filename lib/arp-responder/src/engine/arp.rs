// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! ARP replies synthesized in the switch.

use super::FlowRule;
use crate::api::Direction;
use crate::api::Ipv4Cidr;
use crate::api::MacAddr;
use crate::api::Priority;
use crate::api::TableId;
use arpd::engine::arp::ArpOp;
use arpd::engine::ether::ETHER_TYPE_ARP;
use arpd::engine::field::Field;
use arpd::engine::field::SCRATCH_REG;
use arpd::engine::predicate::EtherTypeMatch;
use arpd::engine::predicate::Ipv4AddrMatch;
use arpd::engine::predicate::Predicate;
use arpd::engine::rule::Action;
use arpd::engine::rule::DEFAULT_PRIORITY;
use arpd::engine::rule::Rule;
use arpd::engine::rule::swap_via;

/// Priority of the per-subnet reply rules.
pub const ARP_REPLY_PRIORITY: Priority = DEFAULT_PRIORITY;

/// Priority of the rule dropping ARP requests for any other address.
pub const ARP_DROP_PRIORITY: Priority = 1;

fn inbound_arp() -> Vec<Predicate> {
    vec![
        Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_ARP)),
        Predicate::Direction(Direction::In),
    ]
}

/// Turn an ARP request into the reply claiming `vmac` for the target
/// address, and send it back where it came from.
pub fn arp_reply_actions(vmac: MacAddr) -> Vec<Action> {
    let mut actions = vec![
        // Reply to the requester.
        Action::mv(Field::EthSrc, Field::EthDst),
        Action::set_mac(Field::EthSrc, vmac),
        Action::set_field(Field::ArpOp, u64::from(ArpOp::REPLY.val())),
        Action::mv(Field::ArpSha, Field::ArpTha),
        Action::set_mac(Field::ArpSha, vmac),
    ];

    // The target becomes the sender and vice versa.
    actions.extend(swap_via(Field::ArpTpa, Field::ArpSpa, SCRATCH_REG));
    actions.push(Action::OutputInPort);
    actions
}

/// Build one reply rule per subnet, in the order given, followed by a
/// rule dropping every other inbound ARP packet.
pub fn synthesize_arp_rules(
    table: TableId,
    subnets: &[Ipv4Cidr],
    vmac: MacAddr,
) -> Vec<FlowRule> {
    let mut rules: Vec<FlowRule> = subnets
        .iter()
        .map(|subnet| {
            let mut rule =
                Rule::new(ARP_REPLY_PRIORITY, arp_reply_actions(vmac));
            rule.add_predicates(inbound_arp());
            rule.add_predicate(Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
                *subnet,
            )));
            FlowRule::new(table, rule.finalize())
        })
        .collect();

    let mut drop = Rule::new(ARP_DROP_PRIORITY, vec![]);
    drop.add_predicates(inbound_arp());
    rules.push(FlowRule::new(table, drop.finalize()));

    rules
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reply_action_order() {
        let vmac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let actions: Vec<String> =
            arp_reply_actions(vmac).iter().map(ToString::to_string).collect();

        assert_eq!(
            actions,
            vec![
                "move:NXM_OF_ETH_SRC[]->NXM_OF_ETH_DST[]",
                "set_field:aa:bb:cc:dd:ee:ff->eth_src",
                "set_field:2->arp_op",
                "move:NXM_NX_ARP_SHA[]->NXM_NX_ARP_THA[]",
                "set_field:aa:bb:cc:dd:ee:ff->arp_sha",
                "move:NXM_OF_ARP_TPA[]->NXM_NX_REG0[]",
                "move:NXM_OF_ARP_SPA[]->NXM_OF_ARP_TPA[]",
                "move:NXM_NX_REG0[]->NXM_OF_ARP_SPA[]",
                "in_port",
            ]
        );
    }

    #[test]
    fn one_rule_per_subnet() {
        let subnets: Vec<Ipv4Cidr> = ["10.1.0.0/16", "192.168.128.0/24"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let vmac = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let rules = synthesize_arp_rules(5, &subnets, vmac);

        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| r.table == 5));
        assert!(rules.iter().all(|r| r.rule.validate().is_ok()));
        assert_eq!(
            rules[1].rule.predicates()[2],
            Predicate::ArpTpa(Ipv4AddrMatch::Prefix(subnets[1]))
        );

        let drop = &rules[2].rule;
        assert!(drop.is_drop());
        assert!(drop.priority() < rules[0].rule.priority());
    }

    #[test]
    fn no_subnets_drops_all() {
        let rules = synthesize_arp_rules(1, &[], MacAddr::ZERO);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].rule.is_drop());
    }
}
