// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A software model of a switch's flow tables.
//!
//! The model executes installed rules the way the switch fast path
//! does: the highest priority matching rule of a table is applied,
//! actions run strictly in order on a single copy of the packet, and a
//! table with no matching rule drops the packet. Among rules of equal
//! priority the earliest installed wins; rule sets that depend on this
//! order are rejected elsewhere, as a real switch gives no such
//! guarantee.
//!
//! A `resubmit` into a table the model holds no rules for stops
//! processing and reports a handoff: that table belongs to some other
//! stage of the pipeline.

use super::channel::FlowChannel;
use super::packet::FieldError;
use super::packet::PacketMeta;
use super::packet::PortId;
use super::rule::Action;
use super::rule::Finalized;
use super::rule::Rule;
use super::rule::RuleError;
use alloc::collections::BTreeMap;
use alloc::string::ToString;
use alloc::vec::Vec;
use arpd_api::ArpdError;
use arpd_api::Priority;
use arpd_api::TableId;
use core::fmt;
use core::fmt::Display;

/// The maximum number of nested resubmits before a packet is
/// considered to be looping.
pub const MAX_RESUBMIT_DEPTH: usize = 16;

/// A packet sent out a port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Emitted {
    pub port: PortId,
    pub pkt: PacketMeta,
}

/// A rule that was applied to the packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hit {
    pub table: TableId,
    pub priority: Priority,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessResult {
    /// Copies of the packet output by the applied rules, in order.
    pub emitted: Vec<Emitted>,

    /// The packet as handed to a table outside of this model.
    pub handoff: Option<(TableId, PacketMeta)>,

    /// The rules applied, in order.
    pub hits: Vec<Hit>,
}

impl ProcessResult {
    /// Did the packet go nowhere?
    pub fn is_drop(&self) -> bool {
        self.emitted.is_empty() && self.handoff.is_none()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessError {
    /// An action accessed a field the packet does not carry.
    Field(FieldError),

    /// Resubmits nested deeper than [`MAX_RESUBMIT_DEPTH`].
    ResubmitLoop(TableId),
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Field(e) => write!(f, "{e}"),
            Self::ResubmitLoop(table) => {
                write!(f, "resubmit loop detected at table {table}")
            }
        }
    }
}

impl From<FieldError> for ProcessError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlowTable {
    tables: BTreeMap<TableId, Vec<Rule<Finalized>>>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a rule.
    ///
    /// Rules are kept in descending priority order, with a new rule
    /// placed after any existing rules of the same priority. A rule
    /// with the same priority and match as an installed one replaces
    /// it.
    pub fn add(
        &mut self,
        table: TableId,
        rule: Rule<Finalized>,
    ) -> Result<(), RuleError> {
        rule.validate()?;
        let rules = self.tables.entry(table).or_default();

        if let Some(existing) = rules
            .iter_mut()
            .find(|r| r.priority() == rule.priority() && r.same_match(&rule))
        {
            *existing = rule;
            return Ok(());
        }

        match rules.iter().position(|r| r.priority() < rule.priority()) {
            Some(pos) => rules.insert(pos, rule),
            None => rules.push(rule),
        }

        Ok(())
    }

    /// Remove all rules from a table, returning how many there were.
    pub fn clear_table(&mut self, table: TableId) -> usize {
        self.tables.remove(&table).map(|rules| rules.len()).unwrap_or(0)
    }

    /// The rules of a table, highest priority first.
    pub fn rules(&self, table: TableId) -> &[Rule<Finalized>] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_rules(&self, table: TableId) -> usize {
        self.rules(table).len()
    }

    /// The tables holding at least one rule.
    pub fn tables(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.iter().filter(|(_, r)| !r.is_empty()).map(|(t, _)| *t)
    }

    /// The rule a packet would hit in `table`, if any.
    pub fn find_match(
        &self,
        table: TableId,
        meta: &PacketMeta,
    ) -> Option<&Rule<Finalized>> {
        self.rules(table).iter().find(|r| r.is_match(meta))
    }

    /// Run a packet through the pipeline starting at `table`.
    pub fn process(
        &self,
        table: TableId,
        mut meta: PacketMeta,
    ) -> Result<ProcessResult, ProcessError> {
        let mut res = ProcessResult::default();
        self.process_table(table, &mut meta, &mut res, 0)?;
        Ok(res)
    }

    fn process_table(
        &self,
        table: TableId,
        meta: &mut PacketMeta,
        res: &mut ProcessResult,
        depth: usize,
    ) -> Result<(), ProcessError> {
        if depth > MAX_RESUBMIT_DEPTH {
            return Err(ProcessError::ResubmitLoop(table));
        }

        let rule = match self.find_match(table, meta) {
            Some(rule) => rule,
            // Table miss.
            None => return Ok(()),
        };

        res.hits.push(Hit { table, priority: rule.priority() });

        for action in rule.actions() {
            match action {
                Action::SetField { field, value } => meta.set(*field, *value)?,

                Action::Move { src, dst } => {
                    let val = meta.get(*src)?;
                    meta.set(*dst, val)?;
                }

                Action::OutputInPort => res
                    .emitted
                    .push(Emitted { port: meta.in_port, pkt: meta.clone() }),

                Action::Resubmit(next) if self.num_rules(*next) == 0 => {
                    res.handoff = Some((*next, meta.clone()));
                    return Ok(());
                }

                Action::Resubmit(next) => {
                    self.process_table(*next, meta, res, depth + 1)?;
                }
            }
        }

        Ok(())
    }
}

/// Use the model as the switch end of a control channel.
impl FlowChannel for FlowTable {
    fn delete_all_flows(&mut self, table: TableId) -> Result<(), ArpdError> {
        self.clear_table(table);
        Ok(())
    }

    fn install_flow(
        &mut self,
        table: TableId,
        rule: &Rule<Finalized>,
    ) -> Result<(), ArpdError> {
        self.add(table, rule.clone()).map_err(|e| ArpdError::Channel {
            op: "install_flow".to_string(),
            msg: e.to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::Direction;
    use crate::engine::ether::ETHER_TYPE_ARP;
    use crate::engine::field::Field;
    use crate::engine::predicate::EtherTypeMatch;
    use crate::engine::predicate::Predicate;
    use arpd_api::MacAddr;

    fn req() -> PacketMeta {
        PacketMeta::arp_request(
            3,
            "11:22:33:44:55:66".parse().unwrap(),
            "10.0.0.5".parse().unwrap(),
            "192.168.128.9".parse().unwrap(),
        )
        .with_direction(Direction::In)
    }

    fn arp_rule(priority: Priority, actions: Vec<Action>) -> Rule<Finalized> {
        let mut rule = Rule::new(priority, actions);
        rule.add_predicate(Predicate::EtherType(EtherTypeMatch::Exact(
            ETHER_TYPE_ARP,
        )));
        rule.finalize()
    }

    #[test]
    fn priority_order() {
        let mut ft = FlowTable::new();
        ft.add(1, Rule::match_any(0, vec![Action::Resubmit(2)])).unwrap();
        ft.add(1, arp_rule(10, vec![Action::OutputInPort])).unwrap();
        ft.add(1, arp_rule(5, vec![])).unwrap();

        let pris: Vec<_> = ft.rules(1).iter().map(|r| r.priority()).collect();
        assert_eq!(pris, vec![10, 5, 0]);

        let res = ft.process(1, req()).unwrap();
        assert_eq!(res.hits, vec![Hit { table: 1, priority: 10 }]);
        assert_eq!(res.emitted.len(), 1);
        assert_eq!(res.emitted[0].port, 3);
    }

    #[test]
    fn same_match_replaces() {
        let mut ft = FlowTable::new();
        ft.add(1, arp_rule(10, vec![])).unwrap();
        ft.add(1, arp_rule(10, vec![Action::OutputInPort])).unwrap();
        assert_eq!(ft.num_rules(1), 1);
        assert!(!ft.rules(1)[0].is_drop());
    }

    #[test]
    fn miss_drop_and_handoff() {
        let mut ft = FlowTable::new();
        ft.add(1, arp_rule(10, vec![])).unwrap();
        assert!(ft.process(1, req()).unwrap().is_drop());
        assert!(ft.process(9, req()).unwrap().is_drop());

        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        ft.add(
            2,
            Rule::match_any(
                0,
                vec![Action::set_mac(Field::EthDst, mac), Action::Resubmit(3)],
            ),
        )
        .unwrap();

        let res = ft.process(2, req()).unwrap();
        let (table, pkt) = res.handoff.unwrap();
        assert_eq!(table, 3);
        assert_eq!(pkt.eth_dst, mac);
    }

    #[test]
    fn resubmit_chain_and_loop() {
        let mut ft = FlowTable::new();
        ft.add(1, Rule::match_any(0, vec![Action::Resubmit(2)])).unwrap();
        ft.add(2, arp_rule(0, vec![Action::OutputInPort])).unwrap();
        let res = ft.process(1, req()).unwrap();
        assert_eq!(res.hits.len(), 2);
        assert_eq!(res.emitted.len(), 1);

        ft.add(3, Rule::match_any(0, vec![Action::Resubmit(3)])).unwrap();
        assert!(matches!(
            ft.process(3, req()),
            Err(ProcessError::ResubmitLoop(3))
        ));
    }

    #[test]
    fn channel_installs_and_clears() {
        let mut ft = FlowTable::new();
        let chan: &mut dyn FlowChannel = &mut ft;
        chan.install_flow(4, &arp_rule(10, vec![])).unwrap();

        // ARP fields without an ARP match are refused.
        let bad = Rule::match_any(0, vec![Action::set_field(Field::ArpOp, 2)]);
        assert!(matches!(
            chan.install_flow(4, &bad),
            Err(ArpdError::Channel { .. })
        ));

        chan.delete_all_flows(4).unwrap();
        assert_eq!(ft.num_rules(4), 0);
        assert_eq!(ft.tables().count(), 0);
    }
}
