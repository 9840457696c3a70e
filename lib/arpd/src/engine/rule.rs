// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Flow rules: a priority, a match, and an ordered action list.
//!
//! Actions are applied strictly in order and each one sees the packet
//! as left by the previous one. In particular a `move` is a
//! destructive copy: once `A` has been moved into `B`, the prior value
//! of `B` is gone. Exchanging two fields therefore needs a register to
//! buffer one of them, see [`swap_via()`].

use super::ether::ETHER_TYPE_ARP;
use super::field::Field;
use super::packet::PacketMeta;
use super::predicate::EtherTypeMatch;
use super::predicate::Predicate;
use alloc::vec::Vec;
use arpd_api::MacAddr;
use arpd_api::Priority;
use arpd_api::TableId;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The lowest priority a rule may have.
pub const MINIMUM_PRIORITY: Priority = 0;

/// The priority of ordinary rules.
pub const DEFAULT_PRIORITY: Priority = 10;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    /// Load a constant into a field.
    SetField { field: Field, value: u64 },

    /// Copy all bits of `src` into `dst`, overwriting `dst`.
    Move { src: Field, dst: Field },

    /// Send the packet back out the port it arrived on.
    OutputInPort,

    /// Continue processing the packet in another table.
    Resubmit(TableId),
}

impl Action {
    pub fn set_field(field: Field, value: u64) -> Self {
        Self::SetField { field, value }
    }

    pub fn set_mac(field: Field, mac: MacAddr) -> Self {
        Self::SetField { field, value: mac.to_u64() }
    }

    pub fn mv(src: Field, dst: Field) -> Self {
        Self::Move { src, dst }
    }

    /// The field this action reads, if any.
    fn reads(&self) -> Option<Field> {
        match self {
            Self::Move { src, .. } => Some(*src),
            _ => None,
        }
    }

    /// The field this action writes, if any.
    fn writes(&self) -> Option<Field> {
        match self {
            Self::SetField { field, .. } => Some(*field),
            Self::Move { dst, .. } => Some(*dst),
            _ => None,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SetField { field, value } => write!(
                f,
                "set_field:{}->{}",
                field.value(*value),
                field.ofctl_name()
            ),
            Self::Move { src, dst } => write!(f, "move:{src}[]->{dst}[]"),
            Self::OutputInPort => write!(f, "in_port"),
            Self::Resubmit(table) => write!(f, "resubmit(,{table})"),
        }
    }
}

/// Exchange the values of two fields using `scratch` as a buffer.
///
/// The three moves must stay in this order: `a` is saved before `b`
/// overwrites it, and the saved value is restored into `b` last.
pub fn swap_via(a: Field, b: Field, scratch: Field) -> [Action; 3] {
    [Action::mv(a, scratch), Action::mv(b, a), Action::mv(scratch, b)]
}

/// Reasons a rule or action list cannot be installed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleError {
    /// A register index beyond what the switch provides.
    BadRegister(u8),

    /// A move between fields of different widths.
    WidthMismatch { src: Field, dst: Field },

    /// A move of a field onto itself.
    SelfMove(Field),

    /// A constant that does not fit in the field it is loaded into.
    ValueTooWide { field: Field, value: u64 },

    /// A register read before anything in the same action list wrote
    /// it.
    ReadBeforeWrite(Field),

    /// `a -> b` followed by `b -> a` with nothing rewriting `b` in
    /// between. The second move copies the already-overwritten value.
    ClobberedSwap { a: Field, b: Field },

    /// A field used without the match pinning the ether type that
    /// carries it.
    MissingPrereq { field: Field, ether_type: u16 },

    /// More than one predicate constrains the same field.
    DuplicateMatch(Field),

    /// Two rules at the same priority could match the same packet.
    SameTierOverlap { priority: Priority, first: usize, second: usize },
}

impl Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadRegister(idx) => write!(f, "no such register: reg{idx}"),
            Self::WidthMismatch { src, dst } => write!(
                f,
                "cannot move {}-bit {src} into {}-bit {dst}",
                src.width(),
                dst.width()
            ),
            Self::SelfMove(field) => write!(f, "move of {field} onto itself"),
            Self::ValueTooWide { field, value } => {
                write!(f, "value 0x{value:x} does not fit in {field}")
            }
            Self::ReadBeforeWrite(field) => {
                write!(f, "{field} read before it was written")
            }
            Self::ClobberedSwap { a, b } => write!(
                f,
                "direct swap of {a} and {b} loses the value of {b}"
            ),
            Self::MissingPrereq { field, ether_type } => write!(
                f,
                "{field} requires a match on eth_type=0x{ether_type:04x}"
            ),
            Self::DuplicateMatch(field) => {
                write!(f, "{field} matched more than once")
            }
            Self::SameTierOverlap { priority, first, second } => write!(
                f,
                "rules {first} and {second} overlap at priority {priority}"
            ),
        }
    }
}

fn check_field(field: Field) -> Result<(), RuleError> {
    match field {
        Field::Reg(idx) if !field.is_valid() => {
            Err(RuleError::BadRegister(idx))
        }
        _ => Ok(()),
    }
}

/// Validate an action list on its own, independent of any match.
///
/// * Every field must exist and moves must be between fields of equal
///   width.
/// * Registers, other than those carrying pipeline metadata, must be
///   written before they are read.
/// * A two-field exchange may not be written as two direct moves.
pub fn validate_actions(actions: &[Action]) -> Result<(), RuleError> {
    for (i, action) in actions.iter().enumerate() {
        match action {
            Action::SetField { field, value } => {
                check_field(*field)?;
                if !field.fits(*value) {
                    return Err(RuleError::ValueTooWide {
                        field: *field,
                        value: *value,
                    });
                }
            }

            Action::Move { src, dst } => {
                check_field(*src)?;
                check_field(*dst)?;

                if src == dst {
                    return Err(RuleError::SelfMove(*src));
                }

                if src.width() != dst.width() {
                    return Err(RuleError::WidthMismatch {
                        src: *src,
                        dst: *dst,
                    });
                }

                if src.is_reg()
                    && !src.is_pipeline_metadata()
                    && !actions[..i].iter().any(|a| a.writes() == Some(*src))
                {
                    return Err(RuleError::ReadBeforeWrite(*src));
                }

                check_clobbered_swap(&actions[i + 1..], *src, *dst)?;
            }

            Action::OutputInPort | Action::Resubmit(_) => (),
        }
    }

    Ok(())
}

// Having just moved `a` into `b`, look for a later `b -> a` that is
// not preceded by a fresh write to `b`.
fn check_clobbered_swap(
    rest: &[Action],
    a: Field,
    b: Field,
) -> Result<(), RuleError> {
    for action in rest {
        if action.reads() == Some(b) && action.writes() == Some(a) {
            return Err(RuleError::ClobberedSwap { a, b });
        }

        if action.writes() == Some(b) {
            break;
        }
    }

    Ok(())
}

pub trait RuleState {}

#[derive(Clone, Debug)]
pub struct Ready {
    preds: Vec<Predicate>,
}
impl RuleState for Ready {}

#[derive(Clone, Debug)]
pub struct Finalized {
    preds: Option<Vec<Predicate>>,
}
impl RuleState for Finalized {}

#[derive(Clone, Debug)]
pub struct Rule<S: RuleState> {
    state: S,
    actions: Vec<Action>,
    priority: Priority,
}

impl<S: RuleState> Rule<S> {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl Rule<Ready> {
    /// Create a new rule with the given priority and actions. An
    /// empty action list drops the packet.
    pub fn new(priority: Priority, actions: Vec<Action>) -> Self {
        Rule { state: Ready { preds: vec![] }, actions, priority }
    }

    /// Create a new rule that matches anything.
    ///
    /// This moves directly to the [`Finalized`] state; preventing any
    /// chance for adding a predicate.
    pub fn match_any(
        priority: Priority,
        actions: Vec<Action>,
    ) -> Rule<Finalized> {
        Rule { state: Finalized { preds: None }, actions, priority }
    }

    /// Add a single [`Predicate`] to the end of the list.
    pub fn add_predicate(&mut self, pred: Predicate) {
        self.state.preds.push(pred);
    }

    /// Append a list of [`Predicate`]s to the existing list.
    pub fn add_predicates(&mut self, preds: Vec<Predicate>) {
        self.state.preds.extend(preds);
    }

    /// Finalize the rule; locking all predicates in stone.
    pub fn finalize(self) -> Rule<Finalized> {
        let preds = if self.state.preds.is_empty() {
            None
        } else {
            Some(self.state.preds)
        };

        Rule {
            state: Finalized { preds },
            actions: self.actions,
            priority: self.priority,
        }
    }
}

impl Rule<Finalized> {
    /// The rule's predicates. A rule with none matches every packet.
    pub fn predicates(&self) -> &[Predicate] {
        self.state.preds.as_deref().unwrap_or(&[])
    }

    pub fn is_drop(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn is_match(&self, meta: &PacketMeta) -> bool {
        self.predicates().iter().all(|p| p.is_match(meta))
    }

    /// Do both rules match on exactly the same set of predicates?
    pub fn same_match(&self, other: &Rule<Finalized>) -> bool {
        let (a, b) = (self.predicates(), other.predicates());
        a.len() == b.len() && a.iter().all(|p| b.contains(p))
    }

    /// Could some packet match both rules?
    pub fn overlaps(&self, other: &Rule<Finalized>) -> bool {
        self.predicates().iter().all(|pa| {
            other
                .predicates()
                .iter()
                .filter(|pb| pb.field() == pa.field())
                .all(|pb| pa.overlaps(pb))
        })
    }

    fn matches_arp(&self) -> bool {
        self.predicates().contains(&Predicate::EtherType(EtherTypeMatch::Exact(
            ETHER_TYPE_ARP,
        )))
    }

    /// Check the rule the way a switch would before accepting it.
    pub fn validate(&self) -> Result<(), RuleError> {
        let preds = self.predicates();
        for (i, p) in preds.iter().enumerate() {
            if preds[..i].iter().any(|q| q.field() == p.field()) {
                return Err(RuleError::DuplicateMatch(p.field()));
            }
        }

        let arp = self.matches_arp();
        let uses_arp = preds.iter().map(Predicate::field).chain(
            self.actions
                .iter()
                .flat_map(|a| a.reads().into_iter().chain(a.writes())),
        );

        for field in uses_arp {
            if field.is_arp() && !arp {
                return Err(RuleError::MissingPrereq {
                    field,
                    ether_type: ETHER_TYPE_ARP,
                });
            }
        }

        validate_actions(&self.actions)
    }
}

/// Rules are equal when they have the same priority, the same set of
/// predicates, and identical action lists.
impl PartialEq for Rule<Finalized> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
            && self.same_match(other)
            && self.actions == other.actions
    }
}

impl Eq for Rule<Finalized> {}

/// Prints the rule in `ovs-ofctl` flow syntax, without the table.
impl Display for Rule<Finalized> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "priority={}", self.priority)?;
        for p in self.predicates() {
            write!(f, ",{p}")?;
        }

        write!(f, " actions=")?;
        if self.actions.is_empty() {
            return write!(f, "drop");
        }

        for (i, a) in self.actions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{a}")?;
        }

        Ok(())
    }
}

/// Verify that rules sharing a priority have pairwise disjoint
/// matches. Which of two overlapping same-priority rules the switch
/// applies is undefined.
pub fn check_same_tier_disjoint(
    rules: &[Rule<Finalized>],
) -> Result<(), RuleError> {
    for (i, a) in rules.iter().enumerate() {
        for (j, b) in rules.iter().enumerate().skip(i + 1) {
            if a.priority() == b.priority() && a.overlaps(b) {
                return Err(RuleError::SameTierOverlap {
                    priority: a.priority(),
                    first: i,
                    second: j,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::Direction;
    use crate::engine::ether::ETHER_TYPE_IPV4;
    use crate::engine::field::DIRECTION_REG;
    use crate::engine::field::SCRATCH_REG;
    use crate::engine::predicate::Ipv4AddrMatch;
    use alloc::string::ToString;

    fn arp_in() -> Vec<Predicate> {
        vec![
            Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_ARP)),
            Predicate::Direction(Direction::In),
        ]
    }

    #[test]
    fn swap_through_register() {
        let swap = swap_via(Field::ArpTpa, Field::ArpSpa, SCRATCH_REG);
        assert_eq!(
            swap,
            [
                Action::mv(Field::ArpTpa, SCRATCH_REG),
                Action::mv(Field::ArpSpa, Field::ArpTpa),
                Action::mv(SCRATCH_REG, Field::ArpSpa),
            ]
        );
        assert_eq!(validate_actions(&swap), Ok(()));
    }

    #[test]
    fn direct_swap_rejected() {
        let actions = [
            Action::mv(Field::ArpTpa, Field::ArpSpa),
            Action::mv(Field::ArpSpa, Field::ArpTpa),
        ];
        assert_eq!(
            validate_actions(&actions),
            Err(RuleError::ClobberedSwap { a: Field::ArpTpa, b: Field::ArpSpa })
        );

        // Rewriting the destination in between makes the second move
        // read a fresh value.
        let actions = [
            Action::mv(Field::ArpTpa, Field::ArpSpa),
            Action::set_field(Field::ArpSpa, 0x0A00_0001),
            Action::mv(Field::ArpSpa, Field::ArpTpa),
        ];
        assert_eq!(validate_actions(&actions), Ok(()));
    }

    #[test]
    fn register_discipline() {
        assert_eq!(
            validate_actions(&[Action::mv(SCRATCH_REG, Field::ArpSpa)]),
            Err(RuleError::ReadBeforeWrite(SCRATCH_REG))
        );

        // The direction tag is written by an earlier stage.
        assert_eq!(
            validate_actions(&[Action::mv(DIRECTION_REG, SCRATCH_REG)]),
            Ok(())
        );

        assert_eq!(
            validate_actions(&[Action::mv(Field::ArpSha, SCRATCH_REG)]),
            Err(RuleError::WidthMismatch {
                src: Field::ArpSha,
                dst: SCRATCH_REG
            })
        );
        assert_eq!(
            validate_actions(&[Action::set_field(Field::Reg(20), 1)]),
            Err(RuleError::BadRegister(20))
        );
        assert_eq!(
            validate_actions(&[Action::set_field(Field::ArpOp, 0x1_0000)]),
            Err(RuleError::ValueTooWide {
                field: Field::ArpOp,
                value: 0x1_0000
            })
        );
    }

    #[test]
    fn prerequisites() {
        let mut rule = Rule::new(
            DEFAULT_PRIORITY,
            vec![Action::set_field(Field::ArpOp, 2)],
        );
        rule.add_predicate(Predicate::Direction(Direction::In));
        assert_eq!(
            rule.finalize().validate(),
            Err(RuleError::MissingPrereq {
                field: Field::ArpOp,
                ether_type: ETHER_TYPE_ARP
            })
        );

        let mut rule = Rule::new(
            DEFAULT_PRIORITY,
            vec![Action::set_field(Field::ArpOp, 2)],
        );
        rule.add_predicates(arp_in());
        assert_eq!(rule.finalize().validate(), Ok(()));

        let mut rule = Rule::new(DEFAULT_PRIORITY, vec![]);
        rule.add_predicates(arp_in());
        rule.add_predicate(Predicate::Direction(Direction::Out));
        assert_eq!(
            rule.finalize().validate(),
            Err(RuleError::DuplicateMatch(DIRECTION_REG))
        );
    }

    #[test]
    fn overlap_and_tiers() {
        let mut drop = Rule::new(1, vec![]);
        drop.add_predicates(arp_in());
        let drop = drop.finalize();

        let mut egress = Rule::new(1, vec![Action::Resubmit(3)]);
        egress.add_predicates(vec![
            Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_IPV4)),
            Predicate::Direction(Direction::Out),
        ]);
        let egress = egress.finalize();

        let any = Rule::match_any(1, vec![Action::Resubmit(3)]);

        assert!(!drop.overlaps(&egress));
        assert!(any.overlaps(&drop));
        assert!(drop.overlaps(&any));

        let rules = vec![drop.clone(), egress.clone()];
        assert_eq!(check_same_tier_disjoint(&rules), Ok(()));

        let rules = vec![drop, egress, any];
        assert_eq!(
            check_same_tier_disjoint(&rules),
            Err(RuleError::SameTierOverlap { priority: 1, first: 0, second: 2 })
        );
    }

    #[test]
    fn ofctl_syntax() {
        let mut rule = Rule::new(
            DEFAULT_PRIORITY,
            vec![
                Action::mv(Field::EthSrc, Field::EthDst),
                Action::set_field(Field::ArpOp, 2),
                Action::OutputInPort,
            ],
        );
        rule.add_predicates(arp_in());
        rule.add_predicate(Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
            "192.168.128.0/24".parse().unwrap(),
        )));

        assert_eq!(
            rule.finalize().to_string(),
            "priority=10,eth_type=0x0806,reg1=0x10,arp_tpa=192.168.128.0/24 \
             actions=move:NXM_OF_ETH_SRC[]->NXM_OF_ETH_DST[],\
             set_field:2->arp_op,in_port"
        );

        assert_eq!(
            Rule::match_any(MINIMUM_PRIORITY, vec![Action::Resubmit(3)])
                .to_string(),
            "priority=0 actions=resubmit(,3)"
        );

        let mut drop = Rule::new(1, vec![]);
        drop.add_predicates(arp_in());
        assert_eq!(
            drop.finalize().to_string(),
            "priority=1,eth_type=0x0806,reg1=0x10 actions=drop"
        );
    }

    #[test]
    fn equality_ignores_predicate_order() {
        let mut a = Rule::new(1, vec![]);
        a.add_predicates(arp_in());
        let mut b = Rule::new(1, vec![]);
        b.add_predicates(arp_in().into_iter().rev().collect());
        assert_eq!(a.finalize(), b.finalize());
    }
}
