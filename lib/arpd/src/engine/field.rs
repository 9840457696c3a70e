// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet fields and registers addressable by match predicates and
//! actions.
//!
//! Every field has a fixed bit width and two names: the short name
//! used by `ovs-ofctl` for matches and `set_field`, and the NXM name
//! used by the `move` action. Values are carried as the low bits of a
//! `u64`, in network order, so that a field-to-field move is a plain
//! copy of bits between fields of equal width.

use super::Direction;
use arpd_api::Ipv4Addr;
use arpd_api::MacAddr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The number of 32-bit general purpose registers (`reg0`..`reg15`)
/// available to a rule.
pub const NUM_REGS: usize = 16;

/// The register used as a temporary buffer within a single action
/// list. It carries no meaning between packets or between rules.
pub const SCRATCH_REG: Field = Field::Reg(0);

/// The register carrying the packet's direction tag, computed by an
/// earlier stage of the pipeline.
pub const DIRECTION_REG: Field = Field::Reg(1);

/// Direction tag value of a packet leaving through the managed
/// interface.
pub const DIRECTION_OUT: u32 = 0x01;

/// Direction tag value of a packet arriving on the managed interface.
pub const DIRECTION_IN: u32 = 0x10;

/// Return the value of [`DIRECTION_REG`] for a direction.
pub const fn direction_tag(dir: Direction) -> u32 {
    match dir {
        Direction::In => DIRECTION_IN,
        Direction::Out => DIRECTION_OUT,
    }
}

/// Map a [`DIRECTION_REG`] value back to its direction, if it is one
/// of the two defined tags.
pub const fn tag_direction(tag: u32) -> Option<Direction> {
    match tag {
        DIRECTION_IN => Some(Direction::In),
        DIRECTION_OUT => Some(Direction::Out),
        _ => None,
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Field {
    EthSrc,
    EthDst,
    EthType,
    ArpOp,
    ArpSha,
    ArpSpa,
    ArpTha,
    ArpTpa,
    Reg(u8),
}

impl Field {
    /// The width of the field in bits.
    pub const fn width(self) -> u32 {
        match self {
            Self::EthSrc | Self::EthDst | Self::ArpSha | Self::ArpTha => 48,
            Self::EthType | Self::ArpOp => 16,
            Self::ArpSpa | Self::ArpTpa | Self::Reg(_) => 32,
        }
    }

    /// A mask covering all bits of the field.
    pub const fn mask(self) -> u64 {
        (1u64 << self.width()) - 1
    }

    /// Does `val` fit in the field?
    pub const fn fits(self, val: u64) -> bool {
        val & !self.mask() == 0
    }

    /// Is this one of the ARP header fields? These may only be read
    /// or written by a rule that matches on the ARP ether type.
    pub const fn is_arp(self) -> bool {
        matches!(
            self,
            Self::ArpOp
                | Self::ArpSha
                | Self::ArpSpa
                | Self::ArpTha
                | Self::ArpTpa
        )
    }

    pub const fn is_reg(self) -> bool {
        matches!(self, Self::Reg(_))
    }

    /// Does the register hold metadata written by an earlier pipeline
    /// stage? Such a register may be read without first being written
    /// in the same action list.
    pub const fn is_pipeline_metadata(self) -> bool {
        matches!(self, Self::Reg(1))
    }

    /// Is this a register index the switch actually provides?
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Reg(idx) => (idx as usize) < NUM_REGS,
            _ => true,
        }
    }

    /// The name used in `ovs-ofctl` matches and `set_field` actions.
    pub fn ofctl_name(self) -> OfctlName {
        OfctlName(self)
    }

    /// Render `val` the way `ovs-ofctl` expects a value of this field.
    pub fn value(self, val: u64) -> FieldValue {
        FieldValue { field: self, val }
    }
}

/// Prints the NXM name of the field, as used by the `move` action.
impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EthSrc => write!(f, "NXM_OF_ETH_SRC"),
            Self::EthDst => write!(f, "NXM_OF_ETH_DST"),
            Self::EthType => write!(f, "NXM_OF_ETH_TYPE"),
            Self::ArpOp => write!(f, "NXM_OF_ARP_OP"),
            Self::ArpSha => write!(f, "NXM_NX_ARP_SHA"),
            Self::ArpSpa => write!(f, "NXM_OF_ARP_SPA"),
            Self::ArpTha => write!(f, "NXM_NX_ARP_THA"),
            Self::ArpTpa => write!(f, "NXM_OF_ARP_TPA"),
            Self::Reg(idx) => write!(f, "NXM_NX_REG{idx}"),
        }
    }
}

/// The `ovs-ofctl` short name of a [`Field`].
#[derive(Clone, Copy, Debug)]
pub struct OfctlName(Field);

impl Display for OfctlName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Field::EthSrc => write!(f, "eth_src"),
            Field::EthDst => write!(f, "eth_dst"),
            Field::EthType => write!(f, "eth_type"),
            Field::ArpOp => write!(f, "arp_op"),
            Field::ArpSha => write!(f, "arp_sha"),
            Field::ArpSpa => write!(f, "arp_spa"),
            Field::ArpTha => write!(f, "arp_tha"),
            Field::ArpTpa => write!(f, "arp_tpa"),
            Field::Reg(idx) => write!(f, "reg{idx}"),
        }
    }
}

/// A field value, formatted according to the field it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct FieldValue {
    field: Field,
    val: u64,
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let val = self.val & self.field.mask();

        match self.field {
            Field::EthSrc | Field::EthDst | Field::ArpSha | Field::ArpTha => {
                write!(f, "{}", MacAddr::from_u64(val))
            }

            // Both are 32-bit fields, so the cast is lossless.
            Field::ArpSpa | Field::ArpTpa => {
                write!(f, "{}", Ipv4Addr::from(val as u32))
            }

            Field::EthType => write!(f, "0x{val:04x}"),
            Field::Reg(_) => write!(f, "0x{val:x}"),
            Field::ArpOp => write!(f, "{val}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn widths_and_masks() {
        assert_eq!(Field::EthSrc.mask(), 0xFFFF_FFFF_FFFF);
        assert_eq!(Field::ArpTpa.mask(), 0xFFFF_FFFF);
        assert!(Field::ArpOp.fits(2));
        assert!(!Field::ArpOp.fits(0x1_0000));
        assert!(Field::Reg(15).is_valid());
        assert!(!Field::Reg(16).is_valid());
    }

    #[test]
    fn names() {
        assert_eq!(Field::ArpSha.to_string(), "NXM_NX_ARP_SHA");
        assert_eq!(SCRATCH_REG.to_string(), "NXM_NX_REG0");
        assert_eq!(Field::ArpTpa.ofctl_name().to_string(), "arp_tpa");
        assert_eq!(DIRECTION_REG.ofctl_name().to_string(), "reg1");
    }

    #[test]
    fn values() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(
            Field::EthSrc.value(mac.to_u64()).to_string(),
            "aa:bb:cc:dd:ee:ff"
        );
        assert_eq!(Field::ArpSpa.value(0x0A00_0005).to_string(), "10.0.0.5");
        assert_eq!(Field::EthType.value(0x0806).to_string(), "0x0806");
        assert_eq!(DIRECTION_REG.value(0x10).to_string(), "0x10");
    }

    #[test]
    fn direction_tags() {
        assert_eq!(direction_tag(Direction::In), DIRECTION_IN);
        assert_eq!(tag_direction(DIRECTION_OUT), Some(Direction::Out));
        assert_eq!(tag_direction(0), None);
    }
}
