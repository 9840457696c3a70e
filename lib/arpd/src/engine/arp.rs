// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! ARP headers and data.
//!
//! Relevant Docs
//!
//! * RFC 826 -- An Ethernet Address Resolution Protocol

use super::ether::ETHER_TYPE_IPV4;
use arpd_api::Ipv4Addr;
use arpd_api::MacAddr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ARP_HTYPE_ETHERNET: u16 = 1;

pub const ARP_ETH4_SZ: usize = core::mem::size_of::<ArpEthIpv4Raw>();

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Hash,
)]
pub struct ArpOp(u16);

impl ArpOp {
    pub const REQUEST: Self = Self(1);
    pub const REPLY: Self = Self(2);

    pub const fn new(op: u16) -> Self {
        Self(op)
    }

    pub const fn val(self) -> u16 {
        self.0
    }
}

impl Default for ArpOp {
    fn default() -> Self {
        Self::REQUEST
    }
}

impl Display for ArpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            ArpOp::REQUEST => "Request",
            ArpOp::REPLY => "Reply",
            _ => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// The Ethernet/IPv4 ARP fields of a packet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ArpMeta {
    pub op: ArpOp,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

impl ArpMeta {
    /// A who-has request for `tpa` from `sha`/`spa`.
    pub fn request(sha: MacAddr, spa: Ipv4Addr, tpa: Ipv4Addr) -> Self {
        Self { op: ArpOp::REQUEST, sha, spa, tha: MacAddr::ZERO, tpa }
    }
}

impl Display for ArpMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} sha={} spa={} tha={} tpa={}",
            self.op, self.sha, self.spa, self.tha, self.tpa
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArpHdrError {
    UnexpectedHwType { htype: u16 },
    UnexpectedProtoType { ptype: u16 },
    UnexpectedHwLen { hlen: u8 },
    UnexpectedProtoLen { plen: u8 },
}

impl Display for ArpHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnexpectedHwType { htype } => {
                write!(f, "unexpected hardware type: {htype}")
            }
            Self::UnexpectedProtoType { ptype } => {
                write!(f, "unexpected protocol type: 0x{ptype:04X}")
            }
            Self::UnexpectedHwLen { hlen } => {
                write!(f, "unexpected hardware length: {hlen}")
            }
            Self::UnexpectedProtoLen { plen } => {
                write!(f, "unexpected protocol length: {plen}")
            }
        }
    }
}

/// An ARP packet containing Ethernet (MAC) to IPv4 address mappings,
/// as laid out on the wire.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct ArpEthIpv4Raw {
    pub htype: [u8; 2],
    pub ptype: [u8; 2],
    pub hlen: u8,
    pub plen: u8,
    pub op: [u8; 2],
    pub sha: [u8; 6],
    pub spa: [u8; 4],
    pub tha: [u8; 6],
    pub tpa: [u8; 4],
}

impl From<&ArpMeta> for ArpEthIpv4Raw {
    fn from(meta: &ArpMeta) -> Self {
        Self {
            htype: ARP_HTYPE_ETHERNET.to_be_bytes(),
            ptype: ETHER_TYPE_IPV4.to_be_bytes(),
            hlen: size_of::<MacAddr>() as u8,
            plen: size_of::<Ipv4Addr>() as u8,
            op: meta.op.val().to_be_bytes(),
            sha: meta.sha.bytes(),
            spa: meta.spa.bytes(),
            tha: meta.tha.bytes(),
            tpa: meta.tpa.bytes(),
        }
    }
}

// NOTE: This only accepts IPv4/Ethernet ARP.
impl TryFrom<&ArpEthIpv4Raw> for ArpMeta {
    type Error = ArpHdrError;

    fn try_from(raw: &ArpEthIpv4Raw) -> Result<Self, Self::Error> {
        let htype = u16::from_be_bytes(raw.htype);
        if htype != ARP_HTYPE_ETHERNET {
            return Err(ArpHdrError::UnexpectedHwType { htype });
        }

        let ptype = u16::from_be_bytes(raw.ptype);
        if ptype != ETHER_TYPE_IPV4 {
            return Err(ArpHdrError::UnexpectedProtoType { ptype });
        }

        if usize::from(raw.hlen) != size_of::<MacAddr>() {
            return Err(ArpHdrError::UnexpectedHwLen { hlen: raw.hlen });
        }

        if usize::from(raw.plen) != size_of::<Ipv4Addr>() {
            return Err(ArpHdrError::UnexpectedProtoLen { plen: raw.plen });
        }

        Ok(Self {
            op: ArpOp::new(u16::from_be_bytes(raw.op)),
            sha: MacAddr::from(raw.sha),
            spa: Ipv4Addr::from(raw.spa),
            tha: MacAddr::from(raw.tha),
            tpa: Ipv4Addr::from(raw.tpa),
        })
    }
}
