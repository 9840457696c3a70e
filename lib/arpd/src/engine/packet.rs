// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The packet metadata a flow table matches on and modifies.

use super::Direction;
use super::arp::ARP_ETH4_SZ;
use super::arp::ArpEthIpv4Raw;
use super::arp::ArpHdrError;
use super::arp::ArpMeta;
use super::arp::ArpOp;
use super::ether::ETHER_HDR_SZ;
use super::ether::ETHER_TYPE_ARP;
use super::ether::EtherHdrRaw;
use super::field::DIRECTION_REG;
use super::field::Field;
use super::field::NUM_REGS;
use super::field::direction_tag;
use super::field::tag_direction;
use alloc::vec::Vec;
use arpd_api::Ipv4Addr;
use arpd_api::MacAddr;
use core::fmt;
use core::fmt::Display;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// The switch port on which a packet arrived.
pub type PortId = u32;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    Truncated { hdr: &'static str, len: usize },
    BadArp(ArpHdrError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { hdr, len } => {
                write!(f, "{hdr} header truncated: {len} bytes")
            }
            Self::BadArp(e) => write!(f, "bad ARP header: {e}"),
        }
    }
}

impl From<ArpHdrError> for ParseError {
    fn from(e: ArpHdrError) -> Self {
        Self::BadArp(e)
    }
}

/// A field access the packet cannot satisfy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldError {
    /// The packet carries no header holding the field.
    Absent(Field),
    /// The register index is beyond [`NUM_REGS`].
    BadRegister(u8),
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Absent(field) => write!(f, "packet has no {field}"),
            Self::BadRegister(idx) => write!(f, "no such register: reg{idx}"),
        }
    }
}

/// A packet as seen by the flow table: its link header, its ARP
/// fields when it is an ARP packet, and the per-packet registers.
///
/// Registers start out zeroed except for those written by earlier
/// pipeline stages, such as [`DIRECTION_REG`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketMeta {
    pub in_port: PortId,
    pub eth_dst: MacAddr,
    pub eth_src: MacAddr,
    pub eth_type: u16,
    pub arp: Option<ArpMeta>,
    pub regs: [u32; NUM_REGS],
    /// Any bytes following the parsed headers.
    pub body: Vec<u8>,
}

impl PacketMeta {
    pub fn new(
        in_port: PortId,
        eth_dst: MacAddr,
        eth_src: MacAddr,
        eth_type: u16,
    ) -> Self {
        Self {
            in_port,
            eth_dst,
            eth_src,
            eth_type,
            arp: None,
            regs: [0; NUM_REGS],
            body: Vec::new(),
        }
    }

    /// A broadcast ARP request from `sha`/`spa` asking for `tpa`.
    pub fn arp_request(
        in_port: PortId,
        sha: MacAddr,
        spa: Ipv4Addr,
        tpa: Ipv4Addr,
    ) -> Self {
        let mut meta =
            Self::new(in_port, MacAddr::BROADCAST, sha, ETHER_TYPE_ARP);
        meta.arp = Some(ArpMeta::request(sha, spa, tpa));
        meta
    }

    /// Tag the packet with the direction an earlier pipeline stage
    /// would have computed for it.
    pub fn with_direction(mut self, dir: Direction) -> Self {
        self.set_direction(dir);
        self
    }

    pub fn set_direction(&mut self, dir: Direction) {
        // DIRECTION_REG is always a valid register.
        if let Field::Reg(idx) = DIRECTION_REG {
            self.regs[usize::from(idx)] = direction_tag(dir);
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self.get(DIRECTION_REG) {
            // Registers are 32 bits wide.
            Ok(tag) => tag_direction(tag as u32),
            Err(_) => None,
        }
    }

    /// Parse an Ethernet frame. ARP frames must carry Ethernet/IPv4
    /// mappings; every other ether type is kept opaque in `body`.
    pub fn parse(in_port: PortId, frame: &[u8]) -> Result<Self, ParseError> {
        let (eth, rest) = EtherHdrRaw::read_from_prefix(frame).map_err(|_| {
            ParseError::Truncated { hdr: "ethernet", len: frame.len() }
        })?;

        let mut meta = Self::new(
            in_port,
            MacAddr::from(eth.dst),
            MacAddr::from(eth.src),
            eth.ether_type(),
        );

        let rest = if meta.eth_type == ETHER_TYPE_ARP {
            let (raw, rest) =
                ArpEthIpv4Raw::read_from_prefix(rest).map_err(|_| {
                    ParseError::Truncated { hdr: "arp", len: rest.len() }
                })?;
            meta.arp = Some(ArpMeta::try_from(&raw)?);
            rest
        } else {
            rest
        };

        meta.body = rest.to_vec();
        Ok(meta)
    }

    /// Serialize the packet back into an Ethernet frame.
    pub fn emit(&self) -> Vec<u8> {
        let mut frame =
            Vec::with_capacity(ETHER_HDR_SZ + ARP_ETH4_SZ + self.body.len());
        let eth = EtherHdrRaw::new(self.eth_dst, self.eth_src, self.eth_type);
        frame.extend_from_slice(eth.as_bytes());

        if let Some(arp) = &self.arp {
            frame.extend_from_slice(ArpEthIpv4Raw::from(arp).as_bytes());
        }

        frame.extend_from_slice(&self.body);
        frame
    }

    fn arp_ref(&self, field: Field) -> Result<&ArpMeta, FieldError> {
        self.arp.as_ref().ok_or(FieldError::Absent(field))
    }

    fn arp_mut(&mut self, field: Field) -> Result<&mut ArpMeta, FieldError> {
        self.arp.as_mut().ok_or(FieldError::Absent(field))
    }

    /// Read a field as the low bits of a `u64`.
    pub fn get(&self, field: Field) -> Result<u64, FieldError> {
        let val = match field {
            Field::EthSrc => self.eth_src.to_u64(),
            Field::EthDst => self.eth_dst.to_u64(),
            Field::EthType => u64::from(self.eth_type),
            Field::ArpOp => u64::from(self.arp_ref(field)?.op.val()),
            Field::ArpSha => self.arp_ref(field)?.sha.to_u64(),
            Field::ArpSpa => u64::from(u32::from(self.arp_ref(field)?.spa)),
            Field::ArpTha => self.arp_ref(field)?.tha.to_u64(),
            Field::ArpTpa => u64::from(u32::from(self.arp_ref(field)?.tpa)),
            Field::Reg(idx) => u64::from(
                *self
                    .regs
                    .get(usize::from(idx))
                    .ok_or(FieldError::BadRegister(idx))?,
            ),
        };

        Ok(val)
    }

    /// Write the low `field.width()` bits of `val` into a field.
    pub fn set(&mut self, field: Field, val: u64) -> Result<(), FieldError> {
        let val = val & field.mask();

        // The casts below are lossless: `val` was masked to the field
        // width above.
        match field {
            Field::EthSrc => self.eth_src = MacAddr::from_u64(val),
            Field::EthDst => self.eth_dst = MacAddr::from_u64(val),
            Field::EthType => self.eth_type = val as u16,
            Field::ArpOp => self.arp_mut(field)?.op = ArpOp::new(val as u16),
            Field::ArpSha => self.arp_mut(field)?.sha = MacAddr::from_u64(val),
            Field::ArpSpa => {
                self.arp_mut(field)?.spa = Ipv4Addr::from(val as u32)
            }
            Field::ArpTha => self.arp_mut(field)?.tha = MacAddr::from_u64(val),
            Field::ArpTpa => {
                self.arp_mut(field)?.tpa = Ipv4Addr::from(val as u32)
            }
            Field::Reg(idx) => {
                let reg = self
                    .regs
                    .get_mut(usize::from(idx))
                    .ok_or(FieldError::BadRegister(idx))?;
                *reg = val as u32;
            }
        }

        Ok(())
    }
}

impl Display for PacketMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "in_port={} {} -> {} eth_type=0x{:04x}",
            self.in_port, self.eth_src, self.eth_dst, self.eth_type
        )?;

        if let Some(arp) = &self.arp {
            write!(f, " arp[{arp}]")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn req() -> PacketMeta {
        PacketMeta::arp_request(
            7,
            "11:22:33:44:55:66".parse().unwrap(),
            "10.0.0.5".parse().unwrap(),
            "192.168.128.9".parse().unwrap(),
        )
    }

    #[test]
    fn frame_roundtrip() {
        let pkt = req().with_direction(Direction::In);
        let frame = pkt.emit();
        assert_eq!(frame.len(), ETHER_HDR_SZ + ARP_ETH4_SZ);

        // Registers are not carried on the wire.
        let parsed = PacketMeta::parse(7, &frame).unwrap();
        assert_eq!(parsed.arp, pkt.arp);
        assert_eq!(parsed.eth_dst, MacAddr::BROADCAST);
        assert_eq!(parsed.direction(), None);
    }

    #[test]
    fn truncated_frames() {
        assert_eq!(
            PacketMeta::parse(1, &[0u8; 10]),
            Err(ParseError::Truncated { hdr: "ethernet", len: 10 })
        );

        let frame = req().emit();
        assert_eq!(
            PacketMeta::parse(1, &frame[..20]),
            Err(ParseError::Truncated { hdr: "arp", len: 6 })
        );
    }

    #[test]
    fn field_access() {
        let mut pkt = req();
        assert_eq!(pkt.get(Field::ArpSpa), Ok(0x0A00_0005));
        pkt.set(Field::ArpOp, 2).unwrap();
        assert_eq!(pkt.arp.unwrap().op, ArpOp::REPLY);

        pkt.set(Field::Reg(0), 0xFFFF_FFFF_0000_0001).unwrap();
        assert_eq!(pkt.regs[0], 1);
        assert_eq!(pkt.get(Field::Reg(16)), Err(FieldError::BadRegister(16)));

        let mut ip = PacketMeta::new(
            1,
            MacAddr::ZERO,
            MacAddr::ZERO,
            crate::engine::ether::ETHER_TYPE_IPV4,
        );
        assert_eq!(
            ip.set(Field::ArpTpa, 1),
            Err(FieldError::Absent(Field::ArpTpa))
        );
    }
}
