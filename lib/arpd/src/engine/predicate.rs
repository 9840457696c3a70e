// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Predicates used for `Rule` matching.
//!
//! A rule's match is the conjunction of its predicates. Each
//! predicate constrains a single field, and a rule holds at most one
//! predicate per field, mirroring an OpenFlow match.

use super::Direction;
use super::field::DIRECTION_REG;
use super::field::Field;
use super::field::direction_tag;
use super::packet::PacketMeta;
use arpd_api::Ipv4Addr;
use arpd_api::Ipv4Cidr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EtherTypeMatch {
    Exact(u16),
}

impl EtherTypeMatch {
    fn matches(&self, flow_et: u16) -> bool {
        match self {
            EtherTypeMatch::Exact(et) => flow_et == *et,
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
        }
    }
}

impl Display for EtherTypeMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherTypeMatch::Exact(et) => {
                write!(f, "{}", Field::EthType.value(u64::from(*et)))
            }
        }
    }
}

/// Describe how to match an IPv4 address
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Ipv4AddrMatch {
    /// Match an exact address
    Exact(Ipv4Addr),
    /// Match an address in the same CIDR block
    Prefix(Ipv4Cidr),
}

impl Ipv4AddrMatch {
    fn matches(&self, flow_ip: Ipv4Addr) -> bool {
        match self {
            Self::Exact(ip) => flow_ip == *ip,
            Self::Prefix(cidr) => cidr.is_member(flow_ip),
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Exact(ip), Self::Prefix(cidr))
            | (Self::Prefix(cidr), Self::Exact(ip)) => cidr.is_member(*ip),
            (Self::Prefix(a), Self::Prefix(b)) => a.overlaps(b),
        }
    }
}

impl Display for Ipv4AddrMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Ipv4AddrMatch::*;

        match self {
            Exact(ip) => write!(f, "{}", ip),
            Prefix(cidr) => write!(f, "{}", cidr),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Predicate {
    EtherType(EtherTypeMatch),
    /// The direction tag carried in [`DIRECTION_REG`].
    Direction(Direction),
    ArpTpa(Ipv4AddrMatch),
}

impl Predicate {
    /// The field this predicate constrains.
    pub fn field(&self) -> Field {
        match self {
            Self::EtherType(_) => Field::EthType,
            Self::Direction(_) => DIRECTION_REG,
            Self::ArpTpa(_) => Field::ArpTpa,
        }
    }

    pub fn is_match(&self, meta: &PacketMeta) -> bool {
        match self {
            Self::EtherType(m) => m.matches(meta.eth_type),

            Self::Direction(dir) => meta
                .get(DIRECTION_REG)
                .is_ok_and(|tag| tag == u64::from(direction_tag(*dir))),

            Self::ArpTpa(m) => match &meta.arp {
                Some(arp) => m.matches(arp.tpa),
                None => false,
            },
        }
    }

    /// Could some packet satisfy both predicates?
    ///
    /// Predicates over different fields never rule each other out, so
    /// they are considered overlapping.
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EtherType(a), Self::EtherType(b)) => a.overlaps(b),
            (Self::Direction(a), Self::Direction(b)) => a == b,
            (Self::ArpTpa(a), Self::ArpTpa(b)) => a.overlaps(b),
            _ => true,
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let field = self.field().ofctl_name();

        match self {
            Self::EtherType(m) => write!(f, "{field}={m}"),
            Self::Direction(dir) => write!(
                f,
                "{field}={}",
                DIRECTION_REG.value(u64::from(direction_tag(*dir)))
            ),
            Self::ArpTpa(m) => write!(f, "{field}={m}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::ETHER_TYPE_ARP;
    use crate::engine::ether::ETHER_TYPE_IPV4;
    use alloc::string::ToString;

    fn req(tpa: &str) -> PacketMeta {
        PacketMeta::arp_request(
            1,
            "11:22:33:44:55:66".parse().unwrap(),
            "10.0.0.5".parse().unwrap(),
            tpa.parse().unwrap(),
        )
    }

    #[test]
    fn matching() {
        let arp = Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_ARP));
        let inbound = Predicate::Direction(Direction::In);
        let tpa = Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
            "192.168.128.0/24".parse().unwrap(),
        ));

        let pkt = req("192.168.128.9").with_direction(Direction::In);
        assert!(arp.is_match(&pkt));
        assert!(inbound.is_match(&pkt));
        assert!(tpa.is_match(&pkt));

        let pkt = req("192.168.129.9").with_direction(Direction::Out);
        assert!(arp.is_match(&pkt));
        assert!(!inbound.is_match(&pkt));
        assert!(!tpa.is_match(&pkt));

        // A packet nobody tagged has no direction.
        assert!(!inbound.is_match(&req("192.168.128.9")));
    }

    #[test]
    fn overlap() {
        let arp = Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_ARP));
        let ip = Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_IPV4));
        assert!(!arp.overlaps(&ip));
        assert!(arp.overlaps(&arp));
        assert!(arp.overlaps(&Predicate::Direction(Direction::Out)));

        let a = Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
            "192.168.128.0/24".parse().unwrap(),
        ));
        let b = Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
            "192.168.129.0/24".parse().unwrap(),
        ));
        let c = Predicate::ArpTpa(Ipv4AddrMatch::Exact(
            "192.168.129.1".parse().unwrap(),
        ));
        assert!(!a.overlaps(&b));
        assert!(b.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn ofctl_syntax() {
        assert_eq!(
            Predicate::EtherType(EtherTypeMatch::Exact(ETHER_TYPE_ARP))
                .to_string(),
            "eth_type=0x0806"
        );
        assert_eq!(
            Predicate::Direction(Direction::In).to_string(),
            "reg1=0x10"
        );
        assert_eq!(
            Predicate::ArpTpa(Ipv4AddrMatch::Prefix(
                "192.168.128.0/24".parse().unwrap()
            ))
            .to_string(),
            "arp_tpa=192.168.128.0/24"
        );
    }
}
