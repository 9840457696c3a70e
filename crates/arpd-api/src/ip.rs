// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::result;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// An IPv4 address.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(C)]
pub struct Ipv4Addr {
    inner: [u8; 4],
}

impl Ipv4Addr {
    pub const ANY_ADDR: Self = Self { inner: [0; 4] };
    pub const LOCAL_BCAST: Self = Self { inner: [255; 4] };

    /// Return the bytes of the address.
    #[inline]
    pub fn bytes(&self) -> [u8; 4] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }

    /// Return the address after applying the network mask.
    pub fn safe_mask(self, prefix_len: Ipv4PrefixLen) -> Self {
        let n = u32::from(self) & u32::from(prefix_len.to_netmask());
        Self::from(n)
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Addr {
    fn from(ip4: core::net::Ipv4Addr) -> Self {
        Self { inner: ip4.octets() }
    }
}

impl From<Ipv4Addr> for core::net::Ipv4Addr {
    fn from(ip4: Ipv4Addr) -> Self {
        Self::from(ip4.inner)
    }
}

impl From<Ipv4Addr> for u32 {
    fn from(ip: Ipv4Addr) -> u32 {
        u32::from_be_bytes(ip.bytes())
    }
}

impl From<u32> for Ipv4Addr {
    fn from(val: u32) -> Self {
        Self { inner: val.to_be_bytes() }
    }
}

impl From<[u8; 4]> for Ipv4Addr {
    fn from(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }
}

impl FromStr for Ipv4Addr {
    type Err = String;

    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let octets: Vec<u8> = val
            .split('.')
            .map(|s| s.parse().map_err(|e| format!("{e}")))
            .collect::<result::Result<Vec<u8>, _>>()?;

        if octets.len() != 4 {
            return Err(format!("malformed ip: {val}"));
        }

        Ok(Self { inner: [octets[0], octets[1], octets[2], octets[3]] })
    }
}

impl Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.inner[0], self.inner[1], self.inner[2], self.inner[3],
        )
    }
}

// Present the address in dotted-decimal form rather than its raw
// array.
impl Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ipv4Addr {{ inner: {self} }}")
    }
}

/// A valid IPv4 prefix length.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Ord,
    PartialOrd,
)]
pub struct Ipv4PrefixLen(u8);

impl TryFrom<u8> for Ipv4PrefixLen {
    type Error = String;

    fn try_from(p: u8) -> Result<Self, Self::Error> {
        Self::new(p)
    }
}

impl Ipv4PrefixLen {
    pub const NETMASK_NONE: Self = Self(0);
    pub const NETMASK_ALL: Self = Self(32);

    pub fn new(prefix_len: u8) -> Result<Self, String> {
        if prefix_len > 32 {
            return Err(format!("bad IPv4 prefix length: {prefix_len}"));
        }

        Ok(Self(prefix_len))
    }

    /// Derive the prefix length from a dotted subnet mask such as
    /// `255.255.255.0`. The mask must be contiguous.
    pub fn from_netmask(mask: Ipv4Addr) -> Result<Self, String> {
        let bits = u32::from(mask);
        let len = bits.leading_ones();

        if bits.checked_shl(len).unwrap_or(0) != 0 {
            return Err(format!("non-contiguous netmask: {mask}"));
        }

        // `leading_ones()` of a u32 is at most 32.
        Ok(Self(len as u8))
    }

    /// Convert the prefix length into a subnet mask.
    pub fn to_netmask(self) -> Ipv4Addr {
        let bits = u32::MAX.checked_shl(32 - u32::from(self.0)).unwrap_or(0);
        Ipv4Addr::from(bits)
    }

    pub fn val(&self) -> u8 {
        self.0
    }
}

/// An IPv4 CIDR.
///
/// The address is always stored with its host bits cleared.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Ipv4Cidr {
    ip: Ipv4Addr,
    prefix_len: Ipv4PrefixLen,
}

impl core::cmp::Ord for Ipv4Cidr {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        if self.ip != other.ip {
            self.ip.cmp(&other.ip)
        } else {
            self.prefix_len.cmp(&other.prefix_len)
        }
    }
}

impl core::cmp::PartialOrd for Ipv4Cidr {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    /// Convert a string like "192.168.2.0/24" or
    /// "192.168.2.0/255.255.255.0" into an `Ipv4Cidr`.
    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let (ip_s, prefix_s) = match val.trim().split_once('/') {
            Some(v) => v,
            None => return Err("no '/' found".to_string()),
        };

        let ip = match ip_s.parse() {
            Ok(v) => v,
            Err(e) => return Err(format!("bad IP: {e}")),
        };

        let prefix_len = if prefix_s.contains('.') {
            let mask = match prefix_s.parse() {
                Ok(v) => v,
                Err(e) => return Err(format!("bad netmask: {e}")),
            };
            Ipv4PrefixLen::from_netmask(mask)?
        } else {
            let raw = match prefix_s.parse::<u8>() {
                Ok(v) => v,
                Err(e) => {
                    return Err(format!("bad prefix length: {e}"));
                }
            };
            Ipv4PrefixLen::new(raw)?
        };

        Ok(Ipv4Cidr::new(ip, prefix_len))
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len.val())
    }
}

impl Ipv4Cidr {
    /// Is this `ip` a member of the CIDR?
    pub fn is_member(&self, ip: Ipv4Addr) -> bool {
        ip.safe_mask(self.prefix_len) == self.ip
    }

    /// Do the two blocks share any address?
    ///
    /// Two CIDR blocks either nest or are disjoint, so it is enough to
    /// test the wider block against the narrower one's base address.
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        if self.prefix_len <= other.prefix_len {
            self.is_member(other.ip)
        } else {
            other.is_member(self.ip)
        }
    }

    pub fn new(ip: Ipv4Addr, prefix_len: Ipv4PrefixLen) -> Self {
        let ip = ip.safe_mask(prefix_len);
        Ipv4Cidr { ip, prefix_len }
    }

    pub fn prefix_len(self) -> u8 {
        self.prefix_len.val()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::string::ToString;

    #[test]
    fn bad_prefix_len() {
        let msg = "bad IPv4 prefix length: 33".to_string();
        assert_eq!(Ipv4PrefixLen::new(33), Err(msg));
    }

    #[test]
    fn bad_cidr() {
        let msg = "bad IPv4 prefix length: 33".to_string();
        assert_eq!("192.168.2.9/33".parse::<Ipv4Cidr>(), Err(msg));
        assert_eq!(
            "192.168.2.9".parse::<Ipv4Cidr>(),
            Err("no '/' found".to_string())
        );
        assert_eq!(
            "192.168.2.0/255.0.255.0".parse::<Ipv4Cidr>(),
            Err("non-contiguous netmask: 255.0.255.0".to_string())
        );
    }

    #[test]
    fn good_cidr() {
        let pl = Ipv4PrefixLen::new(24).unwrap();
        let ip = "192.168.2.0".parse().unwrap();
        assert_eq!(
            Ipv4Cidr::new(ip, pl),
            Ipv4Cidr {
                ip: Ipv4Addr { inner: [192, 168, 2, 0] },
                prefix_len: pl,
            }
        );

        assert_eq!(
            "192.168.2.9/24".parse(),
            Ok(Ipv4Cidr {
                ip: Ipv4Addr { inner: [192, 168, 2, 0] },
                prefix_len: pl,
            })
        );

        assert_eq!(
            "192.168.2.9/255.255.255.0".parse::<Ipv4Cidr>().unwrap(),
            "192.168.2.0/24".parse::<Ipv4Cidr>().unwrap(),
        );

        assert_eq!(
            "192.168.2.9/24".parse::<Ipv4Cidr>().unwrap().to_string(),
            "192.168.2.0/24".to_string()
        );
    }

    #[test]
    fn netmask_edges() {
        assert_eq!(
            Ipv4PrefixLen::NETMASK_NONE.to_netmask(),
            Ipv4Addr::ANY_ADDR
        );
        assert_eq!(
            Ipv4PrefixLen::NETMASK_ALL.to_netmask(),
            Ipv4Addr::LOCAL_BCAST
        );
        assert_eq!(
            Ipv4PrefixLen::new(20).unwrap().to_netmask().to_string(),
            "255.255.240.0"
        );
        assert_eq!(
            Ipv4PrefixLen::from_netmask(Ipv4Addr::ANY_ADDR),
            Ok(Ipv4PrefixLen::NETMASK_NONE)
        );
    }

    #[test]
    fn membership_and_overlap() {
        let ue: Ipv4Cidr = "192.168.128.0/24".parse().unwrap();
        assert!(ue.is_member("192.168.128.9".parse().unwrap()));
        assert!(!ue.is_member("192.168.129.9".parse().unwrap()));

        let wide: Ipv4Cidr = "192.168.0.0/16".parse().unwrap();
        let other: Ipv4Cidr = "10.0.0.0/8".parse().unwrap();
        assert!(ue.overlaps(&wide));
        assert!(wide.overlaps(&ue));
        assert!(!ue.overlaps(&other));
        assert!("0.0.0.0/0".parse::<Ipv4Cidr>().unwrap().overlaps(&other));
    }
}
