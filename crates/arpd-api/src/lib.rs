// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod error;
pub mod ip;
pub mod mac;

pub use error::*;
pub use ip::*;
pub use mac::*;

/// An OpenFlow table number.
pub type TableId = u8;

/// The priority of a flow rule. When two rules in the same table
/// match a packet, the one with the higher priority is applied.
pub type Priority = u16;

/// The direction of a packet relative to the managed virtual
/// interface.
///
/// The direction is computed by an earlier stage of the pipeline and
/// is carried alongside the packet; this crate only consumes it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    In = 1,
    Out = 2,
}

impl core::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            _ => Err(format!("invalid direction: {}", s)),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dirstr = match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        };

        write!(f, "{}", dirstr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn direction_parse() {
        assert_eq!("in".parse::<Direction>(), Ok(Direction::In));
        assert_eq!("OUT".parse::<Direction>(), Ok(Direction::Out));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
