// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! An ARP responder for subscriber subnets, expressed entirely as flow
//! rules.
//!
//! The responder owns one table of the switch pipeline. It answers ARP
//! requests for addresses in the configured UE subnets with the MAC of
//! the virtual interface, drops every other ARP request arriving on
//! that interface, rewrites the destination MAC of outgoing IPv4
//! traffic, and passes everything else on to the next table. Packets
//! never leave the switch fast path.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub mod api {
    pub use arpd::api::*;
}

pub mod cfg;
pub mod engine;
