// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The flow engine.
pub mod arp;
pub mod channel;
pub mod ether;
pub mod field;
pub mod flow_table;
pub mod packet;
pub mod predicate;
pub mod registry;
pub mod rule;

pub use arpd_api::Direction;
