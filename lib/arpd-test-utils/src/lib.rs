// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod channel;

pub use channel::ChannelOp;
pub use channel::RecordingChannel;

// Let's make our lives easier and pub use a bunch of stuff.
pub use arp_responder::cfg::ResponderCfg;
pub use arp_responder::engine::APP_NAME;
pub use arp_responder::engine::ArpResponder;
pub use arp_responder::engine::FlowRule;
pub use arp_responder::engine::Reconcile;
pub use arp_responder::engine::switch::Datapaths;
pub use arp_responder::engine::switch::LinkState;
pub use arp_responder::engine::switch::Switch;
pub use arp_responder::engine::switch::SwitchEvent;
pub use arpd::api::Direction;
pub use arpd::api::Ipv4Addr;
pub use arpd::api::Ipv4Cidr;
pub use arpd::api::MacAddr;
pub use arpd::api::TableId;
pub use arpd::engine::arp::ArpOp;
pub use arpd::engine::flow_table::FlowTable;
pub use arpd::engine::flow_table::ProcessResult;
pub use arpd::engine::packet::PacketMeta;
pub use arpd::engine::packet::PortId;
pub use arpd::engine::registry::ServiceTables;
pub use arpd::provider::LogLevel;
pub use arpd::provider::LogProvider;

use std::sync::Arc;
use std::sync::Mutex;

pub const VIRTUAL_IFACE: &str = "gtp_br0";
pub const VIRTUAL_MAC: MacAddr =
    MacAddr::from_const([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
pub const UE_MAC: MacAddr =
    MacAddr::from_const([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// The services of the test pipeline. The responder owns table 1 and
/// hands packets to table 2.
pub const SERVICES: [&str; 2] = [APP_NAME, "access_control"];

pub fn cidr(s: &str) -> Ipv4Cidr {
    s.parse().unwrap()
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// A responder configuration for the given UE subnets.
pub fn test_cfg(blocks: &[&str]) -> ResponderCfg {
    ResponderCfg::new(
        VIRTUAL_IFACE,
        VIRTUAL_MAC,
        blocks.iter().map(|s| cidr(s)).collect(),
    )
    .unwrap()
}

/// A responder for the given UE subnets, logging to `log`.
pub fn responder_with_log(
    blocks: &[&str],
    log: Arc<dyn LogProvider>,
) -> Arc<ArpResponder> {
    let tables = ServiceTables::new(&SERVICES).unwrap();
    let app =
        ArpResponder::new(APP_NAME, Arc::new(test_cfg(blocks)), &tables, log)
            .unwrap();
    Arc::new(app)
}

/// A responder for the given UE subnets, logging to stdout.
pub fn responder(blocks: &[&str]) -> Arc<ArpResponder> {
    responder_with_log(blocks, Arc::new(arpd::provider::PrintlnLog))
}

/// A broadcast ARP request arriving on the virtual interface.
pub fn arp_req(
    in_port: PortId,
    sha: MacAddr,
    spa: &str,
    tpa: &str,
) -> PacketMeta {
    PacketMeta::arp_request(in_port, sha, ip(spa), ip(tpa))
        .with_direction(Direction::In)
}

/// Keeps every message logged, for tests to inspect.
#[derive(Debug, Default)]
pub struct CaptureLog {
    msgs: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.msgs.lock().unwrap().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.msgs
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.msgs.lock().unwrap().push((level, msg.to_string()));
    }
}
