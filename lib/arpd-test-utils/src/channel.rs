// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A switch channel that records what it is sent.

use arpd::api::ArpdError;
use arpd::api::TableId;
use arpd::engine::channel::FlowChannel;
use arpd::engine::flow_table::FlowTable;
use arpd::engine::rule::Finalized;
use arpd::engine::rule::Rule;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelOp {
    DeleteAll(TableId),
    Install(TableId, Rule<Finalized>),
}

/// Records every message and applies it to a [`FlowTable`] standing
/// in for the switch.
///
/// With [`RecordingChannel::fail_after()`] the channel accepts a number
/// of messages and then fails every message after that, as a dropped
/// connection would.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub ops: Vec<ChannelOp>,
    pub switch: FlowTable,
    fail_after: Option<usize>,
    sent: usize,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that fails once `n` messages have been sent.
    pub fn fail_after(n: usize) -> Self {
        Self { fail_after: Some(n), ..Self::default() }
    }

    /// Start accepting messages again.
    pub fn heal(&mut self) {
        self.fail_after = None;
    }

    /// Forget the messages recorded so far, keeping the switch.
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// The rules installed, in the order they were sent.
    pub fn installs(&self) -> Vec<(TableId, Rule<Finalized>)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ChannelOp::Install(t, r) => Some((*t, r.clone())),
                ChannelOp::DeleteAll(_) => None,
            })
            .collect()
    }

    fn check(&mut self, op: &str) -> Result<(), ArpdError> {
        if self.fail_after.is_some_and(|n| self.sent >= n) {
            return Err(ArpdError::Channel {
                op: op.to_string(),
                msg: "connection reset".to_string(),
            });
        }

        self.sent += 1;
        Ok(())
    }
}

impl FlowChannel for RecordingChannel {
    fn delete_all_flows(&mut self, table: TableId) -> Result<(), ArpdError> {
        self.check("delete_all_flows")?;
        self.ops.push(ChannelOp::DeleteAll(table));
        self.switch.delete_all_flows(table)
    }

    fn install_flow(
        &mut self,
        table: TableId,
        rule: &Rule<Finalized>,
    ) -> Result<(), ArpdError> {
        self.check("install_flow")?;
        self.ops.push(ChannelOp::Install(table, rule.clone()));
        self.switch.install_flow(table, rule)
    }
}
