// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The control channel to a switch.
//!
//! Messages are fire-and-forget: a successful return means the message
//! was handed to the channel, not that the switch applied it.

use super::rule::Finalized;
use super::rule::Rule;
use arpd_api::ArpdError;
use arpd_api::TableId;
use core::fmt;
use core::fmt::Display;

pub trait FlowChannel {
    /// Remove every flow from `table`.
    fn delete_all_flows(&mut self, table: TableId) -> Result<(), ArpdError>;

    /// Add a flow to `table`.
    fn install_flow(
        &mut self,
        table: TableId,
        rule: &Rule<Finalized>,
    ) -> Result<(), ArpdError>;
}

/// A rule and its table, printed as an `ovs-ofctl` flow.
#[derive(Clone, Copy, Debug)]
pub struct OfctlFlow<'a> {
    pub table: TableId,
    pub rule: &'a Rule<Finalized>,
}

impl Display for OfctlFlow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "table={},{}", self.table, self.rule)
    }
}

#[cfg(any(feature = "std", test))]
pub use self::ofctl::OfctlChannel;

#[cfg(any(feature = "std", test))]
mod ofctl {
    use super::*;
    use alloc::string::ToString;
    use std::io::Write;

    /// A channel that writes each message as one line of an
    /// `ovs-ofctl --bundle add-flows <bridge> -` script.
    #[derive(Debug)]
    pub struct OfctlChannel<W: Write> {
        out: W,
    }

    impl<W: Write> OfctlChannel<W> {
        pub fn new(out: W) -> Self {
            Self { out }
        }

        pub fn into_inner(self) -> W {
            self.out
        }

        fn send(
            &mut self,
            op: &str,
            line: fmt::Arguments,
        ) -> Result<(), ArpdError> {
            writeln!(self.out, "{line}").map_err(|e| ArpdError::Channel {
                op: op.to_string(),
                msg: e.to_string(),
            })
        }
    }

    impl<W: Write> FlowChannel for OfctlChannel<W> {
        fn delete_all_flows(
            &mut self,
            table: TableId,
        ) -> Result<(), ArpdError> {
            self.send("delete_all_flows", format_args!("delete table={table}"))
        }

        fn install_flow(
            &mut self,
            table: TableId,
            rule: &Rule<Finalized>,
        ) -> Result<(), ArpdError> {
            self.send(
                "install_flow",
                format_args!("add {}", OfctlFlow { table, rule }),
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::rule::Action;
    use std::string::String;

    #[test]
    fn ofctl_script() {
        let mut chan = OfctlChannel::new(Vec::new());
        chan.delete_all_flows(2).unwrap();
        chan.install_flow(2, &Rule::match_any(0, vec![Action::Resubmit(3)]))
            .unwrap();

        let script = String::from_utf8(chan.into_inner()).unwrap();
        assert_eq!(
            script,
            "delete table=2\nadd table=2,priority=0 actions=resubmit(,3)\n"
        );
    }
}
