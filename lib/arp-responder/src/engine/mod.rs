// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

pub mod arp;
pub mod egress;
pub mod switch;

use crate::api::ArpdError;
use crate::api::TableId;
use crate::cfg::CfgError;
use crate::cfg::ResponderCfg;
use arpd::engine::channel::FlowChannel;
use arpd::engine::channel::OfctlFlow;
use arpd::engine::registry::TableRegistry;
use arpd::engine::rule::Finalized;
use arpd::engine::rule::Rule;
use arpd::engine::rule::check_same_tier_disjoint;
use arpd::provider::LogLevel;
use arpd::provider::LogProvider;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

/// The name the responder registers its table under by default.
pub const APP_NAME: &str = "arpd";

/// A rule together with the table it is installed in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlowRule {
    pub table: TableId,
    pub rule: Rule<Finalized>,
}

impl FlowRule {
    pub fn new(table: TableId, rule: Rule<Finalized>) -> Self {
        Self { table, rule }
    }
}

impl Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", OfctlFlow { table: self.table, rule: &self.rule })
    }
}

/// The outcome of bringing a switch in line with the responder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reconcile {
    /// Every message was handed to the channel.
    Complete { installed: usize },

    /// The channel failed part way through. The switch table holds
    /// some unknown subset of the rules until the next attach.
    Partial { installed: usize, err: ArpdError },

    /// Nothing was sent.
    Skipped,
}

impl Reconcile {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// The responder app: its configuration, the table it owns, and the
/// full set of rules it keeps in that table.
///
/// The responder holds no per-switch state and is shared by the
/// handles of every attached switch.
pub struct ArpResponder {
    cfg: Arc<ResponderCfg>,
    table: TableId,
    next_table: TableId,
    rules: Vec<FlowRule>,
    log: Arc<dyn LogProvider>,
}

impl fmt::Debug for ArpResponder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArpResponder")
            .field("cfg", &self.cfg)
            .field("table", &self.table)
            .field("next_table", &self.next_table)
            .finish_non_exhaustive()
    }
}

impl ArpResponder {
    /// Create the responder registered as `app`. The table numbers are
    /// read from the registry once, here.
    pub fn new(
        app: &str,
        cfg: Arc<ResponderCfg>,
        registry: &dyn TableRegistry,
        log: Arc<dyn LogProvider>,
    ) -> Result<Self, CfgError> {
        let table = registry.get_table_num(app)?;
        let next_table = registry.get_next_table_num(app)?;

        let mut rules = arp::synthesize_arp_rules(
            table,
            &cfg.ue_ip_blocks,
            cfg.virtual_mac,
        );
        rules.extend(egress::build_fallback_rules(
            table,
            next_table,
            cfg.virtual_mac,
        ));

        for fr in &rules {
            fr.rule.validate().map_err(CfgError::Rules)?;
        }

        let finalized: Vec<Rule<Finalized>> =
            rules.iter().map(|fr| fr.rule.clone()).collect();
        check_same_tier_disjoint(&finalized).map_err(CfgError::Rules)?;

        Ok(Self { cfg, table, next_table, rules, log })
    }

    pub fn cfg(&self) -> &ResponderCfg {
        &self.cfg
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn next_table(&self) -> TableId {
        self.next_table
    }

    /// The rules installed on attach, in installation order.
    pub fn rules(&self) -> &[FlowRule] {
        &self.rules
    }

    pub fn log(&self, level: LogLevel, msg: &str) {
        self.log.log(level, msg);
    }

    /// Clear the responder's table and install the full rule set.
    ///
    /// Stops at the first channel failure. The failure is logged and
    /// reported in the result; it is repaired by the next attach.
    pub fn initialize_on_connect(
        &self,
        chan: &mut dyn FlowChannel,
    ) -> Reconcile {
        self.log(
            LogLevel::Note,
            &format!(
                "setting default eth_dst to {} ({})",
                self.cfg.virtual_mac, self.cfg.virtual_iface
            ),
        );

        let mut installed = 0;
        match self.rebuild(chan, &mut installed) {
            Ok(()) => Reconcile::Complete { installed },
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    &format!(
                        "table {} left partially installed ({installed}/{} \
                         rules): {err}",
                        self.table,
                        self.rules.len()
                    ),
                );
                Reconcile::Partial { installed, err }
            }
        }
    }

    fn rebuild(
        &self,
        chan: &mut dyn FlowChannel,
        installed: &mut usize,
    ) -> Result<(), ArpdError> {
        chan.delete_all_flows(self.table)?;
        for fr in &self.rules {
            chan.install_flow(fr.table, &fr.rule)?;
            *installed += 1;
        }
        Ok(())
    }

    /// Clear the responder's table.
    pub fn cleanup_on_disconnect(
        &self,
        chan: &mut dyn FlowChannel,
    ) -> Reconcile {
        match chan.delete_all_flows(self.table) {
            Ok(()) => Reconcile::Complete { installed: 0 },
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    &format!("failed to clear table {}: {err}", self.table),
                );
                Reconcile::Partial { installed: 0, err }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arpd::engine::flow_table::FlowTable;
    use arpd::engine::registry::ServiceTables;
    use arpd::provider::PrintlnLog;

    fn responder(blocks: &[&str]) -> ArpResponder {
        let cfg = ResponderCfg::new(
            "gtp_br0",
            "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            blocks.iter().map(|s| s.parse().unwrap()).collect(),
        )
        .unwrap();
        let tables = ServiceTables::new(&["arpd", "access_control"]).unwrap();
        ArpResponder::new(
            APP_NAME,
            Arc::new(cfg),
            &tables,
            Arc::new(PrintlnLog),
        )
        .unwrap()
    }

    #[test]
    fn tables_from_registry() {
        let app = responder(&["192.168.128.0/24"]);
        assert_eq!(app.table(), 1);
        assert_eq!(app.next_table(), 2);
        assert_eq!(app.rules().len(), 4);
    }

    #[test]
    fn unregistered_app() {
        let tables = ServiceTables::new(&["access_control"]).unwrap();
        let cfg =
            ResponderCfg::new("gtp_br0", Default::default(), vec![]).unwrap();
        let err = ArpResponder::new(
            APP_NAME,
            Arc::new(cfg),
            &tables,
            Arc::new(PrintlnLog),
        )
        .unwrap_err();
        assert!(matches!(err, CfgError::Tables(ArpdError::UnknownApp(_))));
    }

    #[test]
    fn connect_and_disconnect() {
        let app = responder(&["192.168.128.0/24", "10.0.0.0/8"]);
        let mut ft = FlowTable::new();

        assert_eq!(
            app.initialize_on_connect(&mut ft),
            Reconcile::Complete { installed: 5 }
        );
        assert_eq!(ft.num_rules(1), 5);

        assert_eq!(
            app.cleanup_on_disconnect(&mut ft),
            Reconcile::Complete { installed: 0 }
        );
        assert_eq!(ft.num_rules(1), 0);
    }
}
