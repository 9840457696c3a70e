// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::io;
use std::path::PathBuf;

use clap::Parser;

use arp_responder::engine::Reconcile;
use arp_responder::engine::switch::Switch;
use arp_responder::engine::switch::SwitchEvent;
use arpd::api::Direction;
use arpd::api::Ipv4Addr;
use arpd::api::MacAddr;
use arpd::engine::channel::OfctlChannel;
use arpd::engine::flow_table::FlowTable;
use arpd::engine::packet::PacketMeta;
use arpd::engine::packet::PortId;
use arpd::engine::rule::Finalized;
use arpd::engine::rule::Rule;
use arpd::print::print_rules;
use arpd::print::print_trace;
use arpdadm::init_logger;
use arpdadm::load_responder;

/// Inspect the flow rules of the subscriber ARP responder
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Show the rules installed in the responder's table.
    ShowRules {
        #[arg(short)]
        config: PathBuf,
    },

    /// Print the messages sent to a switch on attach, as an
    /// `ovs-ofctl --bundle add-flows` script.
    Ofctl {
        #[arg(short)]
        config: PathBuf,
    },

    /// Run an ARP request through the responder's table.
    Trace {
        #[arg(short)]
        config: PathBuf,

        /// The sender protocol address of the request.
        #[arg(long)]
        spa: Ipv4Addr,

        /// The target protocol address of the request.
        #[arg(long)]
        tpa: Ipv4Addr,

        /// The sender hardware address of the request.
        #[arg(long)]
        sha: MacAddr,

        /// The link source address, when it differs from `sha`.
        #[arg(long)]
        eth_src: Option<MacAddr>,

        #[arg(long, default_value_t = 1)]
        in_port: PortId,

        #[arg(long = "dir", default_value_t = Direction::In)]
        direction: Direction,
    },
}

fn main() -> anyhow::Result<()> {
    let log = init_logger();
    let cmd = Command::parse();

    match cmd {
        Command::ShowRules { config } => {
            let app = load_responder(&config, log)?;
            let rules: Vec<Rule<Finalized>> =
                app.rules().iter().map(|fr| fr.rule.clone()).collect();
            print_rules(app.table(), &rules)?;
        }

        Command::Ofctl { config } => {
            let app = load_responder(&config, log)?;
            let mut chan = OfctlChannel::new(io::stdout().lock());
            if let Reconcile::Partial { err, .. } =
                app.initialize_on_connect(&mut chan)
            {
                anyhow::bail!("failed to write flows: {err}");
            }
        }

        Command::Trace {
            config,
            spa,
            tpa,
            sha,
            eth_src,
            in_port,
            direction,
        } => {
            let app = load_responder(&config, log)?;
            let table = app.table();

            let mut sw = Switch::new(0, FlowTable::new(), app);
            if let Reconcile::Partial { err, .. } =
                sw.handle(SwitchEvent::Attach)
            {
                anyhow::bail!("failed to install flows: {err}");
            }

            let mut req = PacketMeta::arp_request(in_port, sha, spa, tpa)
                .with_direction(direction);
            if let Some(mac) = eth_src {
                req.eth_src = mac;
            }

            println!("{req}");
            let res = sw
                .channel()
                .process(table, req)
                .map_err(|e| anyhow::anyhow!("processing failed: {e}"))?;
            print_trace(&res)?;
        }
    }

    Ok(())
}
