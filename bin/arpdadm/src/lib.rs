// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! ARP responder administration library

use anyhow::Context;
use arp_responder::cfg::DaemonCfg;
use arp_responder::cfg::SysfsLinkResolver;
use arp_responder::engine::ArpResponder;
use arpd::provider::LogLevel;
use arpd::provider::LogProvider;
use slog::Drain;
use slog::Logger;
use std::path::Path;
use std::sync::Arc;

/// Build the root logger, filtered by `RUST_LOG`.
pub fn init_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!())
}

/// A [`LogProvider`] writing to slog.
#[derive(Clone, Debug)]
pub struct SlogLog(Logger);

impl SlogLog {
    pub fn new(log: Logger) -> Self {
        Self(log)
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.0, "{}", msg),
            LogLevel::Warn => slog::warn!(self.0, "{}", msg),
            LogLevel::Error => slog::error!(self.0, "{}", msg),
        }
    }
}

/// Load a configuration file and build the responder it describes.
pub fn load_responder(
    path: &Path,
    log: Logger,
) -> anyhow::Result<Arc<ArpResponder>> {
    let cfg = DaemonCfg::load(path, &SysfsLinkResolver::new())
        .with_context(|| format!("loading {}", path.display()))?;

    let log = log.new(slog::o!("app" => cfg.app_name.clone()));
    let app = ArpResponder::new(
        &cfg.app_name,
        Arc::new(cfg.responder),
        &cfg.tables,
        Arc::new(SlogLog::new(log)),
    )?;

    Ok(Arc::new(app))
}
