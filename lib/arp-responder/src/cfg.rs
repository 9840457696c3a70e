// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Responder configuration and its loading at startup.
//!
//! Every error here is fatal: the responder never starts with a
//! configuration it could not fully resolve.

use crate::api::ArpdError;
use crate::api::Ipv4Cidr;
use crate::api::MacAddr;
use crate::engine::APP_NAME;
use arpd::engine::registry::ServiceTables;
use arpd::engine::rule::RuleError;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building the responder configuration.
#[derive(Debug, Error)]
pub enum CfgError {
    #[error("failed to read {path}: {err}")]
    Io { path: String, err: std::io::Error },

    #[error("malformed config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("bad MAC address {mac:?}: {msg}")]
    BadMac { mac: String, msg: String },

    #[error("bad UE subnet {subnet:?}: {msg}")]
    BadSubnet { subnet: String, msg: String },

    #[error("UE subnets {0} and {1} overlap")]
    OverlappingSubnets(Ipv4Cidr, Ipv4Cidr),

    #[error("cannot resolve MAC address of interface {iface:?}: {msg}")]
    UnknownInterface { iface: String, msg: String },

    #[error("bad table layout: {0}")]
    Tables(#[from] ArpdError),

    #[error("invalid rule set: {0}")]
    Rules(RuleError),
}

/// The configuration the responder runs with. It does not change for
/// the lifetime of the process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponderCfg {
    /// The name of the virtual interface the responder answers for.
    pub virtual_iface: String,

    /// The MAC address of the virtual interface, used as the answer to
    /// every ARP request.
    pub virtual_mac: MacAddr,

    /// The UE subnets, in configuration order.
    pub ue_ip_blocks: Vec<Ipv4Cidr>,
}

impl ResponderCfg {
    /// Build a configuration, rejecting subnets that share addresses.
    pub fn new(
        virtual_iface: impl Into<String>,
        virtual_mac: MacAddr,
        ue_ip_blocks: Vec<Ipv4Cidr>,
    ) -> Result<Self, CfgError> {
        for (i, a) in ue_ip_blocks.iter().enumerate() {
            let rest = &ue_ip_blocks[i + 1..];
            if let Some(b) = rest.iter().find(|b| a.overlaps(b)) {
                return Err(CfgError::OverlappingSubnets(*a, *b));
            }
        }

        Ok(Self {
            virtual_iface: virtual_iface.into(),
            virtual_mac,
            ue_ip_blocks,
        })
    }
}

/// Resolves the MAC address of a network interface.
pub trait LinkResolver {
    fn resolve_mac(&self, iface: &str) -> Result<MacAddr, CfgError>;
}

/// Read interface addresses from sysfs, as `ip link` does.
#[derive(Clone, Debug)]
pub struct SysfsLinkResolver {
    root: PathBuf,
}

impl Default for SysfsLinkResolver {
    fn default() -> Self {
        Self::with_root("/sys/class/net")
    }
}

impl SysfsLinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve against `<root>/<iface>/address` instead of sysfs.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LinkResolver for SysfsLinkResolver {
    fn resolve_mac(&self, iface: &str) -> Result<MacAddr, CfgError> {
        if iface.is_empty() || iface.contains('/') || iface.starts_with('.') {
            return Err(CfgError::UnknownInterface {
                iface: iface.to_string(),
                msg: "invalid interface name".to_string(),
            });
        }

        let path = self.root.join(iface).join("address");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            CfgError::UnknownInterface {
                iface: iface.to_string(),
                msg: format!("{}: {e}", path.display()),
            }
        })?;

        parse_mac(&raw)
    }
}

fn parse_mac(s: &str) -> Result<MacAddr, CfgError> {
    s.parse()
        .map_err(|msg| CfgError::BadMac { mac: s.trim().to_string(), msg })
}

fn parse_subnet(s: &str) -> Result<Ipv4Cidr, CfgError> {
    s.parse()
        .map_err(|msg| CfgError::BadSubnet { subnet: s.to_string(), msg })
}

/// The on-disk configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CfgFile {
    virtual_interface: String,
    virtual_mac: Option<String>,
    ue_ip_blocks: Vec<String>,
    services: Option<Vec<String>>,
    app_name: Option<String>,
}

/// Everything the daemon needs at startup: the responder
/// configuration, the pipeline table layout, and the name the
/// responder is registered under in that layout.
#[derive(Clone, Debug)]
pub struct DaemonCfg {
    pub responder: ResponderCfg,
    pub tables: ServiceTables,
    pub app_name: String,
}

impl DaemonCfg {
    /// Parse a TOML configuration.
    ///
    /// The virtual MAC is taken from `virtual_mac` when present and
    /// resolved from `virtual_interface` otherwise. Without a
    /// `services` list the responder is the only app of the pipeline.
    pub fn from_toml(
        s: &str,
        resolver: &dyn LinkResolver,
    ) -> Result<Self, CfgError> {
        let file: CfgFile = toml::from_str(s)?;

        let virtual_mac = match &file.virtual_mac {
            Some(mac) => parse_mac(mac)?,
            None => resolver.resolve_mac(&file.virtual_interface)?,
        };

        let ue_ip_blocks = file
            .ue_ip_blocks
            .iter()
            .map(|s| parse_subnet(s))
            .collect::<Result<Vec<_>, _>>()?;

        let app_name = file.app_name.unwrap_or_else(|| APP_NAME.to_string());
        let services = file.services.unwrap_or_else(|| vec![app_name.clone()]);
        let tables = ServiceTables::new(services.as_slice())?;

        if !tables.apps().contains(&app_name) {
            return Err(CfgError::Tables(ArpdError::UnknownApp(app_name)));
        }

        let responder = ResponderCfg::new(
            file.virtual_interface,
            virtual_mac,
            ue_ip_blocks,
        )?;

        Ok(Self { responder, tables, app_name })
    }

    /// Read and parse a TOML configuration file.
    pub fn load(
        path: impl AsRef<Path>,
        resolver: &dyn LinkResolver,
    ) -> Result<Self, CfgError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|err| CfgError::Io {
            path: path.display().to_string(),
            err,
        })?;
        Self::from_toml(&s, resolver)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct NoLinks;

    impl LinkResolver for NoLinks {
        fn resolve_mac(&self, iface: &str) -> Result<MacAddr, CfgError> {
            Err(CfgError::UnknownInterface {
                iface: iface.to_string(),
                msg: "no such link".to_string(),
            })
        }
    }

    #[test]
    fn parse_full() {
        let cfg = DaemonCfg::from_toml(
            r#"
            virtual_interface = "gtp_br0"
            virtual_mac = "aa:bb:cc:dd:ee:ff"
            ue_ip_blocks = ["192.168.128.0/24", "10.10.0.0/255.255.0.0"]
            services = ["arpd", "access_control"]
            "#,
            &NoLinks,
        )
        .unwrap();

        assert_eq!(cfg.app_name, "arpd");
        assert_eq!(cfg.responder.virtual_iface, "gtp_br0");
        assert_eq!(
            cfg.responder.virtual_mac,
            "aa:bb:cc:dd:ee:ff".parse().unwrap()
        );
        assert_eq!(cfg.responder.ue_ip_blocks[1].prefix_len(), 16);
        assert_eq!(cfg.tables.apps().len(), 2);
    }

    #[test]
    fn host_bits_masked() {
        let cfg = DaemonCfg::from_toml(
            r#"
            virtual_interface = "gtp_br0"
            virtual_mac = "aa:bb:cc:dd:ee:ff"
            ue_ip_blocks = ["192.168.128.77/24"]
            "#,
            &NoLinks,
        )
        .unwrap();

        assert_eq!(
            cfg.responder.ue_ip_blocks[0].to_string(),
            "192.168.128.0/24"
        );
    }

    #[test]
    fn resolution_failure_is_fatal() {
        let err = DaemonCfg::from_toml(
            r#"
            virtual_interface = "gtp_br0"
            ue_ip_blocks = []
            "#,
            &NoLinks,
        )
        .unwrap_err();
        assert!(matches!(err, CfgError::UnknownInterface { .. }));
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = DaemonCfg::from_toml(
            r#"
            virtual_interface = "gtp_br0"
            virtual_mac = "aa:bb:cc:dd:ee:ff"
            ue_ip_blocks = []
            ue_ip_block = "10.0.0.0/8"
            "#,
            &NoLinks,
        )
        .unwrap_err();
        assert!(matches!(err, CfgError::Toml(_)));
    }

    #[test]
    fn app_must_have_a_table() {
        let err = DaemonCfg::from_toml(
            r#"
            virtual_interface = "gtp_br0"
            virtual_mac = "aa:bb:cc:dd:ee:ff"
            ue_ip_blocks = []
            services = ["access_control"]
            "#,
            &NoLinks,
        )
        .unwrap_err();
        assert!(matches!(err, CfgError::Tables(ArpdError::UnknownApp(_))));
    }

    #[test]
    fn sysfs_lookup() {
        let root = std::env::temp_dir()
            .join(format!("arpd-sysfs-{}", std::process::id()));
        std::fs::create_dir_all(root.join("gtp_br0")).unwrap();
        std::fs::write(root.join("gtp_br0/address"), "02:00:00:00:00:01\n")
            .unwrap();

        let resolver = SysfsLinkResolver::with_root(&root);
        assert_eq!(
            resolver.resolve_mac("gtp_br0").unwrap(),
            "02:00:00:00:00:01".parse().unwrap()
        );
        assert!(matches!(
            resolver.resolve_mac("eth9"),
            Err(CfgError::UnknownInterface { .. })
        ));
        assert!(matches!(
            resolver.resolve_mac("../gtp_br0"),
            Err(CfgError::UnknownInterface { .. })
        ));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
