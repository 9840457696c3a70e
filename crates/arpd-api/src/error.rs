// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Errors that cross the boundary between the responder and the
/// collaborators it is wired to (table registry, switch channel).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ArpdError {
    /// The same app name was registered twice in the table layout.
    DuplicateApp(String),

    /// More apps were registered than there are tables between the
    /// ingress and egress tables.
    TooManyApps {
        count: usize,
        max: usize,
    },

    /// The app has no table assignment.
    UnknownApp(String),

    /// The switch channel refused or failed to carry a message.
    Channel {
        op: String,
        msg: String,
    },
}

impl Display for ArpdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DuplicateApp(app) => {
                write!(f, "app {app} registered more than once")
            }

            Self::TooManyApps { count, max } => {
                write!(f, "{count} apps registered but only {max} tables free")
            }

            Self::UnknownApp(app) => write!(f, "no table assigned to {app}"),

            Self::Channel { op, msg } => {
                write!(f, "switch channel {op} failed: {msg}")
            }
        }
    }
}

impl core::error::Error for ArpdError {}
