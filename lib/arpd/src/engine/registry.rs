// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Assignment of flow tables to the apps of the pipeline.

use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use arpd_api::ArpdError;
use arpd_api::TableId;

/// Maps an app to the table it owns and to the table packets continue
/// in once the app is done with them.
pub trait TableRegistry {
    fn get_table_num(&self, app: &str) -> Result<TableId, ArpdError>;
    fn get_next_table_num(&self, app: &str) -> Result<TableId, ArpdError>;
}

/// The table every packet enters the pipeline in.
pub const INGRESS_TABLE: TableId = 0;

/// The last table of the pipeline, shared by all apps.
pub const EGRESS_TABLE: TableId = 20;

/// A static pipeline layout: the ingress table, then one table per app
/// in the order given, then the egress table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceTables {
    apps: Vec<String>,
}

impl ServiceTables {
    pub fn new<S: AsRef<str>>(apps: &[S]) -> Result<Self, ArpdError> {
        let max = usize::from(EGRESS_TABLE - INGRESS_TABLE - 1);
        if apps.len() > max {
            return Err(ArpdError::TooManyApps { count: apps.len(), max });
        }

        let mut names: Vec<String> = Vec::with_capacity(apps.len());
        for app in apps {
            let app = app.as_ref();
            if names.iter().any(|n| n == app) {
                return Err(ArpdError::DuplicateApp(app.to_string()));
            }
            names.push(app.to_string());
        }

        Ok(Self { apps: names })
    }

    pub fn apps(&self) -> &[String] {
        &self.apps
    }

    fn index(&self, app: &str) -> Result<usize, ArpdError> {
        self.apps
            .iter()
            .position(|a| a == app)
            .ok_or_else(|| ArpdError::UnknownApp(app.to_string()))
    }
}

impl TableRegistry for ServiceTables {
    fn get_table_num(&self, app: &str) -> Result<TableId, ArpdError> {
        // The length check in new() keeps this below EGRESS_TABLE.
        let idx = self.index(app)? as TableId;
        Ok(INGRESS_TABLE + 1 + idx)
    }

    fn get_next_table_num(&self, app: &str) -> Result<TableId, ArpdError> {
        let idx = self.index(app)?;
        if idx + 1 == self.apps.len() {
            Ok(EGRESS_TABLE)
        } else {
            self.get_table_num(&self.apps[idx + 1])
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout() {
        let reg = ServiceTables::new(&["arpd", "access_control"]).unwrap();
        assert_eq!(reg.get_table_num("arpd"), Ok(1));
        assert_eq!(reg.get_next_table_num("arpd"), Ok(2));
        assert_eq!(reg.get_table_num("access_control"), Ok(2));
        assert_eq!(reg.get_next_table_num("access_control"), Ok(EGRESS_TABLE));
        assert_eq!(
            reg.get_table_num("meter"),
            Err(ArpdError::UnknownApp("meter".to_string()))
        );
    }

    #[test]
    fn bad_layouts() {
        assert_eq!(
            ServiceTables::new(&["arpd", "arpd"]),
            Err(ArpdError::DuplicateApp("arpd".to_string()))
        );

        let apps: Vec<String> = (0..20).map(|i| format!("app{i}")).collect();
        assert_eq!(
            ServiceTables::new(apps.as_slice()),
            Err(ArpdError::TooManyApps { count: 20, max: 19 })
        );
    }
}
