// src/apps/entries.rs

//! Static bundle entry tables per application.
//!
//! Module lists are load-order sensitive (polyfills first, and so on), so
//! they are kept exactly as written: no sorting, no de-duplication.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::AppName;

/// Startup script appended to an app's own entry when a test file under the
/// app is requested.
pub const CUSTOM_STARTUP: &str = "./debugout/dxcore/custom-startup.js";

/// One named entry (an application bundle or a shared vendor group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryGroup {
    pub name: String,
    pub modules: Vec<String>,
}

/// Ordered entry name → module list mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
    groups: Vec<EntryGroup>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, name: &str, modules: &[&str]) -> Self {
        self.groups.push(EntryGroup {
            name: name.to_string(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[EntryGroup] {
        &self.groups
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.modules.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a module to an existing group. Returns false if the group is
    /// absent.
    pub fn push_module(&mut self, name: &str, module: &str) -> bool {
        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(group) => {
                group.modules.push(module.to_string());
                true
            }
            None => false,
        }
    }
}

impl Serialize for EntryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.name, &group.modules)?;
        }
        map.end()
    }
}

const ADMIN_VENDOR: &[&str] = &[
    "babel-polyfill",
    "bootstrap",
    "bootstrap-less-port",
    "backbone",
    "cronstrue",
    "highcharts",
    "highcharts-map",
    "highcharts-no-data",
    "ip-subnet-calculator",
    "jquery",
    "jsoneditor",
    "knockout",
    "moment",
    "moment-duration-format",
    "moment-timezone",
    "npm-modernizr",
    "objectpath",
    "perfect-scrollbar",
    "string-format-js",
    "tv4",
    "underscore",
    "xregexp",
    "ngx-mat-timepicker",
    "xlsx",
    "xlsx/dist/xlsx.mini.min",
];

const ADMIN_VENDOR_ANGULAR: &[&str] = &[
    "@angular/upgrade",
    "ag-grid-community",
    "angular",
    "angular-animate",
    "angular-messages",
    "angular-moment",
    "angular-sanitize",
    "angular-schema-form",
    "ui-bootstrap4",
    "@uirouter/angular-hybrid",
    "angular-ui-sortable",
    "angular-ui-validate",
    "ng-file-upload",
];

const JETSTREAM_VENDOR: &[&str] = &[
    "babel-polyfill",
    "backbone",
    "bootstrap",
    "bootstrap-less-port",
    "jquery",
    "knockout",
    "moment",
    "npm-modernizr",
    "perfect-scrollbar",
    "underscore",
    "xregexp",
];

const LOGIN_VENDOR: &[&str] = &[
    "jquery",
    "babel-polyfill",
    "underscore",
    "backbone",
    "knockout",
    "npm-modernizr",
    "xregexp",
];

const API_VENDOR: &[&str] = &[
    "jquery",
    "underscore",
    "bootstrap",
    "bootstrap-less-port",
    "backbone",
];

/// Entry table for `app`. `dxcore` and `dxtest` are bundled into the other
/// apps and have none.
pub fn resolve_entries(app: AppName) -> EntryMap {
    match app {
        AppName::Admin => EntryMap::new()
            .with_group("admin", &["./admin/admin-app.js"])
            .with_group("vendor", ADMIN_VENDOR)
            .with_group("vendorAngular", ADMIN_VENDOR_ANGULAR)
            .with_group("dxGUI", &["@delphix/dx-gui"])
            .with_group("adminShared", &["@dlpx/admin-shared", "@dlpx/admin-lib"]),
        AppName::Jetstream => EntryMap::new()
            .with_group("jetstream", &["./jetstream/js/main.js"])
            .with_group("vendor", JETSTREAM_VENDOR),
        AppName::Login => EntryMap::new()
            .with_group("login", &["./login/js/login.js"])
            .with_group("vendor", LOGIN_VENDOR),
        AppName::Api => EntryMap::new()
            .with_group("api", &["./api/js/delphix-doc.js"])
            .with_group("vendor", API_VENDOR),
        AppName::Dxcore | AppName::Dxtest => EntryMap::new(),
    }
}

/// Append [`CUSTOM_STARTUP`] to the app's own entry when `test_file` lies
/// under `source_path`. Returns whether the entry was extended.
pub fn inject_startup_file(
    entries: &mut EntryMap,
    app: AppName,
    source_path: &str,
    test_file: Option<&str>,
) -> bool {
    let Some(file) = test_file else {
        return false;
    };
    let marker = format!("{}/", source_path.trim_end_matches('/'));
    if !file.contains(&marker) {
        return false;
    }
    entries.push_module(app.as_str(), CUSTOM_STARTUP)
}
