// src/libraries.rs

//! External library projects whose build output is mirrored into the
//! dependency trees of the consumer applications.
//!
//! The table is fixed. Paths are relative to the client root; the sibling
//! projects live next to it (`../webapp`, `../setup`, ...).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::BuildError;

/// A project tree that receives library output under its `node_modules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Consumer {
    Client,
    Webapp,
    Setup,
    ServerSetup,
}

impl Consumer {
    pub const ALL: [Consumer; 4] = [
        Consumer::Client,
        Consumer::Webapp,
        Consumer::Setup,
        Consumer::ServerSetup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Consumer::Client => "client",
            Consumer::Webapp => "webapp",
            Consumer::Setup => "setup",
            Consumer::ServerSetup => "server-setup",
        }
    }

    /// Project root relative to the client root.
    pub fn root(self, client_root: &Path) -> PathBuf {
        match self {
            Consumer::Client => client_root.to_path_buf(),
            other => client_root.join("..").join(other.as_str()),
        }
    }

    /// Consumers with their own rebuild step and watch binding.
    pub fn is_rebuildable(self) -> bool {
        matches!(self, Consumer::Setup | Consumer::ServerSetup)
    }
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consumer {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Consumer::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BuildError::ConfigError(format!("unknown consumer project '{s}'")))
    }
}

/// Where a library's sources and build output live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Checkout given by the library path environment variable.
    External,
    /// `../webapp/projects/<name>` with output in `../webapp/dist/<name>`.
    Webapp,
    /// `npm/dxDataSystem` inside the client tree.
    DataSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Library {
    DxGui,
    Assets,
    AdminLib,
    AdminShared,
    SetupLib,
    SystemLib,
    DxDataSystem,
}

impl Library {
    pub const ALL: [Library; 7] = [
        Library::DxGui,
        Library::Assets,
        Library::AdminLib,
        Library::AdminShared,
        Library::SetupLib,
        Library::SystemLib,
        Library::DxDataSystem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Library::DxGui => "dx-gui",
            Library::Assets => "assets",
            Library::AdminLib => "admin-lib",
            Library::AdminShared => "admin-shared",
            Library::SetupLib => "setup-lib",
            Library::SystemLib => "system-lib",
            Library::DxDataSystem => "dx-data-system",
        }
    }

    fn origin(self) -> Origin {
        match self {
            Library::DxGui => Origin::External,
            Library::DxDataSystem => Origin::DataSystem,
            _ => Origin::Webapp,
        }
    }

    pub fn scope(self) -> &'static str {
        match self {
            Library::DxGui => "@delphix",
            _ => "@dlpx",
        }
    }

    pub fn package(self) -> &'static str {
        match self {
            Library::DxDataSystem => "dxDataSystem",
            other => other.as_str(),
        }
    }

    /// Whether the library participates given the external checkout path.
    pub fn is_enabled(self, external_path: Option<&Path>) -> bool {
        self.origin() != Origin::External || external_path.is_some()
    }

    /// Source tree watched for changes, with the watch patterns relative to
    /// it. `None` when the library is not enabled.
    pub fn watch_root(self, client_root: &Path, external_path: Option<&Path>) -> Option<PathBuf> {
        match self.origin() {
            Origin::External => external_path.map(|p| p.join("projects").join("dx-gui").join("src")),
            Origin::Webapp => {
                let project = client_root.join("..").join("webapp").join("projects").join(self.as_str());
                Some(if self == Library::Assets {
                    project
                } else {
                    project.join("src")
                })
            }
            Origin::DataSystem => Some(client_root.join("npm").join("dxDataSystem")),
        }
    }

    pub fn watch_patterns(self) -> Vec<&'static str> {
        match self.origin() {
            Origin::DataSystem => vec![
                "**/*",
                "!node_modules/**",
                "!dist/**",
                "!build/**",
                "!.gradle/**",
                "!coverage/**",
            ],
            _ => vec!["**"],
        }
    }

    /// Built output that gets mirrored.
    pub fn dist_dir(self, client_root: &Path, external_path: Option<&Path>) -> Option<PathBuf> {
        match self.origin() {
            Origin::External => external_path.map(|p| p.join("dist").join("dx-gui")),
            Origin::Webapp => Some(
                client_root
                    .join("..")
                    .join("webapp")
                    .join("dist")
                    .join(self.as_str()),
            ),
            Origin::DataSystem => Some(client_root.join("npm").join("dxDataSystem").join("dist")),
        }
    }

    /// Consumer trees this library is mirrored into, in a fixed order.
    pub fn consumers(self) -> Vec<Consumer> {
        match self {
            Library::AdminLib => vec![Consumer::Client],
            Library::Assets | Library::AdminShared | Library::SetupLib => {
                vec![Consumer::Client, Consumer::ServerSetup, Consumer::Setup]
            }
            Library::SystemLib => vec![Consumer::Client, Consumer::ServerSetup],
            Library::DxGui | Library::DxDataSystem => vec![
                Consumer::Client,
                Consumer::Webapp,
                Consumer::Setup,
                Consumer::ServerSetup,
            ],
        }
    }

    /// Consumer projects rebuilt after this library is synced, in order.
    pub fn dependent_rebuilds(self) -> Vec<Consumer> {
        match self {
            Library::AdminLib => vec![],
            Library::SystemLib => vec![Consumer::ServerSetup],
            _ => vec![Consumer::Setup, Consumer::ServerSetup],
        }
    }

    /// Webapp libraries also feed the admin sass build.
    pub fn recompiles_admin_styles(self) -> bool {
        self.origin() == Origin::Webapp
    }

    /// `<consumer root>/node_modules/<scope>/<package>`
    pub fn destination(self, consumer: Consumer, client_root: &Path) -> PathBuf {
        consumer
            .root(client_root)
            .join("node_modules")
            .join(self.scope())
            .join(self.package())
    }

    pub fn destinations(self, client_root: &Path) -> Vec<PathBuf> {
        self.consumers()
            .into_iter()
            .map(|c| self.destination(c, client_root))
            .collect()
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Library {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Library::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| BuildError::ConfigError(format!("unknown library project '{s}'")))
    }
}
