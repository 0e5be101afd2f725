// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use storage_sys::device::{BlockDeviceInspector, DeviceAliases, SysfsInspector};
use storage_sys::{CommandRunner, SystemRunner, ToolPaths};

use crate::error::Result;
use crate::fetch::{KeyFileFetcher, LocalFetcher};
use crate::settings::ProvisionSettings;

/// Everything a reconciler needs besides the storage spec.
///
/// Shared read-only across filesystem workers, hence the `Send + Sync` seams.
#[derive(Clone)]
pub struct StageContext {
    pub settings: ProvisionSettings,
    pub runner: Arc<dyn CommandRunner>,
    pub inspector: Arc<dyn BlockDeviceInspector>,
    pub fetcher: Arc<dyn KeyFileFetcher>,
    aliases: DeviceAliases,
}

impl StageContext {
    pub fn new(
        settings: ProvisionSettings,
        runner: Arc<dyn CommandRunner>,
        inspector: Arc<dyn BlockDeviceInspector>,
        fetcher: Arc<dyn KeyFileFetcher>,
    ) -> Self {
        let aliases = DeviceAliases::new(&settings.alias_dir);
        Self {
            settings,
            runner,
            inspector,
            fetcher,
            aliases,
        }
    }

    /// Production wiring: host commands, sysfs, local key files
    pub fn system(settings: ProvisionSettings) -> Self {
        let inspector = SysfsInspector::new(&settings.sys_root, &settings.mounts_file);
        Self::new(
            settings,
            Arc::new(SystemRunner),
            Arc::new(inspector),
            Arc::new(LocalFetcher),
        )
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.settings.tools
    }

    pub fn aliases(&self) -> &DeviceAliases {
        &self.aliases
    }

    /// Stable alias path for a configured device, as passed to tools
    pub fn alias(&self, device: &str) -> String {
        self.aliases.alias_path(device).display().to_string()
    }

    /// Device node the alias of `device` points at
    pub fn resolved(&self, device: &str) -> Result<String> {
        Ok(self.aliases.target(device)?)
    }
}
