// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage_sys::ToolPaths;

use crate::error::{ProvisionError, Result};

/// Host-level knobs for the disks stage, loaded from TOML.
///
/// Every field has a default so an empty file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProvisionSettings {
    /// Where stable device alias symlinks are created
    pub alias_dir: PathBuf,
    /// Scratch space for key files and temporary mounts
    pub run_dir: PathBuf,
    pub sys_root: PathBuf,
    pub mounts_file: PathBuf,
    /// Filesystem worker count; defaults to the number of logical CPUs
    pub filesystem_workers: Option<usize>,
    pub tools: ToolPaths,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            alias_dir: PathBuf::from("/run/storage-provision/dev_aliases"),
            run_dir: PathBuf::from("/run/storage-provision"),
            sys_root: PathBuf::from("/sys"),
            mounts_file: PathBuf::from("/proc/mounts"),
            filesystem_workers: None,
            tools: ToolPaths::default(),
        }
    }
}

impl ProvisionSettings {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ProvisionError::Settings(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Settings(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Worker count for the filesystem pool
    pub fn filesystem_workers(&self) -> usize {
        self.filesystem_workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, usize::from))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = ProvisionSettings::from_toml("").unwrap();
        assert_eq!(settings, ProvisionSettings::default());
        assert!(settings.filesystem_workers() >= 1);
    }

    #[test]
    fn overrides_tools_and_workers() {
        let settings = ProvisionSettings::from_toml(
            r#"
alias-dir = "/tmp/aliases"
filesystem-workers = 0

[tools]
sgdisk = "/usr/sbin/sgdisk"
"#,
        )
        .unwrap();
        assert_eq!(settings.alias_dir, PathBuf::from("/tmp/aliases"));
        assert_eq!(settings.filesystem_workers(), 1);
        assert_eq!(settings.tools.sgdisk, PathBuf::from("/usr/sbin/sgdisk"));
        assert_eq!(settings.tools.mdadm, PathBuf::from("mdadm"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(matches!(
            ProvisionSettings::from_toml("filesystem-workers = \"many\""),
            Err(ProvisionError::Settings(_))
        ));
    }
}
