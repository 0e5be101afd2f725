// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Result, SysError};

/// Stable symlinks to resolved devices.
///
/// udev may move or drop `/dev/disk/by-*` links while tables are rewritten;
/// the alias keeps pointing at the node that was resolved when the device
/// first became available.
#[derive(Debug, Clone)]
pub struct DeviceAliases {
    dir: PathBuf,
}

impl DeviceAliases {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<device path>`
    pub fn alias_path(&self, device: &str) -> PathBuf {
        self.dir.join(device.trim_start_matches('/'))
    }

    /// Point the alias for `device` at `target`, replacing any older alias
    pub fn create(&self, device: &str, target: &Path) -> Result<PathBuf> {
        let alias = self.alias_path(device);
        if let Some(parent) = alias.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::remove_file(&alias) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        symlink(target, &alias)?;
        debug!(device, alias = %alias.display(), target = %target.display(), "created device alias");
        Ok(alias)
    }

    /// The device node an alias points at
    pub fn target(&self, device: &str) -> Result<String> {
        let alias = self.alias_path(device);
        let target = fs::read_link(&alias).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SysError::DeviceNotFound(format!(
                "{device} has no alias; it was never waited for"
            )),
            _ => e.into(),
        })?;
        Ok(target.display().to_string())
    }
}
