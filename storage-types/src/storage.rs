// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::{Disk, Filesystem, Luks, Raid};

/// Storage section of a provisioning config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Disks whose partition tables should be reconciled
    #[serde(default)]
    pub disks: Vec<Disk>,

    /// Software RAID arrays to create
    #[serde(default)]
    pub raid: Vec<Raid>,

    /// Filesystems to create or verify
    #[serde(default)]
    pub filesystems: Vec<Filesystem>,

    /// Encrypted volumes to create or reuse
    #[serde(default)]
    pub luks: Vec<Luks>,
}

impl Storage {
    /// True when there is nothing for the disks stage to do.
    ///
    /// A no-op storage section must not touch devices at all, not even a udev
    /// settle, since interacting with udev is racy on its own.
    pub fn is_noop(&self) -> bool {
        self.disks.is_empty()
            && self.raid.is_empty()
            && self.filesystems.is_empty()
            && self.luks.is_empty()
    }
}
