// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Software RAID array to assemble with mdadm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Raid {
    /// Array name passed to `mdadm --create` (e.g., "md/data")
    pub name: String,

    /// RAID level (e.g., "raid1", "linear")
    pub level: String,

    /// Member devices, spares included
    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spares: Option<u32>,

    /// Extra mdadm arguments, passed through verbatim
    #[serde(default)]
    pub options: Vec<String>,
}

impl Raid {
    pub fn spare_count(&self) -> u32 {
        self.spares.unwrap_or(0)
    }

    /// Number of active (non-spare) members
    pub fn active_device_count(&self) -> usize {
        self.devices
            .len()
            .saturating_sub(self.spare_count() as usize)
    }
}
