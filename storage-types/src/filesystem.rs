// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filesystem formats the provisioning stage can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemFormat {
    Btrfs,
    Ext4,
    Xfs,
    Swap,
    Vfat,
}

impl FilesystemFormat {
    /// Name as reported by blkid `TYPE=`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btrfs => "btrfs",
            Self::Ext4 => "ext4",
            Self::Xfs => "xfs",
            Self::Swap => "swap",
            Self::Vfat => "vfat",
        }
    }

    /// Parse from blkid/config string format
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "btrfs" => Some(Self::Btrfs),
            "ext4" => Some(Self::Ext4),
            "xfs" => Some(Self::Xfs),
            "swap" => Some(Self::Swap),
            "vfat" => Some(Self::Vfat),
            _ => None,
        }
    }
}

impl fmt::Display for FilesystemFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired filesystem on a block device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filesystem {
    /// Block device holding the filesystem
    pub device: String,

    /// Format to create; filesystems without one are left alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FilesystemFormat>,

    /// Mount path in the final system (used by later stages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Extra mkfs arguments, passed through verbatim
    #[serde(default)]
    pub options: Vec<String>,

    /// Recreate even if a matching or different filesystem exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_filesystem: Option<bool>,

    #[serde(default)]
    pub mount_options: Vec<String>,

    /// Anchored regular expressions of paths to keep when reusing
    #[serde(default)]
    pub clean_except: Vec<String>,
}

impl Filesystem {
    /// `wipeFilesystem`, with unspecified treated as false
    pub fn wipes_filesystem(&self) -> bool {
        self.wipe_filesystem == Some(true)
    }
}

/// Normalize a filesystem UUID for comparison and for mkfs.
///
/// UUIDs compare case-insensitively. FAT uses a 32-bit volume ID which blkid
/// prints as `A1B2-C3D4` but mkfs.fat only accepts without the dash, so the
/// dash is dropped for `vfat`.
pub fn canonicalize_filesystem_uuid(format: &str, uuid: &str) -> String {
    let mut uuid = uuid.to_lowercase();
    if format == FilesystemFormat::Vfat.as_str() && uuid.len() >= 5 && uuid.as_bytes()[4] == b'-'
    {
        uuid.remove(4);
    }
    uuid
}
