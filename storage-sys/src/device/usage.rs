// SPDX-License-Identifier: GPL-3.0-only

//! Block device in-use detection
//!
//! A device is considered in use when something holds it (device-mapper, md,
//! LUKS) or when it is mounted. Partition tables of disks with active
//! partitions may still be edited, but never the active entries themselves.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Result, SysError};

/// What currently uses a disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUsage {
    /// The whole-disk node is held by another device
    pub held: bool,
    /// The whole-disk node is mounted
    pub mounted: bool,
    /// Partitions that are held or mounted
    pub active_partitions: BTreeSet<u32>,
}

impl DeviceUsage {
    /// The disk itself (not one of its partitions) is busy
    pub fn disk_in_use(&self) -> bool {
        self.held || self.mounted
    }

    pub fn partition_active(&self, number: u32) -> bool {
        self.active_partitions.contains(&number)
    }
}

/// Seam for resolving device paths and inspecting their usage
pub trait BlockDeviceInspector: Send + Sync {
    /// Resolve symlinks (`/dev/disk/by-*`) to the device node
    fn resolve(&self, device: &str) -> Result<PathBuf>;

    /// Usage of a resolved whole-disk node
    fn usage(&self, device: &str) -> Result<DeviceUsage>;
}

/// Separator between a disk name and partition number ("nvme0n1" + "p" + "1")
pub fn partition_number_prefix(disk_name: &str) -> &'static str {
    if disk_name.ends_with(|c: char| c.is_ascii_digit()) {
        "p"
    } else {
        ""
    }
}

/// Inspects `/sys` and the mount table
#[derive(Debug, Clone)]
pub struct SysfsInspector {
    sys_root: PathBuf,
    mounts_file: PathBuf,
}

impl SysfsInspector {
    pub fn new(sys_root: impl Into<PathBuf>, mounts_file: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            mounts_file: mounts_file.into(),
        }
    }

    fn class_block(&self, name: &str) -> PathBuf {
        self.sys_root.join("class/block").join(name)
    }

    fn has_holders(&self, sysfs_dir: &Path) -> Result<bool> {
        match fs::read_dir(sysfs_dir.join("holders")) {
            Ok(mut entries) => Ok(entries.next().is_some()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Device nodes that appear as a mount source
    fn mounted_sources(&self) -> Result<BTreeSet<String>> {
        let table = fs::read_to_string(&self.mounts_file)?;
        Ok(table
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .filter(|source| source.starts_with('/'))
            .map(|source| {
                fs::canonicalize(source)
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|_| source.to_string())
            })
            .collect())
    }

    /// Partition directories of a disk: `(number, kernel name, sysfs dir)`
    fn partitions(&self, disk_name: &str) -> Result<Vec<(u32, String, PathBuf)>> {
        let prefix = format!("{disk_name}{}", partition_number_prefix(disk_name));
        let mut parts = Vec::new();
        let entries = match fs::read_dir(self.class_block(disk_name)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SysError::DeviceNotFound(disk_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(number) = name.strip_prefix(&prefix)
                && let Ok(number) = number.parse::<u32>()
                && entry.path().join("partition").exists()
            {
                parts.push((number, name, entry.path()));
            }
        }
        parts.sort_by_key(|(number, _, _)| *number);
        Ok(parts)
    }
}

impl BlockDeviceInspector for SysfsInspector {
    fn resolve(&self, device: &str) -> Result<PathBuf> {
        fs::canonicalize(device).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SysError::DeviceNotFound(device.to_string()),
            _ => e.into(),
        })
    }

    fn usage(&self, device: &str) -> Result<DeviceUsage> {
        let disk_name = Path::new(device)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| SysError::DeviceNotFound(device.to_string()))?;
        let mounted = self.mounted_sources()?;

        let disk_dir = self.class_block(&disk_name);
        // holders are not checked on device-mapper nodes
        let is_dm = disk_dir.join("dm/name").exists();

        let mut usage = DeviceUsage {
            held: !is_dm && self.has_holders(&disk_dir)?,
            mounted: mounted.contains(device),
            active_partitions: BTreeSet::new(),
        };

        for (number, name, dir) in self.partitions(&disk_name)? {
            if self.has_holders(&dir)? || mounted.contains(&format!("/dev/{name}")) {
                usage.active_partitions.insert(number);
            }
        }

        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_disk(sys: &Path, disk: &str, parts: &[&str]) {
        let disk_dir = sys.join("class/block").join(disk);
        fs::create_dir_all(disk_dir.join("holders")).unwrap();
        for part in parts {
            let part_dir = disk_dir.join(part);
            fs::create_dir_all(part_dir.join("holders")).unwrap();
            fs::write(part_dir.join("partition"), "1\n").unwrap();
        }
    }

    #[test]
    fn nvme_style_names_use_p_separator() {
        assert_eq!(partition_number_prefix("nvme0n1"), "p");
        assert_eq!(partition_number_prefix("vda"), "");
    }

    #[test]
    fn detects_mounted_and_held_partitions() {
        let root = tempfile::tempdir().unwrap();
        let sys = root.path().join("sys");
        fake_disk(&sys, "nvme0n1", &["nvme0n1p1", "nvme0n1p2", "nvme0n1p3"]);
        fs::create_dir_all(sys.join("class/block/nvme0n1/nvme0n1p3/holders/dm-0")).unwrap();
        // queue dir and friends are not partitions
        fs::create_dir_all(sys.join("class/block/nvme0n1/queue")).unwrap();

        let mounts = root.path().join("mounts");
        fs::write(
            &mounts,
            "proc /proc proc rw 0 0\n/dev/nvme0n1p2 /boot ext4 rw 0 0\n",
        )
        .unwrap();

        let inspector = SysfsInspector::new(&sys, &mounts);
        let usage = inspector.usage("/dev/nvme0n1").unwrap();
        assert!(!usage.disk_in_use());
        assert_eq!(usage.active_partitions, BTreeSet::from([2, 3]));
        assert!(!usage.partition_active(1));
    }

    #[test]
    fn whole_disk_holders_mark_disk_in_use() {
        let root = tempfile::tempdir().unwrap();
        let sys = root.path().join("sys");
        fake_disk(&sys, "vdb", &[]);
        fs::create_dir_all(sys.join("class/block/vdb/holders/md127")).unwrap();
        let mounts = root.path().join("mounts");
        fs::write(&mounts, "").unwrap();

        let usage = SysfsInspector::new(&sys, &mounts).usage("/dev/vdb").unwrap();
        assert!(usage.held);
        assert!(usage.disk_in_use());
        assert!(usage.active_partitions.is_empty());
    }
}
