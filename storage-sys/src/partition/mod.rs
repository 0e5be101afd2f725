// SPDX-License-Identifier: GPL-3.0-only

//! Partition table tooling
//!
//! - [`table`]: reading the live GPT (`blockdev`, `sfdisk --json`)
//! - [`sgdisk`]: immutable GPT change plans, dry-run parsing, commit
//! - [`fdasd`]: DASD geometry/partition parsing and table commits
//! - [`partx`]: telling the kernel about changes on busy disks

pub mod fdasd;
pub mod partx;
pub mod sgdisk;
pub mod table;

use serde::{Deserialize, Serialize};

use crate::{Result, SysError};

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Byte count of `mib`, failing instead of wrapping
pub fn mib_to_bytes(mib: u64) -> Result<u64> {
    mib.checked_mul(BYTES_PER_MIB)
        .ok_or(SysError::SizeOverflow(mib))
}

/// An existing GPT partition, in logical sectors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub number: u32,
    pub label: String,
    pub guid: String,
    pub type_guid: String,
    pub start_sector: u64,
    pub size_in_sectors: u64,
}

/// Live state of a disk's partition table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub logical_sector_size: u64,
    pub partitions: Vec<PartitionInfo>,
}

impl DiskInfo {
    pub fn partition(&self, number: u32) -> Option<&PartitionInfo> {
        self.partitions.iter().find(|part| part.number == number)
    }

    /// Convert MiB to logical sectors of this disk
    pub fn mib_to_sectors(&self, mib: u64) -> Result<u64> {
        Ok(mib_to_bytes(mib)? / self.logical_sector_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mib_conversion_depends_on_sector_size() {
        let disk = DiskInfo {
            logical_sector_size: 512,
            partitions: vec![],
        };
        assert_eq!(disk.mib_to_sectors(128).unwrap(), 262144);

        let disk = DiskInfo {
            logical_sector_size: 4096,
            partitions: vec![],
        };
        assert_eq!(disk.mib_to_sectors(128).unwrap(), 32768);
    }

    #[test]
    fn oversized_mib_is_an_error() {
        let disk = DiskInfo {
            logical_sector_size: 512,
            partitions: vec![],
        };
        assert!(matches!(
            disk.mib_to_sectors(u64::MAX / 1024),
            Err(SysError::SizeOverflow(_))
        ));
        assert_eq!(mib_to_bytes(1).unwrap(), 1048576);
    }
}
