// SPDX-License-Identifier: GPL-3.0-only

//! Desired disks and partitions
//!
//! Sizes and offsets are expressed in MiB here; the partition reconcilers
//! convert them into the unit system of the target device (logical sectors for
//! GPT, tracks for DASD).

use serde::{Deserialize, Serialize};

/// A disk whose partition table should match `partitions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Device path (e.g., "/dev/vda" or "/dev/disk/by-id/...")
    pub device: String,

    /// Zap the whole partition table before reconciling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_table: Option<bool>,

    /// Desired partitions
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

impl Disk {
    /// Whether the table should be wiped first (`None` means no)
    pub fn wipes_table(&self) -> bool {
        self.wipe_table == Some(true)
    }
}

/// Desired state of a single partition
///
/// `number == 0` asks for the next free slot. Every other `None` field means
/// "don't care": an existing value is preserved and never compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Partition number (1-based, 0 = next free)
    #[serde(default)]
    pub number: u32,

    /// GPT partition name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Unique partition GUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,

    /// Partition type GUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_guid: Option<String>,

    /// Start offset in MiB (0 = first free aligned position)
    #[serde(
        default,
        rename = "startMiB",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_mib: Option<u64>,

    /// Size in MiB (0 = all remaining space)
    #[serde(default, rename = "sizeMiB", skip_serializing_if = "Option::is_none")]
    pub size_mib: Option<u64>,

    /// Whether the partition should exist (`None` means yes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_exist: Option<bool>,

    /// Allow deleting/recreating an existing entry that doesn't match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_partition_entry: Option<bool>,

    /// Allow growing/shrinking an otherwise matching partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<bool>,
}

impl Partition {
    /// `shouldExist`, with unspecified treated as true
    pub fn should_exist(&self) -> bool {
        self.should_exist != Some(false)
    }

    /// `wipePartitionEntry`, with unspecified treated as false
    pub fn wipes_entry(&self) -> bool {
        self.wipe_partition_entry == Some(true)
    }

    /// `resize`, with unspecified treated as false
    pub fn resizes(&self) -> bool {
        self.resize == Some(true)
    }

    /// Whether the partition asks for the next free slot
    pub fn is_auto_numbered(&self) -> bool {
        self.number == 0
    }
}

/// Stable sort that moves auto-numbered (`number == 0`) partitions last.
///
/// Explicitly numbered entries keep their relative order, as do the
/// auto-numbered ones, so sgdisk assigns slots in config order.
pub fn sort_auto_numbered_last(partitions: &mut [Partition]) {
    partitions.sort_by_key(Partition::is_auto_numbered);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(number: u32, label: &str) -> Partition {
        Partition {
            number,
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn auto_numbered_partitions_sort_last_and_stay_stable() {
        let mut parts = vec![
            numbered(0, "a"),
            numbered(3, "b"),
            numbered(0, "c"),
            numbered(1, "d"),
            numbered(2, "e"),
        ];

        sort_auto_numbered_last(&mut parts);

        let labels: Vec<_> = parts
            .iter()
            .map(|part| part.label.as_deref().unwrap())
            .collect();
        assert_eq!(labels, vec!["b", "d", "e", "a", "c"]);
    }

    #[test]
    fn optional_flags_use_documented_defaults() {
        let part = Partition::default();
        assert!(part.should_exist());
        assert!(!part.wipes_entry());
        assert!(!part.resizes());

        let part = Partition {
            should_exist: Some(false),
            wipe_partition_entry: Some(true),
            resize: Some(true),
            ..Default::default()
        };
        assert!(!part.should_exist());
        assert!(part.wipes_entry());
        assert!(part.resizes());
    }

    #[test]
    fn mib_fields_use_ignition_names() {
        let part: Partition =
            serde_json::from_str(r#"{"number": 2, "startMiB": 1, "sizeMiB": 128}"#).unwrap();
        assert_eq!(part.start_mib, Some(1));
        assert_eq!(part.size_mib, Some(128));

        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"startMiB\":1"));
        assert!(!json.contains("label"));
    }
}
