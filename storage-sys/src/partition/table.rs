// SPDX-License-Identifier: GPL-3.0-only

use serde::Deserialize;
use tracing::debug;

use super::{DiskInfo, PartitionInfo};
use crate::command::{CommandRunner, ToolCommand};
use crate::tools::ToolPaths;
use crate::{Result, SysError};

#[derive(Debug, Deserialize)]
struct SfdiskDump {
    partitiontable: SfdiskTable,
}

#[derive(Debug, Deserialize)]
struct SfdiskTable {
    #[serde(default)]
    partitions: Vec<SfdiskPartition>,
}

#[derive(Debug, Deserialize)]
struct SfdiskPartition {
    node: String,
    start: u64,
    size: u64,
    #[serde(rename = "type", default)]
    type_guid: String,
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    name: String,
}

/// Partition number of a device node ("/dev/nvme0n1p3" → 3)
fn node_number(node: &str) -> Option<u32> {
    let digits_at = node
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    node[digits_at..].parse().ok()
}

/// Parse `sfdisk --json` output into partitions
pub fn parse_sfdisk_json(output: &str) -> Result<Vec<PartitionInfo>> {
    let dump: SfdiskDump =
        serde_json::from_str(output).map_err(|e| SysError::BadSfdiskOutput(e.to_string()))?;

    dump.partitiontable
        .partitions
        .into_iter()
        .map(|part| {
            let number = node_number(&part.node).ok_or_else(|| {
                SysError::BadSfdiskOutput(format!("no partition number in {}", part.node))
            })?;
            Ok(PartitionInfo {
                number,
                label: part.name,
                guid: part.uuid,
                type_guid: part.type_guid,
                start_sector: part.start,
                size_in_sectors: part.size,
            })
        })
        .collect()
}

/// Parse `blockdev --getss` output
pub fn parse_sector_size(output: &str) -> Result<u64> {
    output
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| SysError::BadCommandOutput {
            command: "blockdev --getss".to_string(),
            reason: format!("invalid sector size {:?}", output.trim()),
        })
}

/// Read the logical sector size and current partitions of `device`.
///
/// A disk without a recognizable partition table has no partitions.
pub fn read_disk_info(
    runner: &dyn CommandRunner,
    tools: &ToolPaths,
    device: &str,
) -> Result<DiskInfo> {
    let ss = runner.run_checked(&ToolCommand::new(&tools.blockdev).args(["--getss", device]))?;
    let logical_sector_size = parse_sector_size(&ss.stdout)?;

    let dump_cmd = ToolCommand::new(&tools.sfdisk).args(["--json", device]);
    let dump = runner.run(&dump_cmd)?;
    let partitions = if dump.success() {
        parse_sfdisk_json(&dump.stdout)?
    } else if dump.stderr.contains("does not contain a recognized partition table") {
        debug!(device, "no partition table present");
        Vec::new()
    } else {
        return Err(dump.into_failure(&dump_cmd));
    };

    Ok(DiskInfo {
        logical_sector_size,
        partitions,
    })
}
