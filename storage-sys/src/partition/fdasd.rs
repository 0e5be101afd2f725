// SPDX-License-Identifier: GPL-3.0-only

//! DASD (s390x CKD) partitioning with `fdasd` and `dasdfmt`
//!
//! DASD volumes are addressed in tracks and hold at most three partitions.
//! `fdasd` rewrites the whole VTOC at once from a config file, so a commit
//! always carries the complete desired table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::mib_to_bytes;
use crate::command::{CommandRunner, ToolCommand};
use crate::{Result, SysError};

/// Maximum number of partitions on a CDL formatted DASD
pub const MAX_DASD_PARTITIONS: usize = 3;

/// First usable track on a CDL formatted DASD
pub const FIRST_USABLE_TRACK: u64 = 2;

/// Physical layout reported by `fdasd -p`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DasdGeometry {
    pub cylinders: u64,
    pub tracks_per_cylinder: u64,
    pub blocks_per_track: u64,
    pub bytes_per_block: u64,
}

impl DasdGeometry {
    pub fn total_tracks(&self) -> u64 {
        self.cylinders * self.tracks_per_cylinder
    }

    pub fn bytes_per_track(&self) -> u64 {
        self.blocks_per_track * self.bytes_per_block
    }

    /// Convert MiB to tracks, rounding up
    pub fn mib_to_tracks(&self, mib: u64) -> Result<u64> {
        Ok(mib_to_bytes(mib)?.div_ceil(self.bytes_per_track()))
    }
}

/// An existing DASD partition, in tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DasdPartitionInfo {
    pub number: u32,
    pub start_track: u64,
    pub size_in_tracks: u64,
}

/// Parsed `fdasd -p` report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DasdInfo {
    pub geometry: DasdGeometry,
    pub partitions: Vec<DasdPartitionInfo>,
}

impl DasdInfo {
    pub fn partition(&self, number: u32) -> Option<&DasdPartitionInfo> {
        self.partitions.iter().find(|part| part.number == number)
    }
}

/// Parse a geometry line such as `  tracks per cylinder ..: 15`
fn parse_geometry_line(line: &str) -> Option<(String, u64)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim().trim_end_matches('.').trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase() || c == ' ') {
        return None;
    }
    let value = value.split_whitespace().next()?.parse().ok()?;
    Some((key.to_string(), value))
}

/// Parse a partition row: `/dev/dasda1   2   1501   1500   1  Linux native`
fn parse_partition_line(line: &str) -> Option<DasdPartitionInfo> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 || !tokens[0].starts_with('/') {
        return None;
    }
    let start: u64 = tokens[1].parse().ok()?;
    let _end: u64 = tokens[2].parse().ok()?;
    let length: u64 = tokens[3].parse().ok()?;
    let number: u32 = tokens[4].parse().ok()?;
    Some(DasdPartitionInfo {
        number,
        start_track: start,
        size_in_tracks: length,
    })
}

/// Parse the output of `fdasd -p`.
///
/// Missing geometry means the volume has no usable label and must be
/// low-level formatted first.
pub fn parse_fdasd_output(output: &str) -> Result<DasdInfo> {
    let mut cylinders = None;
    let mut tracks_per_cylinder = None;
    let mut blocks_per_track = None;
    let mut bytes_per_block = None;
    let mut partitions = Vec::new();

    for line in output.lines() {
        if let Some(part) = parse_partition_line(line) {
            partitions.push(part);
            continue;
        }
        if let Some((key, value)) = parse_geometry_line(line) {
            match key.as_str() {
                "cylinders" => cylinders = Some(value),
                "tracks per cylinder" => tracks_per_cylinder = Some(value),
                "blocks per track" => blocks_per_track = Some(value),
                "bytes per block" => bytes_per_block = Some(value),
                _ => {}
            }
        }
    }

    let (
        Some(cylinders),
        Some(tracks_per_cylinder),
        Some(blocks_per_track),
        Some(bytes_per_block),
    ) = (cylinders, tracks_per_cylinder, blocks_per_track, bytes_per_block)
    else {
        return Err(SysError::BadFdasdOutput(
            "disk geometry not found; the volume may need formatting".to_string(),
        ));
    };

    if blocks_per_track == 0 || bytes_per_block == 0 {
        return Err(SysError::BadFdasdOutput("zero track size".to_string()));
    }

    Ok(DasdInfo {
        geometry: DasdGeometry {
            cylinders,
            tracks_per_cylinder,
            blocks_per_track,
            bytes_per_block,
        },
        partitions,
    })
}

/// Read geometry and partitions of a DASD
pub fn read_dasd_info(runner: &dyn CommandRunner, fdasd: &Path, device: &str) -> Result<DasdInfo> {
    let output = runner.run_checked(&ToolCommand::new(fdasd).args(["-p", device]))?;
    parse_fdasd_output(&output.stdout)
}

/// One entry of a committed DASD table, in tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdasdEntry {
    pub start: u64,
    pub size: u64,
}

/// Complete DASD partition table to write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdasdPlan {
    pub entries: Vec<FdasdEntry>,
}

impl FdasdPlan {
    /// The config file `fdasd --config` expects: one `[first,last,type]` per line
    pub fn config_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "[{},{},native]\n",
                    entry.start,
                    entry.start + entry.size - 1
                )
            })
            .collect()
    }

    /// Rewrite the table on `device`
    pub fn commit(&self, runner: &dyn CommandRunner, fdasd: &Path, device: &str) -> Result<()> {
        if self.entries.len() > MAX_DASD_PARTITIONS {
            return Err(SysError::TooManyDasdPartitions {
                requested: self.entries.len(),
                max: MAX_DASD_PARTITIONS,
            });
        }
        info!(device, entries = self.entries.len(), "writing DASD partition table");
        runner.run_checked(
            &ToolCommand::new(fdasd)
                .args(["--silent", "--config", "/dev/stdin", device])
                .stdin(self.config_text()),
        )?;
        Ok(())
    }
}

/// Low-level format a DASD with the compatible disk layout
pub fn dasdfmt(runner: &dyn CommandRunner, dasdfmt: &Path, device: &str) -> Result<()> {
    warn!(device, "low-level formatting DASD; all data will be lost");
    runner.run_checked(&ToolCommand::new(dasdfmt).args([
        "--blocksize=4096",
        "--disk_layout=cdl",
        "--mode=full",
        "-yv",
        device,
    ]))?;
    Ok(())
}
