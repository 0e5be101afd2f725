// SPDX-License-Identifier: GPL-3.0-only

//! GPT changes through `sgdisk`
//!
//! A [`SgdiskPlan`] is built once from the reconciler's decisions and rendered
//! into a single `sgdisk` invocation. The same plan can be dry-run with
//! `--pretend` to learn where sgdisk would place partitions whose start or
//! size was left for it to choose.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::command::{CommandRunner, ToolCommand};
use crate::{Result, SysError};

const FIRST_SECTOR: &str = "First sector: ";
const LAST_SECTOR: &str = "Last sector: ";

/// A partition to create, in logical sectors.
///
/// `None` start or size lets sgdisk pick (first free aligned sector, or the
/// largest remaining space).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPartition {
    pub number: u32,
    pub start: Option<u64>,
    pub size: Option<u64>,
    pub label: Option<String>,
    pub type_guid: Option<String>,
    pub guid: Option<String>,
}

/// Placement reported by `sgdisk --info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    pub start: u64,
    pub size: u64,
}

/// One `sgdisk` invocation: zap, deletions, creations, infos, in that order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SgdiskPlan {
    pub zap_all: bool,
    pub deletions: Vec<u32>,
    pub creations: Vec<NewPartition>,
    pub infos: Vec<u32>,
}

impl SgdiskPlan {
    /// True if committing would not change anything
    pub fn is_empty(&self) -> bool {
        !self.zap_all && self.deletions.is_empty() && self.creations.is_empty()
    }

    /// Arguments for sgdisk, device last
    pub fn args(&self, device: &str, pretend: bool) -> Vec<String> {
        let mut args = Vec::new();
        if self.zap_all {
            args.push("--zap-all".to_string());
        }
        for number in &self.deletions {
            args.push(format!("--delete={number}"));
        }
        for part in &self.creations {
            let start = part.start.map_or_else(|| "0".to_string(), |s| s.to_string());
            let size = part.size.map_or_else(|| "0".to_string(), |s| s.to_string());
            args.push(format!("--new={}:{start}:+{size}", part.number));
            if let Some(label) = &part.label {
                args.push(format!("--change-name={}:{label}", part.number));
            }
            if let Some(type_guid) = part.type_guid.as_deref().filter(|g| !g.is_empty()) {
                args.push(format!("--typecode={}:{type_guid}", part.number));
            }
            if let Some(guid) = part.guid.as_deref().filter(|g| !g.is_empty()) {
                args.push(format!("--partition-guid={}:{guid}", part.number));
            }
        }
        for number in &self.infos {
            args.push(format!("--info={number}"));
        }
        if pretend {
            args.push("--pretend".to_string());
        }
        args.push(device.to_string());
        args
    }

    pub fn command(&self, sgdisk: &Path, device: &str, pretend: bool) -> ToolCommand {
        ToolCommand::new(sgdisk).args(self.args(device, pretend))
    }

    /// Dry-run the plan and report the placement of every partition in `infos`
    pub fn pretend(
        &self,
        runner: &dyn CommandRunner,
        sgdisk: &Path,
        device: &str,
    ) -> Result<BTreeMap<u32, SectorRange>> {
        let output = runner.run_checked(&self.command(sgdisk, device, true))?;
        parse_pretend_output(&output.stdout, &self.infos)
    }

    /// Apply the plan to the disk
    pub fn commit(&self, runner: &dyn CommandRunner, sgdisk: &Path, device: &str) -> Result<()> {
        info!(
            device,
            deletions = self.deletions.len(),
            creations = self.creations.len(),
            "writing partition table changes"
        );
        runner.run_checked(&self.command(sgdisk, device, false))?;
        Ok(())
    }
}

/// Zap the GPT and MBR structures on `device`
pub fn zap_all(runner: &dyn CommandRunner, sgdisk: &Path, device: &str) -> Result<()> {
    SgdiskPlan {
        zap_all: true,
        ..Default::default()
    }
    .commit(runner, sgdisk, device)
}

enum ParseState {
    AwaitingFirst,
    AwaitingLast { start: u64 },
    Done,
}

/// Sector from a line shaped like `First sector: 2048 (at 1024.0 KiB)`
fn sector(prefix: &str, line: &str) -> Result<Option<u64>> {
    let Some(rest) = line.strip_prefix(prefix) else {
        return Ok(None);
    };
    let Some((digits, annotation)) = rest.split_once(' ') else {
        return Ok(None);
    };
    if !(annotation.starts_with('(') && annotation.ends_with(')')) {
        return Ok(None);
    }
    digits
        .parse()
        .map(Some)
        .map_err(|_| SysError::BadSgdiskOutput)
}

/// Extract `--info` placements from a pretend transcript.
///
/// Results are assigned to `numbers` in issue order. Input that ends before
/// every number was seen, or that reports sectors after the last expected
/// one, is rejected.
pub fn parse_pretend_output(output: &str, numbers: &[u32]) -> Result<BTreeMap<u32, SectorRange>> {
    let mut ranges = BTreeMap::new();
    if numbers.is_empty() {
        return Ok(ranges);
    }

    let mut state = ParseState::AwaitingFirst;
    let mut pending = numbers.iter();
    let mut current = pending.next().copied();

    for line in output.lines() {
        let line = line.trim_end();
        state = match state {
            ParseState::AwaitingFirst => match sector(FIRST_SECTOR, line)? {
                Some(start) => ParseState::AwaitingLast { start },
                None => ParseState::AwaitingFirst,
            },
            ParseState::AwaitingLast { .. } if sector(FIRST_SECTOR, line)?.is_some() => {
                return Err(SysError::BadSgdiskOutput);
            }
            ParseState::AwaitingLast { start } => match sector(LAST_SECTOR, line)? {
                Some(end) => {
                    let number = current.ok_or(SysError::BadSgdiskOutput)?;
                    let size = (end + 1)
                        .checked_sub(start)
                        .ok_or(SysError::BadSgdiskOutput)?;
                    ranges.insert(number, SectorRange { start, size });
                    current = pending.next().copied();
                    if current.is_some() {
                        ParseState::AwaitingFirst
                    } else {
                        ParseState::Done
                    }
                }
                None => ParseState::AwaitingLast { start },
            },
            ParseState::Done => {
                if sector(FIRST_SECTOR, line)?.is_some() || sector(LAST_SECTOR, line)?.is_some() {
                    return Err(SysError::BadSgdiskOutput);
                }
                ParseState::Done
            }
        };
    }

    match state {
        ParseState::Done => Ok(ranges),
        _ => Err(SysError::BadSgdiskOutput),
    }
}
