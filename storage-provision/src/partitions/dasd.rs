// SPDX-License-Identifier: GPL-3.0-only

//! DASD reconciliation
//!
//! `fdasd` has no dry run and always rewrites the whole table, so the layout
//! is resolved here: gaps and trailing entries are carried over from the
//! existing table, unset starts follow the previous partition and unset sizes
//! grow to the next partition or the end of the volume. Everything is in
//! tracks.

use std::collections::BTreeSet;

use storage_sys::device::udev::trigger_settle;
use storage_sys::partition::fdasd::{
    DasdInfo, FIRST_USABLE_TRACK, FdasdEntry, FdasdPlan, MAX_DASD_PARTITIONS, dasdfmt,
    read_dasd_info,
};
use storage_types::{Disk, Partition};
use tracing::{debug, info, warn};

use super::PartitionReconciler;
use super::matching::{ExistingPartition, PartitionAction, TargetPartition, decide};
use crate::context::StageContext;
use crate::error::{ProvisionError, Result};

/// s390x DASD volumes, edited with fdasd
#[derive(Debug, Default, Clone, Copy)]
pub struct DasdReconciler;

fn check_fields(device: &str, part: &Partition) -> Result<()> {
    let invalid = |field| ProvisionError::DasdInvalidField {
        device: device.to_string(),
        number: part.number,
        field,
    };
    if part.label.is_some() {
        return Err(invalid("label"));
    }
    if part.guid.is_some() {
        return Err(invalid("guid"));
    }
    if part.type_guid.is_some() {
        return Err(invalid("typeGuid"));
    }
    if part.number == 0 || part.number as usize > MAX_DASD_PARTITIONS {
        return Err(ProvisionError::DasdLayout {
            device: device.to_string(),
            reason: format!(
                "partition number {} is outside 1..={MAX_DASD_PARTITIONS}",
                part.number
            ),
        });
    }
    Ok(())
}

fn carried_over(info: &DasdInfo, number: u32) -> Option<TargetPartition> {
    let existing = info.partition(number)?;
    Some(TargetPartition {
        number,
        start: Some(existing.start_track),
        size: Some(existing.size_in_tracks),
        should_exist: true,
        ..Default::default()
    })
}

fn from_config(info: &DasdInfo, part: &Partition) -> Result<TargetPartition> {
    let geometry = info.geometry;
    let mut target = TargetPartition::from_spec(part, |mib| geometry.mib_to_tracks(mib))?;
    if let Some(existing) = info.partition(part.number)
        && !target.wipe_entry
    {
        target.start = target.start.or(Some(existing.start_track));
        target.size = target.size.or(Some(existing.size_in_tracks));
    }
    Ok(target)
}

/// Merge the config with the existing table and fill in unset start/size.
///
/// `partitions` must be sorted by number.
pub fn resolve_layout(
    device: &str,
    info: &DasdInfo,
    partitions: &[Partition],
) -> Result<Vec<TargetPartition>> {
    let layout_error = |reason: String| ProvisionError::DasdLayout {
        device: device.to_string(),
        reason,
    };

    let mut merged = Vec::new();
    let mut last = 0;
    for part in partitions {
        for gap in last + 1..part.number {
            let carried = carried_over(info, gap).ok_or_else(|| {
                layout_error(format!(
                    "can't find existing partition {gap}; ensure there are no gaps in partition numbering"
                ))
            })?;
            merged.push(carried);
        }
        merged.push(from_config(info, part)?);
        last = part.number;
    }
    merged.extend(
        info.partitions
            .iter()
            .filter(|existing| existing.number > last)
            .filter_map(|existing| carried_over(info, existing.number)),
    );

    let total_tracks = info.geometry.total_tracks();
    let mut next_track = FIRST_USABLE_TRACK;
    for index in 0..merged.len() {
        let next_start = merged
            .get(index + 1)
            .filter(|next| next.should_exist)
            .map(|next| next.start.filter(|start| *start > 0));

        let target = &mut merged[index];
        let start = match target.start {
            Some(start) if start > 0 => start,
            _ => next_track,
        };
        target.start = Some(start);

        if target.size.is_none_or(|size| size == 0) {
            let end = match next_start {
                Some(Some(next)) => Some(next),
                Some(None) => None,
                None => Some(total_tracks),
            };
            target.size = end.map(|end| end.saturating_sub(start));
        }

        if target.should_exist {
            let size = target.size.filter(|size| *size > 0).ok_or_else(|| {
                layout_error(format!(
                    "no space left for partition {}",
                    target.number
                ))
            })?;
            next_track = start.checked_add(size).ok_or_else(|| {
                layout_error(format!("partition {} overflows the volume", target.number))
            })?;
            if next_track > total_tracks {
                return Err(layout_error(format!(
                    "partition {} ends at track {next_track}, past the end of the volume ({total_tracks})",
                    target.number
                )));
            }
        }
    }
    Ok(merged)
}

fn existing(info: &DasdInfo, number: u32) -> Option<ExistingPartition> {
    info.partition(number).map(|part| ExistingPartition {
        number,
        start: part.start_track,
        size: part.size_in_tracks,
        ..Default::default()
    })
}

/// Decide every entry and build the complete table to write
pub fn plan_table(device: &str, info: &DasdInfo, targets: &[TargetPartition]) -> Result<FdasdPlan> {
    let mut plan = FdasdPlan::default();
    for target in targets {
        // resizing is meaningless when every entry is rewritten
        let target = TargetPartition {
            resize: false,
            ..target.clone()
        };
        let current = existing(info, target.number);
        let action = decide(current.as_ref(), &target)
            .map_err(|reason| ProvisionError::conflict(device, target.number, reason))?;

        match action {
            PartitionAction::Delete => {
                info!(number = target.number, "partition should not exist, leaving it out");
                continue;
            }
            PartitionAction::Keep if current.is_none() => continue,
            PartitionAction::Keep => {
                info!(number = target.number, "partition found, will be rewritten unchanged");
            }
            PartitionAction::Recreate => {
                info!(
                    number = target.number,
                    "partition did not match the config, wiping entry and recreating"
                );
            }
            PartitionAction::Create | PartitionAction::Resize => {}
        }

        // resolve_layout fills in every entry that should exist
        let (Some(start), Some(size)) = (target.start, target.size) else {
            continue;
        };
        plan.entries.push(FdasdEntry { start, size });
    }

    if plan.entries.len() > MAX_DASD_PARTITIONS {
        return Err(ProvisionError::DasdLayout {
            device: device.to_string(),
            reason: format!(
                "{} partitions resolved, at most {MAX_DASD_PARTITIONS} fit",
                plan.entries.len()
            ),
        });
    }
    Ok(plan)
}

fn unchanged(info: &DasdInfo, plan: &FdasdPlan) -> bool {
    info.partitions.len() == plan.entries.len()
        && info
            .partitions
            .iter()
            .zip(&plan.entries)
            .all(|(part, entry)| part.start_track == entry.start && part.size_in_tracks == entry.size)
}

impl PartitionReconciler for DasdReconciler {
    fn reconcile(&self, ctx: &StageContext, disk: &Disk) -> Result<()> {
        let device = ctx.alias(&disk.device);
        let runner = ctx.runner();
        let tools = ctx.tools();

        if disk.wipes_table() {
            info!(device = %disk.device, "wiping partition table");
            dasdfmt(runner, &tools.dasdfmt, &device)?;
        } else {
            info!(device = %disk.device, "adding partitions will not preserve existing ones");
        }

        let mut partitions = disk.partitions.clone();
        partitions.sort_by_key(|part| part.number);
        for part in &partitions {
            check_fields(&disk.device, part)?;
        }

        let info = read_dasd_info(runner, &tools.fdasd, &device)?;
        let targets = resolve_layout(&disk.device, &info, &partitions)?;
        let plan = plan_table(&disk.device, &info, &targets)?;

        if unchanged(&info, &plan) {
            debug!(device = %disk.device, "DASD table already matches");
            return Ok(());
        }

        // entries are positional, so anything left out is renumbered or lost
        let kept: BTreeSet<u32> = targets
            .iter()
            .filter(|target| target.should_exist)
            .map(|target| target.number)
            .collect();
        let dropped: Vec<u32> = info
            .partitions
            .iter()
            .map(|part| part.number)
            .filter(|number| !kept.contains(number))
            .collect();
        if !dropped.is_empty() {
            warn!(device = %disk.device, ?dropped, "existing partitions will be destroyed");
        }

        plan.commit(runner, &tools.fdasd, &device)?;
        trigger_settle(runner, &tools.udevadm, &device)?;
        Ok(())
    }
}
