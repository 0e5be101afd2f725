// SPDX-License-Identifier: GPL-3.0-only

use storage_sys::device::udev::trigger_settle;
use storage_sys::partition::partx::{PartxAction, partx};
use storage_sys::partition::sgdisk::{NewPartition, SgdiskPlan, zap_all};
use storage_sys::partition::table::read_disk_info;
use storage_sys::partition::{DiskInfo, PartitionInfo};
use storage_types::{Disk, Partition, sort_auto_numbered_last};
use tracing::{debug, info, warn};

use super::PartitionReconciler;
use super::matching::{ExistingPartition, PartitionAction, TargetPartition, decide};
use crate::context::StageContext;
use crate::error::{ProvisionError, Result};

/// GPT disks, edited with sgdisk
#[derive(Debug, Default, Clone, Copy)]
pub struct GptReconciler;

fn existing(info: &PartitionInfo) -> ExistingPartition {
    ExistingPartition {
        number: info.number,
        label: info.label.clone(),
        guid: info.guid.clone(),
        type_guid: info.type_guid.clone(),
        start: info.start_sector,
        size: info.size_in_sectors,
    }
}

fn new_partition(target: &TargetPartition) -> NewPartition {
    NewPartition {
        number: target.number,
        start: target.start,
        size: target.size,
        label: target.label.clone(),
        type_guid: target.type_guid.clone(),
        guid: target.guid.clone(),
    }
}

/// Explicit zero start/size asks sgdisk to choose; those need a dry run
fn should_be_inspected(target: &TargetPartition) -> bool {
    target.number != 0 && (target.start == Some(0) || target.size == Some(0))
}

/// Convert the config to sectors and learn the real placement of partitions
/// whose start or size is left to sgdisk.
///
/// The dry run simulates deleting every configured partition that exists and
/// recreating those that should exist, with unset start/size defaulting to
/// the existing entry unless the entry is to be wiped.
fn resolve_start_and_size(
    ctx: &StageContext,
    device: &str,
    disk: &DiskInfo,
    partitions: &[Partition],
) -> Result<Vec<TargetPartition>> {
    let mut targets: Vec<TargetPartition> = partitions
        .iter()
        .map(|part| TargetPartition::from_spec(part, |mib| disk.mib_to_sectors(mib)))
        .collect::<storage_sys::Result<_>>()?;

    let mut simulation = SgdiskPlan::default();
    for target in &targets {
        let mut creation = new_partition(target);
        if let Some(info) = disk.partition(target.number) {
            simulation.deletions.push(target.number);
            if !target.wipe_entry {
                creation.start = creation.start.or(Some(info.start_sector));
                creation.size = creation.size.or(Some(info.size_in_sectors));
            }
        }
        if target.should_exist {
            // labels may contain characters that upset the dry run
            creation.label = None;
            simulation.creations.push(creation);
        }
    }
    simulation.infos = targets
        .iter()
        .filter(|target| should_be_inspected(target))
        .map(|target| target.number)
        .collect();

    let placements = simulation.pretend(ctx.runner(), &ctx.tools().sgdisk, device)?;

    for target in &mut targets {
        if let Some(range) = placements.get(&target.number) {
            if target.start.is_some() {
                target.start = Some(range.start);
            }
            if target.size.is_some() {
                target.size = Some(range.size);
            }
        }
    }
    Ok(targets)
}

#[derive(Default)]
struct KernelUpdates {
    delete: Vec<u32>,
    update: Vec<u32>,
    add: Vec<u32>,
}

impl PartitionReconciler for GptReconciler {
    fn reconcile(&self, ctx: &StageContext, disk: &Disk) -> Result<()> {
        let device = ctx.alias(&disk.device);
        let resolved = ctx.resolved(&disk.device)?;
        let runner = ctx.runner();
        let tools = ctx.tools();

        let usage = ctx.inspector.usage(&resolved)?;
        if usage.disk_in_use() && usage.active_partitions.is_empty() {
            return Err(ProvisionError::ActiveDevice(format!(
                "refusing to operate on directly active disk {}",
                disk.device
            )));
        }

        let mut modified = false;
        if disk.wipes_table() {
            info!(device = %disk.device, "wiping partition table");
            if !usage.active_partitions.is_empty() {
                return Err(ProvisionError::ActiveDevice(format!(
                    "refusing to wipe active disk {}",
                    disk.device
                )));
            }
            // a corrupted table makes the first zap report failure
            if let Err(err) = zap_all(runner, &tools.sgdisk, &device) {
                warn!(%err, "potential error encountered while wiping table, retrying");
                zap_all(runner, &tools.sgdisk, &device)?;
            }
            modified = true;
        }

        let mut partitions = disk.partitions.clone();
        sort_auto_numbered_last(&mut partitions);

        let table = read_disk_info(runner, tools, &device)?;
        let targets = resolve_start_and_size(ctx, &device, &table, &partitions)?;

        let mut plan = SgdiskPlan::default();
        let mut kernel = KernelUpdates::default();

        for target in &targets {
            let current = table.partition(target.number).map(existing);
            let action = decide(current.as_ref(), target)
                .map_err(|reason| ProvisionError::conflict(&disk.device, target.number, reason))?;

            match action {
                PartitionAction::Keep => {
                    info!(number = target.number, "partition already matches");
                }
                PartitionAction::Create => {
                    plan.creations.push(new_partition(target));
                    kernel.add.push(target.number);
                }
                PartitionAction::Delete => {
                    plan.deletions.push(target.number);
                    kernel.delete.push(target.number);
                }
                PartitionAction::Resize => {
                    info!(number = target.number, "resizing partition");
                    // decide only resizes existing partitions
                    let Some(current) = current.as_ref() else {
                        continue;
                    };
                    plan.deletions.push(target.number);
                    plan.creations.push(NewPartition {
                        number: current.number,
                        start: Some(current.start),
                        size: target.size,
                        label: Some(current.label.clone()),
                        type_guid: Some(current.type_guid.clone()),
                        guid: Some(current.guid.clone()),
                    });
                    kernel.update.push(target.number);
                }
                PartitionAction::Recreate => {
                    info!(
                        number = target.number,
                        "partition did not match the config, wiping entry and recreating"
                    );
                    plan.deletions.push(target.number);
                    plan.creations.push(new_partition(target));
                    kernel.update.push(target.number);
                }
            }

            if action.modifies() && usage.partition_active(target.number) {
                return Err(ProvisionError::ActiveDevice(format!(
                    "refusing to modify active partition {} on {}",
                    target.number, disk.device
                )));
            }
        }

        if !plan.is_empty() {
            plan.commit(runner, &tools.sgdisk, &device)?;
            modified = true;

            // sgdisk only issues BLKRRPART, which the kernel refuses while
            // any partition of the disk is in use
            if !usage.active_partitions.is_empty() {
                for (action, numbers) in [
                    (PartxAction::Delete, &kernel.delete),
                    (PartxAction::Update, &kernel.update),
                    (PartxAction::Add, &kernel.add),
                ] {
                    for number in numbers.iter().filter(|number| **number != 0) {
                        partx(runner, &tools.partx, action, *number, &resolved)?;
                    }
                }
            }
        } else {
            debug!(device = %disk.device, "partition table already matches");
        }

        if modified {
            // wait for partition nodes to be recreated before later steps
            trigger_settle(runner, &tools.udevadm, &device)?;
        }
        Ok(())
    }
}
