// SPDX-License-Identifier: GPL-3.0-only

//! Partition table reconciliation
//!
//! Each configured disk is brought to its desired partition layout by one of
//! two reconcilers, picked by looking at the resolved device node: DASD
//! volumes (`/dev/dasd*`) go through `fdasd`, everything else through
//! `sgdisk`.

pub mod dasd;
pub mod gpt;
pub mod matching;

use storage_types::Disk;
use tracing::info_span;

use crate::context::StageContext;
use crate::error::Result;
use crate::sync::wait_on_devices;

pub use dasd::DasdReconciler;
pub use gpt::GptReconciler;

/// Brings one disk's partition table in line with its config
pub trait PartitionReconciler {
    fn reconcile(&self, ctx: &StageContext, disk: &Disk) -> Result<()>;
}

/// Whether a resolved device node is an s390x DASD
pub fn is_dasd(resolved: &str) -> bool {
    resolved.starts_with("/dev/dasd")
}

/// Pick the reconciler for a resolved device node
pub fn reconciler_for(resolved: &str) -> &'static dyn PartitionReconciler {
    if is_dasd(resolved) {
        &DasdReconciler
    } else {
        &GptReconciler
    }
}

/// Reconcile every disk, one after another
pub fn create_partitions(ctx: &StageContext, disks: &[Disk]) -> Result<()> {
    if disks.is_empty() {
        return Ok(());
    }

    let devices: Vec<String> = disks.iter().map(|disk| disk.device.clone()).collect();
    wait_on_devices(ctx, &devices, "disks")?;

    for disk in disks {
        let resolved = ctx.resolved(&disk.device)?;
        let _span = info_span!("partitioning", device = %disk.device, node = %resolved).entered();
        reconciler_for(&resolved).reconcile(ctx, disk)?;
    }
    Ok(())
}
