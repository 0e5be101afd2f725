// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem creation
//!
//! Targets are independent of one another, so they run on a worker pool and
//! every failure is reported, not just the first.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use storage_sys::filesystem::{FilesystemInfo, mkfs_command, probe, wipefs};
use storage_types::{Filesystem, FilesystemFormat, canonicalize_filesystem_uuid};
use tracing::{error, info};

use crate::clean::clean_filesystem;
use crate::context::StageContext;
use crate::error::{ProvisionError, Result};
use crate::sync::wait_on_devices;

/// Whether what is on disk already satisfies `fs`
pub fn already_formatted(found: &FilesystemInfo, fs: &Filesystem, format: FilesystemFormat) -> bool {
    found.fs_type == format.as_str()
        && fs.label.as_ref().is_none_or(|label| *label == found.label)
        && fs.uuid.as_ref().is_none_or(|uuid| {
            canonicalize_filesystem_uuid(&found.fs_type, &found.uuid)
                == canonicalize_filesystem_uuid(format.as_str(), uuid)
        })
}

fn create_filesystem(ctx: &StageContext, fs: &Filesystem, format: FilesystemFormat) -> Result<()> {
    let device = ctx.alias(&fs.device);
    let runner = ctx.runner();
    let tools = ctx.tools();

    let found = probe(runner, &tools.blkid, &device)?;
    info!(
        device = %fs.device,
        fs_type = %found.fs_type,
        uuid = %found.uuid,
        label = %found.label,
        "probed filesystem"
    );

    if !fs.wipes_filesystem() {
        if already_formatted(&found, fs, format) {
            info!(device = %fs.device, "filesystem is already correctly formatted, skipping mkfs");
            if !fs.clean_except.is_empty() {
                clean_filesystem(
                    ctx,
                    &device,
                    &found.fs_type,
                    &fs.mount_options,
                    &fs.clean_except,
                )?;
            }
            return Ok(());
        }
        if !found.is_empty() {
            return Err(ProvisionError::BadFilesystem {
                device: fs.device.clone(),
                found_type: found.fs_type,
                found_label: found.label,
                found_uuid: found.uuid,
            });
        }
    }

    wipefs(runner, &tools.wipefs, &device)?;
    info!(device = %fs.device, %format, "creating filesystem");
    runner.run_checked(&mkfs_command(tools, fs, format, &device))?;
    Ok(())
}

/// Create every filesystem that names a format, in parallel
pub fn create_filesystems(ctx: &StageContext, filesystems: &[Filesystem]) -> Result<()> {
    let targets: Vec<(&Filesystem, FilesystemFormat)> = filesystems
        .iter()
        .filter_map(|fs| fs.format.map(|format| (fs, format)))
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    let devices: Vec<String> = targets.iter().map(|(fs, _)| fs.device.clone()).collect();
    wait_on_devices(ctx, &devices, "filesystems")?;

    let pool = ThreadPoolBuilder::new()
        .num_threads(ctx.settings.filesystem_workers())
        .build()
        .map_err(|e| ProvisionError::WorkerPool(e.to_string()))?;

    let errors: Vec<ProvisionError> = pool.install(|| {
        targets
            .par_iter()
            .filter_map(|(fs, format)| {
                create_filesystem(ctx, fs, *format)
                    .inspect_err(|err| error!(device = %fs.device, %err, "filesystem failed"))
                    .err()
            })
            .collect()
    });

    ProvisionError::collect(errors)
}
