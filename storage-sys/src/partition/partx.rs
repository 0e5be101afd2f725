// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

/// Kernel partition table update performed by `partx`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartxAction {
    Delete,
    Update,
    Add,
}

impl PartxAction {
    fn flag(self) -> &'static str {
        match self {
            Self::Delete => "--delete",
            Self::Update => "--update",
            Self::Add => "--add",
        }
    }
}

pub fn partx_command(partx: &Path, action: PartxAction, number: u32, device: &str) -> ToolCommand {
    ToolCommand::new(partx).args([
        action.flag().to_string(),
        "--nr".to_string(),
        number.to_string(),
        device.to_string(),
    ])
}

/// Tell the kernel about a single changed partition.
///
/// Needed on disks with partitions in use, where the BLKRRPART ioctl that
/// sgdisk issues is refused.
pub fn partx(
    runner: &dyn CommandRunner,
    partx: &Path,
    action: PartxAction,
    number: u32,
    device: &str,
) -> Result<()> {
    runner.run_checked(&partx_command(partx, action, number, device))?;
    Ok(())
}
