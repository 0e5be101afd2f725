// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

/// Wait for the udev event queue to drain
pub fn settle(runner: &dyn CommandRunner, udevadm: &Path) -> Result<()> {
    runner.run_checked(&ToolCommand::new(udevadm).arg("settle"))?;
    Ok(())
}

/// Re-trigger udev for `device` and wait until its events are processed,
/// so partition nodes and by-* links reflect a freshly written table
pub fn trigger_settle(runner: &dyn CommandRunner, udevadm: &Path, device: &str) -> Result<()> {
    runner.run_checked(&ToolCommand::new(udevadm).args(["trigger", "--settle", device]))?;
    Ok(())
}
