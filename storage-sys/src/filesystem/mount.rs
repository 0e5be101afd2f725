// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

pub fn mount(
    runner: &dyn CommandRunner,
    mount: &Path,
    fs_type: &str,
    options: &[String],
    device: &str,
    target: &Path,
) -> Result<()> {
    let mut cmd = ToolCommand::new(mount).args(["-t", fs_type]);
    if !options.is_empty() {
        cmd = cmd.args(["-o".to_string(), options.join(",")]);
    }
    runner.run_checked(&cmd.args([device.to_string(), target.display().to_string()]))?;
    Ok(())
}

pub fn umount(runner: &dyn CommandRunner, umount: &Path, target: &Path) -> Result<()> {
    runner.run_checked(&ToolCommand::new(umount).arg(target.display().to_string()))?;
    Ok(())
}
