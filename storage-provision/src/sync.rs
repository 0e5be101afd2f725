// SPDX-License-Identifier: GPL-3.0-only

//! Device Synchronizer
//!
//! Blocks until the configured devices exist and pins each one with an alias
//! symlink, so later steps keep addressing the same node even when udev
//! reshuffles `/dev/disk/by-*` links underneath them.

use std::collections::BTreeSet;

use storage_sys::device::start_device_units;
use tracing::info;

use crate::context::StageContext;
use crate::error::Result;

/// Wait for `devices` and create their aliases. `purpose` names the step
/// for logging ("disks", "raids", "luks", "filesystems").
pub fn wait_on_devices(ctx: &StageContext, devices: &[String], purpose: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    let devices: Vec<String> = devices
        .iter()
        .filter(|device| seen.insert(device.as_str()))
        .cloned()
        .collect();
    if devices.is_empty() {
        return Ok(());
    }

    info!(purpose, count = devices.len(), "waiting for devices");
    start_device_units(ctx.runner(), &ctx.tools().systemctl, &devices)?;

    for device in &devices {
        let target = ctx.inspector.resolve(device)?;
        ctx.aliases().create(device, &target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storage_sys::SysError;
    use storage_sys::testing::{FakeInspector, ScriptedRunner};

    use super::*;
    use crate::error::ProvisionError;
    use crate::fetch::LocalFetcher;
    use crate::settings::ProvisionSettings;

    fn context(runner: Arc<ScriptedRunner>, alias_dir: &std::path::Path) -> StageContext {
        let settings = ProvisionSettings {
            alias_dir: alias_dir.to_path_buf(),
            ..Default::default()
        };
        let inspector = FakeInspector::new().with_link("/dev/disk/by-label/data", "/dev/vdb1");
        StageContext::new(settings, runner, Arc::new(inspector), Arc::new(LocalFetcher))
    }

    #[test]
    fn starts_units_once_and_creates_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = context(runner.clone(), dir.path());

        wait_on_devices(
            &ctx,
            &[
                "/dev/disk/by-label/data".to_string(),
                "/dev/vda".to_string(),
                "/dev/vda".to_string(),
            ],
            "filesystems",
        )
        .unwrap();

        assert_eq!(
            runner.executed(),
            vec!["systemctl start dev-disk-by\\x2dlabel-data.device dev-vda.device"]
        );
        assert_eq!(ctx.resolved("/dev/disk/by-label/data").unwrap(), "/dev/vdb1");
        assert_eq!(ctx.resolved("/dev/vda").unwrap(), "/dev/vda");
    }

    #[test]
    fn failed_unit_aborts_before_aliasing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail(
            "systemctl start",
            1,
            "Job for dev-vdz.device failed",
        ));
        let ctx = context(runner, dir.path());

        let err = wait_on_devices(&ctx, &["/dev/vdz".to_string()], "disks").unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Sys(SysError::DeviceUnit { .. })
        ));
        assert!(ctx.resolved("/dev/vdz").is_err());
    }

    #[test]
    fn empty_device_list_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = context(runner.clone(), dir.path());
        wait_on_devices(&ctx, &[], "raids").unwrap();
        assert!(runner.executed().is_empty());
    }
}
