// SPDX-License-Identifier: GPL-3.0-only

use storage_sys::logical::create_array;
use storage_types::Raid;
use tracing::info;

use crate::context::StageContext;
use crate::error::Result;
use crate::sync::wait_on_devices;

/// Create every md array, one at a time.
///
/// Members are waited on together first; mdadm is then handed their alias
/// paths so a renamed `/dev/disk/by-*` link cannot redirect it.
pub fn create_raids(ctx: &StageContext, raids: &[Raid]) -> Result<()> {
    if raids.is_empty() {
        return Ok(());
    }

    let members: Vec<String> = raids
        .iter()
        .flat_map(|raid| raid.devices.iter().cloned())
        .collect();
    wait_on_devices(ctx, &members, "raids")?;

    for raid in raids {
        let devices: Vec<String> = raid.devices.iter().map(|device| ctx.alias(device)).collect();
        create_array(ctx.runner(), &ctx.tools().mdadm, raid, &devices)?;
        info!(name = %raid.name, "created md array");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storage_sys::testing::{FakeInspector, ScriptedRunner};

    use super::*;
    use crate::fetch::LocalFetcher;
    use crate::settings::ProvisionSettings;

    #[test]
    fn mdadm_receives_alias_paths() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let settings = ProvisionSettings {
            alias_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let ctx = StageContext::new(
            settings,
            runner.clone(),
            Arc::new(FakeInspector::new()),
            Arc::new(LocalFetcher),
        );
        let raid = Raid {
            name: "md/boot".to_string(),
            level: "raid1".to_string(),
            devices: vec!["/dev/vdb1".to_string(), "/dev/vdc1".to_string()],
            ..Default::default()
        };

        create_raids(&ctx, &[raid]).unwrap();

        let alias_dir = dir.path().display();
        assert_eq!(
            runner.executed(),
            vec![
                "systemctl start dev-vdb1.device dev-vdc1.device".to_string(),
                format!(
                    "mdadm --create md/boot --force --run --homehost any --level raid1 \
                     --raid-devices 2 {alias_dir}/dev/vdb1 {alias_dir}/dev/vdc1"
                ),
            ]
        );
    }
}
