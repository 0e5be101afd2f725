// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use storage_types::Raid;
use tracing::info;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

/// `mdadm --create` arguments for `raid`, with members given as `devices`
pub fn create_args(raid: &Raid, devices: &[String]) -> Vec<String> {
    let mut args = vec![
        "--create".to_string(),
        raid.name.clone(),
        "--force".to_string(),
        "--run".to_string(),
        "--homehost".to_string(),
        "any".to_string(),
        "--level".to_string(),
        raid.level.clone(),
        "--raid-devices".to_string(),
        raid.active_device_count().to_string(),
    ];

    if raid.spare_count() > 0 {
        args.push("--spare-devices".to_string());
        args.push(raid.spare_count().to_string());
    }

    args.extend(raid.options.iter().cloned());
    args.extend(devices.iter().cloned());
    args
}

/// Create and start a new array
pub fn create_array(
    runner: &dyn CommandRunner,
    mdadm: &Path,
    raid: &Raid,
    devices: &[String],
) -> Result<()> {
    info!(name = %raid.name, level = %raid.level, members = devices.len(), "creating md array");
    runner.run_checked(&ToolCommand::new(mdadm).args(create_args(raid, devices)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_create_args_with_spares_and_options() {
        let raid = Raid {
            name: "md/data".to_string(),
            level: "raid5".to_string(),
            devices: vec![],
            spares: Some(1),
            options: vec!["--chunk=256".to_string()],
        };
        let members = vec![
            "/run/a/dev/vdb".to_string(),
            "/run/a/dev/vdc".to_string(),
            "/run/a/dev/vdd".to_string(),
            "/run/a/dev/vde".to_string(),
        ];
        let raid = Raid {
            devices: members.clone(),
            ..raid
        };

        assert_eq!(
            create_args(&raid, &members).join(" "),
            "--create md/data --force --run --homehost any --level raid5 --raid-devices 3 \
             --spare-devices 1 --chunk=256 /run/a/dev/vdb /run/a/dev/vdc /run/a/dev/vdd /run/a/dev/vde"
        );
    }

    #[test]
    fn omits_spares_when_none() {
        let raid = Raid {
            name: "md/boot".to_string(),
            level: "raid1".to_string(),
            devices: vec!["/dev/vdb1".to_string(), "/dev/vdc1".to_string()],
            spares: None,
            options: vec![],
        };
        let args = create_args(&raid, &raid.devices);
        assert!(!args.contains(&"--spare-devices".to_string()));
        assert_eq!(args[9], "2");
    }
}
