mod common;

use common::{Fixture, NO_TABLE};
use storage_provision::{DisksStage, ProvisionError};
use storage_sys::testing::ScriptedRunner;
use storage_types::{Filesystem, FilesystemFormat, Storage};

const FULL: &str = r#"{
    "disks": [{
        "device": "/dev/vdb",
        "partitions": [{"number": 1, "label": "root", "sizeMiB": 128}]
    }],
    "raid": [{
        "name": "md/data",
        "level": "raid1",
        "devices": ["/dev/vdc", "/dev/vdd"]
    }],
    "luks": [{
        "name": "data",
        "device": "/dev/md/data",
        "clevis": {"tpm2": true}
    }],
    "filesystems": [
        {"device": "/dev/mapper/data", "format": "ext4", "label": "data"},
        {"device": "/dev/vdb1", "path": "/var"}
    ]
}"#;

fn position(executed: &[String], prefix: &str) -> usize {
    executed
        .iter()
        .position(|cmd| cmd.starts_with(prefix))
        .unwrap_or_else(|| panic!("{prefix} never ran: {executed:#?}"))
}

fn ext4(device: &str) -> Filesystem {
    Filesystem {
        device: device.to_string(),
        format: Some(FilesystemFormat::Ext4),
        ..Default::default()
    }
}

#[test]
fn steps_run_in_order_with_one_final_settle() {
    let fx = Fixture::new(
        ScriptedRunner::new()
            .respond("blockdev --getss", "512\n")
            .fail("sfdisk --json", 1, NO_TABLE)
            .fail("cryptsetup isLuks", 1, ""),
    );
    let storage: Storage = serde_json::from_str(FULL).unwrap();

    let report = DisksStage::new(fx.ctx.clone()).run(&storage).unwrap();

    let executed = fx.executed_short();
    let partition = position(&executed, "sgdisk --new=1:0:+262144 --change-name");
    let raid = position(&executed, "mdadm --create md/data");
    let luks = position(&executed, "cryptsetup luksFormat");
    let mkfs = position(&executed, "mkfs.ext4");
    assert!(partition < raid && raid < luks && luks < mkfs);

    let settles: Vec<_> = executed
        .iter()
        .filter(|cmd| cmd.as_str() == "udevadm settle")
        .collect();
    assert_eq!(settles.len(), 1);
    assert_eq!(executed.last().unwrap(), "udevadm settle");

    assert!(executed.contains(&"mkfs.ext4 -F -L data @/dev/mapper/data".to_string()));
    // filesystems without a format are not touched
    assert!(!executed.iter().any(|cmd| cmd.contains("@/dev/vdb1")));
    // the generated key was removed once clevis took over
    assert!(report.luks_persist_keys.is_empty());
}

#[test]
fn empty_storage_runs_nothing() {
    let fx = Fixture::new(ScriptedRunner::new());

    let report = DisksStage::new(fx.ctx.clone())
        .run(&Storage::default())
        .unwrap();

    assert!(fx.executed().is_empty());
    assert!(report.luks_persist_keys.is_empty());
}

#[test]
fn foreign_filesystem_is_not_destroyed() {
    let fx = Fixture::new(ScriptedRunner::new().respond("blkid -p", "TYPE=xfs\nUUID=0a1b\n"));
    let storage = Storage {
        filesystems: vec![ext4("/dev/vdb1")],
        ..Default::default()
    };

    let err = DisksStage::new(fx.ctx.clone()).run(&storage).unwrap_err();

    match err {
        ProvisionError::Step { step, source } => {
            assert_eq!(step, "createFilesystems");
            assert!(matches!(*source, ProvisionError::BadFilesystem { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    let executed = fx.executed();
    assert!(!executed.iter().any(|cmd| cmd.starts_with("wipefs")));
    assert!(!executed.iter().any(|cmd| cmd.starts_with("mkfs")));
    assert!(!executed.iter().any(|cmd| cmd == "udevadm settle"));
}

#[test]
fn relabelled_filesystem_is_not_destroyed() {
    let fx = Fixture::new(ScriptedRunner::new().respond("blkid -p", "TYPE=ext4\nLABEL=old\n"));
    let storage = Storage {
        filesystems: vec![Filesystem {
            label: Some("data".to_string()),
            wipe_filesystem: Some(false),
            ..ext4("/dev/vdb1")
        }],
        ..Default::default()
    };

    let err = DisksStage::new(fx.ctx.clone()).run(&storage).unwrap_err();

    let ProvisionError::Step { step, source } = err else {
        panic!("error was not attributed to a step");
    };
    assert_eq!(step, "createFilesystems");
    match *source {
        ProvisionError::BadFilesystem {
            found_type,
            found_label,
            ..
        } => {
            assert_eq!(found_type, "ext4");
            assert_eq!(found_label, "old");
        }
        other => panic!("unexpected error: {other}"),
    }
    let executed = fx.executed();
    assert!(!executed.iter().any(|cmd| cmd.starts_with("wipefs")));
    assert!(!executed.iter().any(|cmd| cmd.starts_with("mkfs")));
}

#[test]
fn every_filesystem_failure_is_reported() {
    let fx = Fixture::new(ScriptedRunner::new().respond("blkid -p", "TYPE=btrfs\n"));
    let storage = Storage {
        filesystems: vec![ext4("/dev/vdb1"), ext4("/dev/vdc1"), ext4("/dev/vdd1")],
        ..Default::default()
    };

    let err = DisksStage::new(fx.ctx.clone()).run(&storage).unwrap_err();

    let ProvisionError::Step { source, .. } = err else {
        panic!("error was not attributed to a step");
    };
    let ProvisionError::Multiple(errors) = *source else {
        panic!("failures were not collected");
    };
    assert_eq!(errors.len(), 3);
}

#[test]
fn failing_step_stops_later_steps() {
    let fx = Fixture::new(ScriptedRunner::new().fail("mdadm --create", 1, "mdadm: device busy"));
    let storage: Storage = serde_json::from_str(
        r#"{
            "raid": [{"name": "md/data", "level": "raid1", "devices": ["/dev/vdc", "/dev/vdd"]}],
            "filesystems": [{"device": "/dev/md/data", "format": "xfs"}]
        }"#,
    )
    .unwrap();

    let err = DisksStage::new(fx.ctx.clone()).run(&storage).unwrap_err();

    assert!(err.to_string().starts_with("createRaids: "), "{err}");
    assert!(err.to_string().contains("mdadm: device busy"), "{err}");
    assert!(!fx.executed().iter().any(|cmd| cmd.starts_with("mkfs")));
}

#[test]
fn reused_filesystem_is_cleaned_and_unmounted() {
    let fx = Fixture::new(
        ScriptedRunner::new().respond("blkid -p", "TYPE=ext4\nLABEL=var\nUUID=0a1b\n"),
    );
    let storage = Storage {
        filesystems: vec![Filesystem {
            label: Some("var".to_string()),
            mount_options: vec!["noatime".to_string()],
            clean_except: vec!["/lib(/.*)?".to_string()],
            ..ext4("/dev/vdb1")
        }],
        ..Default::default()
    };

    DisksStage::new(fx.ctx.clone()).run(&storage).unwrap();

    let executed = fx.executed_short();
    let mount = position(&executed, "mount -t ext4 -o noatime @/dev/vdb1");
    let umount = position(&executed, "umount");
    assert!(mount < umount);
    assert!(!executed.iter().any(|cmd| cmd.starts_with("mkfs")));
    // scratch mount points are removed afterwards
    let leftovers = std::fs::read_dir(fx.scratch().join("run")).unwrap().count();
    assert_eq!(leftovers, 0);
}
