// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use storage_types::{Filesystem, FilesystemFormat, canonicalize_filesystem_uuid};

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};
use crate::tools::ToolPaths;

/// Build the mkfs invocation for `fs` on `device`.
///
/// User options come first, then the force, UUID and label flags of the
/// format's tool, then the device.
pub fn mkfs_command(
    tools: &ToolPaths,
    fs: &Filesystem,
    format: FilesystemFormat,
    device: &str,
) -> ToolCommand {
    let uuid = fs
        .uuid
        .as_deref()
        .map(|uuid| canonicalize_filesystem_uuid(format.as_str(), uuid));
    let label = fs.label.clone();

    let (program, force, uuid_args, label_flag): (&Path, Option<&str>, Vec<String>, &str) =
        match format {
            FilesystemFormat::Btrfs => (
                tools.mkfs_btrfs.as_path(),
                Some("--force"),
                uuid.map(|u| vec!["-U".to_string(), u]).unwrap_or_default(),
                "-L",
            ),
            FilesystemFormat::Ext4 => (
                tools.mkfs_ext4.as_path(),
                Some("-F"),
                uuid.map(|u| vec!["-U".to_string(), u]).unwrap_or_default(),
                "-L",
            ),
            FilesystemFormat::Xfs => (
                tools.mkfs_xfs.as_path(),
                Some("-f"),
                uuid.map(|u| vec!["-m".to_string(), format!("uuid={u}")])
                    .unwrap_or_default(),
                "-L",
            ),
            FilesystemFormat::Swap => (
                tools.mkswap.as_path(),
                Some("-f"),
                uuid.map(|u| vec!["-U".to_string(), u]).unwrap_or_default(),
                "-L",
            ),
            // mkfs.fat has no force flag; it always overwrites
            FilesystemFormat::Vfat => (
                tools.mkfs_fat.as_path(),
                None,
                uuid.map(|u| vec!["-i".to_string(), u]).unwrap_or_default(),
                "-n",
            ),
        };

    let mut cmd = ToolCommand::new(program).args(fs.options.iter().cloned());
    if let Some(force) = force {
        cmd = cmd.arg(force);
    }
    cmd = cmd.args(uuid_args);
    if let Some(label) = label {
        cmd = cmd.args([label_flag.to_string(), label]);
    }
    cmd.arg(device)
}

/// Erase every signature on `device`
pub fn wipefs(runner: &dyn CommandRunner, wipefs: &Path, device: &str) -> Result<()> {
    runner.run_checked(&ToolCommand::new(wipefs).args(["-a", device]))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(uuid: Option<&str>, label: Option<&str>) -> Filesystem {
        Filesystem {
            device: "/dev/vda4".to_string(),
            uuid: uuid.map(str::to_string),
            label: label.map(str::to_string),
            options: vec!["-b".to_string(), "4096".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn flag_table_per_format() {
        let tools = ToolPaths::default();
        let spec = fs(Some("AAAA-BBBB"), Some("data"));
        let render = |format| mkfs_command(&tools, &spec, format, "/dev/vda4").render();

        assert_eq!(
            render(FilesystemFormat::Btrfs),
            "mkfs.btrfs -b 4096 --force -U aaaa-bbbb -L data /dev/vda4"
        );
        assert_eq!(
            render(FilesystemFormat::Ext4),
            "mkfs.ext4 -b 4096 -F -U aaaa-bbbb -L data /dev/vda4"
        );
        assert_eq!(
            render(FilesystemFormat::Xfs),
            "mkfs.xfs -b 4096 -f -m uuid=aaaa-bbbb -L data /dev/vda4"
        );
        assert_eq!(
            render(FilesystemFormat::Swap),
            "mkswap -b 4096 -f -U aaaa-bbbb -L data /dev/vda4"
        );
        assert_eq!(
            render(FilesystemFormat::Vfat),
            "mkfs.fat -b 4096 -i aaaabbbb -n data /dev/vda4"
        );
    }

    #[test]
    fn unset_uuid_and_label_add_no_flags() {
        let tools = ToolPaths::default();
        let cmd = mkfs_command(&tools, &fs(None, None), FilesystemFormat::Ext4, "/dev/vdb");
        assert_eq!(cmd.render(), "mkfs.ext4 -b 4096 -F /dev/vdb");
    }
}
