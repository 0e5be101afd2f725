// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Paths of the external programs the provisioning stage drives.
///
/// Defaults are bare program names resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolPaths {
    pub sgdisk: PathBuf,
    pub fdasd: PathBuf,
    pub dasdfmt: PathBuf,
    pub sfdisk: PathBuf,
    pub blockdev: PathBuf,
    pub partx: PathBuf,
    pub mdadm: PathBuf,
    pub mkfs_btrfs: PathBuf,
    pub mkfs_ext4: PathBuf,
    pub mkfs_xfs: PathBuf,
    pub mkswap: PathBuf,
    pub mkfs_fat: PathBuf,
    pub wipefs: PathBuf,
    pub blkid: PathBuf,
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub cryptsetup: PathBuf,
    pub clevis: PathBuf,
    pub udevadm: PathBuf,
    pub systemctl: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            sgdisk: "sgdisk".into(),
            fdasd: "fdasd".into(),
            dasdfmt: "dasdfmt".into(),
            sfdisk: "sfdisk".into(),
            blockdev: "blockdev".into(),
            partx: "partx".into(),
            mdadm: "mdadm".into(),
            mkfs_btrfs: "mkfs.btrfs".into(),
            mkfs_ext4: "mkfs.ext4".into(),
            mkfs_xfs: "mkfs.xfs".into(),
            mkswap: "mkswap".into(),
            mkfs_fat: "mkfs.fat".into(),
            wipefs: "wipefs".into(),
            blkid: "blkid".into(),
            mount: "mount".into(),
            umount: "umount".into(),
            cryptsetup: "cryptsetup".into(),
            clevis: "clevis".into(),
            udevadm: "udevadm".into(),
            systemctl: "systemctl".into(),
        }
    }
}

impl ToolPaths {
    fn all(&self) -> [&PathBuf; 20] {
        [
            &self.sgdisk,
            &self.fdasd,
            &self.dasdfmt,
            &self.sfdisk,
            &self.blockdev,
            &self.partx,
            &self.mdadm,
            &self.mkfs_btrfs,
            &self.mkfs_ext4,
            &self.mkfs_xfs,
            &self.mkswap,
            &self.mkfs_fat,
            &self.wipefs,
            &self.blkid,
            &self.mount,
            &self.umount,
            &self.cryptsetup,
            &self.clevis,
            &self.udevadm,
            &self.systemctl,
        ]
    }

    /// Configured programs that cannot be found on this host.
    ///
    /// Not every tool is needed by every config (fdasd only on s390x, clevis
    /// only for bound volumes), so callers only warn about these.
    pub fn missing(&self) -> Vec<PathBuf> {
        self.all()
            .into_iter()
            .filter(|path| which::which(path).is_err())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tool_table_keeps_defaults() {
        let tools: ToolPaths =
            serde_json::from_str(r#"{"sgdisk": "/usr/sbin/sgdisk", "mkfs-fat": "/sbin/mkfs.vfat"}"#)
                .unwrap();
        assert_eq!(tools.sgdisk, PathBuf::from("/usr/sbin/sgdisk"));
        assert_eq!(tools.mkfs_fat, PathBuf::from("/sbin/mkfs.vfat"));
        assert_eq!(tools.cryptsetup, PathBuf::from("cryptsetup"));
    }

    #[test]
    fn nonexistent_tools_are_reported_missing() {
        let tools = ToolPaths {
            clevis: "/nonexistent/clevis".into(),
            ..Default::default()
        };
        assert!(tools.missing().contains(&PathBuf::from("/nonexistent/clevis")));
    }
}
