// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use storage_types::Luks;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

/// Thin wrapper over the cryptsetup subcommands used for LUKS2 volumes
#[derive(Clone, Copy)]
pub struct Cryptsetup<'a> {
    runner: &'a dyn CommandRunner,
    program: &'a Path,
}

impl<'a> Cryptsetup<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: &'a Path) -> Self {
        Self { runner, program }
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(self.program)
    }

    /// Whether `device` carries a LUKS2 header
    pub fn is_luks2(&self, device: &str) -> Result<bool> {
        let output = self
            .runner
            .run(&self.command().args(["isLuks", "--type", "luks2", device]))?;
        Ok(output.success())
    }

    pub fn luks_uuid(&self, device: &str) -> Result<String> {
        let output = self
            .runner
            .run_checked(&self.command().args(["luksUUID", device]))?;
        Ok(output.stdout.trim().to_string())
    }

    pub fn format(&self, luks: &Luks, device: &str, key_file: &Path) -> Result<()> {
        self.runner
            .run_checked(&self.command().args(luks_format_args(luks, device, key_file)))?;
        Ok(())
    }

    pub fn open(&self, device: &str, name: &str, key_file: &Path) -> Result<()> {
        self.runner.run_checked(&self.command().args([
            "luksOpen".to_string(),
            device.to_string(),
            name.to_string(),
            "--key-file".to_string(),
            key_file.display().to_string(),
        ]))?;
        Ok(())
    }

    pub fn close(&self, name: &str) -> Result<()> {
        self.runner
            .run_checked(&self.command().args(["luksClose", name]))?;
        Ok(())
    }

    /// Drop the key slot unlocked by `key_file`
    pub fn remove_key(&self, device: &str, key_file: &Path) -> Result<()> {
        self.runner.run_checked(&self.command().args([
            "luksRemoveKey".to_string(),
            device.to_string(),
            key_file.display().to_string(),
        ]))?;
        Ok(())
    }
}

/// `cryptsetup luksFormat` arguments; user options come after the generated
/// ones and the device is last
pub fn luks_format_args(luks: &Luks, device: &str, key_file: &Path) -> Vec<String> {
    let mut args = vec![
        "luksFormat".to_string(),
        "--type".to_string(),
        "luks2".to_string(),
        "--key-file".to_string(),
        key_file.display().to_string(),
    ];
    if let Some(label) = luks.label.as_deref().filter(|l| !l.is_empty()) {
        args.push("--label".to_string());
        args.push(label.to_string());
    }
    if let Some(uuid) = luks.uuid.as_deref().filter(|u| !u.is_empty()) {
        args.push("--uuid".to_string());
        args.push(uuid.to_string());
    }
    args.extend(luks.options.iter().cloned());
    args.push(device.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_args_place_device_last() {
        let luks = Luks {
            name: "secret".to_string(),
            device: "/dev/vda4".to_string(),
            label: Some("crypt".to_string()),
            uuid: Some(String::new()),
            options: vec!["--cipher".to_string(), "aes-xts-plain64".to_string()],
            ..Default::default()
        };
        assert_eq!(
            luks_format_args(&luks, "/run/alias/dev/vda4", Path::new("/run/keys/k")).join(" "),
            "luksFormat --type luks2 --key-file /run/keys/k --label crypt \
             --cipher aes-xts-plain64 /run/alias/dev/vda4"
        );
    }
}
