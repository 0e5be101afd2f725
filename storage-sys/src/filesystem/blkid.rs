// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use tracing::warn;

use crate::Result;
use crate::command::{CommandRunner, ToolCommand};

/// blkid exit status when no signature was found
const BLKID_NOTHING_FOUND: i32 = 2;
/// blkid exit status when low-level probing found conflicting signatures
const BLKID_AMBIVALENT: i32 = 8;

/// Signature found on a block device; empty strings mean "none"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub fs_type: String,
    pub uuid: String,
    pub label: String,
}

impl FilesystemInfo {
    pub fn is_empty(&self) -> bool {
        self.fs_type.is_empty()
    }
}

/// Parse `blkid -o export` output (`KEY=value` per line)
pub fn parse_blkid_export(output: &str) -> FilesystemInfo {
    let mut info = FilesystemInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "TYPE" => info.fs_type = value.trim().to_string(),
            "UUID" => info.uuid = value.trim().to_string(),
            "LABEL" => info.label = value.trim().to_string(),
            _ => {}
        }
    }
    info
}

/// Probe the signature on `device`.
///
/// A device without any signature yields an empty [`FilesystemInfo`]. When
/// the low-level probe finds several conflicting signatures, the regular
/// probe result is used instead and a warning is logged.
pub fn probe(runner: &dyn CommandRunner, blkid: &Path, device: &str) -> Result<FilesystemInfo> {
    let low_level = ToolCommand::new(blkid).args(["-p", "-o", "export", device]);
    let output = runner.run(&low_level)?;
    match output.status {
        Some(0) => Ok(parse_blkid_export(&output.stdout)),
        Some(BLKID_NOTHING_FOUND) => Ok(FilesystemInfo::default()),
        Some(BLKID_AMBIVALENT) => {
            warn!(device, "multiple signatures found; falling back to cached probe");
            let fallback = ToolCommand::new(blkid).args(["-o", "export", device]);
            let output = runner.run(&fallback)?;
            match output.status {
                Some(0) => Ok(parse_blkid_export(&output.stdout)),
                Some(BLKID_NOTHING_FOUND) => Ok(FilesystemInfo::default()),
                _ => Err(output.into_failure(&fallback)),
            }
        }
        _ => Err(output.into_failure(&low_level)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_format() {
        let info = parse_blkid_export(
            "DEVNAME=/dev/vda4\nUUID=9e6da9c2-3c0b-4d2b-8a8f-1a1f2f3c4d5e\nBLOCK_SIZE=4096\nTYPE=xfs\nLABEL=root\n",
        );
        assert_eq!(info.fs_type, "xfs");
        assert_eq!(info.uuid, "9e6da9c2-3c0b-4d2b-8a8f-1a1f2f3c4d5e");
        assert_eq!(info.label, "root");
    }

    #[test]
    fn missing_keys_stay_empty() {
        let info = parse_blkid_export("DEVNAME=/dev/vdb\nPTTYPE=gpt\n");
        assert!(info.is_empty());
        assert_eq!(info.label, "");
    }
}
