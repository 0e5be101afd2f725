// SPDX-License-Identifier: GPL-3.0-only

//! Clevis pin configuration and LUKS binding

use std::path::Path;

use serde::Serialize;
use storage_types::Clevis;

use crate::command::{CommandRunner, ToolCommand};
use crate::{Result, SysError};

#[derive(Debug, Serialize)]
struct TangPin {
    url: String,
    #[serde(rename = "thp", skip_serializing_if = "Option::is_none")]
    thumbprint: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tpm2Pin {}

#[derive(Debug, Serialize)]
struct SssPins {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tang: Vec<TangPin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tpm2: Option<Tpm2Pin>,
}

/// Shamir secret sharing config for the `sss` pin
#[derive(Debug, Serialize)]
struct SssConfig {
    pins: SssPins,
    t: u32,
}

/// Pin name and JSON config to hand to `clevis luks bind`
pub fn pin_and_config(clevis: &Clevis) -> Result<(String, String)> {
    if let Some(custom) = clevis.custom_pin() {
        return Ok((custom.pin.clone(), custom.config.clone()));
    }

    let config = SssConfig {
        pins: SssPins {
            tang: clevis
                .tang
                .iter()
                .map(|tang| TangPin {
                    url: tang.url.clone(),
                    thumbprint: tang.thumbprint.clone().filter(|thp| !thp.is_empty()),
                })
                .collect(),
            tpm2: (clevis.tpm2 == Some(true)).then_some(Tpm2Pin {}),
        },
        t: clevis.threshold(),
    };
    let json = serde_json::to_string(&config).map_err(|e| SysError::BadCommandOutput {
        command: "clevis".to_string(),
        reason: format!("failed to encode pin config: {e}"),
    })?;
    Ok(("sss".to_string(), json))
}

/// Add a clevis key slot unlocked by the existing `key_file`
pub fn bind(
    runner: &dyn CommandRunner,
    clevis: &Path,
    device: &str,
    key_file: &Path,
    pin: &str,
    config: &str,
) -> Result<()> {
    runner.run_checked(&ToolCommand::new(clevis).args([
        "luks".to_string(),
        "bind".to_string(),
        "-f".to_string(),
        "-k".to_string(),
        key_file.display().to_string(),
        "-d".to_string(),
        device.to_string(),
        pin.to_string(),
        config.to_string(),
    ]))?;
    Ok(())
}

/// Open `device` as `name` through its clevis binding
pub fn unlock(runner: &dyn CommandRunner, clevis: &Path, device: &str, name: &str) -> Result<()> {
    runner.run_checked(&ToolCommand::new(clevis).args(["luks", "unlock", "-d", device, "-n", name]))?;
    Ok(())
}
