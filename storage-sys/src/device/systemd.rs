// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use tracing::info;

use crate::command::{CommandRunner, ToolCommand};
use crate::{Result, SysError};

fn escape_char(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("\\x{byte:02x}"));
    }
}

/// Escape a filesystem path into a unit name the way `systemd-escape --path`
/// does: redundant slashes dropped, `/` becomes `-`, and anything outside
/// `[A-Za-z0-9:_.]` (or a leading `.`) becomes `\xNN`.
pub fn unit_name_path_escape(path: &str) -> String {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.is_empty() {
        return "-".to_string();
    }
    let simplified = components.join("/");

    let mut out = String::with_capacity(simplified.len());
    for (idx, c) in simplified.chars().enumerate() {
        match c {
            '/' => out.push('-'),
            '.' if idx == 0 => escape_char(&mut out, c),
            c if c.is_ascii_alphanumeric() || c == ':' || c == '_' || c == '.' => out.push(c),
            c => escape_char(&mut out, c),
        }
    }
    out
}

/// The `.device` unit systemd generates for a device node
pub fn device_unit_name(device: &str) -> String {
    format!("{}.device", unit_name_path_escape(device))
}

/// Block until the device units of every path are active.
///
/// `systemctl start` waits for each job to finish and fails if any unit does
/// not come up; there is no timeout beyond systemd's own.
pub fn start_device_units(
    runner: &dyn CommandRunner,
    systemctl: &Path,
    devices: &[String],
) -> Result<()> {
    if devices.is_empty() {
        return Ok(());
    }

    let units: Vec<String> = devices.iter().map(|dev| device_unit_name(dev)).collect();
    info!(units = %units.join(" "), "waiting for devices");

    let output = runner.run(&ToolCommand::new(systemctl).arg("start").args(units.clone()))?;
    if !output.success() {
        return Err(SysError::DeviceUnit {
            units: units.join(" "),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(())
}
