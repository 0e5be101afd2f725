// SPDX-License-Identifier: GPL-3.0-only

pub mod alias;
pub mod systemd;
pub mod udev;
pub mod usage;

pub use alias::DeviceAliases;
pub use systemd::{device_unit_name, start_device_units, unit_name_path_escape};
pub use usage::{BlockDeviceInspector, DeviceUsage, SysfsInspector};
