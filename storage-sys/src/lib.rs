// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for storage provisioning
//!
//! This crate wraps the external tools the provisioning stage drives and
//! parses what they print:
//! - Partition tables (`sgdisk`, `sfdisk`, `fdasd`, `dasdfmt`, `partx`)
//! - Software RAID (`mdadm`)
//! - Encryption (`cryptsetup`, `clevis`)
//! - Filesystems (`blkid`, `wipefs`, `mkfs.*`, `mount`)
//! - Device readiness (`systemctl`, `udevadm`, sysfs)
//!
//! Every invocation goes through [`CommandRunner`], so callers can substitute
//! [`testing::ScriptedRunner`] (feature `test-support`) in tests.
//!
//! These operations require elevated privileges and are destructive.

pub mod command;
pub mod device;
pub mod encryption;
pub mod error;
pub mod filesystem;
pub mod logical;
pub mod partition;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod tools;

pub use command::{CommandOutput, CommandRunner, SystemRunner, ToolCommand};
pub use error::{Result, SysError};
pub use tools::ToolPaths;
