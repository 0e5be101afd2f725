// SPDX-License-Identifier: GPL-3.0-only

pub mod blkid;
pub mod mkfs;
pub mod mount;

pub use blkid::{FilesystemInfo, parse_blkid_export, probe};
pub use mkfs::{mkfs_command, wipefs};
