// SPDX-License-Identifier: GPL-3.0-only

//! Declarative storage models for first-boot provisioning
//!
//! This crate defines the single source of truth for the storage section of a
//! provisioning config. The config collaborator deserializes and validates a
//! [`Storage`] value; the provisioning stage consumes it unchanged.
//!
//! ## Architecture
//!
//! - [`Disk`] / [`Partition`] → partition table reconciliation
//! - [`Raid`] → `mdadm` array assembly
//! - [`Luks`] / [`Clevis`] → encrypted volume setup
//! - [`Filesystem`] → filesystem creation and verification
//!
//! Optional fields follow the "absent means don't care" rule: `None` never
//! triggers a mutation on its own.

pub mod disk;
pub mod filesystem;
pub mod luks;
pub mod raid;
pub mod storage;
pub mod validate;

pub use disk::{Disk, Partition, sort_auto_numbered_last};
pub use filesystem::{Filesystem, FilesystemFormat, canonicalize_filesystem_uuid};
pub use luks::{Clevis, ClevisCustom, KeyFile, Luks, Tang};
pub use raid::Raid;
pub use storage::Storage;
pub use validate::ValidationError;
