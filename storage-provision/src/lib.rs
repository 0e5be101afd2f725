// SPDX-License-Identifier: GPL-3.0-only

//! First-boot storage provisioning
//!
//! Applies a declarative [`Storage`](storage_types::Storage) description to
//! the machine's block devices: partition tables (GPT or DASD), md RAID
//! arrays, LUKS2 volumes and filesystems, in that order. Host commands go
//! through the [`CommandRunner`](storage_sys::CommandRunner) seam carried by
//! [`StageContext`].

pub mod clean;
pub mod context;
pub mod error;
pub mod fetch;
pub mod filesystems;
pub mod luks;
pub mod partitions;
pub mod raid;
pub mod settings;
pub mod stage;
pub mod sync;

pub use context::StageContext;
pub use error::{ProvisionError, Result};
pub use fetch::{KeyFileFetcher, LocalFetcher};
pub use settings::ProvisionSettings;
pub use stage::{DisksStage, StageReport, Step};
