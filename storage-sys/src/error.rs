// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed (exit status {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("sgdisk returned malformed output")]
    BadSgdiskOutput,

    #[error("fdasd returned malformed output: {0}")]
    BadFdasdOutput(String),

    #[error("DASD table of {requested} partitions requested, at most {max} fit")]
    TooManyDasdPartitions { requested: usize, max: usize },

    #[error("{0} MiB is too large to address")]
    SizeOverflow(u64),

    #[error("sfdisk returned malformed output: {0}")]
    BadSfdiskOutput(String),

    #[error("{command} returned malformed output: {reason}")]
    BadCommandOutput { command: String, reason: String },

    #[error("Device units did not become active ({units}): {stderr}")]
    DeviceUnit { units: String, stderr: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
