// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use storage_sys::SysError;
use thiserror::Error;

/// Disks stage errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Sys(#[from] SysError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("partition {number} on {device}: {reason}")]
    PartitionConflict {
        device: String,
        number: u32,
        reason: String,
    },

    #[error("refusing to operate on active device: {0}")]
    ActiveDevice(String),

    #[error("DASD partition {number} on {device}: {field} cannot be set on DASD")]
    DasdInvalidField {
        device: String,
        number: u32,
        field: &'static str,
    },

    #[error("DASD layout on {device}: {reason}")]
    DasdLayout { device: String, reason: String },

    #[error(
        "filesystem at {device} is not of the correct type, label, or UUID \
         (found {found_type:?}, {found_label:?}, {found_uuid:?}) and a wipe was not requested"
    )]
    BadFilesystem {
        device: String,
        found_type: String,
        found_label: String,
        found_uuid: String,
    },

    #[error("volume {device} is not of the correct type: {reason}")]
    BadVolume { device: String, reason: String },

    #[error("invalid cleanExcept pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("key file for {name}: {reason}")]
    KeyFile { name: String, reason: String },

    #[error("settings: {0}")]
    Settings(String),

    #[error("failed to build filesystem worker pool: {0}")]
    WorkerPool(String),

    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("{}", JoinedErrors(.0))]
    Multiple(Vec<ProvisionError>),
}

struct JoinedErrors<'a>(&'a [ProvisionError]);

impl fmt::Display for JoinedErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl ProvisionError {
    pub(crate) fn conflict(device: &str, number: u32, reason: impl Into<String>) -> Self {
        Self::PartitionConflict {
            device: device.to_string(),
            number,
            reason: reason.into(),
        }
    }

    /// Collapse collected errors: none is `Ok`, one stays as is
    pub(crate) fn collect(mut errors: Vec<ProvisionError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_errors_are_joined_by_newline() {
        let err = ProvisionError::Multiple(vec![
            ProvisionError::Settings("a".to_string()),
            ProvisionError::ActiveDevice("/dev/vda".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "settings: a\nrefusing to operate on active device: /dev/vda"
        );
    }

    #[test]
    fn single_collected_error_is_not_wrapped() {
        let err = ProvisionError::collect(vec![ProvisionError::Settings("x".to_string())])
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Settings(_)));
        assert!(ProvisionError::collect(vec![]).is_ok());
    }
}
