// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::Storage;

/// Reasons a storage section is rejected before any device is touched
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind} entry has an empty device path")]
    EmptyDevice { kind: &'static str },

    #[error("partition number {number} is used more than once on {device}")]
    DuplicatePartition { device: String, number: u32 },

    #[error("{field} {value:?} is not a valid GUID")]
    InvalidGuid { field: &'static str, value: String },

    #[error("raid {name} has {spares} spares but only {devices} devices")]
    TooManySpares {
        name: String,
        spares: u32,
        devices: usize,
    },
}

fn check_guid(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(value) if !value.is_empty() && Uuid::parse_str(value).is_err() => {
            Err(ValidationError::InvalidGuid {
                field,
                value: value.to_string(),
            })
        }
        _ => Ok(()),
    }
}

impl Storage {
    /// Reject configs that can never be applied.
    ///
    /// Returns every problem found rather than only the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for disk in &self.disks {
            if disk.device.is_empty() {
                errors.push(ValidationError::EmptyDevice { kind: "disk" });
            }

            let mut seen = HashSet::new();
            for part in &disk.partitions {
                if part.number != 0 && !seen.insert(part.number) {
                    errors.push(ValidationError::DuplicatePartition {
                        device: disk.device.clone(),
                        number: part.number,
                    });
                }
                if let Err(e) = check_guid("guid", part.guid.as_deref()) {
                    errors.push(e);
                }
                if let Err(e) = check_guid("typeGuid", part.type_guid.as_deref()) {
                    errors.push(e);
                }
            }
        }

        for raid in &self.raid {
            if raid.spare_count() as usize > raid.devices.len() {
                errors.push(ValidationError::TooManySpares {
                    name: raid.name.clone(),
                    spares: raid.spare_count(),
                    devices: raid.devices.len(),
                });
            }
            if raid.devices.iter().any(String::is_empty) {
                errors.push(ValidationError::EmptyDevice { kind: "raid" });
            }
        }

        for luks in &self.luks {
            if luks.device.is_empty() {
                errors.push(ValidationError::EmptyDevice { kind: "luks" });
            }
            if let Err(e) = check_guid("uuid", luks.uuid.as_deref()) {
                errors.push(e);
            }
        }

        for fs in &self.filesystems {
            if fs.device.is_empty() {
                errors.push(ValidationError::EmptyDevice { kind: "filesystem" });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
