// SPDX-License-Identifier: GPL-3.0-only

//! Comparing desired partitions against existing ones
//!
//! Both GPT (sectors) and DASD (tracks) feed values in their own unit; only
//! fields the config actually sets are compared.

use storage_types::Partition;

/// A desired partition with start/size converted to device units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPartition {
    pub number: u32,
    pub label: Option<String>,
    pub guid: Option<String>,
    pub type_guid: Option<String>,
    pub start: Option<u64>,
    pub size: Option<u64>,
    pub should_exist: bool,
    pub wipe_entry: bool,
    pub resize: bool,
}

impl TargetPartition {
    /// Convert `part` using `to_units` for MiB values
    pub fn from_spec(
        part: &Partition,
        to_units: impl Fn(u64) -> storage_sys::Result<u64>,
    ) -> storage_sys::Result<Self> {
        Ok(Self {
            number: part.number,
            label: part.label.clone(),
            guid: part.guid.clone(),
            type_guid: part.type_guid.clone(),
            start: part.start_mib.map(&to_units).transpose()?,
            size: part.size_mib.map(&to_units).transpose()?,
            should_exist: part.should_exist(),
            wipe_entry: part.wipes_entry(),
            resize: part.resizes(),
        })
    }
}

/// An existing partition, in device units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingPartition {
    pub number: u32,
    pub label: String,
    pub guid: String,
    pub type_guid: String,
    pub start: u64,
    pub size: u64,
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Everything but the size matches
pub fn matches_common(existing: &ExistingPartition, target: &TargetPartition) -> Result<(), String> {
    if target.number != existing.number {
        return Err(format!(
            "partition numbers did not match (specified {}, got {})",
            target.number, existing.number
        ));
    }
    if let Some(start) = target.start
        && start != existing.start
    {
        return Err(format!(
            "starting offset did not match (specified {start}, got {})",
            existing.start
        ));
    }
    if let Some(guid) = set(&target.guid)
        && !guid.eq_ignore_ascii_case(&existing.guid)
    {
        return Err(format!(
            "GUID did not match (specified {guid:?}, got {:?})",
            existing.guid
        ));
    }
    if let Some(type_guid) = set(&target.type_guid)
        && !type_guid.eq_ignore_ascii_case(&existing.type_guid)
    {
        return Err(format!(
            "type GUID did not match (specified {type_guid:?}, got {:?})",
            existing.type_guid
        ));
    }
    if let Some(label) = &target.label
        && *label != existing.label
    {
        return Err(format!(
            "label did not match (specified {label:?}, got {:?})",
            existing.label
        ));
    }
    Ok(())
}

/// Every field the config sets matches
pub fn matches(existing: &ExistingPartition, target: &TargetPartition) -> Result<(), String> {
    matches_common(existing, target)?;
    if let Some(size) = target.size
        && size != existing.size
    {
        return Err(format!(
            "size did not match (specified {size}, got {})",
            existing.size
        ));
    }
    Ok(())
}

/// Only the size differs and the config allows resizing
pub fn matches_resize(existing: &ExistingPartition, target: &TargetPartition) -> bool {
    target.resize && matches_common(existing, target).is_ok()
}

/// What to do with one partition entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAction {
    /// Nothing to do
    Keep,
    Create,
    Delete,
    /// Delete and recreate with the existing identity but a new size
    Resize,
    /// Delete and recreate from the config
    Recreate,
}

impl PartitionAction {
    pub fn modifies(self) -> bool {
        !matches!(self, Self::Keep)
    }
}

/// Decide the action for `target` given what exists.
///
/// Returns the conflict description when the config cannot be applied
/// without destroying data it did not ask to destroy.
pub fn decide(
    existing: Option<&ExistingPartition>,
    target: &TargetPartition,
) -> Result<PartitionAction, String> {
    let Some(existing) = existing else {
        return Ok(if target.should_exist {
            PartitionAction::Create
        } else {
            PartitionAction::Keep
        });
    };

    if !target.should_exist {
        return if target.wipe_entry {
            Ok(PartitionAction::Delete)
        } else {
            Err("partition exists but is specified as nonexistent and wipePartitionEntry is false"
                .to_string())
        };
    }

    match matches(existing, target) {
        Ok(()) => Ok(PartitionAction::Keep),
        Err(_) if target.wipe_entry => Ok(PartitionAction::Recreate),
        Err(_) if matches_resize(existing, target) => Ok(PartitionAction::Resize),
        Err(reason) => Err(format!("partition didn't match: {reason}")),
    }
}
