// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use storage_sys::device::udev::settle;
use storage_types::Storage;
use tracing::{info, info_span};

use crate::context::StageContext;
use crate::error::{ProvisionError, Result};
use crate::filesystems::create_filesystems;
use crate::luks::{PersistedKeys, create_luks};
use crate::partitions::create_partitions;
use crate::raid::create_raids;

/// Steps of the disks stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Partitions,
    Raid,
    Luks,
    Filesystems,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Partitions, Step::Raid, Step::Luks, Step::Filesystems];

    pub fn name(self) -> &'static str {
        match self {
            Step::Partitions => "createPartitions",
            Step::Raid => "createRaids",
            Step::Luks => "createLuks",
            Step::Filesystems => "createFilesystems",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What later stages need from this one
#[derive(Default)]
pub struct StageReport {
    /// LUKS keys that still unlock their volume, by volume name
    pub luks_persist_keys: PersistedKeys,
}

impl fmt::Debug for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageReport")
            .field("luks_persist_keys", &self.luks_persist_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The disks stage: partitions, RAID, LUKS and filesystems, then one settle
pub struct DisksStage {
    ctx: StageContext,
}

impl DisksStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    fn run_step(&self, step: Step, storage: &Storage, report: &mut StageReport) -> Result<()> {
        let ctx = &self.ctx;
        match step {
            Step::Partitions => {
                let _span = info_span!("createPartitions").entered();
                create_partitions(ctx, &storage.disks)
            }
            Step::Raid => {
                let _span = info_span!("createRaids").entered();
                create_raids(ctx, &storage.raid)
            }
            Step::Luks => {
                let _span = info_span!("createLuks").entered();
                report.luks_persist_keys = create_luks(ctx, &storage.luks)?;
                Ok(())
            }
            Step::Filesystems => {
                let _span = info_span!("createFilesystems").entered();
                create_filesystems(ctx, &storage.filesystems)
            }
        }
    }

    pub fn run(&self, storage: &Storage) -> Result<StageReport> {
        let mut report = StageReport::default();
        if storage.is_noop() {
            info!("no storage configured, nothing to do");
            return Ok(report);
        }

        for step in Step::ALL {
            self.run_step(step, storage, &mut report)
                .map_err(|source| ProvisionError::Step {
                    step: step.name(),
                    source: Box::new(source),
                })?;
        }

        // by-label links can vanish and reappear while mkfs uevents drain
        settle(self.ctx.runner(), &self.ctx.tools().udevadm)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_run_in_fixed_order() {
        let mut shuffled = [Step::Filesystems, Step::Partitions, Step::Luks, Step::Raid];
        shuffled.sort();
        assert_eq!(shuffled, Step::ALL);
        assert_eq!(Step::Raid.to_string(), "createRaids");
    }
}
