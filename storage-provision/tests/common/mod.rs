#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use storage_provision::{LocalFetcher, ProvisionSettings, StageContext};
use storage_sys::testing::{FakeInspector, ScriptedRunner};
use tempfile::TempDir;

/// A stage context over scripted commands, rooted in a scratch directory
pub struct Fixture {
    pub dir: TempDir,
    pub runner: Arc<ScriptedRunner>,
    pub ctx: StageContext,
}

impl Fixture {
    pub fn new(runner: ScriptedRunner) -> Self {
        Self::with_inspector(runner, FakeInspector::new())
    }

    pub fn with_inspector(runner: ScriptedRunner, inspector: FakeInspector) -> Self {
        let dir = tempfile::tempdir().expect("create scratch dir");
        let runner = Arc::new(runner);
        let settings = ProvisionSettings {
            alias_dir: dir.path().join("aliases"),
            run_dir: dir.path().join("run"),
            filesystem_workers: Some(2),
            ..Default::default()
        };
        let ctx = StageContext::new(
            settings,
            runner.clone(),
            Arc::new(inspector),
            Arc::new(LocalFetcher),
        );
        Self { dir, runner, ctx }
    }

    /// Alias path the stage hands to tools for `device`
    pub fn alias(&self, device: &str) -> String {
        self.ctx.alias(device)
    }

    pub fn executed(&self) -> Vec<String> {
        self.runner.executed()
    }

    /// Commands with the alias directory replaced by `@`, for readable asserts
    pub fn executed_short(&self) -> Vec<String> {
        let prefix = self.dir.path().join("aliases");
        let prefix = prefix.display().to_string();
        self.executed()
            .into_iter()
            .map(|cmd| cmd.replace(&prefix, "@"))
            .collect()
    }

    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }
}

/// `sfdisk --json` output for partitions given as (node, start, size, name)
pub fn sfdisk_json(partitions: &[(&str, u64, u64, &str)]) -> String {
    let parts: Vec<String> = partitions
        .iter()
        .map(|(node, start, size, name)| {
            format!(
                r#"{{"node": "{node}", "start": {start}, "size": {size},
                    "type": "0FC63DAF-8483-4772-8E79-3D69D8477DE4",
                    "uuid": "3D4D5C7C-34A8-4C8C-9C11-6B0F1A3E5B2A", "name": "{name}"}}"#
            )
        })
        .collect();
    format!(
        r#"{{"partitiontable": {{"label": "gpt", "unit": "sectors", "partitions": [{}]}}}}"#,
        parts.join(",")
    )
}

/// One `sgdisk --info` block as printed during `--pretend`
pub fn sgdisk_info(first: u64, last: u64) -> String {
    format!(
        "Partition GUID code: 0FC63DAF-8483-4772-8E79-3D69D8477DE4 (Linux filesystem)\n\
         Partition unique GUID: 3D4D5C7C-34A8-4C8C-9C11-6B0F1A3E5B2A\n\
         First sector: {first} (at 129.0 MiB)\n\
         Last sector: {last} (at 20.0 GiB)\n\
         Partition name: ''\n"
    )
}

pub const NO_TABLE: &str = "sfdisk: /dev/vdb: does not contain a recognized partition table";
