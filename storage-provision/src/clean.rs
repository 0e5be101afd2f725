// SPDX-License-Identifier: GPL-3.0-only

//! Selective cleaning of a reused filesystem
//!
//! Paths are matched relative to the filesystem root with a leading `/`, so
//! `/etc/ssh/.*` keeps everything under `etc/ssh`. Each pattern must match
//! the whole path. Directories leading to a kept entry survive; their other
//! contents do not.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use storage_sys::filesystem::mount::{mount, umount};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::context::StageContext;
use crate::error::{ProvisionError, Result};

/// Compiled `cleanExcept` patterns
#[derive(Debug, Clone)]
pub struct CleanExcept {
    patterns: Vec<Regex>,
}

impl CleanExcept {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    ProvisionError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether the root-relative `path` matches a pattern
    pub fn keeps(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }

    fn relative(root: &Path, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(root).ok()?;
        Some(Path::new("/").join(rel))
    }

    /// Root-relative paths to keep: matches plus their ancestors
    fn survivors(&self, root: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut keep = BTreeSet::new();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(|e| ProvisionError::Io(e.into()))?;
            let Some(rel) = Self::relative(root, entry.path()) else {
                continue;
            };
            if self.keeps(&rel.to_string_lossy()) {
                keep.extend(
                    rel.ancestors()
                        .filter(|ancestor| *ancestor != Path::new("/"))
                        .map(Path::to_path_buf),
                );
            }
        }
        Ok(keep)
    }

    /// Delete everything under `root` that is not kept.
    ///
    /// Returns the number of top-most entries removed; pruned directories
    /// are removed whole without being walked.
    pub fn sweep(&self, root: &Path) -> Result<usize> {
        let keep = self.survivors(root)?;
        let mut removed = 0;

        let mut walker = WalkDir::new(root).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| ProvisionError::Io(e.into()))?;
            let Some(rel) = Self::relative(root, entry.path()) else {
                continue;
            };
            if keep.contains(&rel) {
                continue;
            }

            debug!(path = %rel.display(), "removing");
            if entry.file_type().is_dir() {
                fs::remove_dir_all(entry.path())?;
                walker.skip_current_dir();
            } else {
                fs::remove_file(entry.path())?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

/// Mount `device`, sweep it with `patterns` and unmount it again
pub fn clean_filesystem(
    ctx: &StageContext,
    device: &str,
    fs_type: &str,
    mount_options: &[String],
    patterns: &[String],
) -> Result<()> {
    let clean = CleanExcept::new(patterns)?;

    fs::create_dir_all(&ctx.settings.run_dir)?;
    let scratch = tempfile::Builder::new()
        .prefix("clean-")
        .tempdir_in(&ctx.settings.run_dir)?;

    let runner = ctx.runner();
    let tools = ctx.tools();
    mount(runner, &tools.mount, fs_type, mount_options, device, scratch.path())?;

    let swept = clean.sweep(scratch.path());
    let unmounted = umount(runner, &tools.umount, scratch.path());

    match (swept, unmounted) {
        (Ok(removed), Ok(())) => {
            info!(device, removed, "cleaned filesystem");
            Ok(())
        }
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), unmounted) => {
            if let Err(umount_err) = unmounted {
                warn!(device, %umount_err, "failed to unmount after cleaning error");
            }
            error!(device, %err, "cleaning filesystem failed");
            Err(err)
        }
    }
}
