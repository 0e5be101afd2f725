// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use storage_provision::{DisksStage, ProvisionSettings, StageContext, StageReport};
use storage_types::Storage;
use tracing_subscriber::{EnvFilter, fmt};

/// Apply a storage description to this machine's disks
#[derive(Parser)]
#[command(name = "storage-provision")]
#[command(about = "Partition, assemble, encrypt and format disks on first boot", long_about = None)]
struct Cli {
    /// Storage description (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Host settings (TOML); built-in defaults when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Run without root privileges (for testing against loop devices)
    #[arg(long)]
    skip_root_check: bool,

    /// Write LUKS keys that remain valid to this file as JSON
    #[arg(long)]
    keys_out: Option<PathBuf>,
}

fn load_storage(path: &Path) -> Result<Storage> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read storage config {}", path.display()))?;
    let storage: Storage = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse storage config {}", path.display()))?;

    if let Err(errors) = storage.validate() {
        for error in &errors {
            tracing::error!("{error}");
        }
        anyhow::bail!("storage config has {} validation error(s)", errors.len());
    }
    Ok(storage)
}

fn write_keys(path: &Path, report: &StageReport) -> Result<()> {
    let keys: BTreeMap<&str, String> = report
        .luks_persist_keys
        .iter()
        .map(|(name, key)| (name.as_str(), hex::encode(key.as_slice())))
        .collect();
    let json = serde_json::to_vec(&keys)?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(&json)?;
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("storage_provision=info,storage_sys=info,warn")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.skip_root_check && unsafe { libc::geteuid() } != 0 {
        tracing::error!("storage-provision must run as root");
        anyhow::bail!("root privileges required");
    }

    let settings = match &cli.settings {
        Some(path) => ProvisionSettings::load(path)?,
        None => ProvisionSettings::default(),
    };

    let missing = settings.tools.missing();
    if !missing.is_empty() {
        tracing::warn!(?missing, "some tools were not found; steps needing them will fail");
    }

    let storage = load_storage(&cli.config)?;

    let stage = DisksStage::new(StageContext::system(settings));
    let report = stage.run(&storage)?;
    tracing::info!(
        persisted_keys = report.luks_persist_keys.len(),
        "disks stage finished"
    );

    if let Some(path) = &cli.keys_out {
        write_keys(path, &report)?;
    }
    Ok(())
}
