// SPDX-License-Identifier: GPL-3.0-only

//! LUKS2 volume creation
//!
//! Volumes are processed one after another. Each gets a scratch key file in
//! the run directory that is removed when the volume is done, whatever the
//! outcome.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use rand::RngCore;
use rand::rngs::OsRng;
use storage_sys::encryption::Cryptsetup;
use storage_sys::encryption::clevis::{bind, pin_and_config, unlock};
use storage_sys::filesystem::{probe, wipefs};
use storage_types::Luks;
use tempfile::NamedTempFile;
use tracing::{error, info};
use zeroize::Zeroizing;

use crate::context::StageContext;
use crate::error::{ProvisionError, Result};
use crate::sync::wait_on_devices;

/// Random bytes behind a generated key, hex encoded before use
const GENERATED_KEY_BYTES: usize = 4096;

/// Key material handed back for persistence, by volume name
pub type PersistedKeys = BTreeMap<String, Zeroizing<Vec<u8>>>;

struct KeyFile {
    file: NamedTempFile,
    contents: Zeroizing<Vec<u8>>,
    generated: bool,
}

impl KeyFile {
    fn path(&self) -> &Path {
        self.file.path()
    }
}

fn generate_key() -> Result<Zeroizing<Vec<u8>>> {
    let mut bytes = Zeroizing::new(vec![0u8; GENERATED_KEY_BYTES]);
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ProvisionError::Io(std::io::Error::other(e)))?;
    Ok(Zeroizing::new(hex::encode(bytes.as_slice()).into_bytes()))
}

fn prepare_key_file(ctx: &StageContext, luks: &Luks) -> Result<KeyFile> {
    let (contents, generated) = match luks.key_file.source() {
        Some(source) => (ctx.fetcher.fetch(&luks.name, source)?, false),
        None => (generate_key()?, true),
    };

    fs::create_dir_all(&ctx.settings.run_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("luks-key-")
        .tempfile_in(&ctx.settings.run_dir)?;
    file.write_all(&contents)?;
    file.flush()?;
    fs::set_permissions(file.path(), fs::Permissions::from_mode(0o400))?;

    Ok(KeyFile {
        file,
        contents,
        generated,
    })
}

fn bad_volume(luks: &Luks, reason: impl Into<String>) -> ProvisionError {
    ProvisionError::BadVolume {
        device: luks.device.clone(),
        reason: reason.into(),
    }
}

/// Check an existing LUKS2 header against the config and open it
fn reuse_volume(ctx: &StageContext, luks: &Luks, device: &str, key: &KeyFile) -> Result<()> {
    if luks.clevis_binding().is_some() {
        return Err(bad_volume(luks, "an existing volume cannot be reused with a clevis binding"));
    }
    if luks.key_file.source().is_none() {
        return Err(bad_volume(luks, "an existing volume can only be reused with a key file"));
    }

    if let Some(label) = &luks.label {
        let found = probe(ctx.runner(), &ctx.tools().blkid, device)?;
        if found.label != *label {
            return Err(bad_volume(
                luks,
                format!("volume label {:?} doesn't match expected label {label:?}", found.label),
            ));
        }
    }

    let cryptsetup = Cryptsetup::new(ctx.runner(), &ctx.tools().cryptsetup);
    if let Some(uuid) = &luks.uuid {
        let found = cryptsetup.luks_uuid(device)?;
        if !found.eq_ignore_ascii_case(uuid) {
            return Err(bad_volume(
                luks,
                format!("volume UUID {found:?} doesn't match expected UUID {uuid:?}"),
            ));
        }
    }

    cryptsetup
        .open(device, &luks.name, key.path())
        .map_err(|_| bad_volume(luks, "failed to open device using the specified key file"))
}

/// Create and open one volume. Returns whether its key stays valid.
fn create_volume(ctx: &StageContext, luks: &Luks, key: &KeyFile) -> Result<bool> {
    let device = ctx.alias(&luks.device);
    let runner = ctx.runner();
    let tools = ctx.tools();
    let cryptsetup = Cryptsetup::new(runner, &tools.cryptsetup);

    if luks.wipes_volume() {
        wipefs(runner, &tools.wipefs, &device)?;
    } else if cryptsetup.is_luks2(&device)? {
        if let Err(err) = reuse_volume(ctx, luks, &device, key) {
            error!(device = %luks.device, %err, "volume wipe was not requested and the LUKS device could not be reused");
            return Err(err);
        }
        info!(device = %luks.device, "volume is already correctly formatted, skipping");
        return Ok(true);
    } else {
        let found = probe(runner, &tools.blkid, &device)?;
        info!(
            device = %luks.device,
            fs_type = %found.fs_type,
            uuid = %found.uuid,
            label = %found.label,
            "probed volume"
        );
        if !found.is_empty() {
            return Err(bad_volume(
                luks,
                format!("found {} and a volume wipe was not requested", found.fs_type),
            ));
        }
    }

    info!(name = %luks.name, device = %luks.device, "creating LUKS volume");
    cryptsetup.format(luks, &device, key.path())?;
    cryptsetup.open(&device, &luks.name, key.path())?;

    let Some(clevis) = luks.clevis_binding() else {
        return Ok(true);
    };

    let (pin, config) = pin_and_config(clevis)?;
    info!(name = %luks.name, %pin, "binding clevis");
    bind(runner, &tools.clevis, &device, key.path(), &pin, &config)?;

    // reopen through clevis to prove the binding unlocks
    cryptsetup.close(&luks.name)?;
    unlock(runner, &tools.clevis, &device, &luks.name)?;

    if key.generated {
        info!(name = %luks.name, "removing generated key slot");
        cryptsetup.remove_key(&device, key.path())?;
        return Ok(false);
    }
    Ok(true)
}

/// Create every LUKS volume in order and collect the keys worth persisting
pub fn create_luks(ctx: &StageContext, volumes: &[Luks]) -> Result<PersistedKeys> {
    let mut persisted = PersistedKeys::new();
    if volumes.is_empty() {
        return Ok(persisted);
    }

    let devices: Vec<String> = volumes.iter().map(|luks| luks.device.clone()).collect();
    wait_on_devices(ctx, &devices, "luks")?;

    for luks in volumes {
        let key = prepare_key_file(ctx, luks)?;
        if create_volume(ctx, luks, &key)? {
            persisted.insert(luks.name.clone(), key.contents.clone());
        }
    }
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storage_sys::testing::{FakeInspector, ScriptedRunner};
    use storage_types::{Clevis, KeyFile as KeySource};

    use super::*;
    use crate::fetch::LocalFetcher;
    use crate::settings::ProvisionSettings;

    fn context(runner: Arc<ScriptedRunner>, dir: &Path) -> StageContext {
        let settings = ProvisionSettings {
            alias_dir: dir.join("aliases"),
            run_dir: dir.join("run"),
            ..Default::default()
        };
        StageContext::new(
            settings,
            runner,
            Arc::new(FakeInspector::new()),
            Arc::new(LocalFetcher),
        )
    }

    fn programs(runner: &ScriptedRunner) -> Vec<String> {
        runner
            .executed()
            .iter()
            .map(|cmd| cmd.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
            .collect()
    }

    #[test]
    fn generated_key_with_tpm2_is_removed_after_binding() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("cryptsetup isLuks", 1, ""));
        let ctx = context(runner.clone(), dir.path());
        let luks = Luks {
            name: "root".to_string(),
            device: "/dev/vda4".to_string(),
            clevis: Some(Clevis {
                tpm2: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let persisted = create_luks(&ctx, &[luks]).unwrap();

        assert!(persisted.is_empty());
        assert_eq!(
            programs(&runner),
            vec![
                "systemctl start",
                "cryptsetup isLuks",
                "blkid -p",
                "cryptsetup luksFormat",
                "cryptsetup luksOpen",
                "clevis luks",
                "cryptsetup luksClose",
                "clevis luks",
                "cryptsetup luksRemoveKey",
            ]
        );
        // scratch key files never outlive the step
        assert_eq!(fs::read_dir(dir.path().join("run")).unwrap().count(), 0);
    }

    #[test]
    fn user_key_without_clevis_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("secret");
        fs::write(&key, b"hunter2").unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("cryptsetup isLuks", 1, ""));
        let ctx = context(runner.clone(), dir.path());
        let luks = Luks {
            name: "data".to_string(),
            device: "/dev/vdb".to_string(),
            key_file: KeySource {
                source: Some(key.display().to_string()),
            },
            ..Default::default()
        };

        let persisted = create_luks(&ctx, &[luks]).unwrap();

        assert_eq!(persisted["data"].as_slice(), b"hunter2");
        assert!(!runner.executed().iter().any(|cmd| cmd.contains("clevis")));
    }

    #[test]
    fn foreign_signature_without_wipe_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .fail("cryptsetup isLuks", 1, "")
                .respond("blkid -p", "TYPE=xfs\nUUID=1234\n"),
        );
        let ctx = context(runner.clone(), dir.path());
        let luks = Luks {
            name: "data".to_string(),
            device: "/dev/vdb".to_string(),
            ..Default::default()
        };

        let err = create_luks(&ctx, &[luks]).unwrap_err();
        assert!(matches!(err, ProvisionError::BadVolume { .. }));
        assert!(!runner.executed().iter().any(|cmd| cmd.contains("luksFormat")));
    }

    #[test]
    fn existing_volume_is_reused_when_it_matches() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("secret");
        fs::write(&key, b"hunter2").unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .respond("blkid -p", "TYPE=crypto_LUKS\nLABEL=vault\n")
                .respond("cryptsetup luksUUID", "0b6a8a5c-2b2f-4c48-a1f3-2f3c8d7d1e77\n"),
        );
        let ctx = context(runner.clone(), dir.path());
        let luks = Luks {
            name: "vault".to_string(),
            device: "/dev/vdc".to_string(),
            label: Some("vault".to_string()),
            uuid: Some("0B6A8A5C-2B2F-4C48-A1F3-2F3C8D7D1E77".to_string()),
            key_file: KeySource {
                source: Some(key.display().to_string()),
            },
            ..Default::default()
        };

        let persisted = create_luks(&ctx, &[luks]).unwrap();

        assert!(persisted.contains_key("vault"));
        let executed = runner.executed();
        assert!(executed.iter().any(|cmd| cmd.starts_with("cryptsetup luksOpen")));
        assert!(!executed.iter().any(|cmd| cmd.contains("luksFormat")));
    }

    #[test]
    fn existing_volume_with_generated_key_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = context(runner, dir.path());
        let luks = Luks {
            name: "vault".to_string(),
            device: "/dev/vdc".to_string(),
            ..Default::default()
        };

        let err = create_luks(&ctx, &[luks]).unwrap_err();
        assert!(err.to_string().contains("only be reused with a key file"));
    }
}
