// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{ProvisionError, Result};

/// Seam for retrieving user-supplied key material.
///
/// Remote schemes belong to the config fetching collaborator; this stage only
/// needs the bytes.
pub trait KeyFileFetcher: Send + Sync {
    fn fetch(&self, name: &str, source: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads key files from local paths and `file://` URLs
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFetcher;

impl KeyFileFetcher for LocalFetcher {
    fn fetch(&self, name: &str, source: &str) -> Result<Zeroizing<Vec<u8>>> {
        let path = source.strip_prefix("file://").unwrap_or(source);
        if !Path::new(path).is_absolute() {
            return Err(ProvisionError::KeyFile {
                name: name.to_string(),
                reason: format!("unsupported key file source {source:?}"),
            });
        }
        fs::read(path)
            .map(Zeroizing::new)
            .map_err(|e| ProvisionError::KeyFile {
                name: name.to_string(),
                reason: format!("failed to read {path}: {e}"),
            })
    }
}
