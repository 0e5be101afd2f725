// SPDX-License-Identifier: GPL-3.0-only

//! Desired encrypted volumes

use serde::{Deserialize, Serialize};

/// LUKS2 volume to create (or reuse) and open as `/dev/mapper/<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Luks {
    /// Device-mapper name of the opened volume
    pub name: String,

    /// Backing block device
    pub device: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// User-supplied key material; generated when absent
    #[serde(default)]
    pub key_file: KeyFile,

    /// Extra `cryptsetup luksFormat` arguments
    #[serde(default)]
    pub options: Vec<String>,

    /// Recreate even if the device already carries a signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_volume: Option<bool>,

    /// Automated unlock bindings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clevis: Option<Clevis>,
}

impl Luks {
    pub fn wipes_volume(&self) -> bool {
        self.wipe_volume == Some(true)
    }

    /// Clevis config that actually binds something
    pub fn clevis_binding(&self) -> Option<&Clevis> {
        self.clevis.as_ref().filter(|clevis| clevis.is_present())
    }
}

/// Reference to key material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// Resource URL or path of the key; `None` asks for a generated key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl KeyFile {
    /// The source, if it names something
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().filter(|source| !source.is_empty())
    }
}

/// Clevis binding: Shamir secret sharing over Tang/TPM2 pins, or a custom pin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clevis {
    #[serde(default)]
    pub tang: Vec<Tang>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm2: Option<bool>,

    /// Number of pins required to unlock (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<ClevisCustom>,
}

impl Clevis {
    pub fn is_present(&self) -> bool {
        !self.tang.is_empty() || self.tpm2 == Some(true) || self.custom_pin().is_some()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.unwrap_or(1)
    }

    /// Custom pin overriding the generated `sss` config
    pub fn custom_pin(&self) -> Option<&ClevisCustom> {
        self.custom.as_ref().filter(|custom| !custom.pin.is_empty())
    }
}

/// Tang server pin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tang {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
}

/// Pin and JSON config handed to `clevis luks bind` verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClevisCustom {
    pub pin: String,

    pub config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_network: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clevis_presence_requires_a_pin() {
        assert!(!Clevis::default().is_present());
        assert!(
            Clevis {
                tpm2: Some(true),
                ..Default::default()
            }
            .is_present()
        );
        assert!(
            !Clevis {
                tpm2: Some(false),
                custom: Some(ClevisCustom::default()),
                ..Default::default()
            }
            .is_present()
        );
        assert_eq!(Clevis::default().threshold(), 1);
    }

    #[test]
    fn empty_key_source_means_generated() {
        let luks: Luks = serde_json::from_str(
            r#"{"name": "root", "device": "/dev/vda4", "keyFile": {"source": ""}}"#,
        )
        .unwrap();
        assert_eq!(luks.key_file.source(), None);
        assert!(luks.clevis_binding().is_none());
    }
}
