// SPDX-License-Identifier: GPL-3.0-only

pub mod clevis;
pub mod cryptsetup;

pub use cryptsetup::{Cryptsetup, luks_format_args};
