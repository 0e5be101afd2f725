// SPDX-License-Identifier: GPL-3.0-only

pub mod mdadm_tools;

pub use mdadm_tools::{create_args, create_array};
