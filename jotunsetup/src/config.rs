// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Run-time options taken from the kernel command line.

/// Disk probing policy (`edd=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EddMode {
    /// Geometry and MBR signatures.
    On,
    Off,
    /// Geometry only.
    SkipMbr,
}

impl EddMode {
    /// Build-time default; `edd-off` flips it.
    pub const DEFAULT: Self = if cfg!(feature = "edd-off") {
        EddMode::Off
    } else {
        EddMode::On
    };

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on" => Some(EddMode::On),
            "off" => Some(EddMode::Off),
            "skip" | "skipmbr" => Some(EddMode::SkipMbr),
            _ => None,
        }
    }

    pub fn probe_geometry(self) -> bool {
        self != EddMode::Off
    }

    pub fn read_signatures(self) -> bool {
        self == EddMode::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupConfig {
    pub edd: EddMode,
    /// Suppress console status text.
    pub quiet: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            edd: EddMode::DEFAULT,
            quiet: false,
        }
    }
}

impl SetupConfig {
    /// Scan whitespace-separated tokens; the last `edd=` wins. Unknown
    /// values leave the previous setting alone.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut cfg = Self::default();
        for token in cmdline.split_ascii_whitespace() {
            if token == "quiet" {
                cfg.quiet = true;
            } else if let Some(value) = token.strip_prefix("edd=") {
                if let Some(mode) = EddMode::parse(value) {
                    cfg.edd = mode;
                }
            }
        }
        cfg
    }
}
