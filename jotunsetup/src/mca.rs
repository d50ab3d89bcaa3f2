// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! System description table (`int 0x15, AH=0xC0`).

use crate::bios::{BiosError, FarWindow, Firmware, vector};
use crate::bootparams::{Record, SysDescTable};
use core::fmt;
use core::mem::size_of;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McaError {
    NotPresent(BiosError),
}

impl fmt::Display for McaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McaError::NotPresent(e) => write!(f, "no system description table: {e}"),
        }
    }
}

impl From<BiosError> for McaError {
    fn from(e: BiosError) -> Self {
        McaError::NotPresent(e)
    }
}

/// Copy the firmware's table, clamped to the record's 16 bytes.
/// Returns the number of bytes copied; the length word is part of them.
pub fn query_mca<F: Firmware>(fw: &mut F, table: &mut SysDescTable) -> Result<usize, McaError> {
    let mut ireg = fw.initregs();
    ireg.set_ah(0xc0);
    let oreg = fw.call(vector::SYSTEM, &ireg, None)?;

    let mut win = FarWindow::new(fw, oreg.es());
    let len = (win.read16(oreg.bx()) as usize).min(size_of::<SysDescTable>());
    win.copy_to_slice(oreg.bx(), &mut table.as_bytes_mut()[..len]);
    debug!(
        "system description at {:04x}:{:04x}, {} bytes copied",
        oreg.es(),
        oreg.bx(),
        len
    );
    Ok(len)
}
