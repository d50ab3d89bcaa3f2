// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! BIOS Enhanced Disk Drive services: per-disk geometry and MBR signatures.
//!
//! Every legacy hard-disk id `0x80..0x90` gets two independent passes. A
//! failure only drops that disk's entry for that pass; the scan goes on.

use crate::bios::{BiosError, Firmware, vector};
use crate::bootparams::{BootParams, EDD_MBR_SIG_MAX, EddDeviceParams, EddInfo, Record};
use crate::config::EddMode;
use crate::console::{Console, Status};
use crate::heap::ScratchHeap;
use core::fmt::{self, Write};
use core::mem::size_of;
use log::{debug, info};

pub const EDD_FIRST_DISK: u8 = 0x80;
/// Number of disk ids probed, one per signature slot.
pub const EDD_DISK_COUNT: u8 = EDD_MBR_SIG_MAX as u8;

/// Magic in BX for the presence check, and the swapped form on return.
pub const EDD_MAGIC_IN: u16 = 0x55aa;
pub const EDD_MAGIC_OUT: u16 = 0xaa55;

/// Boot-sector magic at offset 510.
pub const MBR_MAGIC: u16 = 0xaa55;
pub const MBR_MAGIC_OFFSET: usize = 510;
/// Disk signature inside the MBR.
pub const MBR_SIG_OFFSET: usize = 0x1b8;

const DEFAULT_SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EddError {
    NoExtensions(BiosError),
    BadMagic(u16),
    ParamsFailed(BiosError),
    /// No heap, or the aligned sector buffer would run past its end.
    NoBuffer,
    BadSectorSize(u16),
    ReadFailed(BiosError),
    NotBootSector(u16),
}

impl fmt::Display for EddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EddError::NoExtensions(e) => write!(f, "no EDD extensions: {e}"),
            EddError::BadMagic(bx) => write!(f, "EDD check returned {bx:#06x}"),
            EddError::ParamsFailed(e) => write!(f, "get device parameters failed: {e}"),
            EddError::NoBuffer => f.write_str("no heap space for a sector buffer"),
            EddError::BadSectorSize(n) => write!(f, "unusable sector size {n}"),
            EddError::ReadFailed(e) => write!(f, "MBR read failed: {e}"),
            EddError::NotBootSector(m) => write!(f, "sector 0 magic {m:#06x}"),
        }
    }
}

/// Build the geometry entry for `devno`, or nothing at all.
pub fn get_edd_info<F: Firmware>(fw: &mut F, devno: u8) -> Result<EddInfo, EddError> {
    let mut ei = EddInfo::zeroed();

    let mut ireg = fw.initregs();
    ireg.set_ah(0x41);
    ireg.set_bx(EDD_MAGIC_IN);
    ireg.set_dl(devno);
    let oreg = fw.call(vector::DISK, &ireg, None).map_err(EddError::NoExtensions)?;
    if oreg.bx() != EDD_MAGIC_OUT {
        return Err(EddError::BadMagic(oreg.bx()));
    }
    ei.device = devno;
    ei.version = oreg.ah();
    ei.interface_support = oreg.cx();

    // The buffer announces how much the firmware may fill.
    let mut params = EddDeviceParams::zeroed();
    params.length = size_of::<EddDeviceParams>() as u16;
    let mut ireg = fw.initregs();
    ireg.set_ah(0x48);
    ireg.set_dl(devno);
    ireg.set_si(fw.near_addr(params.as_bytes()));
    fw.call(vector::DISK, &ireg, Some(params.as_bytes_mut()))
        .map_err(EddError::ParamsFailed)?;
    ei.params = params;

    // Legacy CHS is optional. ES:DI = 0:0 works around some BIOSes.
    let mut ireg = fw.initregs();
    ireg.set_ah(0x08);
    ireg.set_dl(devno);
    ireg.set_es(0);
    if let Ok(oreg) = fw.call(vector::DISK, &ireg, None) {
        ei.legacy_max_cylinder = oreg.ch() as u16 + (((oreg.cl() & 0xc0) as u16) << 2);
        ei.legacy_max_head = oreg.dh();
        ei.legacy_sectors_per_track = oreg.cl() & 0x3f;
    }

    Ok(ei)
}

/// Read sector 0 of `devno` into a naturally aligned heap buffer and return
/// the 32-bit disk signature, if the sector carries the boot magic.
pub fn read_mbr_sig<F: Firmware>(
    fw: &mut F,
    heap: &mut ScratchHeap<'_>,
    devno: u8,
    bytes_per_sector: u16,
) -> Result<u32, EddError> {
    let sector_size = match bytes_per_sector as usize {
        0 => DEFAULT_SECTOR_SIZE,
        n if n.is_power_of_two() && n >= DEFAULT_SECTOR_SIZE => n,
        _ => return Err(EddError::BadSectorSize(bytes_per_sector)),
    };
    let scratch = heap
        .aligned_scratch(sector_size, sector_size)
        .ok_or(EddError::NoBuffer)?;
    scratch.buf.fill(0);

    let mut ireg = fw.initregs();
    ireg.set_ax(0x0201);
    ireg.set_cx(0x0001);
    ireg.set_dx(devno as u16);
    ireg.set_bx(scratch.offset);
    fw.call(vector::DISK, &ireg, Some(&mut *scratch.buf))
        .map_err(EddError::ReadFailed)?;

    let buf = &*scratch.buf;
    let magic = u16::from_le_bytes([buf[MBR_MAGIC_OFFSET], buf[MBR_MAGIC_OFFSET + 1]]);
    if magic != MBR_MAGIC {
        return Err(EddError::NotBootSector(magic));
    }
    let sig = &buf[MBR_SIG_OFFSET..MBR_SIG_OFFSET + 4];
    Ok(u32::from_le_bytes([sig[0], sig[1], sig[2], sig[3]]))
}

/// Probe every legacy disk id and fill the record's EDD tables.
pub fn query_edd<F, C>(
    fw: &mut F,
    heap: &mut ScratchHeap<'_>,
    params: &mut BootParams,
    mode: EddMode,
    con: &mut C,
    quiet: bool,
) where
    F: Firmware,
    C: Console + ?Sized,
{
    if !mode.probe_geometry() {
        debug!("EDD probing disabled");
        return;
    }

    // Buggy option ROMs can hang here; tell the user how to skip it.
    let mut status = Status::new(con, quiet);
    let _ = status.write_str("Probing EDD (edd=off to disable)... ");

    for slot in 0..EDD_DISK_COUNT {
        let devno = EDD_FIRST_DISK + slot;

        let sector = match get_edd_info(fw, devno) {
            Ok(ei) => {
                let sector = ei.params.bytes_per_sector;
                if params.edd_table().push(ei) {
                    debug!("disk {devno:#04x}: EDD {:#04x}, {sector} bytes/sector", ei.version);
                } else {
                    debug!("disk {devno:#04x}: EDD table full, entry dropped");
                }
                sector
            }
            Err(e) => {
                debug!("disk {devno:#04x}: {e}");
                0
            }
        };

        if mode.read_signatures() {
            match read_mbr_sig(fw, heap, devno, sector) {
                Ok(sig) => {
                    params.mbr_sig_table().set(slot as usize, sig.to_le_bytes());
                    debug!("disk {devno:#04x}: MBR signature {sig:#010x}");
                }
                Err(e) => debug!("disk {devno:#04x}: no signature: {e}"),
            }
        }
    }

    let _ = status.write_str("ok\n");
    info!(
        "EDD: {} geometry entries, {} signature slots",
        params.eddbuf_entries, params.edd_mbr_sig_buf_entries
    );
}
