// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Firmware call gateway.
//!
//! Every interaction with the legacy BIOS goes through [`Firmware::intcall`]:
//! a software interrupt issued with a caller-built [`BiosRegs`] frame, answered
//! with the frame the firmware left behind. The carry flag of the returned
//! frame is the failure indicator. No retries happen at this layer.
//!
//! Memory outside the default data segment is only reachable through a
//! [`FarWindow`], which borrows the firmware mutably: a window cannot survive
//! a firmware call, and it re-asserts its segment on every access.

use bitflags::bitflags;
use core::fmt;

/// Interrupt vectors used by the setup stage.
pub mod vector {
    pub const VIDEO: u8 = 0x10;
    pub const DISK: u8 = 0x13;
    pub const SYSTEM: u8 = 0x15;
    pub const KEYBOARD: u8 = 0x16;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 6;
        const INTERRUPT = 1 << 9;
    }
}

/// Register frame in hardware push order (`pushad`, then gs/fs/es/ds, then eflags).
///
/// The assembly gateway copies this structure verbatim on and off the stack,
/// so the field order is part of the contract with `intcall.asm`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BiosRegs {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub fsgs: u32,
    pub dses: u32,
    pub eflags: u32,
}

const _: () = assert!(core::mem::size_of::<BiosRegs>() == 44);

macro_rules! reg16 {
    ($($get:ident / $set:ident => $field:ident >> $shift:literal;)*) => {
        $(
            #[inline]
            pub const fn $get(&self) -> u16 {
                (self.$field >> $shift) as u16
            }
            #[inline]
            pub fn $set(&mut self, v: u16) {
                self.$field = (self.$field & !(0xffffu32 << $shift)) | ((v as u32) << $shift);
            }
        )*
    };
}

macro_rules! reg8 {
    ($($get:ident / $set:ident => $field:ident >> $shift:literal;)*) => {
        $(
            #[inline]
            pub const fn $get(&self) -> u8 {
                (self.$field >> $shift) as u8
            }
            #[inline]
            pub fn $set(&mut self, v: u8) {
                self.$field = (self.$field & !(0xffu32 << $shift)) | ((v as u32) << $shift);
            }
        )*
    };
}

impl BiosRegs {
    reg16! {
        ax / set_ax => eax >> 0;
        bx / set_bx => ebx >> 0;
        cx / set_cx => ecx >> 0;
        dx / set_dx => edx >> 0;
        si / set_si => esi >> 0;
        hsi / set_hsi => esi >> 16;
        di / set_di => edi >> 0;
        bp / set_bp => ebp >> 0;
        gs / set_gs => fsgs >> 0;
        fs / set_fs => fsgs >> 16;
        es / set_es => dses >> 0;
        ds / set_ds => dses >> 16;
    }

    reg8! {
        al / set_al => eax >> 0;
        ah / set_ah => eax >> 8;
        bl / set_bl => ebx >> 0;
        bh / set_bh => ebx >> 8;
        cl / set_cl => ecx >> 0;
        ch / set_ch => ecx >> 8;
        dl / set_dl => edx >> 0;
        dh / set_dh => edx >> 8;
    }

    #[inline]
    pub const fn flags(&self) -> EFlags {
        EFlags::from_bits_retain(self.eflags)
    }

    /// The firmware's failure indicator.
    #[inline]
    pub const fn cf(&self) -> bool {
        self.eflags & EFlags::CARRY.bits() != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiosError {
    /// The service returned with the carry flag set; `ah` usually holds a status code.
    Carry { vector: u8, ah: u8 },
}

impl fmt::Display for BiosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiosError::Carry { vector, ah } => {
                write!(f, "int {:#04x} failed (status {:#04x})", vector, ah)
            }
        }
    }
}

/// The legacy firmware, plus raw access to memory beyond the data segment.
pub trait Firmware {
    /// Issue software interrupt `vector` with `ireg` loaded and return the
    /// resulting registers. `buf` is the near buffer the service may fill;
    /// the caller has already pointed the relevant register at it.
    fn intcall(&mut self, vector: u8, ireg: &BiosRegs, buf: Option<&mut [u8]>) -> BiosRegs;

    /// Copy `out.len()` bytes from `seg:off`.
    fn far_read(&mut self, seg: u16, off: u16, out: &mut [u8]);

    /// Copy `data` to `seg:off`.
    fn far_write(&mut self, seg: u16, off: u16, data: &[u8]);

    /// A cleared frame with the carry flag preset, so that a service which
    /// never touches the flags reads as failed.
    fn initregs(&self) -> BiosRegs {
        BiosRegs {
            eflags: EFlags::CARRY.bits(),
            ..BiosRegs::default()
        }
    }

    /// Offset of a data-segment buffer as the firmware sees it.
    fn near_addr(&self, buf: &[u8]) -> u16 {
        buf.as_ptr() as usize as u16
    }

    /// `intcall` with the carry flag folded into a `Result`.
    fn call(
        &mut self,
        vector: u8,
        ireg: &BiosRegs,
        buf: Option<&mut [u8]>,
    ) -> Result<BiosRegs, BiosError> {
        let oreg = self.intcall(vector, ireg, buf);
        if oreg.cf() {
            Err(BiosError::Carry {
                vector,
                ah: oreg.ah(),
            })
        } else {
            Ok(oreg)
        }
    }
}

/// Segment:offset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarPtr {
    pub seg: u16,
    pub off: u16,
}

impl FarPtr {
    /// Decode the `seg << 16 | off` encoding used by far-call vectors.
    pub const fn from_seg_off(raw: u32) -> Self {
        Self {
            seg: (raw >> 16) as u16,
            off: raw as u16,
        }
    }

    /// Normalised pointer for a linear address below 1 MiB + 64 KiB.
    pub const fn from_linear(addr: u32) -> Self {
        Self {
            seg: (addr >> 4) as u16,
            off: (addr & 0xf) as u16,
        }
    }

    pub const fn linear(&self) -> u32 {
        ((self.seg as u32) << 4) + self.off as u32
    }
}

/// Exclusive handle on the far-memory segment register.
pub struct FarWindow<'f, F: Firmware + ?Sized> {
    fw: &'f mut F,
    seg: u16,
}

impl<'f, F: Firmware + ?Sized> FarWindow<'f, F> {
    pub fn new(fw: &'f mut F, seg: u16) -> Self {
        Self { fw, seg }
    }

    pub fn segment(&self) -> u16 {
        self.seg
    }

    pub fn read8(&mut self, off: u16) -> u8 {
        let mut b = [0u8; 1];
        self.fw.far_read(self.seg, off, &mut b);
        b[0]
    }

    pub fn read16(&mut self, off: u16) -> u16 {
        let mut b = [0u8; 2];
        self.fw.far_read(self.seg, off, &mut b);
        u16::from_le_bytes(b)
    }

    pub fn read32(&mut self, off: u16) -> u32 {
        let mut b = [0u8; 4];
        self.fw.far_read(self.seg, off, &mut b);
        u32::from_le_bytes(b)
    }

    pub fn write16(&mut self, off: u16, v: u16) {
        self.fw.far_write(self.seg, off, &v.to_le_bytes());
    }

    pub fn copy_to_slice(&mut self, off: u16, out: &mut [u8]) {
        self.fw.far_read(self.seg, off, out);
    }

    pub fn copy_from_slice(&mut self, off: u16, data: &[u8]) {
        self.fw.far_write(self.seg, off, data);
    }

    /// Write `count` copies of `cell` starting at `off`; returns the offset past the last one.
    pub fn fill16(&mut self, off: u16, count: usize, cell: u16) -> u16 {
        let mut at = off;
        for _ in 0..count {
            self.write16(at, cell);
            at = at.wrapping_add(2);
        }
        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBios;

    #[test]
    fn sub_register_views_alias_the_wide_register() {
        let mut r = BiosRegs::default();
        r.set_ax(0x5300);
        assert_eq!(r.ah(), 0x53);
        assert_eq!(r.al(), 0x00);
        r.set_al(0x04);
        assert_eq!(r.eax, 0x5304);

        r.esi = 0x1234_5678;
        assert_eq!(r.si(), 0x5678);
        assert_eq!(r.hsi(), 0x1234);
        r.set_hsi(0xabcd);
        assert_eq!(r.esi, 0xabcd_5678);

        r.set_es(0x9000);
        r.set_ds(0x1000);
        assert_eq!(r.dses, 0x1000_9000);
    }

    #[test]
    fn initregs_presets_carry() {
        let fw = MockBios::new();
        let r = fw.initregs();
        assert!(r.cf());
        assert_eq!(r.eax, 0);
    }

    #[test]
    fn absent_service_reports_failure() {
        let mut fw = MockBios::new();
        let ireg = fw.initregs();
        let err = fw.call(vector::SYSTEM, &ireg, None).unwrap_err();
        assert_eq!(
            err,
            BiosError::Carry {
                vector: vector::SYSTEM,
                ah: 0
            }
        );
    }

    #[test]
    fn far_window_reads_little_endian() {
        let mut fw = MockBios::new();
        fw.poke(0xf000, 0x0010, &[0x34, 0x12, 0x78, 0x56]);
        let mut w = FarWindow::new(&mut fw, 0xf000);
        assert_eq!(w.read16(0x10), 0x1234);
        assert_eq!(w.read32(0x10), 0x5678_1234);
        assert_eq!(w.read8(0x13), 0x56);
    }

    #[test]
    fn fill16_returns_next_offset() {
        let mut fw = MockBios::new();
        let mut w = FarWindow::new(&mut fw, 0xb800);
        let next = w.fill16(4, 3, 0x0720);
        assert_eq!(next, 10);
        assert_eq!(fw.peek(0xb800, 4, 6), vec![0x20, 0x07, 0x20, 0x07, 0x20, 0x07]);
    }

    #[test]
    fn far_pointer_encodings() {
        let p = FarPtr::from_seg_off(0x9000_0200);
        assert_eq!(p.seg, 0x9000);
        assert_eq!(p.off, 0x0200);
        assert_eq!(p.linear(), 0x90200);
        let q = FarPtr::from_linear(0x9_1234);
        assert_eq!(q.linear(), 0x9_1234);
        assert_eq!(q.off, 0x4);
    }
}
