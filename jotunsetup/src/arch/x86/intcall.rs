// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Firmware gateway backed by `intcall.asm`.

use super::{ds, fs, gs};
use crate::bios::{BiosRegs, EFlags, Firmware};
use core::arch::asm;

unsafe extern "C" {
    /// Load `ireg`, raise `int vector`, store the result in `oreg`.
    #[link_name = "intcall"]
    fn bios_intcall(vector: u8, ireg: *const BiosRegs, oreg: *mut BiosRegs);
}

unsafe fn set_fs(seg: u16) {
    unsafe { asm!("mov fs, {0:x}", in(reg) seg, options(nostack, preserves_flags)) }
}

unsafe fn rdfs8(off: u16) -> u8 {
    let v: u8;
    unsafe {
        asm!(
            "mov {0}, byte ptr fs:[{1:e}]",
            out(reg_byte) v,
            in(reg) off as u32,
            options(nostack, readonly, preserves_flags)
        )
    };
    v
}

unsafe fn wrfs8(off: u16, v: u8) {
    unsafe {
        asm!(
            "mov byte ptr fs:[{1:e}], {0}",
            in(reg_byte) v,
            in(reg) off as u32,
            options(nostack, preserves_flags)
        )
    }
}

/// The machine's real-mode BIOS. Zero-sized; every holder talks to the same firmware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealModeBios;

impl Firmware for RealModeBios {
    fn intcall(&mut self, vector: u8, ireg: &BiosRegs, buf: Option<&mut [u8]>) -> BiosRegs {
        let mut oreg = BiosRegs::default();
        // The registers already point at the buffer; make sure the compiler
        // treats it as written by the call.
        if let Some(b) = buf {
            core::hint::black_box(b.as_mut_ptr());
        }
        unsafe { bios_intcall(vector, ireg, &mut oreg) };
        oreg
    }

    fn far_read(&mut self, seg: u16, off: u16, out: &mut [u8]) {
        unsafe {
            set_fs(seg);
            for (i, b) in out.iter_mut().enumerate() {
                *b = rdfs8(off.wrapping_add(i as u16));
            }
        }
    }

    fn far_write(&mut self, seg: u16, off: u16, data: &[u8]) {
        unsafe {
            set_fs(seg);
            for (i, &b) in data.iter().enumerate() {
                wrfs8(off.wrapping_add(i as u16), b);
            }
        }
    }

    fn initregs(&self) -> BiosRegs {
        let mut r = BiosRegs {
            eflags: EFlags::CARRY.bits(),
            ..BiosRegs::default()
        };
        let ds = ds();
        r.set_ds(ds);
        r.set_es(ds);
        r.set_fs(fs());
        r.set_gs(gs());
        r
    }
}
