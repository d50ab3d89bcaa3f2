// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! CPU primitives for the mode switch.

use super::ds;
use crate::bios::FarPtr;
use crate::pm::Cpu;
use crate::pm::gdt::DescriptorTablePointer;
use core::arch::asm;

unsafe extern "C" {
    /// Set CR0.PE, reload the segments with the boot selectors and jump to
    /// `entry` with the record's linear address in ESI.
    fn protected_mode_jump(entry: u32, boot_params: u32) -> !;
}

#[derive(Debug, Default)]
pub struct RealModeCpu;

impl Cpu for RealModeCpu {
    fn outb(&mut self, port: u16, value: u8) {
        unsafe { super::outb(port, value) }
    }

    fn io_delay(&mut self) {
        super::io_delay();
    }

    fn cli(&mut self) {
        unsafe { asm!("cli", options(nomem, nostack)) }
    }

    unsafe fn call_far(&mut self, target: FarPtr) {
        // lcallw takes an offset:segment pair from memory.
        let ptr: [u16; 2] = [target.off, target.seg];
        unsafe {
            asm!(
                "lcallw *({0})",
                in(reg) &ptr,
                out("ebx") _,
                clobber_abi("C"),
                options(att_syntax)
            )
        }
    }

    fn load_idt(&mut self, ptr: &'static DescriptorTablePointer) {
        unsafe {
            asm!(
                "lidtl ({0})",
                in(reg) ptr,
                options(att_syntax, readonly, nostack, preserves_flags)
            )
        }
    }

    fn load_gdt(&mut self, ptr: &'static DescriptorTablePointer) {
        unsafe {
            asm!(
                "lgdtl ({0})",
                in(reg) ptr,
                options(att_syntax, readonly, nostack, preserves_flags)
            )
        }
    }

    fn linear(&self, near: usize) -> u32 {
        ((ds() as u32) << 4) + near as u32
    }

    fn jump_to_protected_mode(&mut self, entry: u32, boot_params: u32) -> ! {
        unsafe { protected_mode_jump(entry, boot_params) }
    }

    fn die(&mut self) -> ! {
        loop {
            unsafe { asm!("hlt", options(nomem, nostack)) }
        }
    }
}
