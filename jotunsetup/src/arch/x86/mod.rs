// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Real-mode implementations of the setup stage's hardware traits.

pub mod a20;
pub mod cpu;
pub mod intcall;
pub mod serial;
pub mod tty;

use core::arch::asm;

#[inline(always)]
pub unsafe fn outb(port: u16, value: u8) {
    unsafe { asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags)) }
}

#[inline(always)]
pub unsafe fn inb(port: u16) -> u8 {
    let v: u8;
    unsafe { asm!("in al, dx", out("al") v, in("dx") port, options(nomem, nostack, preserves_flags)) };
    v
}

/// Write to the POST code port; takes about a microsecond on ISA timing.
#[inline(always)]
pub fn io_delay() {
    unsafe { outb(0x80, 0) }
}

pub fn ds() -> u16 {
    let seg: u16;
    unsafe { asm!("mov {0:x}, ds", out(reg) seg, options(nomem, nostack, preserves_flags)) };
    seg
}

pub fn fs() -> u16 {
    let seg: u16;
    unsafe { asm!("mov {0:x}, fs", out(reg) seg, options(nomem, nostack, preserves_flags)) };
    seg
}

pub fn gs() -> u16 {
    let seg: u16;
    unsafe { asm!("mov {0:x}, gs", out(reg) seg, options(nomem, nostack, preserves_flags)) };
    seg
}

/// Current stack pointer, as an offset in the stack segment.
pub fn sp() -> u16 {
    let sp: u16;
    unsafe { asm!("mov {0:x}, sp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    sp
}
