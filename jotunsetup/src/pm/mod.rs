// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! The one-way switch from real mode to 32-bit protected mode.

pub mod gdt;

use crate::bios::FarPtr;
use crate::bootparams::BootParams;
use core::fmt;
use gdt::{BOOT_GDT, BootGdt, DescriptorTablePointer, NULL_IDT};
use log::{error, info};
use spin::Once;

pub const NMI_PORT: u16 = 0x70;
pub const NMI_DISABLE: u8 = 0x80;
pub const FPU_CLEAR_BUSY_PORT: u16 = 0xf0;
pub const FPU_RESET_PORT: u16 = 0xf1;
pub const PIC1_DATA: u16 = 0x21;
pub const PIC2_DATA: u16 = 0xa1;
pub const IO_DELAY_PORT: u16 = 0x80;

/// Everything masked except IRQ2, the cascade from the secondary PIC.
pub const PIC1_MASK: u8 = 0xfb;
pub const PIC2_MASK: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A20Error {
    NotResponding,
}

impl fmt::Display for A20Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A20Error::NotResponding => f.write_str("A20 gate not responding"),
        }
    }
}

/// Address line 20 enable, provided by the platform.
pub trait A20Gate {
    fn enable(&mut self) -> Result<(), A20Error>;
}

/// CPU primitives the transition needs. The runtime implements these with
/// port I/O and inline assembly; nothing above this trait touches hardware.
pub trait Cpu {
    fn outb(&mut self, port: u16, value: u8);

    /// A short bus delay after a port write.
    fn io_delay(&mut self) {
        self.outb(IO_DELAY_PORT, 0);
    }

    fn cli(&mut self);

    /// Far-call a loader-supplied routine.
    ///
    /// # Safety
    /// `target` must point at real-mode code that returns with `retf`.
    unsafe fn call_far(&mut self, target: FarPtr);

    fn load_idt(&mut self, ptr: &'static DescriptorTablePointer);

    fn load_gdt(&mut self, ptr: &'static DescriptorTablePointer);

    /// Linear address of a data-segment offset.
    fn linear(&self, near: usize) -> u32;

    /// Enter protected mode and jump to `entry` with the record at `boot_params`.
    fn jump_to_protected_mode(&mut self, entry: u32, boot_params: u32) -> !;

    /// Halt forever.
    fn die(&mut self) -> !;
}

static GDT_PTR: Once<DescriptorTablePointer> = Once::new();

fn outb_p<C: Cpu + ?Sized>(cpu: &mut C, port: u16, value: u8) {
    cpu.outb(port, value);
    cpu.io_delay();
}

/// Give the loader's hook a chance to run, or quiesce interrupts ourselves.
fn realmode_switch_hook<C: Cpu + ?Sized>(cpu: &mut C, hook: u32) {
    if hook != 0 {
        let target = FarPtr::from_seg_off(hook);
        info!("calling real-mode switch hook at {:04x}:{:04x}", target.seg, target.off);
        // SAFETY: the loader placed a routine there and asked us to call it.
        unsafe { cpu.call_far(target) };
    } else {
        cpu.cli();
        outb_p(cpu, NMI_PORT, NMI_DISABLE);
    }
}

fn reset_coprocessor<C: Cpu + ?Sized>(cpu: &mut C) {
    outb_p(cpu, FPU_CLEAR_BUSY_PORT, 0);
    outb_p(cpu, FPU_RESET_PORT, 0);
}

fn mask_all_interrupts<C: Cpu + ?Sized>(cpu: &mut C) {
    outb_p(cpu, PIC2_DATA, PIC2_MASK);
    outb_p(cpu, PIC1_DATA, PIC1_MASK);
}

fn setup_idt<C: Cpu + ?Sized>(cpu: &mut C) {
    cpu.load_idt(&NULL_IDT);
}

fn setup_gdt<C: Cpu + ?Sized>(cpu: &mut C) {
    let base = cpu.linear(&BOOT_GDT as *const BootGdt as usize);
    let ptr = GDT_PTR.call_once(|| DescriptorTablePointer::new(BootGdt::LIMIT, base));
    cpu.load_gdt(ptr);
}

/// Run the transition. Only A20 failure stops it, and that halts the machine.
pub fn go_to_protected_mode<C, A, W>(cpu: &mut C, a20: &mut A, con: &mut W, params: &BootParams) -> !
where
    C: Cpu + ?Sized,
    A: A20Gate + ?Sized,
    W: fmt::Write + ?Sized,
{
    let hook = params.hdr.realmode_swtch;
    let entry = params.hdr.code32_start;

    realmode_switch_hook(cpu, hook);

    if let Err(e) = a20.enable() {
        let _ = con.write_str("A20 gate not responding, unable to boot...\n");
        error!("{e}; halting");
        cpu.die();
    }

    reset_coprocessor(cpu);
    mask_all_interrupts(cpu);
    setup_idt(cpu);
    setup_gdt(cpu);

    let record = cpu.linear(params as *const BootParams as usize);
    info!("entering protected mode: entry {entry:#x}, boot params at {record:#x}");
    cpu.jump_to_protected_mode(entry, record)
}
