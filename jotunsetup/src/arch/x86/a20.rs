// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Address line 20: firmware, keyboard controller, then the fast gate.

use super::intcall::RealModeBios;
use super::{inb, io_delay, outb};
use crate::bios::{Firmware, vector};
use crate::pm::{A20Error, A20Gate};
use log::{debug, warn};

const KBC_DATA: u16 = 0x60;
const KBC_STATUS: u16 = 0x64;
const KBC_OUTPUT_FULL: u8 = 0x01;
const KBC_INPUT_FULL: u8 = 0x02;
const KBC_WRITE_OUTPUT: u8 = 0xd1;
const KBC_A20_ON: u8 = 0xdf;
/// Null command; some UHCI legacy emulation needs it.
const KBC_PULSE_NONE: u8 = 0xff;
const MAX_8042_LOOPS: u32 = 100_000;
/// Consecutive 0xff reads that mean "no controller".
const MAX_8042_FF: u32 = 32;

const SYSTEM_CONTROL_A: u16 = 0x92;

/// Interrupt vector 0x80; seen at 0xffff:0x0210 when the address wraps.
const TEST_ADDR: u16 = 4 * 0x80;
const TEST_SHORT: u32 = 32;
const TEST_LONG: u32 = 1 << 21;
const ENABLE_LOOPS: u32 = 255;

#[derive(Debug, Default)]
pub struct A20 {
    bios: RealModeBios,
}

impl A20 {
    pub const fn new() -> Self {
        Self { bios: RealModeBios }
    }

    fn read32(&mut self, seg: u16, off: u16) -> u32 {
        let mut b = [0u8; 4];
        self.bios.far_read(seg, off, &mut b);
        u32::from_le_bytes(b)
    }

    /// Whether low memory and its 1 MiB alias differ.
    fn test(&mut self, loops: u32) -> bool {
        let saved = self.read32(0x0000, TEST_ADDR);
        let mut ctr = saved;
        let mut enabled = false;
        for _ in 0..loops {
            ctr = ctr.wrapping_add(1);
            self.bios.far_write(0x0000, TEST_ADDR, &ctr.to_le_bytes());
            io_delay();
            if self.read32(0xffff, TEST_ADDR + 0x10) != ctr {
                enabled = true;
                break;
            }
        }
        self.bios.far_write(0x0000, TEST_ADDR, &saved.to_le_bytes());
        enabled
    }

    fn enable_bios(&mut self) {
        let mut ireg = self.bios.initregs();
        ireg.set_ax(0x2401);
        let _ = self.bios.intcall(vector::SYSTEM, &ireg, None);
    }

    fn empty_8042(&mut self) -> bool {
        let mut ffs = MAX_8042_FF;
        for _ in 0..MAX_8042_LOOPS {
            io_delay();
            let status = unsafe { inb(KBC_STATUS) };
            if status == 0xff {
                ffs -= 1;
                if ffs == 0 {
                    return false;
                }
            }
            if status & KBC_OUTPUT_FULL != 0 {
                io_delay();
                let _ = unsafe { inb(KBC_DATA) };
            } else if status & KBC_INPUT_FULL == 0 {
                return true;
            }
        }
        false
    }

    fn enable_kbc(&mut self) {
        self.empty_8042();
        unsafe { outb(KBC_STATUS, KBC_WRITE_OUTPUT) };
        self.empty_8042();
        unsafe { outb(KBC_DATA, KBC_A20_ON) };
        self.empty_8042();
        unsafe { outb(KBC_STATUS, KBC_PULSE_NONE) };
        self.empty_8042();
    }

    fn enable_fast(&mut self) {
        unsafe {
            let port_a = inb(SYSTEM_CONTROL_A);
            // Bit 0 would reset the machine.
            outb(SYSTEM_CONTROL_A, (port_a | 0x02) & !0x01);
        }
    }
}

impl A20Gate for A20 {
    fn enable(&mut self) -> Result<(), A20Error> {
        for attempt in 0..ENABLE_LOOPS {
            if self.test(TEST_SHORT) {
                return Ok(());
            }
            self.enable_bios();
            if self.test(TEST_SHORT) {
                debug!("A20 enabled by BIOS");
                return Ok(());
            }
            let kbc_ok = self.empty_8042();
            if self.test(TEST_SHORT) {
                return Ok(());
            }
            if kbc_ok {
                self.enable_kbc();
                if self.test(TEST_LONG) {
                    debug!("A20 enabled by keyboard controller");
                    return Ok(());
                }
            }
            self.enable_fast();
            if self.test(TEST_LONG) {
                debug!("A20 enabled by port 0x92");
                return Ok(());
            }
            warn!("A20 still off after attempt {}", attempt + 1);
        }
        Err(A20Error::NotResponding)
    }
}
