// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! BIOS teletype output and keyboard input.

use super::intcall::RealModeBios;
use crate::bios::{EFlags, FarWindow, Firmware, vector};
use crate::console::{Console, KEY_TIMEOUT_SECS};
use core::fmt;

/// Timer ticks since midnight, in the BIOS data area.
const BDA_TICKS: u16 = 0x046c;

/// The timer runs at about 18.2 Hz.
const TICKS_PER_10_SECS: u32 = 182;

#[derive(Debug, Default)]
pub struct BiosConsole {
    bios: RealModeBios,
}

impl BiosConsole {
    pub const fn new() -> Self {
        Self { bios: RealModeBios }
    }

    fn putchar(&mut self, ch: u8) {
        let mut ireg = self.bios.initregs();
        ireg.set_bx(0x0007);
        ireg.set_cx(0x0001);
        ireg.set_ah(0x0e);
        ireg.set_al(ch);
        let _ = self.bios.intcall(vector::VIDEO, &ireg, None);
    }

    fn kbd_pending(&mut self) -> bool {
        let mut ireg = self.bios.initregs();
        ireg.set_ah(0x01);
        let oreg = self.bios.intcall(vector::KEYBOARD, &ireg, None);
        !oreg.flags().contains(EFlags::ZERO)
    }

    fn ticks(&mut self) -> u32 {
        FarWindow::new(&mut self.bios, 0).read32(BDA_TICKS)
    }
}

impl fmt::Write for BiosConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.putchar(b'\r');
            }
            self.putchar(b);
        }
        Ok(())
    }
}

impl Console for BiosConsole {
    fn getchar(&mut self) -> u8 {
        let mut ireg = self.bios.initregs();
        ireg.set_ah(0x00);
        self.bios.intcall(vector::KEYBOARD, &ireg, None).al()
    }

    fn getchar_timeout(&mut self) -> Option<u8> {
        let limit = KEY_TIMEOUT_SECS * TICKS_PER_10_SECS / 10;
        let start = self.ticks();
        // The counter resets at midnight; a wrapped difference is huge and ends the wait.
        while self.ticks().wrapping_sub(start) < limit {
            if self.kbd_pending() {
                return Some(self.getchar());
            }
        }
        None
    }

    fn kbd_flush(&mut self) {
        while self.kbd_pending() {
            self.getchar();
        }
    }
}
